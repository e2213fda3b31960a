//! One generation run, stage by stage.
//!
//! Each stage either writes its artifact completely or fails before writing
//! anything; earlier artifacts are left in place when a later stage fails.

use std::path::Path;

use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use crate::config::{Config, Layout};
use crate::error::{GenerationError, Result};
use crate::lists;
use crate::relations::RelationGraphBuilder;
use crate::render::Renderer;
use crate::rotation::RotationScheduleBuilder;
use crate::source;

/// What a completed run produced.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub seed: u64,
    pub start_date: NaiveDate,
    pub regions: usize,
    pub relations: usize,
    pub days: usize,
    pub images: usize,
}

/// Tomorrow in local time, the default first scheduled day.
pub fn tomorrow() -> Result<NaiveDate> {
    Ok(Local::now()
        .date_naive()
        .succ_opt()
        .ok_or(GenerationError::DateOverflow { days: 1 })?)
}

/// Run every stage for the project rooted at `project_dir`.
pub fn run(config: &Config, project_dir: &Path) -> Result<RunSummary> {
    config.validate()?;
    let layout = Layout::new(project_dir);

    let seed = config.schedule.seed.unwrap_or_else(|| rand::random());
    let start_date = match config.schedule.start_date {
        Some(date) => date,
        None => tomorrow()?,
    };
    info!(seed, %start_date, project = %project_dir.display(), "starting generation run");

    let store = source::load_regions(&layout.input_dir, &config.source)?;

    info!("calculating relations");
    let graph = RelationGraphBuilder::new(&store).build()?;
    lists::write_relations(&layout.data_dir, &graph)?;

    info!("creating data lists");
    lists::write_municipality_list(&layout.data_dir, &store)?;

    let assignment = RotationScheduleBuilder::new(seed)
        .rounds(config.schedule.rounds)
        .window(config.schedule.window)
        .max_retries(config.schedule.max_retries)
        .build(&store.ids(), start_date)?;
    lists::write_date_list(&layout.data_dir, &assignment)?;
    if let Some(last) = assignment.last_date() {
        info!(first = %start_date, %last, "schedule covers");
    }

    let images = if config.images.enabled {
        Renderer::new(
            config.images.max_size,
            config.images.base_color,
            config.images.highlight_color,
        )
        .margin(config.images.country_margin)
        .render_all(&store, &layout.image_dir)?
    } else {
        warn!("image rendering disabled");
        0
    };

    let summary = RunSummary {
        seed,
        start_date,
        regions: store.len(),
        relations: graph.directed_len(),
        days: assignment.len(),
        images,
    };
    info!(?summary, "generation run complete");
    Ok(summary)
}
