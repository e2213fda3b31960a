use std::error::Error as _;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::Parser;

use regiondle::config::{parse_color, Config};
use regiondle::pipeline;

#[derive(Parser, Debug)]
#[command(name = "regiondle")]
#[command(about = "Generate relation, schedule and image artifacts for the daily region game")]
struct Args {
    /// Project folder containing input_data/ and public/
    #[arg(short = 'd', long, default_value = ".")]
    project_dir: PathBuf,

    /// TOML config file (CLI flags override its values)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Random seed (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of rotation rounds
    #[arg(short, long)]
    rounds: Option<usize>,

    /// Maximum displacement between consecutive rounds
    #[arg(short, long)]
    window: Option<usize>,

    /// First scheduled day, YYYY-MM-DD (default: tomorrow)
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Pixel length of the longer image side
    #[arg(long)]
    max_image_size: Option<u32>,

    /// Region color as r,g,b,a
    #[arg(long, value_parser = parse_color)]
    base_color: Option<[u8; 4]>,

    /// Highlight color as r,g,b,a
    #[arg(long, value_parser = parse_color)]
    highlight_color: Option<[u8; 4]>,

    /// Skip PNG rendering
    #[arg(long)]
    skip_images: bool,

    /// Log level filter (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(seed) = self.seed {
            config.schedule.seed = Some(seed);
        }
        if let Some(rounds) = self.rounds {
            config.schedule.rounds = rounds;
        }
        if let Some(window) = self.window {
            config.schedule.window = window;
        }
        if let Some(date) = self.start_date {
            config.schedule.start_date = Some(date);
        }
        if let Some(size) = self.max_image_size {
            config.images.max_size = size;
        }
        if let Some(color) = self.base_color {
            config.images.base_color = color;
        }
        if let Some(color) = self.highlight_color {
            config.images.highlight_color = color;
        }
        if self.skip_images {
            config.images.enabled = false;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("error: {}", err);
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };
    args.apply(&mut config);
    config.logging.init();

    match pipeline::run(&config, &args.project_dir) {
        Ok(summary) => {
            println!(
                "Generated {} relations, {} days and {} images for {} regions (seed {})",
                summary.relations, summary.days, summary.images, summary.regions, summary.seed
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "generation failed");
            let mut source = err.source();
            while let Some(cause) = source {
                tracing::error!(cause = %cause, "caused by");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
