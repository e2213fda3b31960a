//! Run configuration.
//!
//! Every setting defaults to the Danish municipality data set. A TOML file
//! can override any of them, and CLI flags override the file.
//!
//! ```toml
//! [source]
//! file = "regions.geojson"
//! id_property = "kommunekode"
//! name_property = "navn"
//!
//! [schedule]
//! rounds = 10
//! window = 10
//! seed = 42
//! start_date = "2025-01-01"
//!
//! [images]
//! max_size = 512
//! country_margin = 1.0
//! base_color = [0, 109, 44, 255]
//! highlight_color = [222, 45, 38, 255]
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::ConfigError;
use crate::rotation::RotationScheduleBuilder;

/// Where the region source lives and which properties hold id and name.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    /// File name inside the input folder.
    pub file: String,
    pub id_property: String,
    pub name_property: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            file: "regions.geojson".into(),
            id_property: "kommunekode".into(),
            name_property: "navn".into(),
        }
    }
}

/// Rotation schedule parameters.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub rounds: usize,
    pub window: usize,
    pub max_retries: usize,
    /// Random seed; a fresh one is drawn (and logged) when absent.
    pub seed: Option<u64>,
    /// First scheduled day; tomorrow when absent.
    pub start_date: Option<NaiveDate>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            rounds: RotationScheduleBuilder::DEFAULT_ROUNDS,
            window: RotationScheduleBuilder::DEFAULT_WINDOW,
            max_retries: RotationScheduleBuilder::DEFAULT_MAX_RETRIES,
            seed: None,
            start_date: None,
        }
    }
}

/// Image rendering parameters.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImageConfig {
    pub enabled: bool,
    /// Pixel length of the longer side of every image.
    pub max_size: u32,
    /// Padding around all regions in the highlight images, in source units.
    pub country_margin: f64,
    pub base_color: [u8; 4],
    pub highlight_color: [u8; 4],
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 512,
            country_margin: crate::render::COUNTRY_MARGIN,
            base_color: [0, 109, 44, 255],
            highlight_color: [222, 45, 38, 255],
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl LoggingConfig {
    /// Install the global tracing subscriber. `RUST_LOG` takes precedence over `level`.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        let result = match self.format.as_str() {
            "json" => fmt().json().with_env_filter(filter).try_init(),
            _ => fmt().with_env_filter(filter).try_init(),
        };
        if let Err(err) = result {
            eprintln!("logging already initialized: {}", err);
        }
    }
}

/// Folder layout of a project, relative to its root.
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    pub input_dir: PathBuf,
    pub data_dir: PathBuf,
    pub image_dir: PathBuf,
}

impl Layout {
    pub fn new(project_dir: &Path) -> Self {
        let public = project_dir.join("public");
        Self {
            input_dir: project_dir.join("input_data"),
            data_dir: public.join("data"),
            image_dir: public.join("images"),
        }
    }
}

/// Complete settings for one generation run.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub schedule: ScheduleConfig,
    pub images: ImageConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_toml(&text)
    }

    pub fn parse_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(ConfigError::Parse)
    }

    /// Reject settings the generator cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule.rounds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "schedule.rounds",
                reason: "must be at least 1".into(),
            });
        }
        if self.schedule.window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "schedule.window",
                reason: "must be at least 1".into(),
            });
        }
        if self.schedule.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "schedule.max_retries",
                reason: "must be at least 1".into(),
            });
        }
        if self.images.max_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "images.max_size",
                reason: "must be at least 1 pixel".into(),
            });
        }
        if !self.images.country_margin.is_finite() || self.images.country_margin < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "images.country_margin",
                reason: "must be a finite, non-negative distance".into(),
            });
        }
        if self.source.id_property.is_empty() || self.source.name_property.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "source",
                reason: "id and name properties must be named".into(),
            });
        }
        Ok(())
    }
}

/// Parse `r,g,b,a` into an RGBA color.
pub fn parse_color(s: &str) -> Result<[u8; 4], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(format!("expected r,g,b,a but got '{}'", s));
    }
    let mut color = [0u8; 4];
    for (channel, part) in color.iter_mut().zip(&parts) {
        *channel = part
            .parse()
            .map_err(|_| format!("'{}' is not a channel value 0-255", part))?;
    }
    Ok(color)
}
