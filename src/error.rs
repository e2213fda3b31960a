//! Error types for every stage of a generation run.

use std::path::PathBuf;

use thiserror::Error;

/// Region source could not be read or is malformed.
#[derive(Error, Debug)]
pub enum DataLoadError {
    #[error("failed to read region source {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse region source {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("feature #{index} has no usable '{property}' property")]
    MissingProperty { index: usize, property: String },

    #[error("feature '{id}' has unsupported geometry type '{kind}'")]
    UnsupportedGeometry { id: String, kind: String },

    #[error("feature '{id}' has malformed geometry: {reason}")]
    MalformedGeometry { id: String, reason: String },

    #[error("duplicate region id '{0}'")]
    DuplicateId(String),

    #[error("region source {0} contains no features")]
    Empty(PathBuf),
}

/// A region's geometry cannot take part in distance/bearing queries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("region '{0}' has no geometry")]
    Missing(String),

    #[error("region '{0}' has an undefined centroid")]
    UndefinedCentroid(String),

    #[error("region '{0}' is degenerate (zero area)")]
    Degenerate(String),

    #[error("region '{0}' has non-finite coordinates")]
    NonFinite(String),
}

/// The rotation schedule could not be produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("round {round}: no shuffle satisfied the round boundary after {attempts} attempts")]
    RetriesExhausted { round: usize, attempts: usize },

    #[error("date range overflows the calendar after {days} days")]
    DateOverflow { days: usize },
}

/// Invalid run parameters.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    DataLoad(#[from] DataLoadError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
