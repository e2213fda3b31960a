//! Data generator for a daily region-guessing game.
//!
//! Re-exports modules for use by the binary and tests.

pub mod config;
pub mod error;
pub mod lists;
pub mod pipeline;
pub mod region;
pub mod relations;
pub mod render;
pub mod rotation;
pub mod shuffle;
pub mod source;

pub use error::{Error, Result};
