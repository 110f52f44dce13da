//! Parsing and validation of `tycache.toml` configuration files.
//!
//! This crate reads the optional project configuration file and produces a
//! strongly-typed [`CacheOptions`] describing where the artifact cache lives
//! and how large it may grow.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use types::*;
