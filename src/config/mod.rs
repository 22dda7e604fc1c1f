//! Configuration for spritegrid
//!
//! Provides types and parsing for `spritegrid.toml`.

pub mod loader;
pub mod schema;

pub use loader::{load_config, merge_cli_overrides, CliOverrides, ConfigError};
pub use schema::*;
