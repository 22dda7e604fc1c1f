//! Configuration loading and discovery for `spritegrid.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::SpritegridConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file searched for.
pub const CONFIG_FILE_NAME: &str = "spritegrid.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse spritegrid.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Number of transform workers
    pub jobs: Option<usize>,
    /// Maximum frames per batch
    pub max_frames_cap: Option<usize>,
    /// Force the flood-fill component path
    pub flood_fill: Option<bool>,
    /// Frame rate for animation output
    pub fps: Option<u32>,
    /// Output sheet width in frames
    pub frames_per_row: Option<u32>,
}

/// Find spritegrid.toml by walking up from the current working directory.
///
/// Search order:
/// 1. Walk up from current directory looking for spritegrid.toml
/// 2. Check XDG_CONFIG_HOME/spritegrid/spritegrid.toml (or ~/.config/spritegrid/spritegrid.toml)
pub fn find_config() -> Option<PathBuf> {
    if let Ok(cwd) = env::current_dir() {
        if let Some(path) = find_config_from(cwd) {
            return Some(path);
        }
    }

    find_xdg_config()
}

/// Find spritegrid.toml in the XDG config directory.
pub fn find_xdg_config() -> Option<PathBuf> {
    let xdg_config = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok()?;

    let config_path = xdg_config.join("spritegrid").join(CONFIG_FILE_NAME);
    if config_path.exists() {
        Some(config_path)
    } else {
        None
    }
}

/// Find spritegrid.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a spritegrid.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns the defaults.
///
/// # Example
/// ```ignore
/// let config = load_config(None)?;
/// let config = load_config(Some(Path::new("sheets/spritegrid.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<SpritegridConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(SpritegridConfig::default()),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<SpritegridConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: SpritegridConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    tracing::debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut SpritegridConfig, overrides: &CliOverrides) {
    if let Some(jobs) = overrides.jobs {
        config.runner.jobs = Some(jobs.max(1));
    }

    if let Some(cap) = overrides.max_frames_cap {
        config.limits.max_frames = cap;
    }

    if overrides.flood_fill == Some(true) {
        config.components.strategy = super::ComponentStrategy::FloodFill;
    }

    if let Some(fps) = overrides.fps {
        config.output.fps = fps;
    }

    if let Some(frames_per_row) = overrides.frames_per_row {
        config.output.frames_per_row = Some(frames_per_row);
    }
}
