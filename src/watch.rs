//! Watch mode for processing sprites as they land in a directory
//!
//! Provides debounced file system watching for the `spritegrid watch` command.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;
use thiserror::Error;

use crate::config::WatchConfig;

/// Error during watch mode
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch path: {0}")]
    WatchPath(notify::Error),
    /// Channel receive error
    #[error("Watch channel error: {0}")]
    ChannelError(String),
    /// Watched directory not found
    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
}

/// Options for watch mode
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Directory to watch
    pub src_dir: PathBuf,
    /// Output directory; events inside it are ignored
    pub out_dir: PathBuf,
    /// File name pattern of inputs, e.g. `*.png`
    pub pattern: glob::Pattern,
    pub config: WatchConfig,
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Current UTC time of day as `HH:MM:SS`
pub fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Whether a changed path is an input: its file name matches `pattern` and it
/// does not live under `out_dir`.
pub fn is_relevant_file(path: &Path, pattern: &glob::Pattern, out_dir: &Path) -> bool {
    if path.starts_with(out_dir) {
        return false;
    }
    path.file_name()
        .map(|name| pattern.matches(&name.to_string_lossy()))
        .unwrap_or(false)
}

/// Watch `options.src_dir` and call `on_change` for each input file that was
/// created or modified, once per debounce window.
///
/// Blocks until the event channel closes. Watcher errors are reported and
/// watching continues.
pub fn watch_directory<F>(options: &WatchOptions, mut on_change: F) -> Result<(), WatchError>
where
    F: FnMut(&Path),
{
    if !options.src_dir.is_dir() {
        return Err(WatchError::SourceNotFound(options.src_dir.clone()));
    }
    // Events carry absolute paths.
    let out_dir = options.out_dir.canonicalize().unwrap_or_else(|_| options.out_dir.clone());

    let (tx, rx) = channel();
    let debounce = Duration::from_millis(options.config.debounce_ms as u64);
    let mut debouncer = new_debouncer(debounce, tx).map_err(WatchError::WatcherInit)?;
    debouncer
        .watcher()
        .watch(&options.src_dir, RecursiveMode::NonRecursive)
        .map_err(WatchError::WatchPath)?;

    println!("[{}] Watching {} for changes...", timestamp(), options.src_dir.display());
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let mut changed: Vec<PathBuf> = events
                    .into_iter()
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                    .map(|e| e.path)
                    .filter(|p| p.is_file() && is_relevant_file(p, &options.pattern, &out_dir))
                    .collect();
                changed.sort();
                changed.dedup();
                if changed.is_empty() {
                    continue;
                }
                for path in &changed {
                    tracing::debug!(path = %path.display(), "input changed");
                    on_change(path);
                }
                println!(
                    "[{}] Watching {} for changes...",
                    timestamp(),
                    options.src_dir.display()
                );
            }
            Ok(Err(error)) => {
                eprintln!("[{}] Watch error: {:?}", timestamp(), error);
                eprintln!("[{}] Continuing to watch...", timestamp());
            }
            Err(e) => {
                return Err(WatchError::ChannelError(e.to_string()));
            }
        }
    }
}
