//! Watch command implementation

use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use crate::pipeline::Pipeline;
use crate::watch::{format_duration, timestamp, watch_directory, WatchError, WatchOptions};

use super::process::{matching_files, BatchJob, FileOutcome};
use super::{
    load_settings, report_error, ProcessArgs, SliceArgs, EXIT_ERROR, EXIT_INVALID_ARGS,
    EXIT_SUCCESS,
};

/// Process one changed input and log how long it took.
fn process_changed(job: &BatchJob<'_>, input: &Path) {
    let start = Instant::now();
    if job.run(input) == FileOutcome::Written {
        let name = input.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        println!("[{}] Processed {} ({})", timestamp(), name, format_duration(start.elapsed()));
    }
}

/// Execute the watch command - process existing inputs, then each new or
/// changed one until interrupted
pub fn run_watch(
    dir: &Path,
    output_dir: &Path,
    pattern: &str,
    overwrite: bool,
    slicing: &SliceArgs,
    processing: &ProcessArgs,
    config_path: Option<&Path>,
) -> ExitCode {
    let config = match load_settings(config_path, &processing.overrides()) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let transform = match processing.build_transform(&config) {
        Ok(t) => t,
        Err(e) => return report_error("invalid transform", &e),
    };
    if let Err(e) = slicing.grid_spec() {
        return report_error("invalid grid", &e);
    }
    let glob_pattern = match glob::Pattern::new(pattern) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: invalid pattern '{}': {}", pattern, e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        eprintln!("Error: cannot create '{}': {}", output_dir.display(), e);
        return ExitCode::from(EXIT_ERROR);
    }

    let options = WatchOptions {
        src_dir: dir.to_path_buf(),
        out_dir: output_dir.to_path_buf(),
        pattern: glob_pattern,
        config: config.watch.clone(),
    };
    let pipeline = Pipeline::new(config);
    let job = BatchJob {
        pipeline: &pipeline,
        slicing,
        transform: transform.as_ref(),
        output_dir,
        overwrite,
    };

    if let Ok(existing) = matching_files(dir, pattern) {
        for input in &existing {
            process_changed(&job, input);
        }
    }

    match watch_directory(&options, |input| process_changed(&job, input)) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            if matches!(e, WatchError::SourceNotFound(_)) {
                ExitCode::from(EXIT_INVALID_ARGS)
            } else {
                ExitCode::from(EXIT_ERROR)
            }
        }
    }
}
