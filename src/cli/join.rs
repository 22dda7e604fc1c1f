//! Join command implementation

use std::path::Path;
use std::process::ExitCode;

use crate::config::CliOverrides;
use crate::models::{GridSpec, SourceImage};
use crate::output::save_png;
use crate::pipeline::Pipeline;

use super::process::matching_files;
use super::{load_settings, report_error, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Execute the join command - tile every matching frame file into one sheet
pub fn run_join(
    dir: &Path,
    output: &Path,
    pattern: &str,
    grid: &str,
    frames_per_row: Option<u32>,
    config_path: Option<&Path>,
) -> ExitCode {
    let overrides = CliOverrides { frames_per_row, ..CliOverrides::default() };
    let config = match load_settings(config_path, &overrides) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let grid = match grid.parse::<GridSpec>() {
        Ok(grid) => grid,
        Err(e) => return report_error("invalid grid", &e),
    };

    let files = match matching_files(dir, pattern) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Error: invalid pattern '{}': {}", pattern, e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };
    if files.is_empty() {
        eprintln!("Error: no files matching '{}' in '{}'", pattern, dir.display());
        return ExitCode::from(EXIT_INVALID_ARGS);
    }

    let mut frames = Vec::with_capacity(files.len());
    for path in &files {
        match SourceImage::open(path) {
            Ok(image) => frames.push(image.into_pixels()),
            Err(e) => return report_error(&format!("cannot read '{}'", path.display()), &e),
        }
    }

    let pipeline = Pipeline::new(config);
    let sheet = match pipeline.join_frames(frames, &grid) {
        Ok(sheet) => sheet,
        Err(e) => return report_error("cannot join frames", &e),
    };
    if let Err(e) = save_png(&sheet.image, output) {
        eprintln!("Error: cannot write '{}': {}", output.display(), e);
        return ExitCode::from(EXIT_ERROR);
    }

    println!(
        "Joined {} frames into {} ({}x{} grid, {}x{})",
        files.len(),
        output.display(),
        sheet.cols,
        sheet.rows,
        sheet.image.width(),
        sheet.image.height()
    );
    ExitCode::from(EXIT_SUCCESS)
}
