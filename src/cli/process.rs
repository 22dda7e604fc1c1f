//! Process and batch command implementations

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use glob::glob;
use serde::Serialize;

use crate::error::SpriteError;
use crate::gif::save_gif;
use crate::models::{BatchSummary, SourceImage};
use crate::output::{encode_png_base64, save_png, write_metadata_json};
use crate::pipeline::{Pipeline, ProcessOutput, SheetMetadata};
use crate::runner::FrameTransform;

use super::{
    load_settings, report_error, ProcessArgs, SliceArgs, EXIT_ERROR, EXIT_INVALID_ARGS,
    EXIT_SUCCESS,
};

/// `--json` payload of the process command.
#[derive(Serialize)]
struct ProcessReport<'a> {
    metadata: &'a SheetMetadata,
    summary: &'a BatchSummary,
    png_base64: String,
}

/// Run the pipeline on one file and write the sheet to `output`.
fn process_file(
    pipeline: &Pipeline,
    input: &Path,
    output: &Path,
    slicing: &SliceArgs,
    transform: &dyn FrameTransform,
) -> crate::Result<ProcessOutput> {
    let grid = slicing.grid_spec()?;
    let opts = slicing.extract_options();

    let result = if slicing.is_animated(input) {
        let bytes = std::fs::read(input)?;
        pipeline.process_animation(&bytes, opts, &grid, transform)?
    } else {
        let image = SourceImage::open(input)?;
        pipeline.process_sheet(&image, &grid, opts, transform)?
    };

    save_png(&result.image, output)?;
    Ok(result)
}

fn print_summary(input: &Path, output: &Path, result: &ProcessOutput) {
    let meta = &result.metadata;
    println!(
        "{} -> {} ({} grid, {} frames of {}x{})",
        input.display(),
        output.display(),
        meta.grid,
        meta.frames,
        meta.frame_width,
        meta.frame_height
    );
    if !result.summary.any_succeeded() {
        eprintln!("Warning: transform failed on every frame (kept originals)");
    } else if !meta.failed_frames.is_empty() {
        eprintln!(
            "Warning: transform failed on {} of {} frames (kept originals): {:?}",
            meta.failed_frames.len(),
            meta.frames,
            meta.failed_frames
        );
    }
}

fn warn_low_confidence(result: &ProcessOutput, threshold: f64) {
    if let Some(confidence) = result.metadata.confidence {
        if confidence < threshold {
            eprintln!(
                "Warning: inferred grid {} has low confidence ({:.3}); consider --grid",
                result.metadata.grid, confidence
            );
        }
    }
}

/// Execute the process command
pub fn run_process(
    input: &Path,
    output: &Path,
    slicing: &SliceArgs,
    processing: &ProcessArgs,
    meta: Option<&Path>,
    gif: Option<&Path>,
    json: bool,
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
    let output_config = config.output.clone();
    let pipeline = Pipeline::new(config);

    let result = match process_file(&pipeline, input, output, slicing, transform.as_ref()) {
        Ok(result) => result,
        Err(e) => return report_error(&format!("cannot process '{}'", input.display()), &e),
    };
    warn_low_confidence(&result, output_config.low_confidence);

    if let Some(meta_path) = meta {
        if let Err(e) = write_metadata_json(&result.metadata, meta_path) {
            return report_error(&format!("cannot write '{}'", meta_path.display()), &e);
        }
    }
    if let Some(gif_path) = gif {
        if let Err(e) =
            save_gif(gif_path, &result.frames, output_config.fps, output_config.loop_animation)
        {
            return report_error(&format!("cannot write '{}'", gif_path.display()), &e);
        }
    }

    if json {
        let png_base64 = match encode_png_base64(&result.image) {
            Ok(s) => s,
            Err(e) => return report_error("cannot encode PNG", &e),
        };
        let report =
            ProcessReport { metadata: &result.metadata, summary: &result.summary, png_base64 };
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{}", s),
            Err(e) => return report_error("cannot serialize report", &SpriteError::from(e)),
        }
    } else {
        print_summary(input, output, &result);
    }

    ExitCode::from(EXIT_SUCCESS)
}

/// Files in `dir` matching `pattern`, sorted.
pub(crate) fn matching_files(
    dir: &Path,
    pattern: &str,
) -> Result<Vec<PathBuf>, glob::PatternError> {
    let full = format!("{}/{}", dir.display(), pattern);
    let mut files: Vec<PathBuf> =
        glob(&full)?.filter_map(Result::ok).filter(|p| p.is_file()).collect();
    files.sort();
    Ok(files)
}

/// What happened to one input of a batch or watch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileOutcome {
    Written,
    Skipped,
    Failed,
}

/// Per-file work shared by the batch and watch commands: `<stem>.png` and
/// `<stem>.json` in the output directory for every input.
pub(crate) struct BatchJob<'a> {
    pub pipeline: &'a Pipeline,
    pub slicing: &'a SliceArgs,
    pub transform: &'a dyn FrameTransform,
    pub output_dir: &'a Path,
    pub overwrite: bool,
}

impl BatchJob<'_> {
    /// Sheet and metadata paths for `input`.
    pub fn outputs(&self, input: &Path) -> (PathBuf, PathBuf) {
        let stem = input.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        (
            self.output_dir.join(format!("{}.png", stem)),
            self.output_dir.join(format!("{}.json", stem)),
        )
    }

    /// Process `input` unless its sheet already exists and overwriting is off.
    pub fn run(&self, input: &Path) -> FileOutcome {
        let (output, meta) = self.outputs(input);
        if !self.overwrite && output.exists() {
            println!("Skip exists: {}", output.display());
            return FileOutcome::Skipped;
        }

        let outcome = process_file(self.pipeline, input, &output, self.slicing, self.transform)
            .and_then(|result| write_metadata_json(&result.metadata, &meta).map(|_| result));
        match outcome {
            Ok(result) => {
                warn_low_confidence(&result, self.pipeline.config().output.low_confidence);
                print_summary(input, &output, &result);
                FileOutcome::Written
            }
            Err(e) => {
                eprintln!("Error: {}: {}", input.display(), e);
                FileOutcome::Failed
            }
        }
    }
}

/// Execute the batch command - process every matching file, continuing past failures
pub fn run_batch(
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
    let pipeline = Pipeline::new(config);

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

    let job = BatchJob {
        pipeline: &pipeline,
        slicing,
        transform: transform.as_ref(),
        output_dir,
        overwrite,
    };
    let outcomes: Vec<FileOutcome> = files.iter().map(|input| job.run(input)).collect();
    let count = |kind: FileOutcome| outcomes.iter().filter(|o| **o == kind).count();
    let (failures, skipped) = (count(FileOutcome::Failed), count(FileOutcome::Skipped));

    let mut line = format!("Processed {} of {} files", count(FileOutcome::Written), files.len());
    if skipped > 0 {
        line.push_str(&format!(", {} skipped", skipped));
    }
    println!("{}", line);
    if failures > 0 {
        ExitCode::from(EXIT_ERROR)
    } else {
        ExitCode::from(EXIT_SUCCESS)
    }
}
