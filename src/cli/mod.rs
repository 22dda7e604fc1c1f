//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod analyze;
mod join;
mod process;
mod split;
mod watch;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::{load_config, merge_cli_overrides, CliOverrides, SpritegridConfig};
use crate::error::SpriteError;
use crate::extract::ExtractOptions;
use crate::models::{parse_dims, GridSpec};
use crate::runner::FrameTransform;
use crate::transform::{CommandTransform, Identity, WhiteKey};

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Extensions treated as animations unless `--animated` says otherwise.
const ANIMATED_EXTENSIONS: &[&str] = &["gif", "apng", "webp"];

/// Whether a path looks like an animated image (.gif, .apng, .webp).
pub fn is_animated_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ANIMATED_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// spritegrid - Detect, slice, process and re-tile sprite grids
#[derive(Parser)]
#[command(name = "spritegrid")]
#[command(about = "Detect sprite grids, split frames, process them and rebuild spritesheets")]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to spritegrid.toml (default: search from the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Infer the sprite grid of a spritesheet
    Analyze {
        /// Spritesheet image
        image: PathBuf,

        /// Print the full analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// List grid layouts that divide an image evenly
    Suggest {
        /// Spritesheet image
        image: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Split a spritesheet or animation into frame_NNNN.png files
    Split {
        /// Spritesheet or animation
        image: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        slicing: SliceArgs,
    },

    /// Run the full pipeline: slice, transform each frame, reassemble
    Process {
        /// Spritesheet or animation
        input: PathBuf,

        /// Output PNG spritesheet
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        slicing: SliceArgs,

        #[command(flatten)]
        processing: ProcessArgs,

        /// Also write the sheet metadata as JSON
        #[arg(long, value_name = "PATH")]
        meta: Option<PathBuf>,

        /// Also write the processed frames as an animated GIF
        #[arg(long, value_name = "PATH")]
        gif: Option<PathBuf>,

        /// Print metadata and the base64-encoded PNG as JSON
        #[arg(long)]
        json: bool,
    },

    /// Process every matching file in a directory
    Batch {
        /// Input directory
        dir: PathBuf,

        /// Output directory for sheets and metadata
        #[arg(short, long)]
        output: PathBuf,

        /// Glob pattern relative to the input directory
        #[arg(long, default_value = "*.png")]
        pattern: String,

        /// Replace sheets that already exist instead of skipping their inputs
        #[arg(long)]
        overwrite: bool,

        #[command(flatten)]
        slicing: SliceArgs,

        #[command(flatten)]
        processing: ProcessArgs,
    },

    /// Process matching files in a directory, then keep processing new or changed ones
    Watch {
        /// Directory to watch
        dir: PathBuf,

        /// Output directory for sheets and metadata
        #[arg(short, long)]
        output: PathBuf,

        /// File name pattern of inputs
        #[arg(long, default_value = "*.png")]
        pattern: String,

        /// Replace sheets that already exist instead of skipping their inputs
        #[arg(long)]
        overwrite: bool,

        #[command(flatten)]
        slicing: SliceArgs,

        #[command(flatten)]
        processing: ProcessArgs,
    },

    /// Tile a directory of frame images into one spritesheet
    Join {
        /// Directory holding the frames
        dir: PathBuf,

        /// Output PNG spritesheet
        #[arg(short, long)]
        output: PathBuf,

        /// Glob pattern of frame files, joined in name order
        #[arg(long, default_value = "frame_*.png")]
        pattern: String,

        /// Grid as COLSxROWS, or "auto" for a near-square one
        #[arg(long, default_value = "auto")]
        grid: String,

        /// Lay frames out in rows of N when no grid is given
        #[arg(long, value_name = "N")]
        frames_per_row: Option<u32>,
    },
}

/// How frames are cut from the input.
#[derive(Args, Debug, Clone)]
pub struct SliceArgs {
    /// Grid as COLSxROWS, or "auto" to infer it
    #[arg(long, default_value = "auto")]
    pub grid: String,

    /// Frame size as WIDTHxHEIGHT (combined with --grid when both are given)
    #[arg(long, value_name = "WxH")]
    pub frame_size: Option<String>,

    /// Keep at most N frames
    #[arg(long, value_name = "N")]
    pub frames: Option<usize>,

    /// Sample the kept frames evenly instead of taking the first N
    #[arg(long)]
    pub even: bool,

    /// Treat the input as an animation regardless of its extension
    #[arg(long)]
    pub animated: bool,
}

impl SliceArgs {
    pub fn grid_spec(&self) -> crate::Result<GridSpec> {
        let grid: GridSpec = self.grid.parse()?;
        let frame = self.frame_size.as_deref().map(parse_dims).transpose()?;
        Ok(grid.with_frame_size(frame))
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions { max_frames: self.frames, even_sample: self.even }
    }

    pub fn is_animated(&self, input: &Path) -> bool {
        self.animated || is_animated_path(input)
    }
}

/// Built-in per-frame transforms.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformKind {
    /// Leave frames untouched
    #[default]
    Identity,
    /// Make near-white pixels transparent
    WhiteKey,
    /// Run --command on each frame
    Command,
}

/// Transform and runner settings.
#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    /// Per-frame transform
    #[arg(long, value_enum, default_value_t = TransformKind::Identity)]
    pub transform: TransformKind,

    /// Shell command for --transform command; must use {input} and {output}
    #[arg(long, value_name = "CMD")]
    pub command: Option<String>,

    /// Worker threads for the transform
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Frame rate for --gif output
    #[arg(long)]
    pub fps: Option<u32>,

    /// Maximum frames per batch
    #[arg(long, value_name = "N")]
    pub max_frames: Option<usize>,

    /// Force the flood-fill component extractor
    #[arg(long)]
    pub flood_fill: bool,

    /// Lay the output sheet out in rows of N frames
    #[arg(long, value_name = "N")]
    pub frames_per_row: Option<u32>,
}

impl ProcessArgs {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            jobs: self.jobs,
            max_frames_cap: self.max_frames,
            flood_fill: self.flood_fill.then_some(true),
            fps: self.fps,
            frames_per_row: self.frames_per_row,
        }
    }

    pub fn build_transform(
        &self,
        config: &SpritegridConfig,
    ) -> crate::Result<Box<dyn FrameTransform>> {
        match (self.transform, self.command.as_deref()) {
            (TransformKind::Identity, _) => Ok(Box::new(Identity)),
            (TransformKind::WhiteKey, _) => Ok(Box::new(WhiteKey::from_mask(&config.mask))),
            (TransformKind::Command, Some(cmd)) => Ok(Box::new(CommandTransform::new(cmd)?)),
            (TransformKind::Command, None) => {
                Err(SpriteError::rejected("--transform command requires --command"))
            }
        }
    }
}

/// Install the stderr log subscriber; level grows with each `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Load configuration and apply CLI overrides, printing any problem.
pub(crate) fn load_settings(
    path: Option<&Path>,
    overrides: &CliOverrides,
) -> Result<SpritegridConfig, ExitCode> {
    let mut config = match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Err(ExitCode::from(EXIT_INVALID_ARGS));
        }
    };
    merge_cli_overrides(&mut config, overrides);
    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("Error: {}", problem);
        }
        return Err(ExitCode::from(EXIT_INVALID_ARGS));
    }
    Ok(config)
}

/// Print an error and map it to an exit code.
pub(crate) fn report_error(context: &str, err: &SpriteError) -> ExitCode {
    eprintln!("Error: {}: {}", context, err);
    if err.is_input_rejected() {
        ExitCode::from(EXIT_INVALID_ARGS)
    } else {
        ExitCode::from(EXIT_ERROR)
    }
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Analyze { image, json } => analyze::run_analyze(&image, config_path, json),
        Commands::Suggest { image, json } => analyze::run_suggest(&image, json),
        Commands::Split { image, output, slicing } => {
            split::run_split(&image, &output, &slicing, config_path)
        }
        Commands::Process { input, output, slicing, processing, meta, gif, json } => {
            process::run_process(
                &input,
                &output,
                &slicing,
                &processing,
                meta.as_deref(),
                gif.as_deref(),
                json,
                config_path,
            )
        }
        Commands::Batch { dir, output, pattern, overwrite, slicing, processing } => {
            process::run_batch(
                &dir,
                &output,
                &pattern,
                overwrite,
                &slicing,
                &processing,
                config_path,
            )
        }
        Commands::Watch { dir, output, pattern, overwrite, slicing, processing } => {
            watch::run_watch(&dir, &output, &pattern, overwrite, &slicing, &processing, config_path)
        }
        Commands::Join { dir, output, pattern, grid, frames_per_row } => {
            join::run_join(&dir, &output, &pattern, &grid, frames_per_row, config_path)
        }
    }
}
