//! Configuration schema types for `spritegrid.toml`
//!
//! Every heuristic threshold used by the mask builder, component extractor
//! and grid inference lives here rather than in module constants, so callers
//! and tests can override them per run. The defaults are tuned by hand and
//! carry no calibration guarantee.

use serde::{Deserialize, Serialize};

/// Foreground mask thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskConfig {
    /// Alpha strictly above this is foreground (0-255)
    #[serde(default = "default_alpha_threshold")]
    pub alpha_threshold: u8,
    /// Luminance strictly below this is foreground (0-255 scale)
    #[serde(default = "default_white_threshold")]
    pub white_threshold: f32,
    /// Gradient magnitude strictly above this is foreground
    #[serde(default = "default_edge_threshold")]
    pub edge_threshold: f32,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            alpha_threshold: default_alpha_threshold(),
            white_threshold: default_white_threshold(),
            edge_threshold: default_edge_threshold(),
        }
    }
}

fn default_alpha_threshold() -> u8 {
    8
}

fn default_white_threshold() -> f32 {
    245.0
}

fn default_edge_threshold() -> f32 {
    12.0
}

/// Which connected-component routine to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentStrategy {
    /// Accelerated labelling when compiled in, flood fill otherwise
    #[default]
    Auto,
    /// Morphological opening + 8-connected labelling (requires the `accel` feature)
    Accelerated,
    /// Iterative 4-connected flood fill
    FloodFill,
}

/// Connected-component extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    #[serde(default)]
    pub strategy: ComponentStrategy,
    /// Components whose bounding box area is below this are noise
    #[serde(default = "default_min_blob_area")]
    pub min_blob_area: u64,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self { strategy: ComponentStrategy::default(), min_blob_area: default_min_blob_area() }
    }
}

fn default_min_blob_area() -> u64 {
    32 * 32
}

/// Grid inference settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Smallest tile edge the engine will report
    #[serde(default = "default_min_tile")]
    pub min_tile: u32,
    /// Row join distance as a multiple of the median box height
    #[serde(default = "default_join_factor")]
    pub row_join_factor: f64,
    /// Column join distance as a multiple of the median box width
    #[serde(default = "default_join_factor")]
    pub col_join_factor: f64,
    /// Floor for both join distances, in pixels
    #[serde(default = "default_min_join_distance")]
    pub min_join_distance: f64,
    /// Re-cluster columns when `rows * cols` covers less than this share of boxes
    #[serde(default = "default_coverage_ratio")]
    pub coverage_ratio: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            min_tile: default_min_tile(),
            row_join_factor: default_join_factor(),
            col_join_factor: default_join_factor(),
            min_join_distance: default_min_join_distance(),
            coverage_ratio: default_coverage_ratio(),
        }
    }
}

fn default_min_tile() -> u32 {
    16
}

fn default_join_factor() -> f64 {
    0.7
}

fn default_min_join_distance() -> f64 {
    4.0
}

fn default_coverage_ratio() -> f64 {
    0.7
}

/// Hard resource limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum frames per batch and per inferred grid
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_frames: default_max_frames() }
    }
}

fn default_max_frames() -> usize {
    512
}

/// Transform runner settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Worker threads; unset means available parallelism
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

impl RunnerConfig {
    /// Resolved worker count, never zero.
    pub fn worker_count(&self) -> usize {
        self.jobs
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
            .max(1)
    }
}

/// Output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Frame rate for re-encoded animations
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Loop re-encoded animations forever
    #[serde(default = "default_true")]
    pub loop_animation: bool,
    /// Confidence below which the CLI prints a warning
    #[serde(default = "default_low_confidence")]
    pub low_confidence: f64,
    /// Lay output sheets out this many frames wide instead of on the source grid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames_per_row: Option<u32>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            loop_animation: true,
            low_confidence: default_low_confidence(),
            frames_per_row: None,
        }
    }
}

fn default_fps() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_low_confidence() -> f64 {
    0.5
}

/// Watch mode settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
}

fn default_debounce_ms() -> u32 {
    250
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms() }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpritegridConfig {
    #[serde(default)]
    pub mask: MaskConfig,
    #[serde(default)]
    pub components: ComponentConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// A single configuration problem.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "inference.min_tile")
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "spritegrid.toml: '{}' {}", self.field, self.message)
    }
}

impl SpritegridConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: &str| {
            errors.push(ConfigValidationError {
                field: field.to_string(),
                message: message.to_string(),
            });
        };

        if !(0.0..=255.0).contains(&self.mask.white_threshold) {
            push("mask.white_threshold", "must be between 0 and 255");
        }
        if self.mask.edge_threshold < 0.0 {
            push("mask.edge_threshold", "must not be negative");
        }
        if self.components.min_blob_area == 0 {
            push("components.min_blob_area", "must be a positive integer");
        }
        if !cfg!(feature = "accel") && self.components.strategy == ComponentStrategy::Accelerated {
            push("components.strategy", "'accelerated' requires the `accel` feature");
        }
        if self.inference.min_tile == 0 {
            push("inference.min_tile", "must be a positive integer");
        }
        if self.inference.row_join_factor <= 0.0 {
            push("inference.row_join_factor", "must be positive");
        }
        if self.inference.col_join_factor <= 0.0 {
            push("inference.col_join_factor", "must be positive");
        }
        if !(0.0..=1.0).contains(&self.inference.coverage_ratio) {
            push("inference.coverage_ratio", "must be between 0.0 and 1.0");
        }
        if self.limits.max_frames == 0 {
            push("limits.max_frames", "must be a positive integer");
        }
        if self.runner.jobs == Some(0) {
            push("runner.jobs", "must be a positive integer");
        }
        if self.output.fps == 0 {
            push("output.fps", "must be a positive integer");
        }
        if !(0.0..=1.0).contains(&self.output.low_confidence) {
            push("output.low_confidence", "must be between 0.0 and 1.0");
        }
        if self.output.frames_per_row == Some(0) {
            push("output.frames_per_row", "must be a positive integer");
        }
        if self.watch.debounce_ms == 0 {
            push("watch.debounce_ms", "must be a positive integer");
        }

        errors
    }
}
