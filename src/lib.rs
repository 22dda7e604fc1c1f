//! spritegrid - Sprite grid inference, frame extraction and spritesheet reassembly
//!
//! This library provides functionality to:
//! - Infer the grid of a spritesheet with unknown layout ([`grid::analyze`])
//! - Slice sheets and animations into frames ([`extract`])
//! - Run a per-frame transform with per-frame fallback ([`runner`])
//! - Rebuild a spritesheet from processed frames ([`spritesheet::reassemble`])
//! - Reprocess sprites as they change on disk ([`watch`])
//!
//! [`pipeline::Pipeline`] ties the stages together.

pub mod cli;
pub mod components;
pub mod config;
pub mod error;
pub mod extract;
pub mod gif;
pub mod grid;
pub mod mask;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod runner;
pub mod spritesheet;
pub mod transform;
pub mod watch;

pub use error::{Result, SpriteError, TransformError};
pub use extract::{extract_animated, extract_static, ExtractOptions};
pub use grid::{analyze, suggest_layouts, Analysis};
pub use models::{BoundingBox, Frame, GridLayout, GridSpec, ProcessingResult, SourceImage};
pub use pipeline::{Pipeline, ProcessOutput, SheetMetadata};
pub use runner::{process_batch, process_one, FrameTransform};
pub use spritesheet::{reassemble, Reassembled};
