//! Data models shared by the analysis, extraction and reassembly stages

mod frame;
mod geometry;
mod source;

pub use frame::{BatchSummary, Frame, ProcessingResult};
pub use geometry::{auto_grid, parse_dims, row_grid, BoundingBox, GridLayout, GridSpec};
pub use source::{ChannelMode, SourceImage};
