//! Bounding boxes, grid layouts and caller grid declarations.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SpriteError;

/// Axis-aligned box in source-image pixel coordinates. `w` and `h` are never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Build from inclusive min/max corners.
    pub fn from_extents(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self { x: min_x, y: min_y, w: max_x - min_x + 1, h: max_y - min_y + 1 }
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x as f64 + self.w as f64 / 2.0, self.y as f64 + self.h as f64 / 2.0)
    }

    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Move the box by a crop offset.
    pub fn offset(self, dx: u32, dy: u32) -> Self {
        Self { x: self.x + dx, y: self.y + dy, ..self }
    }
}

/// A tile grid: `cols × rows` tiles of `tile_w × tile_h` pixels.
///
/// `confidence` is 1.0 for caller-declared layouts and the inference score
/// otherwise. It is advisory and must be shown to the user, never used as a gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    pub cols: u32,
    pub rows: u32,
    pub tile_w: u32,
    pub tile_h: u32,
    pub confidence: f64,
}

impl GridLayout {
    /// Create a layout, rejecting zero counts or tile sizes.
    pub fn new(cols: u32, rows: u32, tile_w: u32, tile_h: u32) -> crate::Result<Self> {
        if cols == 0 || rows == 0 {
            return Err(SpriteError::rejected(format!(
                "grid must have at least one column and row, got {}x{}",
                cols, rows
            )));
        }
        if tile_w == 0 || tile_h == 0 {
            return Err(SpriteError::rejected(format!(
                "tile size must be positive, got {}x{}",
                tile_w, tile_h
            )));
        }
        Ok(Self { cols, rows, tile_w, tile_h, confidence: 1.0 })
    }

    /// Split a canvas evenly into `cols × rows` tiles (remainder pixels are dropped).
    pub fn for_canvas(cols: u32, rows: u32, width: u32, height: u32) -> crate::Result<Self> {
        if cols == 0 || rows == 0 {
            return Err(SpriteError::rejected("grid numbers must be positive integers"));
        }
        let tile_w = width / cols;
        let tile_h = height / rows;
        if tile_w == 0 || tile_h == 0 {
            return Err(SpriteError::rejected(format!(
                "canvas {}x{} is too small for a {}x{} grid",
                width, height, cols, rows
            )));
        }
        Self::new(cols, rows, tile_w, tile_h)
    }

    /// Take as many `frame_w × frame_h` tiles as fit in the canvas.
    pub fn from_frame_size(
        frame_w: u32,
        frame_h: u32,
        width: u32,
        height: u32,
    ) -> crate::Result<Self> {
        if frame_w == 0 || frame_h == 0 {
            return Err(SpriteError::rejected("frame width and height must be > 0"));
        }
        let cols = width / frame_w;
        let rows = height / frame_h;
        if cols == 0 || rows == 0 {
            return Err(SpriteError::rejected(format!(
                "frame size {}x{} does not fit in a {}x{} canvas",
                frame_w, frame_h, width, height
            )));
        }
        Self::new(cols, rows, frame_w, frame_h)
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Number of tiles in the grid.
    pub fn capacity(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    /// `"COLSxROWS"`, the same notation [`GridSpec`] parses.
    pub fn grid_label(&self) -> String {
        format!("{}x{}", self.cols, self.rows)
    }
}

/// Near-square grid able to hold `n` frames: `cols = ceil(sqrt(n))`, `rows = ceil(n / cols)`.
pub fn auto_grid(n: usize) -> (u32, u32) {
    if n == 0 {
        return (1, 1);
    }
    let cols = (n as f64).sqrt().ceil() as usize;
    let rows = n.div_ceil(cols);
    (cols as u32, rows as u32)
}

/// Rows of at most `per_row` frames: `cols = min(per_row, n)`, `rows = ceil(n / cols)`.
pub fn row_grid(n: usize, per_row: u32) -> (u32, u32) {
    let n = n.max(1);
    let cols = (per_row.max(1) as usize).min(n);
    (cols as u32, n.div_ceil(cols) as u32)
}

/// How the caller wants a static sheet to be sliced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridSpec {
    /// Infer the grid from the image content.
    #[default]
    Auto,
    /// Split the canvas into `cols × rows` equal tiles.
    Explicit { cols: u32, rows: u32 },
    /// Tiles of a fixed pixel size, as many as fit.
    FrameSize { width: u32, height: u32 },
    /// A declared grid with a declared tile size; must fit the canvas.
    Fixed { cols: u32, rows: u32, width: u32, height: u32 },
}

fn dims_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(-?\d+)\s*[xX]\s*(-?\d+)\s*$").expect("valid regex"))
}

/// Parse `"AxB"` into two positive integers.
pub fn parse_dims(s: &str) -> crate::Result<(u32, u32)> {
    let caps = dims_regex().captures(s).ok_or_else(|| {
        SpriteError::rejected(format!("expected 'COLSxROWS' (e.g. '5x2'), got '{}'", s))
    })?;
    let parse = |m: &str| -> crate::Result<u32> {
        match m.parse::<i64>() {
            Ok(v) if v > 0 && v <= u32::MAX as i64 => Ok(v as u32),
            _ => Err(SpriteError::rejected(format!(
                "grid numbers must be positive integers, got '{}'",
                s
            ))),
        }
    };
    Ok((parse(&caps[1])?, parse(&caps[2])?))
}

impl FromStr for GridSpec {
    type Err = SpriteError;

    /// Accepts `"auto"` or `"COLSxROWS"`. Frame sizes are built with [`GridSpec::frame_size`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(GridSpec::Auto);
        }
        let (cols, rows) = parse_dims(s)?;
        Ok(GridSpec::Explicit { cols, rows })
    }
}

impl GridSpec {
    /// Parse a `"WxH"` frame size.
    pub fn frame_size(s: &str) -> crate::Result<Self> {
        let (width, height) = parse_dims(s)?;
        Ok(GridSpec::FrameSize { width, height })
    }

    /// Combine a grid declaration with an optional frame size override.
    pub fn with_frame_size(self, frame: Option<(u32, u32)>) -> Self {
        match (self, frame) {
            (spec, None) => spec,
            (GridSpec::Explicit { cols, rows }, Some((width, height))) => {
                GridSpec::Fixed { cols, rows, width, height }
            }
            (_, Some((width, height))) => GridSpec::FrameSize { width, height },
        }
    }
}

impl fmt::Display for GridSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridSpec::Auto => write!(f, "auto"),
            GridSpec::Explicit { cols, rows } => write!(f, "{}x{}", cols, rows),
            GridSpec::FrameSize { width, height } => write!(f, "frames of {}x{}", width, height),
            GridSpec::Fixed { cols, rows, width, height } => {
                write!(f, "{}x{} frames of {}x{}", cols, rows, width, height)
            }
        }
    }
}
