//! End-to-end tests of the library pipeline on synthetic spritesheets.

use image::{Rgba, RgbaImage};
use spritegrid::config::{ComponentStrategy, SpritegridConfig};
use spritegrid::error::TransformError;
use spritegrid::extract::ExtractOptions;
use spritegrid::gif::encode_animation;
use spritegrid::pipeline::{InputKind, Pipeline};
use spritegrid::transform::{Identity, WhiteKey};
use spritegrid::{analyze, BoundingBox, FrameTransform, GridSpec, SourceImage};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn sprite_color(i: u32) -> Rgba<u8> {
    Rgba([(200 - 15 * i) as u8, 40, (60 + 12 * i) as u8, 255])
}

/// `cols × rows` solid squares of `size` px on white, `gutter` px apart with a
/// half-gutter margin, so every sprite sits centred in a `size + gutter` cell.
fn sheet(cols: u32, rows: u32, size: u32, gutter: u32) -> SourceImage {
    let cell = size + gutter;
    let margin = gutter / 2;
    let img = RgbaImage::from_fn(cols * cell, rows * cell, |x, y| {
        let (cx, cy) = (x / cell, y / cell);
        let (lx, ly) = (x % cell, y % cell);
        if lx >= margin && lx < margin + size && ly >= margin && ly < margin + size {
            sprite_color(cy * cols + cx)
        } else {
            WHITE
        }
    });
    SourceImage::from_rgba(img)
}

/// Fails on exactly one sprite colour.
struct FailOnColor(Rgba<u8>);

impl FrameTransform for FailOnColor {
    fn name(&self) -> &str {
        "fail-on-color"
    }

    fn apply(&self, frame: &RgbaImage) -> Result<RgbaImage, TransformError> {
        if frame.pixels().any(|p| *p == self.0) {
            return Err(TransformError::Failed("unsupported sprite".into()));
        }
        WhiteKey::default().apply(frame)
    }
}

#[test]
fn test_infers_five_by_two_grid() {
    let image = sheet(5, 2, 32, 4);
    let analysis = analyze(&image, &SpritegridConfig::default()).expect("should analyze");

    assert_eq!((analysis.grid.cols, analysis.grid.rows), (5, 2));
    assert!(analysis.grid.confidence > 0.6, "confidence {}", analysis.grid.confidence);
    assert_eq!(analysis.boxes.len(), 10);
    assert_eq!(analysis.diagnostics.detected_sprites, 10);
    // Boxes include the 1px edge ring around each sprite.
    assert_eq!(analysis.boxes[0], BoundingBox::new(1, 1, 34, 34));
    assert_eq!(analysis.diagnostics.median_pitch.w, 36);
    let median = analysis.diagnostics.median_bbox;
    assert_eq!((median.w, median.h), (34, 34));
    assert!(!analysis.diagnostics.suggestions.is_empty());
}

#[test]
fn test_flood_fill_agrees_on_grid() {
    let image = sheet(4, 3, 24, 6);
    let mut config = SpritegridConfig::default();
    config.components.strategy = ComponentStrategy::FloodFill;
    config.components.min_blob_area = 400;
    let analysis = analyze(&image, &config).expect("should analyze");
    assert_eq!((analysis.grid.cols, analysis.grid.rows), (4, 3));
}

#[test]
fn test_all_foreground_is_one_low_confidence_box() {
    let image = SourceImage::from_rgba(RgbaImage::from_pixel(64, 64, Rgba([30, 30, 30, 255])));
    let mut config = SpritegridConfig::default();
    config.components.strategy = ComponentStrategy::FloodFill;
    let analysis = analyze(&image, &config).expect("should analyze");
    assert_eq!(analysis.boxes, vec![BoundingBox::new(0, 0, 64, 64)]);
    assert_eq!((analysis.grid.cols, analysis.grid.rows), (1, 1));
    assert!((analysis.grid.confidence - 0.30).abs() < 1e-9);
}

#[test]
fn test_blank_image_has_no_foreground() {
    let image = SourceImage::from_rgba(RgbaImage::from_pixel(40, 40, WHITE));
    let err = analyze(&image, &SpritegridConfig::default()).unwrap_err();
    assert!(matches!(err, spritegrid::SpriteError::NoForegroundDetected { .. }));
}

#[test]
fn test_auto_roundtrip_with_identity() {
    let image = sheet(5, 2, 32, 4);
    let out = Pipeline::default()
        .process_sheet(&image, &GridSpec::Auto, ExtractOptions::default(), &Identity)
        .expect("should process");

    assert_eq!(&out.image, image.pixels());
    assert_eq!(out.metadata.grid, "5x2");
    assert_eq!((out.metadata.frame_width, out.metadata.frame_height), (36, 36));
    assert!(out.metadata.confidence.is_some_and(|c| c > 0.6));
    assert_eq!(out.summary.succeeded, 10);
}

#[test]
fn test_failed_frame_keeps_original_pixels() {
    let image = sheet(5, 1, 20, 4);
    let transform = FailOnColor(sprite_color(2));
    let grid = GridSpec::Explicit { cols: 5, rows: 1 };
    let out = Pipeline::default()
        .process_sheet(&image, &grid, ExtractOptions::default(), &transform)
        .expect("should process despite a failing frame");

    assert_eq!(out.metadata.failed_frames, vec![2]);
    assert_eq!(out.summary.succeeded, 4);
    // Frame 2 still has its white background; the others were keyed out.
    assert_eq!(*out.image.get_pixel(2 * 24, 0), WHITE);
    assert_eq!(out.image.get_pixel(0, 0)[3], 0);
    assert_eq!(out.image.get_pixel(4 * 24, 0)[3], 0);
    // Sprite pixels are untouched everywhere.
    assert_eq!(*out.image.get_pixel(2 * 24 + 10, 10), sprite_color(2));
}

#[test]
fn test_declared_grid_that_does_not_fit_is_rejected() {
    let image = SourceImage::from_rgba(RgbaImage::from_pixel(100, 50, WHITE));
    let grid: GridSpec = "10x10".parse().expect("should parse");
    let grid = grid.with_frame_size(Some((10, 10)));
    let err = Pipeline::default()
        .process_sheet(&image, &grid, ExtractOptions::default(), &Identity)
        .unwrap_err();
    assert!(err.is_input_rejected());
}

#[test]
fn test_animation_expands_small_grid() {
    let frames: Vec<RgbaImage> =
        (0..7).map(|i| RgbaImage::from_pixel(8, 8, sprite_color(i))).collect();
    let bytes = encode_animation(&frames, 10, true).expect("should encode");

    let grid = GridSpec::Explicit { cols: 2, rows: 2 };
    let out = Pipeline::default()
        .process_animation(&bytes, ExtractOptions::default(), &grid, &Identity)
        .expect("should process");

    assert_eq!(out.metadata.input_type, InputKind::Animation);
    assert_eq!(out.metadata.frames, 7);
    assert_eq!(out.metadata.grid, "3x3");
    assert_eq!(out.image.dimensions(), (24, 24));
    assert_eq!(out.image.get_pixel(23, 23)[3], 0);
    assert_eq!(out.frames.len(), 7);
}

#[test]
fn test_animation_even_sampling() {
    let frames: Vec<RgbaImage> =
        (0..10).map(|i| RgbaImage::from_pixel(4, 4, sprite_color(i))).collect();
    let bytes = encode_animation(&frames, 10, true).expect("should encode");
    let opts = ExtractOptions::default().with_max_frames(4).with_even_sample(true);

    let out = Pipeline::default()
        .process_animation(&bytes, opts, &GridSpec::Auto, &Identity)
        .expect("should process");
    assert_eq!(out.metadata.frames, 4);
    assert_eq!(out.metadata.grid, "2x2");
}

#[test]
fn test_frame_cap_rejects_large_animation() {
    let frames: Vec<RgbaImage> =
        (0..6).map(|i| RgbaImage::from_pixel(4, 4, sprite_color(i))).collect();
    let bytes = encode_animation(&frames, 10, true).expect("should encode");
    let mut config = SpritegridConfig::default();
    config.limits.max_frames = 5;

    let err = Pipeline::new(config)
        .process_animation(&bytes, ExtractOptions::default(), &GridSpec::Auto, &Identity)
        .unwrap_err();
    assert!(err.is_input_rejected());
}

/// Opaque shapes of different sizes scattered over a fully transparent canvas.
/// Returns the image and each shape's exact extent.
fn transparent_scatter() -> (SourceImage, Vec<BoundingBox>) {
    let rects = [
        BoundingBox::new(10, 12, 40, 36),
        BoundingBox::new(70, 8, 48, 48),
        BoundingBox::new(140, 20, 36, 44),
        BoundingBox::new(16, 90, 56, 40),
        BoundingBox::new(196, 96, 40, 40),
    ];
    // Disk of radius 22 centred at (120, 120).
    let disk = BoundingBox::new(98, 98, 45, 45);
    let in_disk = |x: u32, y: u32| {
        let (dx, dy) = (x as i64 - 120, y as i64 - 120);
        dx * dx + dy * dy <= 22 * 22
    };

    let img = RgbaImage::from_fn(256, 160, |x, y| {
        if let Some(i) = rects.iter().position(|r| {
            x >= r.x && x < r.right() && y >= r.y && y < r.bottom()
        }) {
            sprite_color(i as u32)
        } else if in_disk(x, y) {
            Rgba([20, 180, 90, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    let mut truth = rects.to_vec();
    truth.push(disk);
    (SourceImage::from_rgba(img), truth)
}

fn within(found: &BoundingBox, truth: &BoundingBox, tolerance: u32) -> bool {
    found.x.abs_diff(truth.x) <= tolerance
        && found.y.abs_diff(truth.y) <= tolerance
        && found.right().abs_diff(truth.right()) <= tolerance
        && found.bottom().abs_diff(truth.bottom()) <= tolerance
}

#[test]
fn test_transparent_canvas_finds_every_shape() {
    let (image, truth) = transparent_scatter();
    for strategy in [ComponentStrategy::Auto, ComponentStrategy::FloodFill] {
        let mut config = SpritegridConfig::default();
        config.components.strategy = strategy;

        let first = analyze(&image, &config).expect("should analyze");
        assert_eq!(first.boxes.len(), truth.len(), "{:?}: {:?}", strategy, first.boxes);
        for expected in &truth {
            assert!(
                first.boxes.iter().any(|b| within(b, expected, 2)),
                "{:?}: no box near {:?} in {:?}",
                strategy,
                expected,
                first.boxes
            );
        }

        let second = analyze(&image, &config).expect("should analyze again");
        assert_eq!(second.boxes, first.boxes);
        assert_eq!(second.grid, first.grid);
    }
}
