//! Analyze and suggest command implementations

use std::path::Path;
use std::process::ExitCode;

use crate::config::CliOverrides;
use crate::error::SpriteError;
use crate::grid::{suggest_layouts, Analysis, LayoutSuggestion};
use crate::models::SourceImage;
use crate::pipeline::Pipeline;

use super::{load_settings, report_error, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Execute the analyze command - infer and print the sprite grid
pub fn run_analyze(image_path: &Path, config_path: Option<&Path>, json: bool) -> ExitCode {
    let config = match load_settings(config_path, &CliOverrides::default()) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let low_confidence = config.output.low_confidence;

    let image = match SourceImage::open(image_path) {
        Ok(image) => image,
        Err(e) => return report_error(&format!("cannot read '{}'", image_path.display()), &e),
    };

    let analysis = match Pipeline::new(config).analyze(&image) {
        Ok(analysis) => analysis,
        Err(e) => {
            let code = report_error(&format!("cannot analyze '{}'", image_path.display()), &e);
            if matches!(
                e,
                SpriteError::NoSpritesDetected { .. } | SpriteError::NoForegroundDetected { .. }
            ) {
                let (w, h) = image.dimensions();
                let suggestions = suggest_layouts(w, h);
                if !suggestions.is_empty() {
                    eprintln!(
                        "Hint: pass --grid explicitly. Layouts that divide {}x{} evenly:",
                        w, h
                    );
                    print_suggestions(&suggestions, true);
                }
            }
            return code;
        }
    };

    if json {
        return match serde_json::to_string_pretty(&analysis) {
            Ok(s) => {
                println!("{}", s);
                ExitCode::from(EXIT_SUCCESS)
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::from(EXIT_ERROR)
            }
        };
    }

    print_analysis(image_path, &analysis);
    if analysis.grid.confidence < low_confidence {
        eprintln!(
            "Warning: low confidence ({:.3}); check the grid or pass --grid explicitly",
            analysis.grid.confidence
        );
    }
    ExitCode::from(EXIT_SUCCESS)
}

fn print_analysis(path: &Path, analysis: &Analysis) {
    let grid = &analysis.grid;
    let diag = &analysis.diagnostics;
    println!("{}: {}x{}", path.display(), diag.canvas.w, diag.canvas.h);
    println!("  Grid:        {} ({} frames)", grid.grid_label(), grid.capacity());
    println!("  Tile:        {}x{}", grid.tile_w, grid.tile_h);
    println!("  Pitch:       {}x{}", diag.median_pitch.w, diag.median_pitch.h);
    println!("  Confidence:  {:.3}", grid.confidence);
    println!("  Sprites:     {}", diag.detected_sprites);
    println!(
        "  Content:     {}x{} at {},{}",
        diag.content_crop.w, diag.content_crop.h, diag.content_crop.x, diag.content_crop.y
    );
    if diag.capped {
        println!(
            "  Capped:      detected {}x{}, scaled to the frame limit",
            diag.cols_detected, diag.rows_detected
        );
    }
}

fn print_suggestions(suggestions: &[LayoutSuggestion], to_stderr: bool) {
    for s in suggestions {
        let line = format!(
            "  {:>7}  {:>4}x{:<4}  {:>3} frames",
            s.grid, s.frame_width, s.frame_height, s.total_frames
        );
        if to_stderr {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

/// Execute the suggest command - list evenly dividing layouts
pub fn run_suggest(image_path: &Path, json: bool) -> ExitCode {
    let (w, h) = match image::image_dimensions(image_path) {
        Ok(dims) => dims,
        Err(e) => {
            eprintln!("Error: cannot read '{}': {}", image_path.display(), e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };
    let suggestions = suggest_layouts(w, h);

    if json {
        let value = serde_json::json!({ "width": w, "height": h, "suggestions": suggestions });
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
        return ExitCode::from(EXIT_SUCCESS);
    }

    println!("{}: {}x{}", image_path.display(), w, h);
    print_suggestions(&suggestions, false);
    ExitCode::from(EXIT_SUCCESS)
}
