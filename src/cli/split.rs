//! Split command implementation

use std::path::Path;
use std::process::ExitCode;

use crate::config::CliOverrides;
use crate::error::SpriteError;
use crate::extract::extract_animated;
use crate::gif::decode_animation;
use crate::models::{Frame, SourceImage};
use crate::output::{frame_file_name, save_png};
use crate::pipeline::Pipeline;

use super::{load_settings, report_error, SliceArgs, EXIT_ERROR, EXIT_SUCCESS};

/// Execute the split command - write every extracted frame as a PNG
pub fn run_split(
    input: &Path,
    output_dir: &Path,
    slicing: &SliceArgs,
    config_path: Option<&Path>,
) -> ExitCode {
    let config = match load_settings(config_path, &CliOverrides::default()) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let grid = match slicing.grid_spec() {
        Ok(grid) => grid,
        Err(e) => return report_error("invalid grid", &e),
    };
    let opts = slicing.extract_options();
    let pipeline = Pipeline::new(config);

    let frames: crate::Result<(Vec<Frame>, String)> = if slicing.is_animated(input) {
        std::fs::read(input).map_err(SpriteError::from).and_then(|bytes| {
            let sequence = decode_animation(&bytes)?;
            let frames = extract_animated(&sequence, opts, pipeline.config().limits.max_frames)?;
            let label = format!("{} animation frames", sequence.len());
            Ok((frames, label))
        })
    } else {
        SourceImage::open(input).and_then(|image| {
            let extraction = pipeline.extract_sheet(&image, &grid, opts)?;
            let layout = extraction.layout;
            let mut label =
                format!("grid {}, tile {}x{}", layout.grid_label(), layout.tile_w, layout.tile_h);
            if let Some(confidence) = extraction.confidence {
                label.push_str(&format!(", confidence {:.3}", confidence));
            }
            Ok((extraction.frames, label))
        })
    };

    let (frames, label) = match frames {
        Ok(result) => result,
        Err(e) => return report_error(&format!("cannot split '{}'", input.display()), &e),
    };

    for frame in &frames {
        let path = output_dir.join(frame_file_name(frame.index));
        if let Err(e) = save_png(&frame.image, &path) {
            eprintln!("Error: cannot write '{}': {}", path.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    }

    println!("Wrote {} frames ({}) to {}", frames.len(), label, output_dir.display());
    ExitCode::from(EXIT_SUCCESS)
}
