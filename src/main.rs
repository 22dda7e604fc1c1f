//! spritegrid - Command-line tool for slicing, processing and re-tiling spritesheets

use std::process::ExitCode;

use spritegrid::cli;

fn main() -> ExitCode {
    cli::run()
}
