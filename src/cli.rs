// Command line interface module
// Handles parsing of command line arguments and stdin input

use crate::overlay::DEFAULT_OPACITY_PERCENT;
use anyhow::{bail, Result};
use clap::Parser;
use std::io::{self, Read};
use std::path::PathBuf;

/// rghost - A floating ghost-image overlay for Wayland
#[derive(Parser, Debug)]
#[command(name = "rghost")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the image file (can also be provided via stdin pipe)
    #[arg(value_name = "IMAGE")]
    pub image_path: Option<PathBuf>,

    /// Image opacity in percent (0 - 100)
    #[arg(short, long, default_value_t = DEFAULT_OPACITY_PERCENT, value_parser = parse_opacity)]
    pub opacity: i32,

    /// Initial X position of the floating control
    #[arg(short = 'x', long)]
    pub fab_x: Option<i32>,

    /// Initial Y position of the floating control
    #[arg(short = 'y', long)]
    pub fab_y: Option<i32>,

    /// Disable GPU rendering and use CPU rendering only
    #[arg(long, default_value = "false")]
    pub cpu: bool,
}

/// Parsed arguments with resolved image source
#[derive(Debug)]
pub struct ParsedArgs {
    pub image_path: Option<PathBuf>,
    pub image_data: Option<Vec<u8>>,
    /// Opacity as integer percent, already range-checked
    pub opacity_percent: i32,
    pub fab_x: Option<i32>,
    pub fab_y: Option<i32>,
    /// Use GPU rendering (default true, set to false with --cpu)
    pub use_gpu: bool,
}

/// Parse opacity value and ensure it's within valid range
fn parse_opacity(s: &str) -> Result<i32, String> {
    let opacity: i32 = s.parse().map_err(|_| "Invalid opacity value")?;
    if !(0..=100).contains(&opacity) {
        return Err("Opacity must be between 0 and 100".to_string());
    }
    Ok(opacity)
}

/// Check if stdin has data available (is a pipe)
fn stdin_has_data() -> bool {
    !atty::is(atty::Stream::Stdin)
}

/// Read image data from stdin
fn read_stdin() -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    io::stdin().read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Parse command line arguments and handle stdin input
pub fn parse_args() -> Result<ParsedArgs> {
    let args = Args::parse();

    // Check if we have image data from stdin
    let (image_path, image_data) = if stdin_has_data() {
        // Read from stdin
        let data = read_stdin()?;
        if data.is_empty() {
            bail!("No data received from stdin");
        }
        (args.image_path, Some(data))
    } else if let Some(path) = args.image_path {
        // Use file path
        (Some(path), None)
    } else {
        bail!("No image provided. Please provide an image path or pipe image data to stdin.\n\
               Usage: rghost <IMAGE> [OPTIONS]\n\
               Or:    cat image.png | rghost [OPTIONS]");
    };

    Ok(ParsedArgs {
        image_path,
        image_data,
        opacity_percent: args.opacity,
        fab_x: args.fab_x,
        fab_y: args.fab_y,
        use_gpu: !args.cpu, // GPU is default, --cpu disables it
    })
}
