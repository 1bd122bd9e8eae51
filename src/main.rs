// rghost - A floating ghost-image overlay for Wayland
// Displays a user-chosen image above all other windows as a manipulable,
// optionally click-through guide.

mod cli;
mod fab;
mod geometry;
mod gesture;
mod hit_test;
mod image_loader;
mod mode;
mod overlay;
mod transform;
mod wayland;
mod wgpu_renderer;

use anyhow::Result;
use log::info;
use overlay::{SessionParams, DEFAULT_FAB_POSITION};

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args = cli::parse_args()?;

    info!(
        "Starting rghost with image: {:?}, opacity: {}%",
        args.image_path, args.opacity_percent
    );

    // Load the image
    let image_data = image_loader::load_image(&args)?;

    info!(
        "Image loaded: {}x{} pixels",
        image_data.width, image_data.height
    );

    let params = SessionParams {
        image_uri: args
            .image_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdin".to_string()),
        opacity_percent: args.opacity_percent,
    };
    let fab_position = (
        args.fab_x.unwrap_or(DEFAULT_FAB_POSITION.0),
        args.fab_y.unwrap_or(DEFAULT_FAB_POSITION.1),
    );

    // Run with layer-shell (GPU rendering by default, CPU as fallback)
    info!("Using layer-shell overlay mode (GPU: {})", args.use_gpu);
    wayland::run(image_data, params, fab_position, args.use_gpu)
}
