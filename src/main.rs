// =============================================================================
// TRIANGLE RENDERER - minimal Vulkan setup and frame loop
// =============================================================================
//
// Brings up a Vulkan context for a fixed-size window and draws one hard-coded
// triangle every frame until the window is closed.
//
// ARCHITECTURE OVERVIEW:
//   AppWindow (winit, polled once per frame)
//     └── Renderer (instance, device, swapchain, pipeline, sync)
//           └── FrameLoop (wait -> acquire -> record -> submit -> present)
//
// =============================================================================

mod backend;
mod config;
mod error;
mod frame;
mod renderer;
mod window;

use anyhow::{Context, Result};
use config::Config;
use frame::FrameLoop;
use renderer::Renderer;
use window::AppWindow;

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    init_logging();

    // Load configuration from config.toml
    let config = Config::load();
    log::info!("Starting triangle renderer");

    // Declaration order is teardown order in reverse: renderer first, window last
    let mut window = AppWindow::new(&config).context("Failed to open window")?;
    let mut renderer =
        Renderer::new(&config, &window).context("Failed to initialize Vulkan")?;

    let mut frame_loop = FrameLoop::new(config.debug.show_fps);
    if let Err(e) = frame_loop.run(&mut renderer, &mut window) {
        log::error!("Frame loop stopped in state {:?}", frame_loop.state());
        return Err(e).context("Render loop failed");
    }

    log::info!("Presented {} frames", frame_loop.frames_presented());
    Ok(())
}

/// Initialize logging; `RUST_LOG` overrides the default `info` level
fn init_logging() {
    use env_logger::Builder;
    use log::LevelFilter;

    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info);
    builder.parse_default_env();
    builder.init();
}
