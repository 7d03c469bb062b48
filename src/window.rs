// Window - winit collaborator for the renderer
//
// The frame loop drives the OS event queue itself (pump, don't run), so this
// wraps winit's pump_events extension behind a "poll once, ask should-close"
// interface. The window is fixed-size: resizing would invalidate the swapchain.

use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle};
use std::ffi::CStr;
use std::time::Duration;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowAttributes, WindowId},
};

use crate::config::Config;
use crate::error::{RendererError, Result, RuntimeContext};
use crate::frame::FrameEvents;

/// Receives winit callbacks between pumps.
struct WindowState {
    attributes: WindowAttributes,
    created: Option<Window>,
    opened: bool,
    creation_error: Option<String>,
    close_requested: bool,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.opened {
            return;
        }

        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => {
                self.opened = true;
                self.created = Some(window);
            }
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                self.creation_error = Some(e.to_string());
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.close_requested = true;
            }
            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed() && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    log::info!("ESC pressed, exiting...");
                    self.close_requested = true;
                }
            }
            _ => {}
        }
    }
}

pub struct AppWindow {
    // Declaration order is drop order: window before the event loop
    window: Window,
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl AppWindow {
    /// Open the window described by `config.window` and wait until it exists.
    pub fn new(config: &Config) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("Failed to create event loop")?;

        let attributes = WindowAttributes::default()
            .with_title(&config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                config.window.width,
                config.window.height,
            ))
            .with_resizable(false);

        let mut state = WindowState {
            attributes,
            created: None,
            opened: false,
            creation_error: None,
            close_requested: false,
        };

        // The window is created from inside the first `resumed` callback
        let window = loop {
            if let Some(window) = state.created.take() {
                break window;
            }
            if let Some(error) = state.creation_error.take() {
                return Err(RendererError::Runtime(format!(
                    "Failed to create window: {}",
                    error
                )));
            }
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut state)
            {
                return Err(RendererError::Runtime(format!(
                    "Event loop exited with code {} before the window opened",
                    code
                )));
            }
        };

        log::info!(
            "Window: {}x{} '{}'",
            config.window.width,
            config.window.height,
            config.window.title
        );
        Ok(Self {
            window,
            state,
            event_loop,
        })
    }

    /// Current drawable size in pixels
    pub fn framebuffer_size(&self) -> vk::Extent2D {
        let size = self.window.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }

    /// Instance extensions the platform surface needs
    pub fn required_extensions(&self) -> Result<Vec<&'static CStr>> {
        let names = ash_window::enumerate_required_extensions(self.raw_display_handle())
            .context("Failed to query required surface extensions")?;

        // Safety: ash-window hands out pointers to static NUL-terminated names
        Ok(names
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) })
            .collect())
    }

    pub fn raw_display_handle(&self) -> RawDisplayHandle {
        self.window.raw_display_handle()
    }

    pub fn raw_window_handle(&self) -> RawWindowHandle {
        self.window.raw_window_handle()
    }
}

impl FrameEvents for AppWindow {
    fn poll_events(&mut self) {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state);
        if let PumpStatus::Exit(code) = status {
            log::info!("Event loop exited with code {}", code);
            self.state.close_requested = true;
        }
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }
}

impl Drop for AppWindow {
    fn drop(&mut self) {
        log::debug!("Destroying window");
    }
}
