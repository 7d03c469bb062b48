// =============================================================================
// RENDERER - owns every Vulkan object and drives one frame at a time
// =============================================================================
//
// INITIALIZATION ORDER (teardown is the exact reverse):
//   instance -> surface -> debug messenger -> logical device -> swapchain
//   -> image views -> render pass -> pipeline layout -> pipeline
//   -> framebuffers -> command pool -> sync objects
//
// Each object is registered with the teardown stack the moment it exists, so
// a failure halfway through startup still releases what was created.

use ash::extensions::khr::Surface;
use ash::{vk, Entry};

use crate::backend::commands::{self, DeviceCommands, DrawTarget};
use crate::backend::device::{self, REQUIRED_DEVICE_EXTENSIONS};
use crate::backend::instance;
use crate::backend::pipeline;
use crate::backend::swapchain::{self, Swapchain};
use crate::backend::sync::FrameSync;
use crate::backend::teardown::{ResourceKind, Teardown};
use crate::config::Config;
use crate::error::{Result, RuntimeContext};
use crate::frame::FrameBackend;
use crate::window::AppWindow;

pub struct Renderer {
    device: ash::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    swapchain: Swapchain,
    render_pass: vk::RenderPass,
    pipeline: vk::Pipeline,
    framebuffers: Vec<vk::Framebuffer>,
    command_buffer: vk::CommandBuffer,
    sync: FrameSync,
    clear_color: [f32; 4],

    // Field order matters for Drop: destroy everything, then unload the library
    teardown: Teardown,
    _entry: Entry,
}

impl Renderer {
    pub fn new(config: &Config, window: &AppWindow) -> Result<Self> {
        log::info!("Initializing Vulkan...");

        let entry = unsafe { Entry::load() }
            .context("Failed to load Vulkan library. Is Vulkan installed?")?;
        let mut teardown = Teardown::new();
        let enable_diagnostics = config.diagnostics_enabled();

        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Instance, surface, diagnostics
        // ─────────────────────────────────────────────────────────────────────
        let window_extensions = window.required_extensions()?;
        let instance = instance::create_context(&entry, config, &window_extensions)?;
        {
            let instance = instance.clone();
            teardown.defer(ResourceKind::Context, move || unsafe {
                instance.destroy_instance(None)
            });
        }

        let surface_loader = Surface::new(&entry, &instance);
        let surface = instance::create_surface(&entry, &instance, window)?;
        {
            let surface_loader = surface_loader.clone();
            teardown.defer(ResourceKind::Surface, move || unsafe {
                surface_loader.destroy_surface(surface, None)
            });
        }

        if let Some((debug_utils, messenger)) =
            instance::setup_debug_messenger(&entry, &instance, enable_diagnostics)?
        {
            teardown.defer(ResourceKind::DebugMessenger, move || unsafe {
                debug_utils.destroy_debug_utils_messenger(messenger, None)
            });
        }

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: GPU and logical device
        // ─────────────────────────────────────────────────────────────────────
        let physical_device = device::select_physical_device(&instance, &surface_loader, surface)?;
        let logical_device =
            device::create_logical_device(&instance, &physical_device, REQUIRED_DEVICE_EXTENSIONS)?;
        let device = logical_device.device.clone();
        {
            let device = device.clone();
            teardown.defer(ResourceKind::Device, move || unsafe { device.destroy_device(None) });
        }

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Swapchain and its image views
        // ─────────────────────────────────────────────────────────────────────
        let mut swapchain = Swapchain::new(
            &instance,
            &logical_device,
            &surface_loader,
            surface,
            window.framebuffer_size(),
            config.preferred_present_mode(),
        )?;
        {
            let loader = swapchain.loader.clone();
            let handle = swapchain.swapchain;
            teardown.defer(ResourceKind::Swapchain, move || unsafe {
                loader.destroy_swapchain(handle, None)
            });
        }

        swapchain.image_views =
            swapchain::create_image_views(&device, &swapchain.images, swapchain.format)?;
        {
            let device = device.clone();
            let image_views = swapchain.image_views.clone();
            teardown.defer(ResourceKind::ImageViews, move || unsafe {
                for view in image_views {
                    device.destroy_image_view(view, None);
                }
            });
        }

        // ─────────────────────────────────────────────────────────────────────
        // STEP 4: Render pass, pipeline, framebuffers
        // ─────────────────────────────────────────────────────────────────────
        let render_pass = pipeline::create_render_pass(&device, swapchain.format)?;
        {
            let device = device.clone();
            teardown.defer(ResourceKind::RenderPass, move || unsafe {
                device.destroy_render_pass(render_pass, None)
            });
        }

        let pipeline_layout = pipeline::create_pipeline_layout(&device)?;
        {
            let device = device.clone();
            teardown.defer(ResourceKind::PipelineLayout, move || unsafe {
                device.destroy_pipeline_layout(pipeline_layout, None)
            });
        }

        let graphics_pipeline =
            pipeline::create_graphics_pipeline(&device, render_pass, pipeline_layout, &config.shaders)?;
        {
            let device = device.clone();
            teardown.defer(ResourceKind::Pipeline, move || unsafe {
                device.destroy_pipeline(graphics_pipeline, None)
            });
        }

        let framebuffers = pipeline::create_framebuffers(
            &device,
            render_pass,
            &swapchain.image_views,
            swapchain.extent,
        )?;
        {
            let device = device.clone();
            let framebuffers = framebuffers.clone();
            teardown.defer(ResourceKind::Framebuffers, move || unsafe {
                for framebuffer in framebuffers {
                    device.destroy_framebuffer(framebuffer, None);
                }
            });
        }

        debug_assert_eq!(swapchain.images.len(), swapchain.image_views.len());
        debug_assert_eq!(swapchain.image_views.len(), framebuffers.len());

        // ─────────────────────────────────────────────────────────────────────
        // STEP 5: Commands and synchronization
        // ─────────────────────────────────────────────────────────────────────
        let command_pool =
            commands::create_command_pool(&device, logical_device.graphics_family)?;
        {
            let device = device.clone();
            teardown.defer(ResourceKind::CommandPool, move || unsafe {
                device.destroy_command_pool(command_pool, None)
            });
        }
        let command_buffer = commands::allocate_command_buffer(&device, command_pool)?;

        let sync = FrameSync::new(&device)?;
        {
            let device = device.clone();
            let sync = sync.clone();
            teardown.defer(ResourceKind::SyncObjects, move || sync.destroy(&device));
        }

        log::info!(
            "Vulkan initialized successfully! ({} resources tracked)",
            teardown.len()
        );

        Ok(Self {
            device,
            graphics_queue: logical_device.graphics_queue,
            present_queue: logical_device.present_queue,
            swapchain,
            render_pass,
            pipeline: graphics_pipeline,
            framebuffers,
            command_buffer,
            sync,
            clear_color: config.graphics.clear_color,
            teardown,
            _entry: entry,
        })
    }

    fn draw_target(&self) -> DrawTarget<'_> {
        DrawTarget {
            render_pass: self.render_pass,
            pipeline: self.pipeline,
            framebuffers: &self.framebuffers,
            extent: self.swapchain.extent,
            clear_color: self.clear_color,
        }
    }
}

impl FrameBackend for Renderer {
    fn wait_for_in_flight_fence(&mut self) -> Result<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.sync.in_flight_fence], true, u64::MAX)
        }
        .context("Failed to wait for in-flight fence")
    }

    fn reset_in_flight_fence(&mut self) -> Result<()> {
        unsafe { self.device.reset_fences(&[self.sync.in_flight_fence]) }
            .context("Failed to reset in-flight fence")
    }

    fn acquire_next_image(&mut self) -> Result<u32> {
        self.swapchain.acquire_next_image(self.sync.image_available)
    }

    fn reset_command_buffer(&mut self) -> Result<()> {
        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
        }
        .context("Failed to reset command buffer")
    }

    fn record_command_buffer(&mut self, image_index: u32) -> Result<()> {
        let target = self.draw_target();
        let mut sink = DeviceCommands::new(&self.device, self.command_buffer);
        commands::record_triangle(&mut sink, &target, image_index)
    }

    fn submit(&mut self) -> Result<()> {
        let wait_semaphores = [self.sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.sync.render_finished];
        let command_buffers = [self.command_buffer];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.queue_submit(
                self.graphics_queue,
                &[submit_info.build()],
                self.sync.in_flight_fence,
            )
        }
        .context("Failed to submit draw command buffer")
    }

    fn present(&mut self, image_index: u32) -> Result<()> {
        self.swapchain
            .present(self.present_queue, image_index, &[self.sync.render_finished])
    }

    fn wait_idle(&mut self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.context("Failed to wait for device idle")
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");

        // The frame loop already drained the GPU on a clean exit; this covers
        // the error paths.
        if let Err(e) = self.wait_idle() {
            log::warn!("{}", e);
        }

        // `teardown` runs when the fields drop, right after this
    }
}
