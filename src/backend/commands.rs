// Command pool, command buffer and per-frame recording
//
// Recording goes through `CommandSink` so the exact command stream can be
// checked without a GPU. `DeviceCommands` is the real, ash-backed sink.

use ash::vk;

use crate::error::{RendererError, Result, RuntimeContext};

/// The subset of vkCmd* the triangle needs
pub trait CommandSink {
    fn begin(&mut self) -> Result<()>;
    fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_color: [f32; 4],
    );
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline);
    fn set_viewport(&mut self, viewport: vk::Viewport);
    fn set_scissor(&mut self, scissor: vk::Rect2D);
    fn draw(&mut self, vertex_count: u32, instance_count: u32);
    fn end_render_pass(&mut self);
    fn end(&mut self) -> Result<()>;
}

/// Records into a real command buffer
pub struct DeviceCommands<'a> {
    device: &'a ash::Device,
    command_buffer: vk::CommandBuffer,
}

impl<'a> DeviceCommands<'a> {
    pub fn new(device: &'a ash::Device, command_buffer: vk::CommandBuffer) -> Self {
        Self {
            device,
            command_buffer,
        }
    }
}

impl CommandSink for DeviceCommands<'_> {
    fn begin(&mut self) -> Result<()> {
        // No inheritance, no simultaneous use: re-recorded after every reset
        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe { self.device.begin_command_buffer(self.command_buffer, &begin_info) }
            .context("Failed to begin recording command buffer")
    }

    fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_color: [f32; 4],
    ) {
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear_color,
            },
        }];
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(&clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            )
        }
    }

    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            )
        }
    }

    fn set_viewport(&mut self, viewport: vk::Viewport) {
        unsafe { self.device.cmd_set_viewport(self.command_buffer, 0, &[viewport]) }
    }

    fn set_scissor(&mut self, scissor: vk::Rect2D) {
        unsafe { self.device.cmd_set_scissor(self.command_buffer, 0, &[scissor]) }
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        unsafe {
            self.device
                .cmd_draw(self.command_buffer, vertex_count, instance_count, 0, 0)
        }
    }

    fn end_render_pass(&mut self) {
        unsafe { self.device.cmd_end_render_pass(self.command_buffer) }
    }

    fn end(&mut self) -> Result<()> {
        unsafe { self.device.end_command_buffer(self.command_buffer) }
            .context("Failed to end recording command buffer")
    }
}

/// Fixed inputs to the per-frame recording
#[derive(Debug, Clone, Copy)]
pub struct DrawTarget<'a> {
    pub render_pass: vk::RenderPass,
    pub pipeline: vk::Pipeline,
    pub framebuffers: &'a [vk::Framebuffer],
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
}

/// Record the whole frame: clear, draw the 3-vertex triangle, done.
pub fn record_triangle<S: CommandSink>(
    sink: &mut S,
    target: &DrawTarget<'_>,
    image_index: u32,
) -> Result<()> {
    let framebuffer = *target
        .framebuffers
        .get(image_index as usize)
        .ok_or_else(|| {
            RendererError::Runtime(format!(
                "No framebuffer for swapchain image {} ({} framebuffers)",
                image_index,
                target.framebuffers.len()
            ))
        })?;

    let full_area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: target.extent,
    };

    sink.begin()?;
    sink.begin_render_pass(target.render_pass, framebuffer, full_area, target.clear_color);
    sink.bind_pipeline(target.pipeline);
    sink.set_viewport(vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: target.extent.width as f32,
        height: target.extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    });
    sink.set_scissor(full_area);
    sink.draw(3, 1);
    sink.end_render_pass();
    sink.end()
}

pub fn create_command_pool(device: &ash::Device, queue_family: u32) -> Result<vk::CommandPool> {
    // RESET: the single buffer is reset and re-recorded every frame
    let pool_info = vk::CommandPoolCreateInfo::builder()
        .queue_family_index(queue_family)
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

    unsafe { device.create_command_pool(&pool_info, None) }
        .context("Failed to create command pool")
}

/// Freed together with its pool
pub fn allocate_command_buffer(
    device: &ash::Device,
    command_pool: vk::CommandPool,
) -> Result<vk::CommandBuffer> {
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(command_pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);

    let buffers = unsafe { device.allocate_command_buffers(&alloc_info) }
        .context("Failed to allocate command buffer")?;

    buffers
        .first()
        .copied()
        .ok_or_else(|| RendererError::Runtime("Driver returned no command buffer".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[derive(Debug, Clone, PartialEq)]
    enum Recorded {
        Begin,
        BeginRenderPass {
            render_pass: u64,
            framebuffer: u64,
            area: vk::Rect2D,
            clear_color: [f32; 4],
        },
        BindPipeline(u64),
        SetViewport([f32; 6]),
        SetScissor(vk::Rect2D),
        Draw {
            vertex_count: u32,
            instance_count: u32,
        },
        EndRenderPass,
        End,
    }

    #[derive(Default)]
    struct RecordingSink {
        commands: Vec<Recorded>,
        fail_begin: bool,
    }

    impl CommandSink for RecordingSink {
        fn begin(&mut self) -> Result<()> {
            if self.fail_begin {
                return Err(RendererError::Runtime("begin failed".into()));
            }
            self.commands.push(Recorded::Begin);
            Ok(())
        }

        fn begin_render_pass(
            &mut self,
            render_pass: vk::RenderPass,
            framebuffer: vk::Framebuffer,
            render_area: vk::Rect2D,
            clear_color: [f32; 4],
        ) {
            self.commands.push(Recorded::BeginRenderPass {
                render_pass: render_pass.as_raw(),
                framebuffer: framebuffer.as_raw(),
                area: render_area,
                clear_color,
            });
        }

        fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
            self.commands.push(Recorded::BindPipeline(pipeline.as_raw()));
        }

        fn set_viewport(&mut self, v: vk::Viewport) {
            self.commands.push(Recorded::SetViewport([
                v.x, v.y, v.width, v.height, v.min_depth, v.max_depth,
            ]));
        }

        fn set_scissor(&mut self, scissor: vk::Rect2D) {
            self.commands.push(Recorded::SetScissor(scissor));
        }

        fn draw(&mut self, vertex_count: u32, instance_count: u32) {
            self.commands.push(Recorded::Draw {
                vertex_count,
                instance_count,
            });
        }

        fn end_render_pass(&mut self) {
            self.commands.push(Recorded::EndRenderPass);
        }

        fn end(&mut self) -> Result<()> {
            self.commands.push(Recorded::End);
            Ok(())
        }
    }

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 800,
        height: 600,
    };

    fn framebuffers() -> Vec<vk::Framebuffer> {
        (1..=3).map(|raw| vk::Framebuffer::from_raw(0x100 + raw)).collect()
    }

    fn target(framebuffers: &[vk::Framebuffer]) -> DrawTarget<'_> {
        DrawTarget {
            render_pass: vk::RenderPass::from_raw(0x10),
            pipeline: vk::Pipeline::from_raw(0x20),
            framebuffers,
            extent: EXTENT,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    fn record(image_index: u32) -> Vec<Recorded> {
        let framebuffers = framebuffers();
        let mut sink = RecordingSink::default();
        record_triangle(&mut sink, &target(&framebuffers), image_index).unwrap();
        sink.commands
    }

    #[test]
    fn records_the_full_triangle_frame() {
        let full_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: EXTENT,
        };

        assert_eq!(
            record(1),
            vec![
                Recorded::Begin,
                Recorded::BeginRenderPass {
                    render_pass: 0x10,
                    framebuffer: 0x102,
                    area: full_area,
                    clear_color: [0.0, 0.0, 0.0, 1.0],
                },
                Recorded::BindPipeline(0x20),
                Recorded::SetViewport([0.0, 0.0, 800.0, 600.0, 0.0, 1.0]),
                Recorded::SetScissor(full_area),
                Recorded::Draw {
                    vertex_count: 3,
                    instance_count: 1
                },
                Recorded::EndRenderPass,
                Recorded::End,
            ]
        );
    }

    #[test]
    fn recording_twice_is_identical() {
        let framebuffers = framebuffers();
        let target = target(&framebuffers);
        let mut sink = RecordingSink::default();

        record_triangle(&mut sink, &target, 2).unwrap();
        let first = std::mem::take(&mut sink.commands);
        record_triangle(&mut sink, &target, 2).unwrap();

        assert_eq!(first, sink.commands);
    }

    #[test]
    fn framebuffer_follows_the_image_index() {
        for (index, expected) in [(0u32, 0x101u64), (2, 0x103)] {
            match &record(index)[1] {
                Recorded::BeginRenderPass { framebuffer, .. } => assert_eq!(*framebuffer, expected),
                other => panic!("expected render pass begin, got {:?}", other),
            }
        }
    }

    #[test]
    fn unknown_image_index_records_nothing() {
        let framebuffers = framebuffers();
        let mut sink = RecordingSink::default();

        let result = record_triangle(&mut sink, &target(&framebuffers), 3);

        assert!(matches!(result, Err(RendererError::Runtime(_))));
        assert!(sink.commands.is_empty());
    }

    #[test]
    fn begin_failure_stops_recording() {
        let framebuffers = framebuffers();
        let mut sink = RecordingSink {
            fail_begin: true,
            ..Default::default()
        };

        assert!(record_triangle(&mut sink, &target(&framebuffers), 0).is_err());
        assert!(sink.commands.is_empty());
    }
}
