// =============================================================================
// FRAME LOOP - one frame in flight
// =============================================================================
//
// FRAME FLOW (per tick):
//   poll events -> wait fence -> reset fence -> acquire image
//     -> reset + record command buffer -> submit -> present
//
// The fence wait comes first: there is one command buffer, and the GPU may
// still be reading it from the previous frame.
//
// The loop is written against `FrameBackend` so the ordering can be checked
// without a GPU; `Renderer` is the real implementation.

use std::time::Instant;

use crate::error::Result;

/// GPU-facing steps of one frame, in the order the loop calls them
pub trait FrameBackend {
    /// Block until the previous frame's work is done
    fn wait_for_in_flight_fence(&mut self) -> Result<()>;
    fn reset_in_flight_fence(&mut self) -> Result<()>;
    /// Returns the swapchain image index; signals image-available
    fn acquire_next_image(&mut self) -> Result<u32>;
    fn reset_command_buffer(&mut self) -> Result<()>;
    fn record_command_buffer(&mut self, image_index: u32) -> Result<()>;
    /// Waits image-available, signals render-finished and the fence
    fn submit(&mut self) -> Result<()>;
    /// Waits render-finished
    fn present(&mut self, image_index: u32) -> Result<()>;
    fn wait_idle(&mut self) -> Result<()>;
}

/// Window side of the loop
pub trait FrameEvents {
    fn poll_events(&mut self);
    fn should_close(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    WaitingOnFence,
    ImageAcquired(u32),
    Submitted(u32),
    Presented,
}

/// Logs frames per second once a second
struct FpsCounter {
    frames: u32,
    since: Instant,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            frames: 0,
            since: Instant::now(),
        }
    }

    fn frame_presented(&mut self) {
        self.frames += 1;
        let elapsed = self.since.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            log::info!(
                "{:.0} FPS ({:.2}ms)",
                self.frames as f32 / elapsed,
                elapsed * 1000.0 / self.frames as f32
            );
            self.frames = 0;
            self.since = Instant::now();
        }
    }
}

pub struct FrameLoop {
    state: FrameState,
    frames_presented: u64,
    fps: Option<FpsCounter>,
}

impl FrameLoop {
    pub fn new(show_fps: bool) -> Self {
        Self {
            state: FrameState::Idle,
            frames_presented: 0,
            fps: show_fps.then(FpsCounter::new),
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Render and present one frame.
    ///
    /// On error the state is left where the failing step was, and the error
    /// is returned as is: every failure here is fatal.
    pub fn tick<B: FrameBackend>(&mut self, backend: &mut B) -> Result<()> {
        self.state = FrameState::WaitingOnFence;
        backend.wait_for_in_flight_fence()?;
        // Resetting before the wait returns would race the frame still in flight
        backend.reset_in_flight_fence()?;

        let image_index = backend.acquire_next_image()?;
        self.state = FrameState::ImageAcquired(image_index);

        backend.reset_command_buffer()?;
        backend.record_command_buffer(image_index)?;

        backend.submit()?;
        self.state = FrameState::Submitted(image_index);

        backend.present(image_index)?;
        self.state = FrameState::Presented;

        self.frames_presented += 1;
        if let Some(fps) = self.fps.as_mut() {
            fps.frame_presented();
        }

        self.state = FrameState::Idle;
        Ok(())
    }

    /// Tick until the window asks to close, then drain the GPU.
    ///
    /// Returns the number of frames presented during this call.
    pub fn run<B: FrameBackend, E: FrameEvents>(
        &mut self,
        backend: &mut B,
        events: &mut E,
    ) -> Result<u64> {
        let start = self.frames_presented;

        loop {
            events.poll_events();
            if events.should_close() {
                break;
            }
            self.tick(backend)?;
        }

        // Nothing may still be in flight once teardown starts
        backend.wait_idle()?;

        Ok(self.frames_presented - start)
    }
}
