// Backend module - Vulkan abstraction layer
//
// Design: Thin wrapper around ash, one file per Vulkan concern. Selection and
// negotiation logic is kept in plain functions so it runs without a GPU.

pub mod commands;
pub mod device;
pub mod instance;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod teardown;
