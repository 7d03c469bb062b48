// Vulkan Device - GPU selection and logical device
//
// Responsibilities:
// - Queue family discovery (graphics + present)
// - Physical device selection (first suitable GPU, in enumeration order)
// - Logical device + queue creation

use ash::extensions::khr::Surface;
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::CStr;

use super::instance::{self, extension_name};
use super::swapchain::SwapchainSupportDetails;
use crate::error::{RendererError, Result, RuntimeContext};

/// Device extensions every candidate GPU must offer
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[c"VK_KHR_swapchain"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn both_present(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// `(graphics, present)` once both roles are known
    pub fn complete(&self) -> Option<(u32, u32)> {
        Some((self.graphics_family?, self.present_family?))
    }
}

/// Scan queue families in index order.
///
/// Each role keeps the last index that satisfied it, and the scan stops at
/// the first index where both roles are filled.
pub fn find_queue_families(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: impl FnMut(u32) -> Result<bool>,
) -> Result<QueueFamilyIndices> {
    let mut indices = QueueFamilyIndices::default();

    for (index, family) in families.iter().enumerate() {
        let index = index as u32;

        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics_family = Some(index);
        }
        if supports_present(index)? {
            indices.present_family = Some(index);
        }

        if indices.both_present() {
            break;
        }
    }

    Ok(indices)
}

/// One queue per distinct family; graphics and present may share.
pub fn unique_queue_families(graphics_family: u32, present_family: u32) -> BTreeSet<u32> {
    [graphics_family, present_family].into_iter().collect()
}

/// Everything the selector needs to know about one GPU. Recomputed per query.
#[derive(Debug, Clone)]
pub struct PhysicalDeviceDescriptor {
    pub handle: vk::PhysicalDevice,
    pub queue_families: QueueFamilyIndices,
    pub extensions_supported: bool,
    pub swapchain_support: SwapchainSupportDetails,
}

impl PhysicalDeviceDescriptor {
    pub fn query(
        instance: &ash::Instance,
        surface_loader: &Surface,
        surface: vk::SurfaceKHR,
        handle: vk::PhysicalDevice,
    ) -> Result<Self> {
        let families =
            unsafe { instance.get_physical_device_queue_family_properties(handle) };
        let queue_families = find_queue_families(&families, |index| unsafe {
            surface_loader
                .get_physical_device_surface_support(handle, index, surface)
                .context("Failed to query surface support")
        })?;

        let available = unsafe { instance.enumerate_device_extension_properties(handle) }
            .context("Failed to enumerate device extensions")?;
        let available: Vec<&CStr> = available.iter().map(extension_name).collect();
        let extensions_supported =
            instance::missing_names(REQUIRED_DEVICE_EXTENSIONS, &available).is_empty();

        let swapchain_support = SwapchainSupportDetails::query(surface_loader, handle, surface)?;

        Ok(Self {
            handle,
            queue_families,
            extensions_supported,
            swapchain_support,
        })
    }

    pub fn is_suitable(&self) -> bool {
        self.queue_families.both_present()
            && self.extensions_supported
            && self.swapchain_support.is_adequate()
    }
}

/// First device in enumeration order that passes `is_suitable`.
pub fn pick_physical_device<D: Copy>(
    devices: &[D],
    mut is_suitable: impl FnMut(D) -> Result<bool>,
) -> Result<D> {
    if devices.is_empty() {
        return Err(RendererError::Configuration(
            "No physical devices present".to_string(),
        ));
    }

    for &device in devices {
        if is_suitable(device)? {
            return Ok(device);
        }
    }

    Err(RendererError::Configuration(
        "No suitable physical device is present".to_string(),
    ))
}

/// Enumerate GPUs and return the descriptor of the first suitable one.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &Surface,
    surface: vk::SurfaceKHR,
) -> Result<PhysicalDeviceDescriptor> {
    let devices = instance::list_physical_devices(instance)?;
    log::info!("Found {} physical device(s)", devices.len());

    let chosen = pick_physical_device(&devices, |device| {
        let descriptor =
            PhysicalDeviceDescriptor::query(instance, surface_loader, surface, device)?;
        log::debug!(
            "{}: queues {:?}, extensions {}, swapchain adequate {}",
            device_name(instance, device),
            descriptor.queue_families,
            descriptor.extensions_supported,
            descriptor.swapchain_support.is_adequate()
        );
        Ok(descriptor.is_suitable())
    })?;

    let properties = unsafe { instance.get_physical_device_properties(chosen) };
    log::info!("Selected GPU: {}", device_name(instance, chosen));
    log::info!(
        "API Version: {}.{}.{}",
        vk::api_version_major(properties.api_version),
        vk::api_version_minor(properties.api_version),
        vk::api_version_patch(properties.api_version)
    );

    PhysicalDeviceDescriptor::query(instance, surface_loader, surface, chosen)
}

fn device_name(instance: &ash::Instance, device: vk::PhysicalDevice) -> String {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// Logical device plus the queues the frame loop submits and presents on
pub struct LogicalDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub graphics_family: u32,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

pub fn create_logical_device(
    instance: &ash::Instance,
    physical_device: &PhysicalDeviceDescriptor,
    required_extensions: &[&CStr],
) -> Result<LogicalDevice> {
    let (graphics_family, present_family) =
        physical_device.queue_families.complete().ok_or_else(|| {
            RendererError::Configuration("Selected GPU lacks graphics or present queues".into())
        })?;

    let queue_priorities = [1.0];
    let queue_create_infos: Vec<_> = unique_queue_families(graphics_family, present_family)
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&queue_priorities)
                .build()
        })
        .collect();

    let extensions: Vec<_> = required_extensions.iter().map(|name| name.as_ptr()).collect();

    // No optional features
    let features = vk::PhysicalDeviceFeatures::default();

    let create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extensions)
        .enabled_features(&features);

    let device = unsafe { instance.create_device(physical_device.handle, &create_info, None) }
        .context("Failed to create logical device")?;

    let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
    let present_queue = unsafe { device.get_device_queue(present_family, 0) };

    log::info!(
        "Logical device ready (graphics family {}, present family {})",
        graphics_family,
        present_family
    );

    Ok(LogicalDevice {
        device,
        physical_device: physical_device.handle,
        graphics_family,
        graphics_queue,
        present_queue,
    })
}
