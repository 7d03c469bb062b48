// Vulkan instance - capability queries, context creation, diagnostics
//
// Responsibilities:
// - Read-only queries: instance extensions, layers, physical devices
// - Instance creation with validation layers and the debug messenger chained in
// - Presentation surface for the window

use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry};
use std::ffi::{CStr, CString};

use crate::config::Config;
use crate::error::{RendererError, Result, RuntimeContext};
use crate::window::AppWindow;

pub fn list_instance_extensions(entry: &Entry) -> Result<Vec<vk::ExtensionProperties>> {
    entry
        .enumerate_instance_extension_properties(None)
        .context("Failed to enumerate instance extensions")
}

pub fn list_validation_layers(entry: &Entry) -> Result<Vec<vk::LayerProperties>> {
    entry
        .enumerate_instance_layer_properties()
        .context("Failed to enumerate instance layers")
}

pub fn list_physical_devices(instance: &ash::Instance) -> Result<Vec<vk::PhysicalDevice>> {
    unsafe { instance.enumerate_physical_devices() }
        .context("Failed to enumerate physical devices")
}

pub(crate) fn extension_name(props: &vk::ExtensionProperties) -> &CStr {
    // Safety: the driver fills extension_name with a NUL-terminated string
    unsafe { CStr::from_ptr(props.extension_name.as_ptr()) }
}

fn layer_name(props: &vk::LayerProperties) -> &CStr {
    unsafe { CStr::from_ptr(props.layer_name.as_ptr()) }
}

/// Names in `required` that do not appear in `available`, in request order.
pub fn missing_names<'a>(required: &[&'a CStr], available: &[&CStr]) -> Vec<&'a CStr> {
    required
        .iter()
        .copied()
        .filter(|name| !available.contains(name))
        .collect()
}

/// Fail with a configuration error naming every missing entry.
pub fn check_support(what: &str, required: &[&CStr], available: &[&CStr]) -> Result<()> {
    let missing = missing_names(required, available);
    if missing.is_empty() {
        return Ok(());
    }

    let names: Vec<_> = missing.iter().map(|name| name.to_string_lossy()).collect();
    Err(RendererError::Configuration(format!(
        "Missing required {}: {}",
        what,
        names.join(", ")
    )))
}

/// Windowing extensions, plus debug utils when diagnostics are on.
pub fn required_instance_extensions(
    window_extensions: &[&'static CStr],
    enable_diagnostics: bool,
) -> Vec<&'static CStr> {
    let mut extensions = window_extensions.to_vec();
    if enable_diagnostics {
        extensions.push(DebugUtils::name());
    }
    extensions
}

fn debug_messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
        .build()
}

/// Create the Vulkan instance.
///
/// With diagnostics on, the messenger create-info is chained into
/// `vkCreateInstance` so instance creation itself is validated.
pub fn create_context(
    entry: &Entry,
    config: &Config,
    window_extensions: &[&'static CStr],
) -> Result<ash::Instance> {
    let enable_diagnostics = config.diagnostics_enabled();

    let layer_names = config
        .debug
        .layers
        .iter()
        .map(|name| CString::new(name.as_str()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Invalid validation layer name")?;

    if enable_diagnostics {
        let available = list_validation_layers(entry)?;
        let available: Vec<&CStr> = available.iter().map(layer_name).collect();
        log::debug!("Available layers: {:?}", available);

        let required: Vec<&CStr> = layer_names.iter().map(CString::as_c_str).collect();
        check_support("validation layers", &required, &available)?;
    }

    let extensions = required_instance_extensions(window_extensions, enable_diagnostics);
    let available = list_instance_extensions(entry)?;
    let available: Vec<&CStr> = available.iter().map(extension_name).collect();
    log::debug!("Available instance extensions: {:?}", available);
    check_support("instance extensions", &extensions, &available)?;

    let app_name = CString::new(config.application.application_name.as_str())
        .context("Invalid application name")?;
    let engine_name = CString::new(config.application.engine_name.as_str())
        .context("Invalid engine name")?;

    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(&engine_name)
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_0);

    let extension_ptrs: Vec<_> = extensions.iter().map(|name| name.as_ptr()).collect();
    let layer_ptrs: Vec<_> = if enable_diagnostics {
        layer_names.iter().map(|name| name.as_ptr()).collect()
    } else {
        Vec::new()
    };

    let mut debug_info = debug_messenger_create_info();
    let mut create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extension_ptrs)
        .enabled_layer_names(&layer_ptrs);
    if enable_diagnostics {
        create_info = create_info.push_next(&mut debug_info);
    }

    log::info!(
        "Creating Vulkan instance for '{}' (diagnostics {})",
        config.application.application_name,
        if enable_diagnostics { "on" } else { "off" }
    );

    unsafe { entry.create_instance(&create_info, None) }
        .context("Failed to create Vulkan instance")
}

/// Install the persistent debug messenger. `None` when diagnostics are off.
pub fn setup_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
    enable_diagnostics: bool,
) -> Result<Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>> {
    if !enable_diagnostics {
        return Ok(None);
    }

    let debug_utils = DebugUtils::new(entry, instance);
    let create_info = debug_messenger_create_info();

    let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
        .context("Failed to set up debug messenger")?;

    Ok(Some((debug_utils, messenger)))
}

pub fn create_surface(
    entry: &Entry,
    instance: &ash::Instance,
    window: &AppWindow,
) -> Result<vk::SurfaceKHR> {
    unsafe {
        ash_window::create_surface(
            entry,
            instance,
            window.raw_display_handle(),
            window.raw_window_handle(),
            None,
        )
    }
    .context("Failed to create window surface")
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();
    let category = message_category(message_type);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan {}] {}", category, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan {}] {}", category, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            log::info!("[Vulkan {}] {}", category, message);
        }
        _ => {
            log::trace!("[Vulkan {}] {}", category, message);
        }
    }

    vk::FALSE
}

fn message_category(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "performance"
    } else {
        "general"
    }
}
