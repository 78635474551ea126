//! Vulkan 1.3 instance with optional validation.
//!
//! # Example
//!
//! ```no_run
//! use frame_rhi::instance::Instance;
//!
//! // Surface extensions normally come from the windowing layer
//! let instance = Instance::new(c"Frame Renderer", &[], cfg!(debug_assertions))
//!     .expect("Failed to create Vulkan instance");
//! let vk_instance = instance.handle();
//! ```

use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_void};

use ash::{Entry, vk};
use tracing::{debug, error, info, warn};

use crate::error::RhiResult;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const ENGINE_NAME: &CStr = c"frame";

/// Validation messenger and the loader needed to destroy it.
struct Validation {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

/// Owns the loaded Vulkan library and the `VkInstance`.
///
/// Dropping it destroys the validation messenger, then the instance. Every
/// object created from the instance must be gone by then.
pub struct Instance {
    validation: Option<Validation>,
    instance: ash::Instance,
    entry: Entry,
}

impl Instance {
    /// Loads Vulkan and creates an instance with `surface_extensions`
    /// enabled.
    ///
    /// With `enable_validation`, the Khronos validation layer and a debug
    /// messenger are added if the layer is installed; otherwise a warning is
    /// logged and the instance is created without them.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RhiError::LoadingError`] if no Vulkan loader is
    /// present, or a Vulkan error if instance creation fails.
    pub fn new(
        app_name: &CStr,
        surface_extensions: &[*const c_char],
        enable_validation: bool,
    ) -> RhiResult<Self> {
        // SAFETY: `Entry` keeps the library loaded for as long as it lives,
        // and it is the last field dropped.
        let entry = unsafe { Entry::load()? };

        let validate = enable_validation && has_layer(&entry, VALIDATION_LAYER)?;
        if enable_validation && !validate {
            warn!("Validation requested but {:?} is not installed", VALIDATION_LAYER);
        }

        let version = vk::make_api_version(0, 1, 0, 0);
        let app_info = vk::ApplicationInfo::default()
            .application_name(app_name)
            .application_version(version)
            .engine_name(ENGINE_NAME)
            .engine_version(version)
            .api_version(vk::API_VERSION_1_3);

        let mut extensions = surface_extensions.to_vec();
        let mut layers = Vec::new();
        if validate {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
            layers.push(VALIDATION_LAYER.as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        // SAFETY: every pointer in `create_info` refers to locals or static
        // strings that outlive the call.
        let instance = unsafe { entry.create_instance(&create_info, None)? };
        info!(
            "Vulkan instance created ({} extensions, validation {})",
            extensions.len(),
            if validate { "on" } else { "off" }
        );

        let validation = if validate {
            match create_messenger(&entry, &instance) {
                Ok(v) => Some(v),
                Err(e) => {
                    // SAFETY: nothing has been created from the instance yet.
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Self {
            validation,
            instance,
            entry,
        })
    }

    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Whether validation messages are being routed to the log.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.validation.is_some()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        // SAFETY: the messenger belongs to this instance, and the instance is
        // destroyed exactly once, after everything created from it.
        unsafe {
            if let Some(validation) = self.validation.take() {
                validation
                    .loader
                    .destroy_debug_utils_messenger(validation.messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

fn has_layer(entry: &Entry, name: &CStr) -> RhiResult<bool> {
    // SAFETY: plain enumeration through a loaded entry.
    let layers = unsafe { entry.enumerate_instance_layer_properties()? };
    Ok(layers
        .iter()
        .any(|layer| layer.layer_name_as_c_str().is_ok_and(|n| n == name)))
}

fn create_messenger(entry: &Entry, instance: &ash::Instance) -> RhiResult<Validation> {
    let loader = ash::ext::debug_utils::Instance::new(entry, instance);
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(log_validation_message));

    // SAFETY: the callback is a plain function and needs no user data.
    let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };
    Ok(Validation { loader, messenger })
}

/// Forwards validation messages to `tracing` by severity.
///
/// # Safety
///
/// Called by the loader with `data` either null or valid for the call.
unsafe extern "system" fn log_validation_message(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    kind: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    // SAFETY: see above; the message pointer is checked before use.
    let message = unsafe { data.as_ref() }
        .filter(|d| !d.p_message.is_null())
        .map_or(Cow::Borrowed("(no message)"), |d| unsafe {
            CStr::from_ptr(d.p_message).to_string_lossy()
        });

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", "[{:?}] {}", kind, message);
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", "[{:?}] {}", kind, message);
    } else {
        debug!(target: "vulkan", "[{:?}] {}", kind, message);
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_without_validation_has_no_messenger() {
        match Instance::new(c"frame-test", &[], false) {
            Ok(instance) => assert!(!instance.has_validation()),
            Err(e) => eprintln!("Skipping test: Vulkan not available ({e})"),
        }
    }
}
