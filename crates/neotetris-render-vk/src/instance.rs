// SPDX-License-Identifier: CEPL-1.0
use ash::ext::debug_utils;
use ash::khr::surface;
use ash::{vk, Entry, Instance};
use neotetris_render::RendererConfig;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{CStr, CString};
use tracing::{debug, error, info, trace, warn};

use crate::error::{GfxResult, VkResultExt};
use crate::probe::SurfaceProperties;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const ENGINE_NAME: &CStr = c"No engine";

/// Loader entry + instance (+ validation messenger). Destroys the instance
/// on drop, so it must outlive everything created from it.
pub(crate) struct InstanceHandle {
    pub entry: Entry,
    pub instance: Instance,
    debug: Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if data.is_null() || unsafe { (*data).p_message.is_null() } {
        return vk::FALSE;
    }
    let msg = unsafe { CStr::from_ptr((*data).p_message) }.to_string_lossy();

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("[vulkan] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("[vulkan] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!("[vulkan] {msg}");
    } else {
        trace!("[vulkan] {msg}");
    }
    vk::FALSE
}

impl InstanceHandle {
    pub fn new(display: RawDisplayHandle, cfg: &RendererConfig) -> GfxResult<Self> {
        let entry = unsafe { Entry::load()? };

        let validation = cfg.validation && has_validation_layer(&entry)?;
        if cfg.validation && !validation {
            warn!("validation requested but {VALIDATION_LAYER:?} is not installed");
        }

        let app_name =
            CString::new(cfg.app_name.as_str()).unwrap_or_else(|_| c"neotetris".into());
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 0, 1))
            .engine_name(ENGINE_NAME)
            .engine_version(vk::make_api_version(0, 0, 0, 1))
            .api_version(vk::API_VERSION_1_0);

        let mut extensions = ash_window::enumerate_required_extensions(display)
            .call("enumerate_required_extensions")?
            .to_vec();
        let mut layers = Vec::new();
        if validation {
            extensions.push(debug_utils::NAME.as_ptr());
            layers.push(VALIDATION_LAYER.as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .call("create_instance")?;

        let mut handle = InstanceHandle {
            entry,
            instance,
            debug: None,
        };
        if validation {
            handle.debug = handle.create_messenger();
        }
        info!(
            "Vulkan instance created ({} extensions, validation={})",
            extensions.len(),
            validation
        );
        Ok(handle)
    }

    fn create_messenger(&self) -> Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let loader = debug_utils::Instance::new(&self.entry, &self.instance);
        let ci = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        match unsafe { loader.create_debug_utils_messenger(&ci, None) } {
            Ok(m) => Some((loader, m)),
            Err(e) => {
                warn!("create_debug_utils_messenger failed: {e}; continuing without it");
                None
            }
        }
    }
}

fn has_validation_layer(entry: &Entry) -> GfxResult<bool> {
    let layers = unsafe { entry.enumerate_instance_layer_properties() }
        .call("enumerate_instance_layer_properties")?;
    Ok(layers
        .iter()
        .any(|l| l.layer_name_as_c_str().is_ok_and(|n| n == VALIDATION_LAYER)))
}

impl Drop for InstanceHandle {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        debug!("instance destroyed");
    }
}

/// Presentation surface for the window. Dropped before the instance.
pub(crate) struct SurfaceHandle {
    pub loader: surface::Instance,
    pub handle: vk::SurfaceKHR,
}

impl SurfaceHandle {
    pub fn new(
        inst: &InstanceHandle,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> GfxResult<Self> {
        let handle = unsafe {
            ash_window::create_surface(&inst.entry, &inst.instance, display, window, None)
        }
        .call("create_surface")?;
        Ok(SurfaceHandle {
            loader: surface::Instance::new(&inst.entry, &inst.instance),
            handle,
        })
    }

    pub fn can_present(&self, phys: vk::PhysicalDevice, family: u32) -> GfxResult<bool> {
        unsafe {
            self.loader
                .get_physical_device_surface_support(phys, family, self.handle)
        }
        .call("get_physical_device_surface_support")
    }

    /// Capabilities, formats and present modes of this surface on `phys`.
    /// Empty lists are returned as-is.
    pub fn properties(&self, phys: vk::PhysicalDevice) -> GfxResult<SurfaceProperties> {
        unsafe {
            let capabilities = self
                .loader
                .get_physical_device_surface_capabilities(phys, self.handle)
                .call("get_physical_device_surface_capabilities")?;
            let formats = self
                .loader
                .get_physical_device_surface_formats(phys, self.handle)
                .call("get_physical_device_surface_formats")?;
            let present_modes = self
                .loader
                .get_physical_device_surface_present_modes(phys, self.handle)
                .call("get_physical_device_surface_present_modes")?;
            Ok(SurfaceProperties {
                capabilities,
                formats,
                present_modes,
            })
        }
    }
}

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.handle, None) };
        debug!("surface destroyed");
    }
}
