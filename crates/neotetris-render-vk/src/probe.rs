// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

use crate::error::{GfxResult, VkResultExt};
use crate::instance::SurfaceHandle;

#[derive(Clone, Debug, Default)]
pub struct SurfaceProperties {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceProperties {
    /// A swap chain needs at least one format and one present mode.
    pub fn supports_swapchain(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Read-only view of the physical devices an instance exposes, paired with
/// the surface they would present to.
pub trait DeviceProbe {
    type Device: Copy;

    fn devices(&self) -> GfxResult<Vec<Self::Device>>;
    fn name(&self, dev: Self::Device) -> String;
    fn device_type(&self, dev: Self::Device) -> vk::PhysicalDeviceType;
    fn features(&self, dev: Self::Device) -> vk::PhysicalDeviceFeatures;
    fn queue_families(&self, dev: Self::Device) -> Vec<vk::QueueFamilyProperties>;
    fn can_present(&self, dev: Self::Device, family: u32) -> GfxResult<bool>;
    fn extension_names(&self, dev: Self::Device) -> GfxResult<Vec<String>>;
    fn surface_properties(&self, dev: Self::Device) -> GfxResult<SurfaceProperties>;
}

/// The real thing: an instance and the window surface.
pub(crate) struct SurfaceProbe<'a> {
    pub instance: &'a ash::Instance,
    pub surface: &'a SurfaceHandle,
}

impl DeviceProbe for SurfaceProbe<'_> {
    type Device = vk::PhysicalDevice;

    fn devices(&self) -> GfxResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance.enumerate_physical_devices() }
            .call("enumerate_physical_devices")
    }

    fn name(&self, dev: vk::PhysicalDevice) -> String {
        let props = unsafe { self.instance.get_physical_device_properties(dev) };
        props
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unnamed>".into())
    }

    fn device_type(&self, dev: vk::PhysicalDevice) -> vk::PhysicalDeviceType {
        unsafe { self.instance.get_physical_device_properties(dev) }.device_type
    }

    fn features(&self, dev: vk::PhysicalDevice) -> vk::PhysicalDeviceFeatures {
        unsafe { self.instance.get_physical_device_features(dev) }
    }

    fn queue_families(&self, dev: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        unsafe {
            self.instance
                .get_physical_device_queue_family_properties(dev)
        }
    }

    fn can_present(&self, dev: vk::PhysicalDevice, family: u32) -> GfxResult<bool> {
        self.surface.can_present(dev, family)
    }

    fn extension_names(&self, dev: vk::PhysicalDevice) -> GfxResult<Vec<String>> {
        let props = unsafe { self.instance.enumerate_device_extension_properties(dev) }
            .call("enumerate_device_extension_properties")?;
        Ok(props
            .iter()
            .filter_map(|p| p.extension_name_as_c_str().ok())
            .map(|n| n.to_string_lossy().into_owned())
            .collect())
    }

    fn surface_properties(&self, dev: vk::PhysicalDevice) -> GfxResult<SurfaceProperties> {
        self.surface.properties(dev)
    }
}
