// SPDX-License-Identifier: CEPL-1.0
use ash::khr::swapchain;
use ash::vk;
use neotetris_render::SelectionPolicy;
use std::ffi::CString;
use tracing::{debug, info};

use crate::error::{GfxResult, VkResultExt};
use crate::instance::InstanceHandle;
use crate::queue::QueueFamilies;
use crate::select::{vk_features, SelectedDevice};

/// Logical device with its drawing and presentation queues.
pub(crate) struct LogicalDevice {
    pub phys: vk::PhysicalDevice,
    pub device: ash::Device,
    pub swapchain_loader: swapchain::Device,
    pub families: QueueFamilies,
    pub drawing_queue: vk::Queue,
    pub presentation_queue: vk::Queue,
}

impl LogicalDevice {
    pub fn new(
        inst: &InstanceHandle,
        selected: &SelectedDevice<vk::PhysicalDevice>,
        policy: &SelectionPolicy,
    ) -> GfxResult<Self> {
        let families = selected.families;
        let priorities = [1.0_f32];

        // One create info per distinct family; duplicates are invalid.
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();

        // Selection already matched these against real extension names.
        let ext_names: Vec<CString> = policy
            .required_extensions
            .iter()
            .filter_map(|n| CString::new(n.as_str()).ok())
            .collect();
        let ext_ptrs: Vec<_> = ext_names.iter().map(|n| n.as_ptr()).collect();

        let features = vk_features(policy.required_features);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&ext_ptrs)
            .enabled_features(&features);

        let device = unsafe {
            inst.instance
                .create_device(selected.device, &create_info, None)
        }
        .call("create_device")?;

        let (drawing_queue, presentation_queue) = unsafe {
            (
                device.get_device_queue(families.drawing, 0),
                device.get_device_queue(families.presentation, 0),
            )
        };
        let swapchain_loader = swapchain::Device::new(&inst.instance, &device);

        info!(
            "logical device created on {} ({} queue families)",
            selected.name,
            queue_infos.len()
        );

        Ok(LogicalDevice {
            phys: selected.device,
            device,
            swapchain_loader,
            families,
            drawing_queue,
            presentation_queue,
        })
    }

    pub fn wait_idle(&self) {
        unsafe { self.device.device_wait_idle() }.ok();
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe { self.device.destroy_device(None) };
        debug!("logical device destroyed");
    }
}
