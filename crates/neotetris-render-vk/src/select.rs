// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use neotetris_render::{DeviceFeatures, DeviceTypes, SelectionPolicy};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{GfxError, GfxResult};
use crate::probe::DeviceProbe;
use crate::queue::{find_queue_families, QueueFamilies, QueueFamilyIndices};

/// Why a candidate device was passed over. Checks run in declaration order
/// and the first failure is reported.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("missing features {0:?}")]
    MissingFeatures(DeviceFeatures),
    #[error("unsuitable device type {0:?}")]
    UnacceptedType(vk::PhysicalDeviceType),
    #[error("missing queue families {0:?}")]
    MissingQueueFamilies(QueueFamilyIndices),
    #[error("required extensions not supported: {0:?}")]
    MissingExtensions(Vec<String>),
    #[error("insufficient swap chain support")]
    NoSwapchainSupport,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedDevice<D> {
    pub device: D,
    pub name: String,
    pub families: QueueFamilies,
}

pub fn device_features(f: &vk::PhysicalDeviceFeatures) -> DeviceFeatures {
    let mut out = DeviceFeatures::empty();
    out.set(DeviceFeatures::GEOMETRY_SHADER, f.geometry_shader != 0);
    out.set(DeviceFeatures::TESSELLATION_SHADER, f.tessellation_shader != 0);
    out.set(DeviceFeatures::SAMPLER_ANISOTROPY, f.sampler_anisotropy != 0);
    out.set(DeviceFeatures::FILL_MODE_NON_SOLID, f.fill_mode_non_solid != 0);
    out.set(DeviceFeatures::WIDE_LINES, f.wide_lines != 0);
    out
}

/// Inverse of [`device_features`], for enabling features at device creation.
pub fn vk_features(f: DeviceFeatures) -> vk::PhysicalDeviceFeatures {
    vk::PhysicalDeviceFeatures {
        geometry_shader: f.contains(DeviceFeatures::GEOMETRY_SHADER).into(),
        tessellation_shader: f.contains(DeviceFeatures::TESSELLATION_SHADER).into(),
        sampler_anisotropy: f.contains(DeviceFeatures::SAMPLER_ANISOTROPY).into(),
        fill_mode_non_solid: f.contains(DeviceFeatures::FILL_MODE_NON_SOLID).into(),
        wide_lines: f.contains(DeviceFeatures::WIDE_LINES).into(),
        ..Default::default()
    }
}

pub fn device_type_flag(ty: vk::PhysicalDeviceType) -> DeviceTypes {
    match ty {
        vk::PhysicalDeviceType::DISCRETE_GPU => DeviceTypes::DISCRETE_GPU,
        vk::PhysicalDeviceType::INTEGRATED_GPU => DeviceTypes::INTEGRATED_GPU,
        vk::PhysicalDeviceType::VIRTUAL_GPU => DeviceTypes::VIRTUAL_GPU,
        vk::PhysicalDeviceType::CPU => DeviceTypes::CPU,
        vk::PhysicalDeviceType::OTHER => DeviceTypes::OTHER,
        _ => DeviceTypes::empty(),
    }
}

/// Required names not matched by any available name. Each available name
/// consumes at most one required entry.
pub fn missing_extensions(required: &[String], available: &[String]) -> Vec<String> {
    let mut remaining: Vec<&str> = required.iter().map(String::as_str).collect();
    for name in available {
        if let Some(pos) = remaining.iter().position(|r| *r == name.as_str()) {
            remaining.remove(pos);
        }
    }
    remaining.into_iter().map(String::from).collect()
}

/// Runs every policy check against one device.
pub fn evaluate<P: DeviceProbe>(
    probe: &P,
    dev: P::Device,
    policy: &SelectionPolicy,
) -> GfxResult<Result<QueueFamilies, Rejection>> {
    let missing = policy.required_features - device_features(&probe.features(dev));
    if !missing.is_empty() {
        return Ok(Err(Rejection::MissingFeatures(missing)));
    }

    let ty = probe.device_type(dev);
    if !policy.accepts(device_type_flag(ty)) {
        return Ok(Err(Rejection::UnacceptedType(ty)));
    }

    let indices = find_queue_families(
        &probe.queue_families(dev),
        Some(|family: u32| probe.can_present(dev, family)),
    )?;
    let Some(families) = indices.complete() else {
        return Ok(Err(Rejection::MissingQueueFamilies(indices)));
    };

    let available = probe.extension_names(dev)?;
    let missing = missing_extensions(&policy.required_extensions, &available);
    if !missing.is_empty() {
        return Ok(Err(Rejection::MissingExtensions(missing)));
    }

    if !probe.surface_properties(dev)?.supports_swapchain() {
        return Ok(Err(Rejection::NoSwapchainSupport));
    }

    Ok(Ok(families))
}

/// First device, in enumeration order, that passes every check.
pub fn select_device<P: DeviceProbe>(
    probe: &P,
    policy: &SelectionPolicy,
) -> GfxResult<SelectedDevice<P::Device>> {
    let devices = probe.devices()?;
    if devices.is_empty() {
        return Err(GfxError::NoDevices);
    }

    for &dev in &devices {
        debug!(
            "enumerated device: {} ({:?}), geometry shader: {}",
            probe.name(dev),
            probe.device_type(dev),
            probe.features(dev).geometry_shader != 0
        );
    }

    for &dev in &devices {
        let name = probe.name(dev);
        match evaluate(probe, dev, policy)? {
            Ok(families) => {
                info!(
                    "selected device {name} (drawing family {}, presentation family {})",
                    families.drawing, families.presentation
                );
                return Ok(SelectedDevice {
                    device: dev,
                    name,
                    families,
                });
            }
            Err(why) => warn!("rejecting device {name}: {why}"),
        }
    }

    Err(GfxError::NoSuitableDevice {
        checked: devices.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::SurfaceProperties;

    #[derive(Clone)]
    struct FakeDevice {
        name: &'static str,
        ty: vk::PhysicalDeviceType,
        geometry_shader: bool,
        families: Vec<vk::QueueFlags>,
        present_on: Vec<u32>,
        extensions: Vec<&'static str>,
        formats: usize,
        modes: usize,
    }

    fn good(name: &'static str) -> FakeDevice {
        FakeDevice {
            name,
            ty: vk::PhysicalDeviceType::DISCRETE_GPU,
            geometry_shader: true,
            families: vec![vk::QueueFlags::GRAPHICS],
            present_on: vec![0],
            extensions: vec!["VK_KHR_maintenance1", "VK_KHR_swapchain"],
            formats: 1,
            modes: 1,
        }
    }

    struct FakeProbe(Vec<FakeDevice>);

    impl DeviceProbe for FakeProbe {
        type Device = usize;

        fn devices(&self) -> GfxResult<Vec<usize>> {
            Ok((0..self.0.len()).collect())
        }
        fn name(&self, dev: usize) -> String {
            self.0[dev].name.into()
        }
        fn device_type(&self, dev: usize) -> vk::PhysicalDeviceType {
            self.0[dev].ty
        }
        fn features(&self, dev: usize) -> vk::PhysicalDeviceFeatures {
            vk::PhysicalDeviceFeatures {
                geometry_shader: self.0[dev].geometry_shader.into(),
                ..Default::default()
            }
        }
        fn queue_families(&self, dev: usize) -> Vec<vk::QueueFamilyProperties> {
            self.0[dev]
                .families
                .iter()
                .map(|&queue_flags| vk::QueueFamilyProperties {
                    queue_flags,
                    queue_count: 1,
                    ..Default::default()
                })
                .collect()
        }
        fn can_present(&self, dev: usize, family: u32) -> GfxResult<bool> {
            Ok(self.0[dev].present_on.contains(&family))
        }
        fn extension_names(&self, dev: usize) -> GfxResult<Vec<String>> {
            Ok(self.0[dev].extensions.iter().map(|s| s.to_string()).collect())
        }
        fn surface_properties(&self, dev: usize) -> GfxResult<SurfaceProperties> {
            let d = &self.0[dev];
            Ok(SurfaceProperties {
                capabilities: Default::default(),
                formats: vec![vk::SurfaceFormatKHR::default(); d.formats],
                present_modes: vec![vk::PresentModeKHR::FIFO; d.modes],
            })
        }
    }

    fn reason(d: FakeDevice) -> Rejection {
        let probe = FakeProbe(vec![d]);
        evaluate(&probe, 0, &SelectionPolicy::default())
            .unwrap()
            .unwrap_err()
    }

    #[test]
    fn empty_enumeration_is_no_devices() {
        let res = select_device(&FakeProbe(vec![]), &SelectionPolicy::default());
        assert!(matches!(res, Err(GfxError::NoDevices)));
    }

    #[test]
    fn picks_first_suitable_in_order() {
        let mut integrated = good("igpu");
        integrated.ty = vk::PhysicalDeviceType::INTEGRATED_GPU;
        let probe = FakeProbe(vec![integrated, good("first"), good("second")]);

        let picked = select_device(&probe, &SelectionPolicy::default()).unwrap();
        assert_eq!(picked.device, 1);
        assert_eq!(picked.name, "first");

        // same inputs, same answer
        let again = select_device(&probe, &SelectionPolicy::default()).unwrap();
        assert_eq!(picked, again);
    }

    #[test]
    fn cpu_device_is_accepted() {
        let mut cpu = good("llvmpipe");
        cpu.ty = vk::PhysicalDeviceType::CPU;
        let picked =
            select_device(&FakeProbe(vec![cpu]), &SelectionPolicy::default()).unwrap();
        assert_eq!(picked.name, "llvmpipe");
    }

    #[test]
    fn integrated_only_when_allowed() {
        let mut igpu = good("igpu");
        igpu.ty = vk::PhysicalDeviceType::INTEGRATED_GPU;
        let probe = FakeProbe(vec![igpu]);

        let res = select_device(&probe, &SelectionPolicy::default());
        assert!(matches!(res, Err(GfxError::NoSuitableDevice { checked: 1 })));

        let policy = SelectionPolicy::default().allow(DeviceTypes::INTEGRATED_GPU);
        assert_eq!(select_device(&probe, &policy).unwrap().device, 0);
    }

    #[test]
    fn nothing_suitable() {
        let mut a = good("a");
        a.geometry_shader = false;
        let mut b = good("b");
        b.modes = 0;
        let res = select_device(&FakeProbe(vec![a, b]), &SelectionPolicy::default());
        assert!(matches!(res, Err(GfxError::NoSuitableDevice { checked: 2 })));
    }

    #[test]
    fn rejection_reasons_follow_check_order() {
        let mut d = good("d");
        d.geometry_shader = false;
        d.ty = vk::PhysicalDeviceType::VIRTUAL_GPU;
        assert_eq!(
            reason(d),
            Rejection::MissingFeatures(DeviceFeatures::GEOMETRY_SHADER)
        );

        let mut d = good("d");
        d.ty = vk::PhysicalDeviceType::VIRTUAL_GPU;
        d.extensions.clear();
        assert_eq!(
            reason(d),
            Rejection::UnacceptedType(vk::PhysicalDeviceType::VIRTUAL_GPU)
        );

        let mut d = good("d");
        d.present_on.clear();
        d.extensions.clear();
        assert_eq!(
            reason(d),
            Rejection::MissingQueueFamilies(QueueFamilyIndices {
                drawing: Some(0),
                presentation: None,
            })
        );

        let mut d = good("d");
        d.extensions = vec!["VK_KHR_maintenance1"];
        d.formats = 0;
        assert_eq!(
            reason(d),
            Rejection::MissingExtensions(vec!["VK_KHR_swapchain".into()])
        );

        let mut d = good("d");
        d.formats = 0;
        assert_eq!(reason(d), Rejection::NoSwapchainSupport);
    }

    #[test]
    fn separate_families_are_reported() {
        let mut d = good("split");
        d.families = vec![vk::QueueFlags::TRANSFER, vk::QueueFlags::GRAPHICS];
        d.present_on = vec![0];
        let picked =
            select_device(&FakeProbe(vec![d]), &SelectionPolicy::default()).unwrap();
        assert_eq!(
            picked.families,
            QueueFamilies {
                drawing: 1,
                presentation: 0,
            }
        );
    }

    #[test]
    fn extension_matching_is_exact() {
        let req = vec!["VK_KHR_swapchain".to_string()];
        let near = vec!["VK_KHR_swapchain_mutable_format".to_string()];
        assert_eq!(missing_extensions(&req, &near), req);
        assert!(missing_extensions(&req, &req).is_empty());
        assert!(missing_extensions(&[], &near).is_empty());
    }

    #[test]
    fn each_available_name_satisfies_one_requirement() {
        let req = vec!["VK_KHR_swapchain".to_string(), "VK_KHR_swapchain".to_string()];
        let avail = vec!["VK_KHR_swapchain".to_string()];
        assert_eq!(missing_extensions(&req, &avail), vec!["VK_KHR_swapchain"]);
    }

    #[test]
    fn feature_flags_map_both_ways() {
        let wanted = DeviceFeatures::GEOMETRY_SHADER | DeviceFeatures::WIDE_LINES;
        let vkf = vk_features(wanted);
        assert_eq!(vkf.geometry_shader, vk::TRUE);
        assert_eq!(vkf.tessellation_shader, vk::FALSE);
        assert_eq!(device_features(&vkf), wanted);
    }

    #[test]
    fn unknown_device_type_maps_to_nothing() {
        assert!(device_type_flag(vk::PhysicalDeviceType::from_raw(42)).is_empty());
        assert_eq!(
            device_type_flag(vk::PhysicalDeviceType::CPU),
            DeviceTypes::CPU
        );
    }
}
