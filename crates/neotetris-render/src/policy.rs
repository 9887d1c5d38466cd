// SPDX-License-Identifier: CEPL-1.0
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Optional device features a candidate must expose.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DeviceFeatures: u32 {
        const GEOMETRY_SHADER     = 1 << 0;
        const TESSELLATION_SHADER = 1 << 1;
        const SAMPLER_ANISOTROPY  = 1 << 2;
        const FILL_MODE_NON_SOLID = 1 << 3;
        const WIDE_LINES          = 1 << 4;
    }
}

bitflags! {
    /// Device kinds a candidate may be.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DeviceTypes: u32 {
        const OTHER          = 1 << 0;
        const INTEGRATED_GPU = 1 << 1;
        const DISCRETE_GPU   = 1 << 2;
        const VIRTUAL_GPU    = 1 << 3;
        const CPU            = 1 << 4;
    }
}

/// Capabilities a physical device must have to be picked.
///
/// The default allow-list is discrete GPU or CPU; integrated GPUs must be
/// added with `allow`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
    pub required_extensions: Vec<String>,
    pub required_features: DeviceFeatures,
    pub accepted_types: DeviceTypes,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        SelectionPolicy {
            required_extensions: vec!["VK_KHR_swapchain".into()],
            required_features: DeviceFeatures::GEOMETRY_SHADER,
            accepted_types: DeviceTypes::DISCRETE_GPU | DeviceTypes::CPU,
        }
    }
}

impl SelectionPolicy {
    pub fn allow(mut self, types: DeviceTypes) -> Self {
        self.accepted_types |= types;
        self
    }

    pub fn accepts(&self, ty: DeviceTypes) -> bool {
        !ty.is_empty() && self.accepted_types.contains(ty)
    }
}
