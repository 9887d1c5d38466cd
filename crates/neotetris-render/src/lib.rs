// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use serde::Deserialize;
use std::path::PathBuf;

mod policy;

pub use policy::{DeviceFeatures, DeviceTypes, SelectionPolicy};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Everything a backend needs to know before it touches the graphics API.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RendererConfig {
    pub app_name: String,
    pub clear_color: [f32; 4],
    /// Directory holding `vert.spv` and `frag.spv`.
    pub shader_dir: PathBuf,
    /// Enable `VK_LAYER_KHRONOS_validation` when it is installed.
    pub validation: bool,
    pub device: SelectionPolicy,
}

impl Default for RendererConfig {
    fn default() -> Self {
        RendererConfig {
            app_name: "neotetris".into(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            shader_dir: PathBuf::from("shaders"),
            validation: false,
            device: SelectionPolicy::default(),
        }
    }
}

pub trait Renderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        cfg: &RendererConfig,
    ) -> Result<Self>
    where
        Self: Sized;

    fn resize(&mut self, size: RenderSize) -> Result<()>;
    fn render(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(width: u32, height: u32) -> RenderSize {
        RenderSize { width, height }
    }

    #[test]
    fn empty_sizes() {
        assert!(size(0, 480).is_empty());
        assert!(size(640, 0).is_empty());
        assert!(!size(1, 1).is_empty());
    }

    #[test]
    fn renderer_config_from_partial_toml() {
        let cfg: RendererConfig = toml::from_str(
            r#"
            clear_color = [0.1, 0.2, 0.3, 1.0]
            shader_dir = "assets/spirv"

            [device]
            accepted_types = "DISCRETE_GPU | INTEGRATED_GPU"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.app_name, "neotetris");
        assert_eq!(cfg.clear_color, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(cfg.shader_dir, PathBuf::from("assets/spirv"));
        assert!(!cfg.validation);
        assert_eq!(
            cfg.device.accepted_types,
            DeviceTypes::DISCRETE_GPU | DeviceTypes::INTEGRATED_GPU
        );
        assert_eq!(cfg.device.required_features, DeviceFeatures::GEOMETRY_SHADER);
        assert_eq!(cfg.device.required_extensions, vec!["VK_KHR_swapchain"]);
    }
}
