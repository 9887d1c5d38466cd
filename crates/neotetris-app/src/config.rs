// SPDX-License-Identifier: CEPL-1.0
use neotetris_render::{DeviceTypes, RendererConfig};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Pause between mapping the window and creating the surface.
    pub settle_ms: u64,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: "neotetris".into(),
            width: 640,
            height: 480,
            settle_ms: 1000,
        }
    }
}

impl WindowCfg {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Contents of `neotetris.toml`.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RendererConfig,
}

impl AppCfg {
    pub fn allow_integrated(&mut self) {
        let policy = std::mem::take(&mut self.render.device);
        self.render.device = policy.allow(DeviceTypes::INTEGRATED_GPU);
    }
}
