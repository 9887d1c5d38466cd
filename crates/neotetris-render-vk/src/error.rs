// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use std::{io, path::PathBuf};
use thiserror::Error;

pub type GfxResult<T> = Result<T, GfxError>;

#[derive(Debug, Error)]
pub enum GfxError {
    #[error("failed to load the Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    #[error("{call} failed: {result}")]
    Vulkan {
        call: &'static str,
        result: vk::Result,
    },

    #[error("failed to find devices with Vulkan support")]
    NoDevices,

    #[error("no suitable device found ({checked} checked)")]
    NoSuitableDevice { checked: usize },

    #[error("surface reports no formats")]
    NoSurfaceFormats,

    #[error("present mode {0:?} not available")]
    PresentModeUnavailable(vk::PresentModeKHR),

    #[error("failed to read shader {path}: {source}")]
    ShaderRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Tags a raw `VkResult` with the name of the call that produced it.
pub(crate) trait VkResultExt<T> {
    fn call(self, call: &'static str) -> GfxResult<T>;
}

impl<T> VkResultExt<T> for Result<T, vk::Result> {
    fn call(self, call: &'static str) -> GfxResult<T> {
        self.map_err(|result| GfxError::Vulkan { call, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vulkan_errors_name_the_call() {
        let res: Result<(), vk::Result> = Err(vk::Result::ERROR_DEVICE_LOST);
        let err = res.call("queue_submit").unwrap_err();
        assert!(matches!(
            err,
            GfxError::Vulkan {
                call: "queue_submit",
                result: vk::Result::ERROR_DEVICE_LOST
            }
        ));
        assert!(err.to_string().starts_with("queue_submit failed"));
    }
}
