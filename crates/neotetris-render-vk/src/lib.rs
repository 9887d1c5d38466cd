// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend: device selection, swap chain, the fixed triangle pipeline
//! and the per-frame draw path.

use anyhow::Result;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::path::PathBuf;
use tracing::{debug, info, info_span};

use neotetris_render::{RenderSize, Renderer, RendererConfig};

mod device;
mod error;
mod frame;
mod instance;
mod pipeline;
mod probe;
mod queue;
mod select;
mod swapchain;

pub use error::{GfxError, GfxResult};
pub use pipeline::{load_spirv, scissor, viewport, FRAGMENT_SHADER, VERTEX_SHADER};
pub use probe::{DeviceProbe, SurfaceProperties};
pub use queue::{find_queue_families, QueueFamilies, QueueFamilyIndices};
pub use select::{
    device_features, device_type_flag, evaluate, missing_extensions, select_device, vk_features,
    Rejection, SelectedDevice,
};
pub use swapchain::{
    choose_extent, choose_image_count, choose_present_mode, choose_sharing,
    choose_surface_format, Sharing, SwapchainConfig, PREFERRED_FORMAT, REQUIRED_PRESENT_MODE,
};

use device::LogicalDevice;
use error::VkResultExt;
use frame::{record, CommandResources, FrameSync, FrameTarget};
use instance::{InstanceHandle, SurfaceHandle};
use pipeline::{Framebuffers, Pipeline, RenderPass};
use probe::SurfaceProbe;
use swapchain::Swapchain;

/// Outcome of one pass through the draw path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// Presented, but the swap chain no longer matches the surface exactly.
    Suboptimal,
    /// Nothing was presented; the swap chain must be rebuilt first.
    OutOfDate,
}

impl FrameStatus {
    pub fn needs_rebuild(self) -> bool {
        self != FrameStatus::Presented
    }
}

/// Fields are declared in reverse creation order so they drop in the right
/// sequence after `Drop::drop` has waited for the device.
pub struct VkRenderer {
    sync: FrameSync,
    commands: CommandResources,
    framebuffers: Framebuffers,
    pipeline: Pipeline,
    render_pass: RenderPass,
    swapchain: Swapchain,
    device: LogicalDevice,
    surface: SurfaceHandle,
    _instance: InstanceHandle,

    shader_dir: PathBuf,
    size: RenderSize,
    clear: [f32; 4],
    frames: u64,
}

impl VkRenderer {
    fn build(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        cfg: &RendererConfig,
    ) -> GfxResult<Self> {
        let display_raw = display.display_handle()?.as_raw();
        let window_raw = window.window_handle()?.as_raw();

        let instance = InstanceHandle::new(display_raw, cfg)?;
        let surface = SurfaceHandle::new(&instance, display_raw, window_raw)?;

        let selected = select_device(
            &SurfaceProbe {
                instance: &instance.instance,
                surface: &surface,
            },
            &cfg.device,
        )?;

        let device = LogicalDevice::new(&instance, &selected, &cfg.device)?;
        let swapchain = Swapchain::new(&device, &surface, size, vk::SwapchainKHR::null())?;
        let render_pass = RenderPass::new(&device.device, swapchain.config.format)?;
        let pipeline = Pipeline::new(&device.device, &render_pass, &cfg.shader_dir)?;
        let framebuffers = Framebuffers::new(&device.device, &render_pass, &swapchain)?;
        let commands = CommandResources::new(&device.device, device.families.drawing)?;
        let sync = FrameSync::new(&device.device)?;

        Ok(VkRenderer {
            sync,
            commands,
            framebuffers,
            pipeline,
            render_pass,
            swapchain,
            device,
            surface,
            _instance: instance,
            shader_dir: cfg.shader_dir.clone(),
            size,
            clear: cfg.clear_color,
            frames: 0,
        })
    }

    /// Frames presented so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Wait for the previous frame, acquire, record, submit, present.
    pub fn draw_frame(&mut self) -> GfxResult<FrameStatus> {
        let dev = &self.device.device;
        let fences = [self.sync.in_flight];
        unsafe { dev.wait_for_fences(&fences, true, u64::MAX) }.call("wait_for_fences")?;

        let acquired = unsafe {
            self.device.swapchain_loader.acquire_next_image(
                self.swapchain.handle,
                u64::MAX,
                self.sync.image_available,
                vk::Fence::null(),
            )
        };
        let (index, acquire_suboptimal) = match acquired {
            Ok(v) => v,
            // The fence is still signalled, so the next wait does not block.
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => return Ok(FrameStatus::OutOfDate),
            Err(result) => {
                return Err(GfxError::Vulkan {
                    call: "acquire_next_image",
                    result,
                })
            }
        };

        let cmd = self.commands.buffer;
        unsafe {
            dev.reset_fences(&fences).call("reset_fences")?;
            dev.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .call("reset_command_buffer")?;
        }

        record(
            dev,
            cmd,
            &FrameTarget {
                render_pass: self.render_pass.handle,
                framebuffer: self.framebuffers.handles[index as usize],
                pipeline: self.pipeline.handle,
                extent: self.swapchain.config.extent,
                clear: self.clear,
            },
        )?;

        let wait = [self.sync.image_available];
        let stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let cmds = [cmd];
        let signal = [self.sync.render_finished];
        let submit = vk::SubmitInfo::default()
            .wait_semaphores(&wait)
            .wait_dst_stage_mask(&stages)
            .command_buffers(&cmds)
            .signal_semaphores(&signal);
        unsafe {
            dev.queue_submit(
                self.device.drawing_queue,
                std::slice::from_ref(&submit),
                self.sync.in_flight,
            )
        }
        .call("queue_submit")?;

        let chains = [self.swapchain.handle];
        let indices = [index];
        let present = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal)
            .swapchains(&chains)
            .image_indices(&indices);
        let presented = unsafe {
            self.device
                .swapchain_loader
                .queue_present(self.device.presentation_queue, &present)
        };

        match presented {
            Ok(present_suboptimal) => {
                self.frames += 1;
                if acquire_suboptimal || present_suboptimal {
                    Ok(FrameStatus::Suboptimal)
                } else {
                    Ok(FrameStatus::Presented)
                }
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(FrameStatus::OutOfDate),
            Err(result) => Err(GfxError::Vulkan {
                call: "queue_present",
                result,
            }),
        }
    }

    /// Rebuild the swap chain for the current size. The render pass and
    /// pipeline are only rebuilt when the surface format changed.
    pub fn recreate_swapchain(&mut self) -> GfxResult<()> {
        self.device.wait_idle();

        let chain = Swapchain::new(
            &self.device,
            &self.surface,
            self.size,
            self.swapchain.handle,
        )?;

        let rebuilt = if chain.config.format != self.swapchain.config.format {
            info!(
                "surface format changed {:?} -> {:?}",
                self.swapchain.config.format, chain.config.format
            );
            let render_pass = RenderPass::new(&self.device.device, chain.config.format)?;
            let pipeline = Pipeline::new(&self.device.device, &render_pass, &self.shader_dir)?;
            Some((render_pass, pipeline))
        } else {
            None
        };

        let pass = rebuilt.as_ref().map_or(&self.render_pass, |(rp, _)| rp);
        let framebuffers = Framebuffers::new(&self.device.device, pass, &chain)?;

        // Old framebuffers go before the views they wrap.
        self.framebuffers = framebuffers;
        if let Some((render_pass, pipeline)) = rebuilt {
            self.pipeline = pipeline;
            self.render_pass = render_pass;
        }
        self.swapchain = chain;
        Ok(())
    }
}

impl Drop for VkRenderer {
    fn drop(&mut self) {
        self.device.wait_idle();
        debug!("renderer shut down after {} frames", self.frames);
    }
}

impl Renderer for VkRenderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        cfg: &RendererConfig,
    ) -> Result<Self> {
        let _span = info_span!("vulkan").entered();
        let r = Self::build(window, display, size, cfg)?;
        info!(
            "vulkan renderer ready ({}x{})",
            r.swapchain.config.extent.width, r.swapchain.config.extent.height
        );
        Ok(r)
    }

    fn resize(&mut self, size: RenderSize) -> Result<()> {
        if size == self.size {
            return Ok(());
        }
        self.size = size;
        if size.is_empty() {
            debug!("window minimised, skipping swap chain rebuild");
            return Ok(());
        }
        self.recreate_swapchain()?;
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        if self.size.is_empty() {
            return Ok(());
        }
        let status = self.draw_frame()?;
        if status.needs_rebuild() {
            debug!("swap chain {status:?}, rebuilding");
            self.recreate_swapchain()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_clean_presents_keep_the_swap_chain() {
        assert!(!FrameStatus::Presented.needs_rebuild());
        assert!(FrameStatus::Suboptimal.needs_rebuild());
        assert!(FrameStatus::OutOfDate.needs_rebuild());
    }
}
