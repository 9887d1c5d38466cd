// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

use crate::error::{GfxResult, VkResultExt};
use crate::pipeline::{scissor, viewport};

/// Command pool on the drawing family plus the single primary buffer
/// re-recorded every frame.
pub(crate) struct CommandResources {
    device: ash::Device,
    pool: vk::CommandPool,
    pub buffer: vk::CommandBuffer,
}

impl CommandResources {
    pub fn new(device: &ash::Device, drawing_family: u32) -> GfxResult<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(drawing_family);
        let pool = unsafe { device.create_command_pool(&pool_info, None) }
            .call("create_command_pool")?;
        let mut res = CommandResources {
            device: device.clone(),
            pool,
            buffer: vk::CommandBuffer::null(),
        };

        let alloc = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { device.allocate_command_buffers(&alloc) }
            .call("allocate_command_buffers")?;
        res.buffer = buffers[0];
        Ok(res)
    }
}

impl Drop for CommandResources {
    fn drop(&mut self) {
        // Frees the buffer along with the pool.
        unsafe { self.device.destroy_command_pool(self.pool, None) };
    }
}

/// Per-frame synchronisation. `in_flight` starts signalled so the first
/// wait returns at once.
pub(crate) struct FrameSync {
    device: ash::Device,
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
}

impl FrameSync {
    pub fn new(device: &ash::Device) -> GfxResult<Self> {
        let mut sync = FrameSync {
            device: device.clone(),
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight: vk::Fence::null(),
        };
        let sem_info = vk::SemaphoreCreateInfo::default();
        let fence_info =
            vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        unsafe {
            sync.image_available = device
                .create_semaphore(&sem_info, None)
                .call("create_semaphore")?;
            sync.render_finished = device
                .create_semaphore(&sem_info, None)
                .call("create_semaphore")?;
            sync.in_flight = device.create_fence(&fence_info, None).call("create_fence")?;
        }
        Ok(sync)
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        // Destroying a null handle is a no-op.
        unsafe {
            self.device.destroy_fence(self.in_flight, None);
            self.device.destroy_semaphore(self.render_finished, None);
            self.device.destroy_semaphore(self.image_available, None);
        }
    }
}

/// What one recorded frame draws into.
pub(crate) struct FrameTarget {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub pipeline: vk::Pipeline,
    pub extent: vk::Extent2D,
    pub clear: [f32; 4],
}

pub(crate) fn clear_value(rgba: [f32; 4]) -> vk::ClearValue {
    vk::ClearValue {
        color: vk::ClearColorValue { float32: rgba },
    }
}

/// Clear, bind the pipeline, set the dynamic viewport/scissor and draw the
/// three hard-coded vertices.
pub(crate) fn record(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    target: &FrameTarget,
) -> GfxResult<()> {
    let begin = vk::CommandBufferBeginInfo::default();
    let clears = [clear_value(target.clear)];
    let pass = vk::RenderPassBeginInfo::default()
        .render_pass(target.render_pass)
        .framebuffer(target.framebuffer)
        .render_area(scissor(target.extent))
        .clear_values(&clears);
    let viewports = [viewport(target.extent)];
    let scissors = [scissor(target.extent)];

    unsafe {
        device
            .begin_command_buffer(cmd, &begin)
            .call("begin_command_buffer")?;
        device.cmd_begin_render_pass(cmd, &pass, vk::SubpassContents::INLINE);
        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, target.pipeline);
        device.cmd_set_viewport(cmd, 0, &viewports);
        device.cmd_set_scissor(cmd, 0, &scissors);
        device.cmd_draw(cmd, 3, 1, 0, 0);
        device.cmd_end_render_pass(cmd);
        device.end_command_buffer(cmd).call("end_command_buffer")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_value_carries_rgba() {
        let v = clear_value([0.1, 0.2, 0.3, 1.0]);
        assert_eq!(unsafe { v.color.float32 }, [0.1, 0.2, 0.3, 1.0]);
    }
}
