// SPDX-License-Identifier: CEPL-1.0
use ash::util::read_spv;
use ash::vk;
use std::ffi::CStr;
use std::fs::File;
use std::path::Path;
use tracing::debug;

use crate::error::{GfxError, GfxResult, VkResultExt};
use crate::swapchain::Swapchain;

pub const VERTEX_SHADER: &str = "vert.spv";
pub const FRAGMENT_SHADER: &str = "frag.spv";
const ENTRY_POINT: &CStr = c"main";

/// Full-extent viewport with the default 0..1 depth range.
pub fn viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

pub fn scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

/// Reads a SPIR-V file into words. Alignment and the magic number are
/// checked by `read_spv`.
pub fn load_spirv(path: &Path) -> GfxResult<Vec<u32>> {
    let read_err = |source| GfxError::ShaderRead {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(read_err)?;
    let words = read_spv(&mut file).map_err(read_err)?;
    debug!("read {} ({} bytes)", path.display(), words.len() * 4);
    Ok(words)
}

pub(crate) struct RenderPass {
    device: ash::Device,
    pub handle: vk::RenderPass,
}

impl RenderPass {
    /// One color attachment cleared on load and left ready for present,
    /// one subpass, one external dependency on color output.
    pub fn new(device: &ash::Device, format: vk::Format) -> GfxResult<Self> {
        let color = [vk::AttachmentDescription::default()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];

        let color_ref = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];

        let subpass = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_ref)];

        let dependency = [vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];

        let info = vk::RenderPassCreateInfo::default()
            .attachments(&color)
            .subpasses(&subpass)
            .dependencies(&dependency);

        let handle =
            unsafe { device.create_render_pass(&info, None) }.call("create_render_pass")?;
        Ok(RenderPass {
            device: device.clone(),
            handle,
        })
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe { self.device.destroy_render_pass(self.handle, None) };
    }
}

/// Build-time input only; destroyed as soon as it goes out of scope.
struct ShaderModule<'a> {
    device: &'a ash::Device,
    handle: vk::ShaderModule,
}

impl<'a> ShaderModule<'a> {
    fn load(device: &'a ash::Device, path: &Path) -> GfxResult<Self> {
        let code = load_spirv(path)?;
        let info = vk::ShaderModuleCreateInfo::default().code(&code);
        let handle = unsafe { device.create_shader_module(&info, None) }
            .call("create_shader_module")?;
        Ok(ShaderModule { device, handle })
    }
}

impl Drop for ShaderModule<'_> {
    fn drop(&mut self) {
        unsafe { self.device.destroy_shader_module(self.handle, None) };
    }
}

/// Fixed triangle pipeline plus its (empty) layout.
pub(crate) struct Pipeline {
    device: ash::Device,
    pub layout: vk::PipelineLayout,
    pub handle: vk::Pipeline,
}

impl Pipeline {
    pub fn new(
        device: &ash::Device,
        render_pass: &RenderPass,
        shader_dir: &Path,
    ) -> GfxResult<Self> {
        let vert = ShaderModule::load(device, &shader_dir.join(VERTEX_SHADER))?;
        let frag = ShaderModule::load(device, &shader_dir.join(FRAGMENT_SHADER))?;

        // No descriptor sets, no push constants.
        let layout_info = vk::PipelineLayoutCreateInfo::default();
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .call("create_pipeline_layout")?;
        let mut pipeline = Pipeline {
            device: device.clone(),
            layout,
            handle: vk::Pipeline::null(),
        };

        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert.handle)
                .name(ENTRY_POINT),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag.handle)
                .name(ENTRY_POINT),
        ];

        // Vertices come from gl_VertexIndex.
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let dyn_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dyn_states);
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let raster = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let blend_attachment = [vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachment);

        let info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&raster)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(pipeline.layout)
            .render_pass(render_pass.handle)
            .subpass(0)
            .base_pipeline_index(-1);

        let created = unsafe {
            device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&info),
                None,
            )
        };
        pipeline.handle = match created {
            Ok(p) => p[0],
            Err((_, result)) => {
                return Err(GfxError::Vulkan {
                    call: "create_graphics_pipelines",
                    result,
                })
            }
        };
        debug!("graphics pipeline created");
        Ok(pipeline)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.handle, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// One framebuffer per swap chain view.
pub(crate) struct Framebuffers {
    device: ash::Device,
    pub handles: Vec<vk::Framebuffer>,
}

impl Framebuffers {
    pub fn new(
        device: &ash::Device,
        render_pass: &RenderPass,
        chain: &Swapchain,
    ) -> GfxResult<Self> {
        let mut fbs = Framebuffers {
            device: device.clone(),
            handles: Vec::with_capacity(chain.views.len()),
        };
        let extent = chain.config.extent;
        for &view in &chain.views {
            let attachments = [view];
            let info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass.handle)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let fb = unsafe { device.create_framebuffer(&info, None) }
                .call("create_framebuffer")?;
            fbs.handles.push(fb);
        }
        Ok(fbs)
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        for &fb in &self.handles {
            unsafe { self.device.destroy_framebuffer(fb, None) };
        }
    }
}
