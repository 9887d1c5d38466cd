// SPDX-License-Identifier: CEPL-1.0
use ash::khr::swapchain;
use ash::vk;
use neotetris_render::RenderSize;
use tracing::{debug, info, warn};

use crate::device::LogicalDevice;
use crate::error::{GfxError, GfxResult, VkResultExt};
use crate::instance::SurfaceHandle;
use crate::probe::SurfaceProperties;
use crate::queue::QueueFamilies;

pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// The only present mode the platform must always offer.
pub const REQUIRED_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;

/// Everything that parameterizes swap chain creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainConfig {
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sharing {
    pub mode: vk::SharingMode,
    /// Empty for exclusive sharing.
    pub families: Vec<u32>,
}

fn is_preferred(f: &vk::SurfaceFormatKHR) -> bool {
    f.format == PREFERRED_FORMAT.format && f.color_space == PREFERRED_FORMAT.color_space
}

pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> GfxResult<vk::SurfaceFormatKHR> {
    if let Some(&f) = formats.iter().find(|f| is_preferred(f)) {
        return Ok(f);
    }
    let first = *formats.first().ok_or(GfxError::NoSurfaceFormats)?;
    warn!(
        "preferred surface format unavailable, falling back to {:?}/{:?}",
        first.format, first.color_space
    );
    Ok(first)
}

pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> GfxResult<vk::PresentModeKHR> {
    if modes.contains(&REQUIRED_PRESENT_MODE) {
        Ok(REQUIRED_PRESENT_MODE)
    } else {
        Err(GfxError::PresentModeUnavailable(REQUIRED_PRESENT_MODE))
    }
}

/// `u32::MAX` in `current_extent` means the swap chain may differ from the
/// window; then the drawable size is clamped into the supported range.
pub fn choose_extent(
    caps: &vk::SurfaceCapabilitiesKHR,
    drawable: RenderSize,
) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: drawable
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: drawable
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One more than the minimum so acquiring never waits on the driver;
/// `max_image_count == 0` means unbounded.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count + 1;
    if caps.max_image_count > 0 && wanted > caps.max_image_count {
        caps.max_image_count
    } else {
        wanted
    }
}

pub fn choose_sharing(families: QueueFamilies) -> Sharing {
    if families.is_shared() {
        Sharing {
            mode: vk::SharingMode::EXCLUSIVE,
            families: Vec::new(),
        }
    } else {
        Sharing {
            mode: vk::SharingMode::CONCURRENT,
            families: vec![families.drawing, families.presentation],
        }
    }
}

impl SwapchainConfig {
    pub fn choose(props: &SurfaceProperties, drawable: RenderSize) -> GfxResult<Self> {
        let format = choose_surface_format(&props.formats)?;
        Ok(SwapchainConfig {
            format: format.format,
            color_space: format.color_space,
            present_mode: choose_present_mode(&props.present_modes)?,
            extent: choose_extent(&props.capabilities, drawable),
            image_count: choose_image_count(&props.capabilities),
        })
    }
}

/// Swap chain plus one color view per image. Views go before the chain.
pub(crate) struct Swapchain {
    device: ash::Device,
    loader: swapchain::Device,
    pub handle: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub views: Vec<vk::ImageView>,
    pub config: SwapchainConfig,
}

impl Swapchain {
    pub fn new(
        dev: &LogicalDevice,
        surface: &SurfaceHandle,
        drawable: RenderSize,
        old: vk::SwapchainKHR,
    ) -> GfxResult<Self> {
        let props = surface.properties(dev.phys)?;
        let config = SwapchainConfig::choose(&props, drawable)?;
        let sharing = choose_sharing(dev.families);
        if sharing.mode == vk::SharingMode::EXCLUSIVE {
            debug!("swap chain uses exclusive sharing, family list ignored");
        }

        let info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle)
            .min_image_count(config.image_count)
            .image_format(config.format)
            .image_color_space(config.color_space)
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing.mode)
            .queue_family_indices(&sharing.families)
            .pre_transform(props.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true)
            .old_swapchain(old);

        let handle = unsafe { dev.swapchain_loader.create_swapchain(&info, None) }
            .call("create_swapchain")?;

        let mut chain = Swapchain {
            device: dev.device.clone(),
            loader: dev.swapchain_loader.clone(),
            handle,
            images: Vec::new(),
            views: Vec::new(),
            config,
        };

        chain.images = unsafe { chain.loader.get_swapchain_images(handle) }
            .call("get_swapchain_images")?;

        for &image in &chain.images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(config.format)
                .components(vk::ComponentMapping::default())
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe { chain.device.create_image_view(&view_info, None) }
                .call("create_image_view")?;
            chain.views.push(view);
        }

        info!(
            "swap chain ready ({}x{}, {:?}, {:?}, {} images)",
            config.extent.width,
            config.extent.height,
            config.format,
            config.present_mode,
            chain.images.len()
        );
        Ok(chain)
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.views {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.handle, None);
        }
        debug!("swap chain destroyed");
    }
}
