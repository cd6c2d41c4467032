// SPDX-License-Identifier: CEPL-1.0
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use ash::vk;
use prism_render::{PresentPreference, RenderError, RenderSize};
use tracing::info;

use crate::context::DeviceContext;
use crate::handle::Owned;
use crate::memory::{create_image_view, GpuImage, ImageSpec};

pub const DEPTH_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

const SAMPLE_COUNTS: [vk::SampleCountFlags; 6] = [
    vk::SampleCountFlags::TYPE_64,
    vk::SampleCountFlags::TYPE_32,
    vk::SampleCountFlags::TYPE_16,
    vk::SampleCountFlags::TYPE_8,
    vk::SampleCountFlags::TYPE_4,
    vk::SampleCountFlags::TYPE_2,
];

/// B8G8R8A8_SRGB with the sRGB non-linear color space, else whatever comes first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
}

/// FIFO is always available, so it is the fallback.
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preference: PresentPreference,
) -> vk::PresentModeKHR {
    match preference {
        PresentPreference::Mailbox if modes.contains(&vk::PresentModeKHR::MAILBOX) => {
            vk::PresentModeKHR::MAILBOX
        }
        _ => vk::PresentModeKHR::FIFO,
    }
}

pub fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped by the maximum (0 means unbounded).
pub fn image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count + 1;
    if caps.max_image_count == 0 {
        wanted
    } else {
        wanted.min(caps.max_image_count)
    }
}

/// Highest count usable for both color and depth framebuffers.
pub fn max_usable_sample_count(limits: &vk::PhysicalDeviceLimits) -> vk::SampleCountFlags {
    let counts = limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts;
    SAMPLE_COUNTS
        .into_iter()
        .find(|&c| counts.contains(c))
        .unwrap_or(vk::SampleCountFlags::TYPE_1)
}

pub fn pick_depth_format(
    properties: impl Fn(vk::Format) -> vk::FormatProperties,
) -> Result<vk::Format, RenderError> {
    DEPTH_CANDIDATES
        .into_iter()
        .find(|&f| {
            properties(f)
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or(RenderError::NoDepthFormat)
}

/// Swapchain plus one view per image. Views drop before the swapchain.
pub struct SwapchainBundle {
    pub views: Vec<Owned<vk::ImageView>>,
    swapchain: Owned<vk::SwapchainKHR>,
    pub images: Vec<vk::Image>,
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
}

impl SwapchainBundle {
    pub unsafe fn create(
        ctx: &Rc<DeviceContext>,
        size: RenderSize,
        preference: PresentPreference,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self> {
        let caps = ctx
            .base
            .surface_loader
            .get_physical_device_surface_capabilities(ctx.phys, ctx.base.surface)
            .context("get_physical_device_surface_capabilities")?;
        let formats = ctx
            .base
            .surface_loader
            .get_physical_device_surface_formats(ctx.phys, ctx.base.surface)
            .context("get_physical_device_surface_formats")?;
        let modes = ctx
            .base
            .surface_loader
            .get_physical_device_surface_present_modes(ctx.phys, ctx.base.surface)
            .context("get_physical_device_surface_present_modes")?;

        let format = choose_surface_format(&formats)
            .ok_or_else(|| anyhow!("surface reports no formats"))?;
        let present_mode = choose_present_mode(&modes, preference);
        let extent = extent_from_caps(&caps, size);
        let min_image_count = image_count(&caps);

        let family_indices = [ctx.families.graphics, ctx.families.present];
        let (sharing_mode, index_count) = if ctx.families.is_shared() {
            (vk::SharingMode::EXCLUSIVE, 0)
        } else {
            (vk::SharingMode::CONCURRENT, family_indices.len() as u32)
        };

        let info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: ctx.base.surface,
            min_image_count,
            image_format: format.format,
            image_color_space: format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing_mode,
            queue_family_index_count: index_count,
            p_queue_family_indices: family_indices.as_ptr(),
            pre_transform: caps.current_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            old_swapchain,
            ..Default::default()
        };
        let swapchain = Owned::new(
            ctx,
            ctx.swapchain_loader
                .create_swapchain(&info, None)
                .context("create_swapchain")?,
        );
        let images = ctx
            .swapchain_loader
            .get_swapchain_images(swapchain.raw())
            .context("get_swapchain_images")?;
        let views = images
            .iter()
            .map(|&image| {
                create_image_view(ctx, image, format.format, vk::ImageAspectFlags::COLOR, 1)
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            "vk: swapchain {}x{} format {:?}/{:?} present {:?} images {}",
            extent.width,
            extent.height,
            format.format,
            format.color_space,
            present_mode,
            images.len()
        );

        Ok(Self {
            views,
            swapchain,
            images,
            format,
            present_mode,
            extent,
        })
    }

    pub fn raw(&self) -> vk::SwapchainKHR {
        self.swapchain.raw()
    }
}

pub struct Attachment {
    pub view: Owned<vk::ImageView>,
    pub image: GpuImage,
}

impl Attachment {
    unsafe fn new(
        ctx: &Rc<DeviceContext>,
        extent: vk::Extent2D,
        format: vk::Format,
        samples: vk::SampleCountFlags,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> Result<Self> {
        let image = GpuImage::new(
            ctx,
            &ImageSpec {
                width: extent.width,
                height: extent.height,
                mip_levels: 1,
                samples,
                format,
                tiling: vk::ImageTiling::OPTIMAL,
                usage,
                properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            },
        )?;
        let view = create_image_view(ctx, image.raw(), format, aspect, 1)?;
        Ok(Self { view, image })
    }
}

/// Multisampled color and depth images matching the swapchain extent.
pub struct RenderTargets {
    pub color: Attachment,
    pub depth: Attachment,
}

impl RenderTargets {
    pub unsafe fn new(
        ctx: &Rc<DeviceContext>,
        extent: vk::Extent2D,
        color_format: vk::Format,
        depth_format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> Result<Self> {
        let color = Attachment::new(
            ctx,
            extent,
            color_format,
            samples,
            vk::ImageUsageFlags::TRANSIENT_ATTACHMENT | vk::ImageUsageFlags::COLOR_ATTACHMENT,
            vk::ImageAspectFlags::COLOR,
        )
        .context("msaa color target")?;
        let depth = Attachment::new(
            ctx,
            extent,
            depth_format,
            samples,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
        )
        .context("depth target")?;
        Ok(Self { color, depth })
    }
}

/// Everything that has to be rebuilt with the swapchain, in teardown order.
pub struct Presentation {
    pub framebuffers: Vec<Owned<vk::Framebuffer>>,
    pub targets: RenderTargets,
    pub chain: SwapchainBundle,
}

impl Presentation {
    pub unsafe fn new(
        ctx: &Rc<DeviceContext>,
        chain: SwapchainBundle,
        render_pass: vk::RenderPass,
        depth_format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> Result<Self> {
        let targets = RenderTargets::new(
            ctx,
            chain.extent,
            chain.format.format,
            depth_format,
            samples,
        )?;
        let framebuffers = chain
            .views
            .iter()
            .map(|resolve| -> Result<Owned<vk::Framebuffer>> {
                let attachments = [targets.color.view.raw(), targets.depth.view.raw(), resolve.raw()];
                let info = vk::FramebufferCreateInfo {
                    s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                    render_pass,
                    attachment_count: attachments.len() as u32,
                    p_attachments: attachments.as_ptr(),
                    width: chain.extent.width,
                    height: chain.extent.height,
                    layers: 1,
                    ..Default::default()
                };
                let fb = ctx
                    .device
                    .create_framebuffer(&info, None)
                    .context("create_framebuffer")?;
                Ok(Owned::new(ctx, fb))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            framebuffers,
            targets,
            chain,
        })
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.chain.extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        }
    }

    fn size(width: u32, height: u32) -> RenderSize {
        RenderSize { width, height }
    }

    #[test]
    fn fixed_surface_extent_wins() {
        let c = caps((1280, 720), (1, 1), (4096, 4096));
        let e = extent_from_caps(&c, size(800, 600));
        assert_eq!((e.width, e.height), (1280, 720));
    }

    #[test]
    fn free_extent_is_clamped_into_bounds() {
        let c = caps((u32::MAX, u32::MAX), (100, 100), (1000, 500));
        let e = extent_from_caps(&c, size(50, 900));
        assert_eq!((e.width, e.height), (100, 500));
        let e = extent_from_caps(&c, size(800, 300));
        assert_eq!((e.width, e.height), (800, 300));
    }

    #[test]
    fn image_count_is_min_plus_one_capped() {
        let mut c = caps((1, 1), (1, 1), (1, 1));
        assert_eq!(image_count(&c), 3);
        c.max_image_count = 2;
        assert_eq!(image_count(&c), 2);
    }

    #[test]
    fn present_mode_prefers_mailbox() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&modes, PresentPreference::Mailbox),
            vk::PresentModeKHR::MAILBOX
        );
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(
            choose_present_mode(&modes, PresentPreference::Mailbox),
            vk::PresentModeKHR::FIFO
        );
        let all = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
        assert_eq!(
            choose_present_mode(&all, PresentPreference::Fifo),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn surface_format_prefers_bgra_srgb() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let format = |formats: &[vk::SurfaceFormatKHR]| choose_surface_format(formats).map(|f| f.format);
        assert_eq!(format(&[unorm, srgb]), Some(vk::Format::B8G8R8A8_SRGB));
        assert_eq!(format(&[unorm]), Some(vk::Format::B8G8R8A8_UNORM));
        assert_eq!(format(&[]), None);
    }

    #[test]
    fn sample_count_is_shared_maximum() {
        let limits = vk::PhysicalDeviceLimits {
            framebuffer_color_sample_counts: vk::SampleCountFlags::TYPE_1
                | vk::SampleCountFlags::TYPE_2
                | vk::SampleCountFlags::TYPE_4
                | vk::SampleCountFlags::TYPE_8,
            framebuffer_depth_sample_counts: vk::SampleCountFlags::TYPE_1
                | vk::SampleCountFlags::TYPE_2
                | vk::SampleCountFlags::TYPE_4,
            ..Default::default()
        };
        assert_eq!(max_usable_sample_count(&limits), vk::SampleCountFlags::TYPE_4);
    }

    #[test]
    fn single_sample_when_nothing_else_is_shared() {
        let limits = vk::PhysicalDeviceLimits {
            framebuffer_color_sample_counts: vk::SampleCountFlags::TYPE_1
                | vk::SampleCountFlags::TYPE_8,
            framebuffer_depth_sample_counts: vk::SampleCountFlags::TYPE_1
                | vk::SampleCountFlags::TYPE_4,
            ..Default::default()
        };
        assert_eq!(max_usable_sample_count(&limits), vk::SampleCountFlags::TYPE_1);
    }

    #[test]
    fn depth_format_takes_first_supported_candidate() {
        let picked = pick_depth_format(|f| vk::FormatProperties {
            optimal_tiling_features: if f == vk::Format::D32_SFLOAT {
                vk::FormatFeatureFlags::empty()
            } else {
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
            },
            ..Default::default()
        });
        assert_eq!(picked, Ok(vk::Format::D32_SFLOAT_S8_UINT));
    }

    #[test]
    fn missing_depth_support_is_an_error() {
        let picked = pick_depth_format(|_| vk::FormatProperties::default());
        assert_eq!(picked, Err(RenderError::NoDepthFormat));
    }
}
