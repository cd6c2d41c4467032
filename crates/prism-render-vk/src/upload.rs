// SPDX-License-Identifier: CEPL-1.0
use std::rc::Rc;

use anyhow::{Context, Result};
use ash::vk;
use prism_render::texture::mip_extents;
use prism_render::{MeshData, RenderError, TextureData};
use tracing::debug;

use crate::commands::one_time_submit;
use crate::context::DeviceContext;
use crate::handle::Owned;
use crate::memory::{create_image_view, GpuBuffer, GpuImage, ImageSpec};

pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

const HOST_STAGING: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

unsafe fn staging_buffer(ctx: &Rc<DeviceContext>, bytes: &[u8]) -> Result<GpuBuffer> {
    let mut staging = GpuBuffer::new(
        ctx,
        bytes.len() as vk::DeviceSize,
        vk::BufferUsageFlags::TRANSFER_SRC,
        HOST_STAGING,
    )
    .context("staging buffer")?;
    staging.write_bytes(bytes)?;
    Ok(staging)
}

/// Stages `bytes` and copies them into a new device-local buffer.
pub unsafe fn upload_buffer(
    ctx: &Rc<DeviceContext>,
    pool: vk::CommandPool,
    bytes: &[u8],
    usage: vk::BufferUsageFlags,
) -> Result<GpuBuffer> {
    let staging = staging_buffer(ctx, bytes)?;
    let dst = GpuBuffer::new(
        ctx,
        staging.size(),
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;
    let region = vk::BufferCopy {
        src_offset: 0,
        dst_offset: 0,
        size: staging.size(),
    };
    one_time_submit(ctx, pool, |cmd| {
        ctx.device
            .cmd_copy_buffer(cmd, staging.raw(), dst.raw(), &[region]);
    })
    .context("copy staging -> device-local buffer")?;
    Ok(dst)
}

pub struct MeshBuffers {
    pub vertex: GpuBuffer,
    pub index: GpuBuffer,
    pub index_count: u32,
}

impl MeshBuffers {
    pub unsafe fn upload(
        ctx: &Rc<DeviceContext>,
        pool: vk::CommandPool,
        mesh: &MeshData,
    ) -> Result<Self> {
        mesh.validate()?;
        let vertex = upload_buffer(
            ctx,
            pool,
            mesh.vertex_bytes(),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )
        .context("vertex buffer")?;
        let index = upload_buffer(
            ctx,
            pool,
            mesh.index_bytes(),
            vk::BufferUsageFlags::INDEX_BUFFER,
        )
        .context("index buffer")?;
        debug!(
            "vk: mesh uploaded ({} vertices, {} indices)",
            mesh.vertices.len(),
            mesh.index_count()
        );
        Ok(Self {
            vertex,
            index,
            index_count: mesh.index_count(),
        })
    }
}

/// Sampled texture with its full mip chain. Immutable after upload.
pub struct Texture {
    pub sampler: Owned<vk::Sampler>,
    pub view: Owned<vk::ImageView>,
    pub image: GpuImage,
}

fn color_range(base_mip_level: u32, level_count: u32) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level,
        level_count,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn color_layers(mip_level: u32) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level,
        base_array_layer: 0,
        layer_count: 1,
    }
}

#[allow(clippy::too_many_arguments)]
unsafe fn image_barrier(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    (old_layout, new_layout): (vk::ImageLayout, vk::ImageLayout),
    (src_access_mask, dst_access_mask): (vk::AccessFlags, vk::AccessFlags),
    src_stage: vk::PipelineStageFlags,
    dst_stage: vk::PipelineStageFlags,
) {
    let barrier = vk::ImageMemoryBarrier {
        s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
        src_access_mask,
        dst_access_mask,
        old_layout,
        new_layout,
        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        image,
        subresource_range: range,
        ..Default::default()
    };
    device.cmd_pipeline_barrier(
        cmd,
        src_stage,
        dst_stage,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        &[barrier],
    );
}

fn far_corner(width: u32, height: u32) -> vk::Offset3D {
    vk::Offset3D {
        x: width as i32,
        y: height as i32,
        z: 1,
    }
}

/// Fills levels 1.. by repeated linear blits from the level above. On entry every
/// level is TRANSFER_DST_OPTIMAL; on exit every level is SHADER_READ_ONLY_OPTIMAL.
unsafe fn record_mipmaps(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    width: u32,
    height: u32,
) {
    let extents = mip_extents(width, height);
    for (level, pair) in (1u32..).zip(extents.windows(2)) {
        let ((src_w, src_h), (dst_w, dst_h)) = (pair[0], pair[1]);

        image_barrier(
            device,
            cmd,
            image,
            color_range(level - 1, 1),
            (
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            ),
            (vk::AccessFlags::TRANSFER_WRITE, vk::AccessFlags::TRANSFER_READ),
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::TRANSFER,
        );

        let blit = vk::ImageBlit {
            src_subresource: color_layers(level - 1),
            src_offsets: [vk::Offset3D::default(), far_corner(src_w, src_h)],
            dst_subresource: color_layers(level),
            dst_offsets: [vk::Offset3D::default(), far_corner(dst_w, dst_h)],
        };
        device.cmd_blit_image(
            cmd,
            image,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[blit],
            vk::Filter::LINEAR,
        );

        image_barrier(
            device,
            cmd,
            image,
            color_range(level - 1, 1),
            (
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ),
            (vk::AccessFlags::TRANSFER_READ, vk::AccessFlags::SHADER_READ),
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        );
    }

    // The last level was only ever written.
    image_barrier(
        device,
        cmd,
        image,
        color_range(extents.len() as u32 - 1, 1),
        (
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ),
        (vk::AccessFlags::TRANSFER_WRITE, vk::AccessFlags::SHADER_READ),
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::FRAGMENT_SHADER,
    );
}

unsafe fn create_sampler(ctx: &Rc<DeviceContext>, mip_levels: u32) -> Result<Owned<vk::Sampler>> {
    let info = vk::SamplerCreateInfo {
        s_type: vk::StructureType::SAMPLER_CREATE_INFO,
        mag_filter: vk::Filter::LINEAR,
        min_filter: vk::Filter::LINEAR,
        mipmap_mode: vk::SamplerMipmapMode::LINEAR,
        address_mode_u: vk::SamplerAddressMode::REPEAT,
        address_mode_v: vk::SamplerAddressMode::REPEAT,
        address_mode_w: vk::SamplerAddressMode::REPEAT,
        mip_lod_bias: 0.0,
        anisotropy_enable: if ctx.anisotropy { vk::TRUE } else { vk::FALSE },
        max_anisotropy: if ctx.anisotropy {
            ctx.limits.max_sampler_anisotropy
        } else {
            1.0
        },
        compare_enable: vk::FALSE,
        compare_op: vk::CompareOp::ALWAYS,
        min_lod: 0.0,
        max_lod: mip_levels as f32,
        border_color: vk::BorderColor::INT_OPAQUE_BLACK,
        unnormalized_coordinates: vk::FALSE,
        ..Default::default()
    };
    let sampler = ctx
        .device
        .create_sampler(&info, None)
        .context("create_sampler")?;
    Ok(Owned::new(ctx, sampler))
}

impl Texture {
    pub unsafe fn upload(
        ctx: &Rc<DeviceContext>,
        pool: vk::CommandPool,
        data: &TextureData,
    ) -> Result<Self> {
        if !ctx
            .format_properties(TEXTURE_FORMAT)
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
        {
            return Err(RenderError::BlitUnsupported.into());
        }

        let (width, height) = (data.width(), data.height());
        let mip_levels = data.mip_levels();
        let staging = staging_buffer(ctx, data.pixels())?;
        let image = GpuImage::new(
            ctx,
            &ImageSpec {
                width,
                height,
                mip_levels,
                samples: vk::SampleCountFlags::TYPE_1,
                format: TEXTURE_FORMAT,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::SAMPLED,
                properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            },
        )
        .context("texture image")?;

        let device = &ctx.device;
        one_time_submit(ctx, pool, |cmd| {
            image_barrier(
                device,
                cmd,
                image.raw(),
                color_range(0, mip_levels),
                (
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                ),
                (vk::AccessFlags::empty(), vk::AccessFlags::TRANSFER_WRITE),
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
            );
            let region = vk::BufferImageCopy {
                buffer_offset: 0,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: color_layers(0),
                image_offset: vk::Offset3D::default(),
                image_extent: vk::Extent3D {
                    width,
                    height,
                    depth: 1,
                },
            };
            device.cmd_copy_buffer_to_image(
                cmd,
                staging.raw(),
                image.raw(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
            record_mipmaps(device, cmd, image.raw(), width, height);
        })
        .context("texture transfer")?;

        let view = create_image_view(
            ctx,
            image.raw(),
            TEXTURE_FORMAT,
            vk::ImageAspectFlags::COLOR,
            mip_levels,
        )?;
        let sampler = create_sampler(ctx, mip_levels)?;
        debug!("vk: texture uploaded ({width}x{height}, {mip_levels} mip levels)");
        Ok(Self {
            sampler,
            view,
            image,
        })
    }
}
