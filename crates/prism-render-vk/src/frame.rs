// SPDX-License-Identifier: CEPL-1.0
use std::rc::Rc;

use anyhow::{Context, Result};
use ash::vk;
use prism_render::{ClearValues, MAX_FRAMES_IN_FLIGHT};

use crate::commands::allocate_primary;
use crate::context::DeviceContext;
use crate::handle::Owned;
use crate::pipeline::GraphicsPipeline;

/// Per-slot command buffer and sync objects. The command buffer is freed with its pool.
pub struct FrameSlot {
    pub cmd: vk::CommandBuffer,
    pub image_available: Owned<vk::Semaphore>,
    pub render_finished: Owned<vk::Semaphore>,
    pub in_flight: Owned<vk::Fence>,
}

pub unsafe fn create_frame_slots(
    ctx: &Rc<DeviceContext>,
    pool: vk::CommandPool,
) -> Result<Vec<FrameSlot>> {
    let cmds = allocate_primary(ctx, pool, MAX_FRAMES_IN_FLIGHT as u32)?;
    let sem_info = vk::SemaphoreCreateInfo::default();
    // Signaled so the first wait on each slot returns immediately.
    let fence_info = vk::FenceCreateInfo {
        s_type: vk::StructureType::FENCE_CREATE_INFO,
        flags: vk::FenceCreateFlags::SIGNALED,
        ..Default::default()
    };
    cmds.into_iter()
        .map(|cmd| -> Result<FrameSlot> {
            Ok(FrameSlot {
                cmd,
                image_available: Owned::new(
                    ctx,
                    ctx.device
                        .create_semaphore(&sem_info, None)
                        .context("create_semaphore(image available)")?,
                ),
                render_finished: Owned::new(
                    ctx,
                    ctx.device
                        .create_semaphore(&sem_info, None)
                        .context("create_semaphore(render finished)")?,
                ),
                in_flight: Owned::new(
                    ctx,
                    ctx.device
                        .create_fence(&fence_info, None)
                        .context("create_fence(in flight)")?,
                ),
            })
        })
        .collect()
}

pub struct DrawCall {
    pub vertex: vk::Buffer,
    pub index: vk::Buffer,
    pub index_count: u32,
    pub set: vk::DescriptorSet,
}

pub struct PassTarget {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
}

pub fn clear_values(clear: &ClearValues) -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear.color,
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: clear.depth,
                stencil: clear.stencil,
            },
        },
    ]
}

/// Re-records `cmd` from scratch: one render pass, draws in list order.
pub unsafe fn record_frame(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    target: &PassTarget,
    clear: &ClearValues,
    pipeline: &GraphicsPipeline,
    draws: &[DrawCall],
) -> Result<()> {
    device
        .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
        .context("reset_command_buffer")?;
    let begin = vk::CommandBufferBeginInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
        ..Default::default()
    };
    device
        .begin_command_buffer(cmd, &begin)
        .context("begin_command_buffer")?;

    let area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: target.extent,
    };
    let clears = clear_values(clear);
    let pass_begin = vk::RenderPassBeginInfo {
        s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
        render_pass: target.render_pass,
        framebuffer: target.framebuffer,
        render_area: area,
        clear_value_count: clears.len() as u32,
        p_clear_values: clears.as_ptr(),
        ..Default::default()
    };
    device.cmd_begin_render_pass(cmd, &pass_begin, vk::SubpassContents::INLINE);
    device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline.raw());

    let viewport = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: target.extent.width as f32,
        height: target.extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };
    device.cmd_set_viewport(cmd, 0, &[viewport]);
    device.cmd_set_scissor(cmd, 0, &[area]);

    for draw in draws {
        device.cmd_bind_vertex_buffers(cmd, 0, &[draw.vertex], &[0]);
        device.cmd_bind_index_buffer(cmd, draw.index, 0, vk::IndexType::UINT32);
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            pipeline.layout.raw(),
            0,
            &[draw.set],
            &[],
        );
        device.cmd_draw_indexed(cmd, draw.index_count, 1, 0, 0, 0);
    }

    device.cmd_end_render_pass(cmd);
    device.end_command_buffer(cmd).context("end_command_buffer")
}
