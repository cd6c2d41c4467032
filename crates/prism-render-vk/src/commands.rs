// SPDX-License-Identifier: CEPL-1.0
use std::rc::Rc;

use anyhow::{Context, Result};
use ash::vk;

use crate::context::DeviceContext;
use crate::handle::Owned;

/// Graphics-family pool whose buffers can be reset one at a time.
pub unsafe fn create_command_pool(ctx: &Rc<DeviceContext>) -> Result<Owned<vk::CommandPool>> {
    let info = vk::CommandPoolCreateInfo {
        s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
        queue_family_index: ctx.families.graphics,
        flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        ..Default::default()
    };
    let pool = ctx
        .device
        .create_command_pool(&info, None)
        .context("create_command_pool")?;
    Ok(Owned::new(ctx, pool))
}

pub unsafe fn allocate_primary(
    ctx: &DeviceContext,
    pool: vk::CommandPool,
    count: u32,
) -> Result<Vec<vk::CommandBuffer>> {
    let info = vk::CommandBufferAllocateInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
        command_pool: pool,
        level: vk::CommandBufferLevel::PRIMARY,
        command_buffer_count: count,
        ..Default::default()
    };
    ctx.device
        .allocate_command_buffers(&info)
        .context("allocate_command_buffers")
}

/// Records `record` into a throwaway command buffer, submits it to the graphics
/// queue and blocks until the queue is idle. The buffer is freed on every path.
pub unsafe fn one_time_submit(
    ctx: &DeviceContext,
    pool: vk::CommandPool,
    record: impl FnOnce(vk::CommandBuffer),
) -> Result<()> {
    let cmd = allocate_primary(ctx, pool, 1)?[0];
    let result = submit_and_wait(ctx, cmd, record);
    ctx.device.free_command_buffers(pool, &[cmd]);
    result
}

unsafe fn submit_and_wait(
    ctx: &DeviceContext,
    cmd: vk::CommandBuffer,
    record: impl FnOnce(vk::CommandBuffer),
) -> Result<()> {
    let begin = vk::CommandBufferBeginInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
        flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
        ..Default::default()
    };
    ctx.device
        .begin_command_buffer(cmd, &begin)
        .context("begin_command_buffer(one-time)")?;
    record(cmd);
    ctx.device
        .end_command_buffer(cmd)
        .context("end_command_buffer(one-time)")?;

    let submit = vk::SubmitInfo {
        s_type: vk::StructureType::SUBMIT_INFO,
        command_buffer_count: 1,
        p_command_buffers: &cmd,
        ..Default::default()
    };
    ctx.device
        .queue_submit(ctx.graphics_queue, &[submit], vk::Fence::null())
        .context("queue_submit(one-time)")?;
    ctx.device
        .queue_wait_idle(ctx.graphics_queue)
        .context("queue_wait_idle(one-time)")
}
