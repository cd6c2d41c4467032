// SPDX-License-Identifier: CEPL-1.0
use std::rc::Rc;

use anyhow::{Context, Result};
use ash::vk;
use prism_math::Placement;
use prism_render::{DrawableDesc, UniformBlock, MAX_FRAMES_IN_FLIGHT};

use crate::context::DeviceContext;
use crate::memory::GpuBuffer;

pub const UNIFORM_SIZE: vk::DeviceSize = std::mem::size_of::<UniformBlock>() as vk::DeviceSize;

/// A mesh + texture pairing with its own per-slot uniforms and descriptor sets.
pub struct Drawable {
    pub mesh: usize,
    pub texture: usize,
    pub placement: Placement,
    uniforms: Vec<GpuBuffer>,
    /// Indexed by frame slot; owned by the descriptor pool.
    pub sets: Vec<vk::DescriptorSet>,
}

impl Drawable {
    pub unsafe fn new(ctx: &Rc<DeviceContext>, desc: &DrawableDesc) -> Result<Self> {
        let uniforms = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|slot| -> Result<GpuBuffer> {
                let mut buffer = GpuBuffer::new(
                    ctx,
                    UNIFORM_SIZE,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                )
                .with_context(|| format!("uniform buffer for slot {slot}"))?;
                buffer.map_persistent()?;
                Ok(buffer)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            mesh: desc.mesh,
            texture: desc.texture,
            placement: desc.placement,
            uniforms,
            sets: Vec::new(),
        })
    }

    pub fn uniform(&self, slot: usize) -> vk::Buffer {
        self.uniforms[slot].raw()
    }

    /// Only call once the slot's fence has been waited.
    pub unsafe fn write_uniform(&mut self, slot: usize, block: &UniformBlock) -> Result<()> {
        self.uniforms[slot].write_pod(block)
    }
}
