// SPDX-License-Identifier: CEPL-1.0
use std::rc::Rc;

use anyhow::{Context, Result};
use ash::vk;
use prism_render::RenderError;

use crate::context::DeviceContext;
use crate::handle::Owned;

/// Sizing for a pool holding one set per drawable per frame slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolPlan {
    pub max_sets: u32,
    pub uniform_buffers: u32,
    pub samplers: u32,
}

impl PoolPlan {
    /// `None` when there is nothing to draw; no pool is created then.
    pub fn for_scene(drawables: usize, frames: usize) -> Option<Self> {
        let sets = (drawables * frames) as u32;
        (sets > 0).then_some(Self {
            max_sets: sets,
            uniform_buffers: sets,
            samplers: sets,
        })
    }

    pub fn check(&self, requested: u32) -> Result<(), RenderError> {
        if requested > self.max_sets {
            return Err(RenderError::DescriptorPoolExhausted {
                capacity: self.max_sets,
                requested,
            });
        }
        Ok(())
    }

    fn sizes(&self) -> [vk::DescriptorPoolSize; 2] {
        [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: self.uniform_buffers,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: self.samplers,
            },
        ]
    }
}

pub struct DescriptorPool {
    pool: Owned<vk::DescriptorPool>,
    plan: PoolPlan,
}

impl DescriptorPool {
    pub unsafe fn new(ctx: &Rc<DeviceContext>, plan: PoolPlan) -> Result<Self> {
        let sizes = plan.sizes();
        let info = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            max_sets: plan.max_sets,
            pool_size_count: sizes.len() as u32,
            p_pool_sizes: sizes.as_ptr(),
            ..Default::default()
        };
        let pool = ctx
            .device
            .create_descriptor_pool(&info, None)
            .context("create_descriptor_pool")?;
        Ok(Self {
            pool: Owned::new(ctx, pool),
            plan,
        })
    }

    /// Returns every set to the pool. Previously allocated handles become invalid.
    pub unsafe fn reset(&self) -> Result<()> {
        self.pool
            .device()
            .reset_descriptor_pool(self.pool.raw(), vk::DescriptorPoolResetFlags::empty())
            .context("reset_descriptor_pool")
    }

    /// Allocates `count` sets from a freshly reset pool.
    pub unsafe fn allocate(
        &self,
        layout: vk::DescriptorSetLayout,
        count: u32,
    ) -> Result<Vec<vk::DescriptorSet>> {
        self.plan.check(count)?;
        let layouts = vec![layout; count as usize];
        let info = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool: self.pool.raw(),
            descriptor_set_count: count,
            p_set_layouts: layouts.as_ptr(),
            ..Default::default()
        };
        self.pool
            .device()
            .allocate_descriptor_sets(&info)
            .context("allocate_descriptor_sets")
    }
}

/// Points binding 0 at `uniform` and binding 1 at the texture view + sampler.
pub unsafe fn write_set(
    device: &ash::Device,
    set: vk::DescriptorSet,
    uniform: vk::Buffer,
    uniform_range: vk::DeviceSize,
    view: vk::ImageView,
    sampler: vk::Sampler,
) {
    let buffer_info = vk::DescriptorBufferInfo {
        buffer: uniform,
        offset: 0,
        range: uniform_range,
    };
    let image_info = vk::DescriptorImageInfo {
        sampler,
        image_view: view,
        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    };
    let writes = [
        vk::WriteDescriptorSet {
            s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
            dst_set: set,
            dst_binding: 0,
            dst_array_element: 0,
            descriptor_count: 1,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            p_buffer_info: &buffer_info,
            ..Default::default()
        },
        vk::WriteDescriptorSet {
            s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
            dst_set: set,
            dst_binding: 1,
            dst_array_element: 0,
            descriptor_count: 1,
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            p_image_info: &image_info,
            ..Default::default()
        },
    ];
    device.update_descriptor_sets(&writes, &[]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_scales_with_drawables_and_frames() {
        let plan = PoolPlan::for_scene(3, 2).unwrap();
        assert_eq!(
            plan,
            PoolPlan {
                max_sets: 6,
                uniform_buffers: 6,
                samplers: 6
            }
        );
    }

    #[test]
    fn empty_scene_needs_no_pool() {
        assert_eq!(PoolPlan::for_scene(0, 2), None);
    }

    #[test]
    fn over_allocation_is_refused() {
        let plan = PoolPlan::for_scene(2, 2).unwrap();
        assert!(plan.check(4).is_ok());
        assert_eq!(
            plan.check(5),
            Err(RenderError::DescriptorPoolExhausted {
                capacity: 4,
                requested: 5
            })
        );
    }
}
