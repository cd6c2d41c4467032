// SPDX-License-Identifier: CEPL-1.0
//! Owning wrapper for device-level Vulkan handles.
//!
//! Every wrapper keeps the `DeviceContext` alive, so a handle can never outlive
//! the device (or swapchain loader) that destroys it. Struct fields drop in
//! declaration order, which is how composite resources encode their teardown
//! order (views before images, images before memory, ...).
use std::rc::Rc;

use ash::vk;

use crate::context::DeviceContext;

pub(crate) trait DeviceHandle: Copy {
    /// # Safety
    /// The handle must have been created from `ctx` and be idle on the GPU.
    unsafe fn destroy(self, ctx: &DeviceContext);
}

macro_rules! device_handle {
    ($($ty:ty => $destroy:ident),* $(,)?) => {
        $(
            impl DeviceHandle for $ty {
                unsafe fn destroy(self, ctx: &DeviceContext) {
                    ctx.device.$destroy(self, None)
                }
            }
        )*
    };
}

device_handle! {
    vk::Buffer => destroy_buffer,
    vk::DeviceMemory => free_memory,
    vk::Image => destroy_image,
    vk::ImageView => destroy_image_view,
    vk::Sampler => destroy_sampler,
    vk::Framebuffer => destroy_framebuffer,
    vk::RenderPass => destroy_render_pass,
    vk::PipelineLayout => destroy_pipeline_layout,
    vk::Pipeline => destroy_pipeline,
    vk::ShaderModule => destroy_shader_module,
    vk::DescriptorSetLayout => destroy_descriptor_set_layout,
    vk::DescriptorPool => destroy_descriptor_pool,
    vk::CommandPool => destroy_command_pool,
    vk::Semaphore => destroy_semaphore,
    vk::Fence => destroy_fence,
}

impl DeviceHandle for vk::SwapchainKHR {
    unsafe fn destroy(self, ctx: &DeviceContext) {
        ctx.swapchain_loader.destroy_swapchain(self, None)
    }
}

pub(crate) struct Owned<H: DeviceHandle> {
    raw: H,
    ctx: Rc<DeviceContext>,
}

impl<H: DeviceHandle> Owned<H> {
    /// # Safety
    /// `raw` must have been created from `ctx` and not be owned elsewhere.
    pub unsafe fn new(ctx: &Rc<DeviceContext>, raw: H) -> Self {
        Self {
            raw,
            ctx: Rc::clone(ctx),
        }
    }

    #[inline]
    pub fn raw(&self) -> H {
        self.raw
    }

    pub fn device(&self) -> &ash::Device {
        &self.ctx.device
    }
}

impl<H: DeviceHandle> Drop for Owned<H> {
    fn drop(&mut self) {
        unsafe { self.raw.destroy(&self.ctx) }
    }
}
