// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend: device context, GPU resources, swapchain and the frame loop.
mod commands;
mod context;
mod descriptors;
mod drawable;
mod frame;
mod handle;
mod memory;
mod pipeline;
mod swapchain;
mod upload;

use std::rc::Rc;

use anyhow::{anyhow, bail, Context, Result};
use ash::vk;
use prism_math::Camera;
use prism_render::{
    ClearValues, FrameCursor, FrameStatus, PresentPreference, Rebuild, RenderSettings, RenderSize,
    Renderer, SceneDesc, ShaderBytes, SwapchainLifecycle, UniformBlock, MAX_FRAMES_IN_FLIGHT,
};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info, trace, warn};

use commands::create_command_pool;
use context::DeviceContext;
use descriptors::{write_set, DescriptorPool, PoolPlan};
use drawable::{Drawable, UNIFORM_SIZE};
use frame::{create_frame_slots, record_frame, DrawCall, FrameSlot, PassTarget};
use handle::Owned;
use pipeline::{create_descriptor_set_layout, create_render_pass, GraphicsPipeline};
use swapchain::{max_usable_sample_count, pick_depth_format, Presentation, SwapchainBundle};
use upload::{MeshBuffers, Texture};

/// SPIR-V for the built-in textured shaders, compiled by the build script.
pub fn builtin_shaders() -> ShaderBytes {
    ShaderBytes {
        vertex: include_bytes!(concat!(env!("OUT_DIR"), "/prism.vert.spv")).to_vec(),
        fragment: include_bytes!(concat!(env!("OUT_DIR"), "/prism.frag.spv")).to_vec(),
    }
}

// TEARDOWN ORDER:
// `Drop::drop` idles the device, then fields drop top to bottom:
// - frame sync objects (their command buffers go with the pool)
// - drawables (uniform buffers), then the descriptor pool (frees the sets)
// - framebuffers, MSAA color + depth targets, swapchain views, swapchain
// - pipeline + layout, render pass, set layout
// - textures (sampler, view, image), meshes, command pool
// - the device context, once the last handle has released it:
//   device, surface, debug messenger, instance.
pub struct VkRenderer {
    slots: Vec<FrameSlot>,
    drawables: Vec<Drawable>,
    descriptor_pool: Option<DescriptorPool>,
    presentation: Presentation,
    pipeline: GraphicsPipeline,
    render_pass: Owned<vk::RenderPass>,
    set_layout: Owned<vk::DescriptorSetLayout>,
    textures: Vec<Texture>,
    meshes: Vec<MeshBuffers>,
    command_pool: Owned<vk::CommandPool>,

    cursor: FrameCursor,
    lifecycle: SwapchainLifecycle,
    clear: ClearValues,
    camera: Camera,
    present: PresentPreference,
    shaders: ShaderBytes,
    samples: vk::SampleCountFlags,
    depth_format: vk::Format,
    ctx: Rc<DeviceContext>,
}

impl Drop for VkRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.wait_idle() {
            warn!("vk: wait idle at teardown failed: {e:#}");
        }
        info!("vk: renderer teardown");
    }
}

unsafe fn build_renderer(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    size: RenderSize,
    scene: &SceneDesc,
    settings: &RenderSettings,
) -> Result<VkRenderer> {
    if size.is_zero() {
        bail!("drawable is {}x{} at startup", size.width, size.height);
    }
    scene.validate().context("scene description")?;

    // 1) Instance, surface, device, queues
    let ctx = Rc::new(DeviceContext::new(window, display, settings.validation)?);
    let command_pool = create_command_pool(&ctx)?;

    // 2) Immutable scene resources
    let meshes = scene
        .meshes
        .iter()
        .enumerate()
        .map(|(i, mesh)| {
            MeshBuffers::upload(&ctx, command_pool.raw(), mesh)
                .with_context(|| format!("upload mesh #{i}"))
        })
        .collect::<Result<Vec<_>>>()?;
    let textures = scene
        .textures
        .iter()
        .enumerate()
        .map(|(i, texture)| {
            Texture::upload(&ctx, command_pool.raw(), texture)
                .with_context(|| format!("upload texture #{i}"))
        })
        .collect::<Result<Vec<_>>>()?;
    info!(
        "vk: uploaded {} meshes, {} textures",
        meshes.len(),
        textures.len()
    );

    // 3) Swapchain, render pass, pipeline
    let samples = max_usable_sample_count(&ctx.limits);
    let depth_format = pick_depth_format(|f| ctx.format_properties(f))?;
    info!("vk: msaa {samples:?}, depth {depth_format:?}");
    let chain = SwapchainBundle::create(&ctx, size, settings.present, vk::SwapchainKHR::null())?;
    let render_pass = create_render_pass(&ctx, chain.format.format, depth_format, samples)?;
    let set_layout = create_descriptor_set_layout(&ctx)?;
    let pipeline = GraphicsPipeline::new(
        &ctx,
        render_pass.raw(),
        set_layout.raw(),
        samples,
        &settings.shaders,
    )?;
    let presentation = Presentation::new(&ctx, chain, render_pass.raw(), depth_format, samples)?;

    // 4) Per-drawable uniforms, descriptors, frame slots
    let drawables = scene
        .drawables
        .iter()
        .map(|desc| Drawable::new(&ctx, desc))
        .collect::<Result<Vec<_>>>()?;
    let descriptor_pool = PoolPlan::for_scene(drawables.len(), MAX_FRAMES_IN_FLIGHT)
        .map(|plan| DescriptorPool::new(&ctx, plan))
        .transpose()?;
    let slots = create_frame_slots(&ctx, command_pool.raw())?;

    let mut lifecycle = SwapchainLifecycle::new(size);
    lifecycle.created();

    let mut renderer = VkRenderer {
        slots,
        drawables,
        descriptor_pool,
        presentation,
        pipeline,
        render_pass,
        set_layout,
        textures,
        meshes,
        command_pool,
        cursor: FrameCursor::new(),
        lifecycle,
        clear: ClearValues {
            color: settings.clear_color,
            ..ClearValues::default()
        },
        camera: scene.camera,
        present: settings.present,
        shaders: settings.shaders.clone(),
        samples,
        depth_format,
        ctx,
    };
    renderer.write_descriptor_sets()?;
    info!("vk: renderer ready ({} drawables)", renderer.drawables.len());
    Ok(renderer)
}

impl VkRenderer {
    /// Resets the pool and gives every drawable one freshly written set per slot.
    unsafe fn write_descriptor_sets(&mut self) -> Result<()> {
        let Some(pool) = &self.descriptor_pool else {
            return Ok(());
        };
        pool.reset()?;
        let total = (self.drawables.len() * MAX_FRAMES_IN_FLIGHT) as u32;
        let mut sets = pool.allocate(self.set_layout.raw(), total)?.into_iter();
        for drawable in &mut self.drawables {
            drawable.sets = sets.by_ref().take(MAX_FRAMES_IN_FLIGHT).collect();
            let texture = &self.textures[drawable.texture];
            for (slot, &set) in drawable.sets.iter().enumerate() {
                write_set(
                    &self.ctx.device,
                    set,
                    drawable.uniform(slot),
                    UNIFORM_SIZE,
                    texture.view.raw(),
                    texture.sampler.raw(),
                );
            }
        }
        Ok(())
    }

    // STRICT ORDER (recreate):
    // 1) Idle the device; nothing may still reference the old chain
    // 2) Create the new swapchain, handing over the old one
    // 3) Rebuild render pass + pipeline ONLY if the surface format changed
    // 4) New targets + framebuffers; the old set drops on assignment
    // 5) Reset the descriptor pool and rewrite every set
    unsafe fn recreate_swapchain(&mut self, size: RenderSize) -> Result<()> {
        self.ctx
            .wait_idle()
            .context("idle before swapchain rebuild")?;
        self.cursor.retire_all();

        let old_format = self.presentation.chain.format.format;
        let chain = SwapchainBundle::create(
            &self.ctx,
            size,
            self.present,
            self.presentation.chain.raw(),
        )
        .context("recreate swapchain")?;

        if chain.format.format != old_format {
            info!(
                "vk: surface format {:?} -> {:?}, rebuilding pipeline",
                old_format, chain.format.format
            );
            self.render_pass =
                create_render_pass(&self.ctx, chain.format.format, self.depth_format, self.samples)?;
            self.pipeline = GraphicsPipeline::new(
                &self.ctx,
                self.render_pass.raw(),
                self.set_layout.raw(),
                self.samples,
                &self.shaders,
            )?;
        }

        self.presentation = Presentation::new(
            &self.ctx,
            chain,
            self.render_pass.raw(),
            self.depth_format,
            self.samples,
        )?;
        self.write_descriptor_sets()?;
        self.lifecycle.created();

        let extent = self.presentation.extent();
        info!("vk: swapchain rebuilt at {}x{}", extent.width, extent.height);
        Ok(())
    }

    /// Rebuilds right away unless the drawable is zero-sized.
    unsafe fn rebuild_now(&mut self, otherwise: FrameStatus) -> Result<FrameStatus> {
        match self.lifecycle.plan() {
            Rebuild::Proceed(size) => {
                self.recreate_swapchain(size)?;
                Ok(FrameStatus::Recreated)
            }
            Rebuild::Defer => {
                debug!("vk: rebuild deferred, drawable is zero-sized");
                Ok(otherwise)
            }
            Rebuild::NotNeeded => Ok(otherwise),
        }
    }

    unsafe fn update_uniforms(&mut self, slot: usize, seconds: f32) -> Result<()> {
        let extent = self.presentation.extent();
        let aspect = extent.width as f32 / extent.height.max(1) as f32;
        let view = self.camera.view();
        let proj = self.camera.projection(aspect);
        for drawable in &mut self.drawables {
            let block = UniformBlock::new(drawable.placement.model_at(seconds), view, proj);
            drawable.write_uniform(slot, &block)?;
        }
        Ok(())
    }

    fn draw_calls(&self, slot: usize) -> Vec<DrawCall> {
        self.drawables
            .iter()
            .map(|d| {
                let mesh = &self.meshes[d.mesh];
                DrawCall {
                    vertex: mesh.vertex.raw(),
                    index: mesh.index.raw(),
                    index_count: mesh.index_count,
                    set: d.sets[slot],
                }
            })
            .collect()
    }

    // STRICT PER-FRAME ORDER:
    // 1) wait the slot's fence (its command buffer and uniforms are free again)
    // 2) acquire; OUT_OF_DATE -> rebuild and skip, fence left signaled
    // 3) reset fence, write uniforms, re-record
    // 4) submit: wait image-available, signal render-finished + fence
    // 5) present: wait render-finished
    // 6) advance the slot; rebuild if the chain went stale
    unsafe fn draw_frame(&mut self, seconds: f32) -> Result<FrameStatus> {
        let ctx = Rc::clone(&self.ctx);
        let slot = self.cursor.current();
        let (cmd, image_available, render_finished, in_flight) = {
            let s = &self.slots[slot];
            (
                s.cmd,
                s.image_available.raw(),
                s.render_finished.raw(),
                s.in_flight.raw(),
            )
        };

        ctx.device
            .wait_for_fences(&[in_flight], true, u64::MAX)
            .context("wait_for_fences(in flight)")?;
        self.cursor.retire();

        let swapchain = self.presentation.chain.raw();
        let (image_index, acquire_suboptimal) = match ctx.swapchain_loader.acquire_next_image(
            swapchain,
            u64::MAX,
            image_available,
            vk::Fence::null(),
        ) {
            Ok(acquired) => acquired,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("vk: swapchain out of date at acquire");
                self.lifecycle.invalidate();
                return self.rebuild_now(FrameStatus::Skipped);
            }
            Err(e) => return Err(anyhow!("acquire_next_image: {e:?}")),
        };

        ctx.device
            .reset_fences(&[in_flight])
            .context("reset_fences")?;
        self.update_uniforms(slot, seconds)?;
        let draws = self.draw_calls(slot);
        let target = PassTarget {
            render_pass: self.render_pass.raw(),
            framebuffer: self.presentation.framebuffers[image_index as usize].raw(),
            extent: self.presentation.extent(),
        };
        record_frame(&ctx.device, cmd, &target, &self.clear, &self.pipeline, &draws)?;

        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &image_available,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &render_finished,
            ..Default::default()
        };
        ctx.device
            .queue_submit(ctx.graphics_queue, &[submit], in_flight)
            .context("queue_submit")?;
        self.cursor.submit()?;

        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &render_finished,
            swapchain_count: 1,
            p_swapchains: &swapchain,
            p_image_indices: &image_index,
            ..Default::default()
        };
        let stale = match ctx.swapchain_loader.queue_present(ctx.present_queue, &present) {
            Ok(present_suboptimal) => acquire_suboptimal || present_suboptimal,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => true,
            Err(e) => return Err(anyhow!("queue_present: {e:?}")),
        };
        self.cursor.advance();
        trace!("vk: presented image {image_index} from slot {slot}");

        if stale {
            debug!("vk: swapchain stale after present");
            self.lifecycle.invalidate();
        }
        if self.lifecycle.is_stale() {
            return self.rebuild_now(FrameStatus::Presented);
        }
        Ok(FrameStatus::Presented)
    }
}

impl Renderer for VkRenderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        scene: &SceneDesc,
        settings: &RenderSettings,
    ) -> Result<Self> {
        unsafe { build_renderer(window, display, size, scene, settings) }
    }

    fn resize(&mut self, size: RenderSize) -> Result<()> {
        if size != self.lifecycle.drawable() {
            info!("vk: resize to {}x{}", size.width, size.height);
        }
        self.lifecycle.resized(size);
        Ok(())
    }

    fn render(&mut self, seconds: f32) -> Result<FrameStatus> {
        unsafe {
            match self.lifecycle.plan() {
                Rebuild::NotNeeded => {}
                Rebuild::Defer => return Ok(FrameStatus::Skipped),
                Rebuild::Proceed(size) => self.recreate_swapchain(size)?,
            }
            self.draw_frame(seconds)
        }
    }
}
