// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CStr;
use std::io::Cursor;
use std::mem::{offset_of, size_of};
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use ash::util::read_spv;
use ash::vk;
use prism_render::{RenderError, ShaderBytes, Vertex};

use crate::context::DeviceContext;
use crate::handle::Owned;

const ENTRY_POINT: &CStr = c"main";
pub const MIN_SAMPLE_SHADING: f32 = 0.2;

/// Attachments: 0 = multisampled color, 1 = multisampled depth, 2 = single-sample
/// resolve target (the swapchain image).
pub unsafe fn create_render_pass(
    ctx: &Rc<DeviceContext>,
    color_format: vk::Format,
    depth_format: vk::Format,
    samples: vk::SampleCountFlags,
) -> Result<Owned<vk::RenderPass>> {
    let attachments = [
        vk::AttachmentDescription {
            format: color_format,
            samples,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ..Default::default()
        },
        vk::AttachmentDescription {
            format: depth_format,
            samples,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ..Default::default()
        },
        vk::AttachmentDescription {
            format: color_format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::DONT_CARE,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        },
    ];
    let color_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let resolve_ref = vk::AttachmentReference {
        attachment: 2,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let subpass = vk::SubpassDescription {
        pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
        color_attachment_count: 1,
        p_color_attachments: &color_ref,
        p_resolve_attachments: &resolve_ref,
        p_depth_stencil_attachment: &depth_ref,
        ..Default::default()
    };
    let stages =
        vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    let dependency = vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: stages,
        src_access_mask: vk::AccessFlags::empty(),
        dst_stage_mask: stages,
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        dependency_flags: vk::DependencyFlags::empty(),
    };
    let info = vk::RenderPassCreateInfo {
        s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
        attachment_count: attachments.len() as u32,
        p_attachments: attachments.as_ptr(),
        subpass_count: 1,
        p_subpasses: &subpass,
        dependency_count: 1,
        p_dependencies: &dependency,
        ..Default::default()
    };
    let pass = ctx
        .device
        .create_render_pass(&info, None)
        .context("create_render_pass")?;
    Ok(Owned::new(ctx, pass))
}

/// Binding 0: uniform block (vertex). Binding 1: combined image sampler (fragment).
pub unsafe fn create_descriptor_set_layout(
    ctx: &Rc<DeviceContext>,
) -> Result<Owned<vk::DescriptorSetLayout>> {
    let bindings = [
        vk::DescriptorSetLayoutBinding {
            binding: 0,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::VERTEX,
            ..Default::default()
        },
        vk::DescriptorSetLayoutBinding {
            binding: 1,
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::FRAGMENT,
            ..Default::default()
        },
    ];
    let info = vk::DescriptorSetLayoutCreateInfo {
        s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
        binding_count: bindings.len() as u32,
        p_bindings: bindings.as_ptr(),
        ..Default::default()
    };
    let layout = ctx
        .device
        .create_descriptor_set_layout(&info, None)
        .context("create_descriptor_set_layout")?;
    Ok(Owned::new(ctx, layout))
}

/// Decodes SPIR-V words. Bytes that are empty or not word-aligned are rejected.
pub fn spirv_words(bytes: &[u8]) -> Result<Vec<u32>, RenderError> {
    if bytes.is_empty() {
        return Err(RenderError::InvalidShader);
    }
    read_spv(&mut Cursor::new(bytes)).map_err(|_| RenderError::InvalidShader)
}

unsafe fn create_shader_module(
    ctx: &Rc<DeviceContext>,
    bytes: &[u8],
) -> Result<Owned<vk::ShaderModule>> {
    let code = spirv_words(bytes)?;
    let info = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        code_size: code.len() * 4,
        p_code: code.as_ptr(),
        ..Default::default()
    };
    let module = ctx
        .device
        .create_shader_module(&info, None)
        .context("create_shader_module")?;
    Ok(Owned::new(ctx, module))
}

pub fn vertex_binding() -> vk::VertexInputBindingDescription {
    vk::VertexInputBindingDescription {
        binding: 0,
        stride: size_of::<Vertex>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    }
}

pub fn vertex_attributes() -> [vk::VertexInputAttributeDescription; 3] {
    [
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: offset_of!(Vertex, pos) as u32,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: offset_of!(Vertex, color) as u32,
        },
        vk::VertexInputAttributeDescription {
            location: 2,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: offset_of!(Vertex, tex_coord) as u32,
        },
    ]
}

/// The single fixed graphics pipeline and its layout.
pub struct GraphicsPipeline {
    pub pipeline: Owned<vk::Pipeline>,
    pub layout: Owned<vk::PipelineLayout>,
}

impl GraphicsPipeline {
    pub unsafe fn new(
        ctx: &Rc<DeviceContext>,
        render_pass: vk::RenderPass,
        set_layout: vk::DescriptorSetLayout,
        samples: vk::SampleCountFlags,
        shaders: &ShaderBytes,
    ) -> Result<Self> {
        // Modules only need to live until the pipeline exists.
        let vs = create_shader_module(ctx, &shaders.vertex).context("vertex shader")?;
        let fs = create_shader_module(ctx, &shaders.fragment).context("fragment shader")?;
        let stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: vs.raw(),
                p_name: ENTRY_POINT.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: fs.raw(),
                p_name: ENTRY_POINT.as_ptr(),
                ..Default::default()
            },
        ];

        let binding = vertex_binding();
        let attributes = vertex_attributes();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            vertex_binding_description_count: 1,
            p_vertex_binding_descriptions: &binding,
            vertex_attribute_description_count: attributes.len() as u32,
            p_vertex_attribute_descriptions: attributes.as_ptr(),
            ..Default::default()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            primitive_restart_enable: vk::FALSE,
            ..Default::default()
        };
        let dyn_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
            dynamic_state_count: dyn_states.len() as u32,
            p_dynamic_states: dyn_states.as_ptr(),
            ..Default::default()
        };
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };
        let raster = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            depth_clamp_enable: vk::FALSE,
            rasterizer_discard_enable: vk::FALSE,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_bias_enable: vk::FALSE,
            line_width: 1.0,
            ..Default::default()
        };
        let (sample_shading_enable, min_sample_shading) = if ctx.sample_shading {
            (vk::TRUE, MIN_SAMPLE_SHADING)
        } else {
            (vk::FALSE, 0.0)
        };
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: samples,
            sample_shading_enable,
            min_sample_shading,
            ..Default::default()
        };
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
            depth_test_enable: vk::TRUE,
            depth_write_enable: vk::TRUE,
            depth_compare_op: vk::CompareOp::LESS,
            depth_bounds_test_enable: vk::FALSE,
            stencil_test_enable: vk::FALSE,
            ..Default::default()
        };
        let blend_attachment = vk::PipelineColorBlendAttachmentState {
            color_write_mask: vk::ColorComponentFlags::R
                | vk::ColorComponentFlags::G
                | vk::ColorComponentFlags::B
                | vk::ColorComponentFlags::A,
            blend_enable: vk::FALSE,
            ..Default::default()
        };
        let color_blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &blend_attachment,
            ..Default::default()
        };

        let layout_info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            set_layout_count: 1,
            p_set_layouts: &set_layout,
            ..Default::default()
        };
        let layout = Owned::new(
            ctx,
            ctx.device
                .create_pipeline_layout(&layout_info, None)
                .context("create_pipeline_layout")?,
        );

        let info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &raster,
            p_multisample_state: &multisample,
            p_depth_stencil_state: &depth_stencil,
            p_color_blend_state: &color_blend,
            p_dynamic_state: &dynamic_state,
            layout: layout.raw(),
            render_pass,
            subpass: 0,
            ..Default::default()
        };
        let pipeline = match ctx.device.create_graphics_pipelines(
            vk::PipelineCache::null(),
            &[info],
            None,
        ) {
            Ok(pipelines) => pipelines[0],
            Err((_, err)) => return Err(anyhow!("create_graphics_pipelines failed: {err:?}")),
        };

        Ok(Self {
            pipeline: Owned::new(ctx, pipeline),
            layout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_cover_the_whole_vertex() {
        let attrs = vertex_attributes();
        assert_eq!(attrs.map(|a| a.offset), [0, 12, 24]);
        assert_eq!(attrs.map(|a| a.location), [0, 1, 2]);
        assert_eq!(vertex_binding().stride, 32);
    }

    #[test]
    fn empty_shader_is_rejected() {
        assert_eq!(spirv_words(&[]), Err(RenderError::InvalidShader));
    }

    #[test]
    fn misaligned_shader_is_rejected() {
        assert_eq!(spirv_words(&[0x03, 0x02, 0x23]), Err(RenderError::InvalidShader));
    }

    #[test]
    fn builtin_shaders_decode() {
        let shaders = crate::builtin_shaders();
        assert_eq!(spirv_words(&shaders.vertex).unwrap()[0], 0x0723_0203);
        assert_eq!(spirv_words(&shaders.fragment).unwrap()[0], 0x0723_0203);
    }
}
