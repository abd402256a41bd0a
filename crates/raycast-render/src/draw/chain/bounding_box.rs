use super::ChainedRenderer;
use crate::{
    common::{
        buffer::Buffer,
        pipeline::{
            PipelineLayout,
            Pipelines,
        },
        vertex::LineVertex,
    },
    shader::shader::load_shader_module,
};
use anyhow::Result;
use ash::vk;
use bytemuck::{
    Pod,
    Zeroable,
};
use nalgebra_glm::Mat4;
use raycast_volume::bbox::BoundingBox;
use std::ffi::CString;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct LinePushConstants {
    view_proj: [[f32; 4]; 4],
    color: [f32; 4],
}

fn line_vertices(bounding_box: &BoundingBox) -> Vec<LineVertex> {
    bounding_box
        .edges()
        .iter()
        .map(|&position| LineVertex { position })
        .collect()
}

/// Draws the edges of a (padded) box as depth tested lines.
pub struct BoundingBoxRenderer {
    pipeline: Pipelines,
    pipeline_layout: PipelineLayout,
    vertex_buffer: Buffer,
    vertex_count: u32,
    bounding_box: BoundingBox,
    color: [f32; 4],
    device: ash::Device,
}

impl BoundingBoxRenderer {
    pub fn new(
        bounding_box: BoundingBox,
        padding: f32,
        color: [f32; 4],
        render_pass: vk::RenderPass,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        instance: &ash::Instance,
    ) -> Result<Self> {
        let bounding_box = bounding_box.expanded(padding);
        let vertices = line_vertices(&bounding_box);

        log::info!("creating bounding box vertex buffer");
        let vertex_buffer = Buffer::with_data(
            &vertices,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            physical_device,
            device.clone(),
            instance,
        )?;

        log::info!("creating bounding box pipeline layout");
        let push_constant_ranges = [vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .offset(0)
            .size(std::mem::size_of::<LinePushConstants>() as u32)];
        let pipeline_layout = PipelineLayout::new(&[], &push_constant_ranges, device.clone())?;

        log::info!("creating bounding box pipeline");
        let pipeline = create_line_pipeline(&pipeline_layout, render_pass, &device)?;

        Ok(Self {
            pipeline,
            pipeline_layout,
            vertex_buffer,
            vertex_count: vertices.len() as u32,
            bounding_box,
            color,
            device,
        })
    }
}

impl ChainedRenderer for BoundingBoxRenderer {
    fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    fn draw(&self, command_buffer: vk::CommandBuffer, view_proj: &Mat4) -> Result<()> {
        let push_constants = LinePushConstants {
            view_proj: (*view_proj).into(),
            color: self.color,
        };
        unsafe {
            self.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.vk_pipeline(0),
            );
            self.device.cmd_push_constants(
                command_buffer,
                self.pipeline_layout.vk_pipeline_layout(),
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                bytemuck::bytes_of(&push_constants),
            );
            self.device
                .cmd_bind_vertex_buffers(command_buffer, 0, &[self.vertex_buffer.vk_buffer()], &[0]);
            self.device
                .cmd_draw(command_buffer, self.vertex_count, 1, 0, 0);
        }
        Ok(())
    }
}

fn create_line_pipeline(
    pipeline_layout: &PipelineLayout,
    render_pass: vk::RenderPass,
    device: &ash::Device,
) -> Result<Pipelines> {
    let vert_shader_module = load_shader_module(device, "chain/bounding_box.vert.spv")?;
    let frag_shader_module = match load_shader_module(device, "chain/bounding_box.frag.spv") {
        Ok(module) => module,
        Err(error) => {
            unsafe { device.destroy_shader_module(vert_shader_module, None) };
            return Err(error);
        }
    };

    let main_function_name = CString::new("main")?;
    let shader_stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .module(vert_shader_module)
            .stage(vk::ShaderStageFlags::VERTEX)
            .name(&main_function_name),
        vk::PipelineShaderStageCreateInfo::default()
            .module(frag_shader_module)
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .name(&main_function_name),
    ];

    let binding_descriptions = LineVertex::get_binding_descriptions();
    let attribute_descriptions = LineVertex::get_attribute_descriptions();
    let vertex_input_state_create_info = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&binding_descriptions)
        .vertex_attribute_descriptions(&attribute_descriptions);

    let vertex_input_assembly_state_info = vk::PipelineInputAssemblyStateCreateInfo::default()
        .primitive_restart_enable(false)
        .topology(vk::PrimitiveTopology::LINE_LIST);

    let rasterization_state_create_info = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0)
        .polygon_mode(vk::PolygonMode::FILL)
        .depth_bias_enable(false);

    let multisample_state_create_info = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1)
        .sample_shading_enable(false);

    let depth_stencil_state_create_info = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_compare_op(vk::CompareOp::LESS)
        .depth_test_enable(true)
        .depth_write_enable(true)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    let color_blend_attachment_states = [vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(true)
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
        .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
        .alpha_blend_op(vk::BlendOp::ADD)];

    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .logic_op(vk::LogicOp::COPY)
        .attachments(&color_blend_attachment_states)
        .blend_constants([0.0, 0.0, 0.0, 0.0]);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);

    let graphics_pipeline_create_infos = [vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_state_create_info)
        .input_assembly_state(&vertex_input_assembly_state_info)
        .rasterization_state(&rasterization_state_create_info)
        .multisample_state(&multisample_state_create_info)
        .depth_stencil_state(&depth_stencil_state_create_info)
        .color_blend_state(&color_blend_state)
        .layout(pipeline_layout.vk_pipeline_layout())
        .render_pass(render_pass)
        .subpass(0)
        .dynamic_state(&dynamic_state)
        .viewport_state(&viewport_state)];

    let pipeline = Pipelines::graphics(&graphics_pipeline_create_infos, device.clone());

    unsafe {
        device.destroy_shader_module(vert_shader_module, None);
        device.destroy_shader_module(frag_shader_module, None);
    }
    pipeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_glm::Vec3;

    #[test]
    fn test_line_vertices_cover_padded_box() {
        let bounding_box =
            BoundingBox::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0)).expanded(0.5);
        let vertices = line_vertices(&bounding_box);
        assert_eq!(vertices.len(), 24);
        for vertex in &vertices {
            for axis in 0..3 {
                assert_eq!(vertex.position[axis].abs(), 1.5);
            }
        }
    }

    #[test]
    fn test_push_constants_fit_minimum_limit() {
        // 128 bytes are guaranteed by every implementation
        assert!(std::mem::size_of::<LinePushConstants>() <= 128);
    }
}
