use crate::{
    common::{
        descriptor::{
            layout_binding,
            DescriptorSetLayout,
        },
        pipeline::{
            PipelineLayout,
            Pipelines,
        },
        render_pass::RenderPass,
    },
    shader::shader::load_shader_module,
};
use anyhow::Result;
use ash::vk;
use raycast_volume::params::RaycastMode;
use std::ffi::CString;

pub const SCENE_COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
pub const SCENE_DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
pub const STORAGE_COLOR_FORMAT: vk::Format = vk::Format::R32G32B32A32_SFLOAT;
pub const STORAGE_DEPTH_FORMAT: vk::Format = vk::Format::R32_SFLOAT;
pub const OUTPUT_NORMAL_FORMAT: vk::Format = vk::Format::R32G32B32A32_SFLOAT;

/// Binding slots of the descriptor set shared by the compute and composite passes.
pub mod binding {
    pub const UNIFORMS: u32 = 0;
    pub const VOLUME: u32 = 1;
    pub const TRANSFER_FUNCTION: u32 = 2;
    pub const SCENE_COLOR: u32 = 3;
    pub const SCENE_DEPTH: u32 = 4;
    pub const COLOR: u32 = 5;
    pub const NORMAL: u32 = 6;
    pub const DEPTH: u32 = 7;
    pub const RANGE: u32 = 8;
}

fn compute_shader_path(mode: RaycastMode) -> &'static str {
    match mode {
        RaycastMode::Integration => "raycast/integration.comp.spv",
        RaycastMode::Isosurface => "raycast/isosurface.comp.spv",
        RaycastMode::Aggregate => "raycast/aggregate.comp.spv",
    }
}

fn composite_shader_path(mode: RaycastMode) -> &'static str {
    match mode {
        RaycastMode::Integration => "composite/composite.frag.spv",
        RaycastMode::Isosurface => "composite/composite_iso.frag.spv",
        RaycastMode::Aggregate => "composite/composite_aggregate.frag.spv",
    }
}

pub fn descriptor_set_layout_bindings() -> [vk::DescriptorSetLayoutBinding<'static>; 9] {
    let stages = vk::ShaderStageFlags::COMPUTE | vk::ShaderStageFlags::FRAGMENT;
    [
        layout_binding(binding::UNIFORMS, vk::DescriptorType::UNIFORM_BUFFER, stages),
        layout_binding(
            binding::VOLUME,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            stages,
        ),
        layout_binding(
            binding::TRANSFER_FUNCTION,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            stages,
        ),
        layout_binding(
            binding::SCENE_COLOR,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            stages,
        ),
        layout_binding(
            binding::SCENE_DEPTH,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            stages,
        ),
        layout_binding(binding::COLOR, vk::DescriptorType::STORAGE_IMAGE, stages),
        layout_binding(binding::NORMAL, vk::DescriptorType::STORAGE_IMAGE, stages),
        layout_binding(binding::DEPTH, vk::DescriptorType::STORAGE_IMAGE, stages),
        layout_binding(binding::RANGE, vk::DescriptorType::STORAGE_BUFFER, stages),
    ]
}

/// Pipelines indexed by [`RaycastMode::index`].
pub struct RaycastPipelines {
    compute_pipelines: Pipelines,
    composite_pipelines: Pipelines,
    pipeline_layout: PipelineLayout,
    descriptor_set_layout: DescriptorSetLayout,
    scene_render_pass: RenderPass,
    composite_render_pass: RenderPass,
}

impl RaycastPipelines {
    pub fn new(output_format: vk::Format, device: ash::Device) -> Result<Self> {
        log::info!("creating raycast descriptor set layout");
        let descriptor_set_layout =
            DescriptorSetLayout::new(&descriptor_set_layout_bindings(), device.clone())?;

        log::info!("creating raycast pipeline layout");
        let pipeline_layout = PipelineLayout::new(
            &[descriptor_set_layout.vk_descriptor_set_layout()],
            &[],
            device.clone(),
        )?;

        log::info!("creating scene render pass");
        let scene_render_pass = create_scene_render_pass(device.clone())?;

        log::info!("creating composite render pass");
        let composite_render_pass = create_composite_render_pass(output_format, device.clone())?;

        log::info!("creating raycast compute pipelines");
        let compute_pipelines = create_compute_pipelines(&pipeline_layout, device.clone())?;

        log::info!("creating composite pipelines");
        let composite_pipelines =
            create_composite_pipelines(&pipeline_layout, &composite_render_pass, device)?;

        Ok(Self {
            compute_pipelines,
            composite_pipelines,
            pipeline_layout,
            descriptor_set_layout,
            scene_render_pass,
            composite_render_pass,
        })
    }

    pub fn compute_pipeline(&self, mode: RaycastMode) -> vk::Pipeline {
        self.compute_pipelines.vk_pipeline(mode.index() as usize)
    }

    pub fn composite_pipeline(&self, mode: RaycastMode) -> vk::Pipeline {
        self.composite_pipelines.vk_pipeline(mode.index() as usize)
    }

    pub fn vk_pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout.vk_pipeline_layout()
    }

    pub fn vk_descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout.vk_descriptor_set_layout()
    }

    pub fn scene_render_pass(&self) -> vk::RenderPass {
        self.scene_render_pass.vk_render_pass()
    }

    pub fn composite_render_pass(&self) -> vk::RenderPass {
        self.composite_render_pass.vk_render_pass()
    }
}

/// Color and depth of the chained renderer, left readable by the compute and composite passes.
fn create_scene_render_pass(device: ash::Device) -> Result<RenderPass> {
    let render_pass_attachments = [
        // color
        vk::AttachmentDescription::default()
            .format(SCENE_COLOR_FORMAT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        // depth
        vk::AttachmentDescription::default()
            .format(SCENE_DEPTH_FORMAT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL),
    ];

    let color_attachments = [vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];
    let depth_stencil_attachment = vk::AttachmentReference::default()
        .attachment(1)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_attachments)
        .depth_stencil_attachment(&depth_stencil_attachment)];

    let dependencies = [
        // previous frame's reads -> attachment writes
        vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(
                vk::PipelineStageFlags::COMPUTE_SHADER | vk::PipelineStageFlags::FRAGMENT_SHADER,
            )
            .src_access_mask(vk::AccessFlags::SHADER_READ)
            .dst_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ),
        // attachment writes -> sampling in the raycast and composite passes
        vk::SubpassDependency::default()
            .src_subpass(0)
            .dst_subpass(vk::SUBPASS_EXTERNAL)
            .src_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            )
            .src_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
            .dst_stage_mask(
                vk::PipelineStageFlags::COMPUTE_SHADER | vk::PipelineStageFlags::FRAGMENT_SHADER,
            )
            .dst_access_mask(vk::AccessFlags::SHADER_READ),
    ];

    let render_pass_create_info = vk::RenderPassCreateInfo::default()
        .attachments(&render_pass_attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    RenderPass::new(&render_pass_create_info, device)
}

fn create_composite_render_pass(output_format: vk::Format, device: ash::Device) -> Result<RenderPass> {
    let render_pass_attachments = [
        // color
        vk::AttachmentDescription::default()
            .format(output_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::DONT_CARE)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
        // normal
        vk::AttachmentDescription::default()
            .format(OUTPUT_NORMAL_FORMAT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::DONT_CARE)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
    ];

    let color_attachments = [
        vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
        vk::AttachmentReference::default()
            .attachment(1)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
    ];

    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_attachments)];

    let dependencies = [
        // the output is copied out after the pass
        vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::TRANSFER)
            .src_access_mask(vk::AccessFlags::TRANSFER_READ)
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE),
    ];

    let render_pass_create_info = vk::RenderPassCreateInfo::default()
        .attachments(&render_pass_attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    RenderPass::new(&render_pass_create_info, device)
}

fn create_compute_pipelines(
    pipeline_layout: &PipelineLayout,
    device: ash::Device,
) -> Result<Pipelines> {
    let main_function_name = CString::new("main")?;

    let mut shader_modules = Vec::with_capacity(RaycastMode::ALL.len());
    for mode in RaycastMode::ALL {
        match load_shader_module(&device, compute_shader_path(mode)) {
            Ok(module) => shader_modules.push(module),
            Err(error) => {
                destroy_shader_modules(&device, &shader_modules);
                return Err(error);
            }
        }
    }

    let compute_pipeline_create_infos = shader_modules
        .iter()
        .map(|&module| {
            vk::ComputePipelineCreateInfo::default()
                .stage(
                    vk::PipelineShaderStageCreateInfo::default()
                        .module(module)
                        .stage(vk::ShaderStageFlags::COMPUTE)
                        .name(&main_function_name),
                )
                .layout(pipeline_layout.vk_pipeline_layout())
        })
        .collect::<Vec<_>>();

    let pipelines = Pipelines::compute(&compute_pipeline_create_infos, device.clone());
    destroy_shader_modules(&device, &shader_modules);
    pipelines
}

fn create_composite_pipelines(
    pipeline_layout: &PipelineLayout,
    render_pass: &RenderPass,
    device: ash::Device,
) -> Result<Pipelines> {
    let main_function_name = CString::new("main")?;

    let mut shader_modules = Vec::with_capacity(RaycastMode::ALL.len() + 1);
    let paths = std::iter::once("composite/fullscreen.vert.spv")
        .chain(RaycastMode::ALL.iter().map(|&mode| composite_shader_path(mode)));
    for path in paths {
        match load_shader_module(&device, path) {
            Ok(module) => shader_modules.push(module),
            Err(error) => {
                destroy_shader_modules(&device, &shader_modules);
                return Err(error);
            }
        }
    }
    let vert_shader_module = shader_modules[0];

    let shader_stages = shader_modules[1..]
        .iter()
        .map(|&frag_shader_module| {
            [
                vk::PipelineShaderStageCreateInfo::default()
                    .module(vert_shader_module)
                    .stage(vk::ShaderStageFlags::VERTEX)
                    .name(&main_function_name),
                vk::PipelineShaderStageCreateInfo::default()
                    .module(frag_shader_module)
                    .stage(vk::ShaderStageFlags::FRAGMENT)
                    .name(&main_function_name),
            ]
        })
        .collect::<Vec<_>>();

    // the fullscreen triangle is generated from the vertex index
    let vertex_input_state_create_info = vk::PipelineVertexInputStateCreateInfo::default();

    let vertex_input_assembly_state_info = vk::PipelineInputAssemblyStateCreateInfo::default()
        .primitive_restart_enable(false)
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

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
        .depth_test_enable(false)
        .depth_write_enable(false)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    // blending happens in the fragment shaders
    let color_blend_attachment_states = [
        // color
        vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA),
        // normal
        vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA),
    ];

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

    let graphics_pipeline_create_infos = shader_stages
        .iter()
        .map(|stages| {
            vk::GraphicsPipelineCreateInfo::default()
                .stages(stages)
                .vertex_input_state(&vertex_input_state_create_info)
                .input_assembly_state(&vertex_input_assembly_state_info)
                .rasterization_state(&rasterization_state_create_info)
                .multisample_state(&multisample_state_create_info)
                .depth_stencil_state(&depth_stencil_state_create_info)
                .color_blend_state(&color_blend_state)
                .layout(pipeline_layout.vk_pipeline_layout())
                .render_pass(render_pass.vk_render_pass())
                .subpass(0)
                .dynamic_state(&dynamic_state)
                .viewport_state(&viewport_state)
        })
        .collect::<Vec<_>>();

    let pipelines = Pipelines::graphics(&graphics_pipeline_create_infos, device.clone());
    destroy_shader_modules(&device, &shader_modules);
    pipelines
}

fn destroy_shader_modules(device: &ash::Device, shader_modules: &[vk::ShaderModule]) {
    for &shader_module in shader_modules {
        unsafe {
            device.destroy_shader_module(shader_module, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings_are_dense() {
        let bindings = descriptor_set_layout_bindings();
        for (i, binding) in bindings.iter().enumerate() {
            assert_eq!(binding.binding, i as u32);
            assert_eq!(binding.descriptor_count, 1);
        }
        assert_eq!(
            bindings[binding::RANGE as usize].descriptor_type,
            vk::DescriptorType::STORAGE_BUFFER
        );
    }

    #[test]
    fn test_every_mode_has_shaders() {
        let mut paths = RaycastMode::ALL
            .iter()
            .flat_map(|&mode| [compute_shader_path(mode), composite_shader_path(mode)])
            .collect::<Vec<_>>();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 2 * RaycastMode::ALL.len());
    }
}
