mod cache;
mod pipelines;
mod targets;
mod uniforms;

pub use cache::{
    VolumeCache,
    VolumeInfo,
};
pub use uniforms::RaycastUniforms;

use self::{
    cache::{
        transfer_function_needs_upload,
        widen_extents,
    },
    pipelines::{
        binding,
        descriptor_set_layout_bindings,
        RaycastPipelines,
    },
    targets::RenderTargets,
};
use super::{
    chain::{
        bounding_box::BoundingBoxRenderer,
        ChainedRenderer,
    },
    strategy::DrawStrategy,
};
use crate::{
    common::{
        buffer::Buffer,
        camera::TransformParams,
        command_buffer::CommandPool,
        consts::{
            MAX_FRAMES_IN_FLIGHT,
            RAYCAST_LOCAL_SIZE,
        },
        descriptor::{
            pool_sizes,
            DescriptorPool,
            DescriptorSets,
        },
        image_buffer::ImageBuffer,
        uniform_buffer::UniformBuffer,
    },
    texture::{
        texture_sampler::TextureSampler,
        transfer::TransferFunctionTexture,
        volume::VolumeTexture,
    },
    utils::math::div_up,
};
use anyhow::{
    Context,
    Result,
};
use ash::vk;
use raycast_volume::{
    metadata::{
        GridType,
        Metadata,
        ScalarType,
    },
    params::{
        RaycastMode,
        RaycastParams,
    },
    range::{
        RangeFeedback,
        ValueRange,
    },
    scene::ChainDescriptor,
    source::{
        request_frame,
        VolumeExtents,
        VolumeFrame,
        VolumeSource,
    },
    transfer::{
        TransferFunction,
        TransferFunctionSource,
    },
};

/// Bound until the first real frame arrives so that every descriptor stays valid.
fn placeholder_volume(
    queue: vk::Queue,
    command_pool: vk::CommandPool,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    instance: &ash::Instance,
) -> Result<VolumeTexture> {
    let metadata = Metadata {
        grid_type: GridType::Cartesian,
        scalar_type: ScalarType::FloatingPoint,
        scalar_length: 4,
        components: 1,
        resolution: [1, 1, 1],
        origin: [0.0; 3],
        extents: [1.0; 3],
        min_values: vec![0.0],
        max_values: vec![1.0],
        frame_count: 1,
    };
    let data = 0.0f32.to_le_bytes();
    let frame = VolumeFrame {
        frame_id: 0,
        data_hash: 0,
        metadata: &metadata,
        data: &data,
    };
    VolumeTexture::new(
        &frame,
        queue,
        command_pool,
        physical_device,
        device,
        instance,
    )
}

/// Ray casting draw strategy: a chained scene pass, one compute dispatch per frame and a
/// fullscreen composite pass, all specialised by [`RaycastMode`].
pub struct Raycast {
    descriptor_sets: DescriptorSets,
    _descriptor_pool: DescriptorPool,
    uniforms: UniformBuffer<RaycastUniforms>,
    range_buffers: Vec<Buffer>,
    targets: RenderTargets,
    chain: Option<Box<dyn ChainedRenderer>>,
    pipelines: RaycastPipelines,
    volume_texture: VolumeTexture,
    transfer_function_texture: TransferFunctionTexture,
    scene_sampler: TextureSampler,
    command_pool: CommandPool,
    source: Option<Box<dyn VolumeSource>>,
    volume_info: Option<VolumeInfo>,
    cache: VolumeCache,
    params: RaycastParams,
    last_value_range: Option<ValueRange>,
    descriptors_dirty: bool,
    output_format: vk::Format,
    queue: vk::Queue,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    instance: ash::Instance,
}

impl Raycast {
    pub fn new(
        mut source: Box<dyn VolumeSource>,
        params: RaycastParams,
        chain: Option<&ChainDescriptor>,
        extent: vk::Extent2D,
        output_format: vk::Format,
        queue: vk::Queue,
        queue_family_index: u32,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        instance: ash::Instance,
    ) -> Result<Self> {
        params.validate()?;

        log::info!("creating raycast command pool");
        let command_pool = CommandPool::new(queue_family_index, device.clone())?;

        let pipelines = RaycastPipelines::new(output_format, device.clone())?;

        let targets = RenderTargets::new(
            extent,
            output_format,
            &pipelines,
            queue,
            command_pool.vk_command_pool(),
            physical_device,
            device.clone(),
            &instance,
        )?;

        log::info!("creating placeholder volume");
        let volume_texture = placeholder_volume(
            queue,
            command_pool.vk_command_pool(),
            physical_device,
            device.clone(),
            &instance,
        )?;

        log::info!("creating default transfer function");
        let transfer_function_texture = TransferFunctionTexture::new(
            &TransferFunction::grayscale(),
            queue,
            command_pool.vk_command_pool(),
            physical_device,
            device.clone(),
            &instance,
        )?;

        let scene_sampler = TextureSampler::new(vk::Filter::NEAREST, device.clone())?;

        log::info!("creating raycast uniform buffers");
        let uniforms = UniformBuffer::new(
            RaycastUniforms::default(),
            physical_device,
            device.clone(),
            &instance,
        )?;

        log::info!("creating range feedback buffers");
        let mut range_buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let buffer = Buffer::with_data(
                &[RangeFeedback::RESET],
                vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
                physical_device,
                device.clone(),
                &instance,
            )?;
            range_buffers.push(buffer);
        }

        log::info!("creating raycast descriptor pool");
        let max_sets = MAX_FRAMES_IN_FLIGHT as u32;
        let descriptor_pool = DescriptorPool::new(
            max_sets,
            &pool_sizes(&descriptor_set_layout_bindings(), max_sets),
            device.clone(),
        )?;

        log::info!("creating raycast descriptor sets");
        let set_layouts = vec![pipelines.vk_descriptor_set_layout(); MAX_FRAMES_IN_FLIGHT];
        let descriptor_sets =
            DescriptorSets::allocate(&set_layouts, &descriptor_pool, device.clone())?;

        let chain = match chain {
            Some(descriptor) => {
                log::info!("creating chained bounding box renderer");
                let extents = source.extents(0)?;
                let renderer: Box<dyn ChainedRenderer> = Box::new(BoundingBoxRenderer::new(
                    extents.bounding_box,
                    descriptor.padding,
                    descriptor.color,
                    pipelines.scene_render_pass(),
                    physical_device,
                    device.clone(),
                    &instance,
                )?);
                Some(renderer)
            }
            None => None,
        };

        let raycast = Self {
            descriptor_sets,
            _descriptor_pool: descriptor_pool,
            uniforms,
            range_buffers,
            targets,
            chain,
            pipelines,
            volume_texture,
            transfer_function_texture,
            scene_sampler,
            command_pool,
            source: Some(source),
            volume_info: None,
            cache: VolumeCache::default(),
            params,
            last_value_range: None,
            descriptors_dirty: false,
            output_format,
            queue,
            physical_device,
            device,
            instance,
        };
        raycast.write_descriptor_sets();
        Ok(raycast)
    }

    /// Extents of the volume at frame `time`, widened by the chained renderer's box.
    pub fn extents(&mut self, time: u32) -> Result<VolumeExtents> {
        let source = self
            .source
            .as_mut()
            .context("no volume source connected")?;
        let extents = source.extents(time)?;
        let chain_box = self.chain.as_ref().map(|chain| chain.bounding_box());
        Ok(widen_extents(extents, chain_box.as_ref()))
    }

    /// Makes sure the volume texture holds `frame_id`. Returns whether it was uploaded.
    pub fn update_volume_data(&mut self, frame_id: u32) -> Result<bool> {
        let source = self
            .source
            .as_mut()
            .context("no volume source connected")?;
        let frame = request_frame(source.as_mut(), frame_id)?;
        if !self.cache.needs_upload(frame.frame_id, frame.data_hash) {
            return Ok(false);
        }

        let volume_texture = VolumeTexture::new(
            &frame,
            self.queue,
            self.command_pool.vk_command_pool(),
            self.physical_device,
            self.device.clone(),
            &self.instance,
        )?;
        let metadata = frame.metadata;
        log::info!(
            "volume frame {}: origin {:?}, extents {:?}, resolution {:?}, value range {:?}",
            frame.frame_id,
            metadata.origin,
            metadata.extents,
            metadata.resolution,
            metadata.value_range()
        );
        self.volume_info = Some(VolumeInfo::new(metadata.clone(), volume_texture.format()));
        self.cache.store(frame.frame_id, frame.data_hash);
        self.volume_texture = volume_texture;
        self.descriptors_dirty = true;
        Ok(true)
    }

    /// Uploads a changed transfer function. Modes without a transfer function skip the request.
    pub fn update_transfer_function(
        &mut self,
        transfer_function_source: &mut dyn TransferFunctionSource,
    ) -> Result<bool> {
        if !self.params.mode.uses_transfer_function() {
            return Ok(false);
        }
        let Some(transfer_function) = transfer_function_source.request() else {
            log::warn!("transfer function request failed, keeping the previous one");
            return Ok(false);
        };
        if !transfer_function_needs_upload(
            self.params.mode,
            self.transfer_function_texture.version(),
            transfer_function.version,
        ) {
            return Ok(false);
        }
        self.transfer_function_texture = TransferFunctionTexture::new(
            transfer_function,
            self.queue,
            self.command_pool.vk_command_pool(),
            self.physical_device,
            self.device.clone(),
            &self.instance,
        )?;
        self.descriptors_dirty = true;
        Ok(true)
    }

    /// Swaps the volume source. The next `update_volume_data` uploads unconditionally.
    pub fn set_source(&mut self, source: Option<Box<dyn VolumeSource>>) {
        self.source = source;
        self.volume_info = None;
        self.cache.invalidate();
    }

    pub fn params(&self) -> &RaycastParams {
        &self.params
    }

    pub fn set_params(&mut self, params: RaycastParams) -> Result<()> {
        params.validate()?;
        if params.mode != self.params.mode {
            self.last_value_range = None;
        }
        self.params = params;
        Ok(())
    }

    /// Image-wide range of the aggregated values of the last finished frame.
    pub fn last_value_range(&self) -> Option<ValueRange> {
        self.last_value_range
    }

    pub fn volume_info(&self) -> Option<&VolumeInfo> {
        self.volume_info.as_ref()
    }

    /// The frame the source currently holds, for CPU side inspection.
    pub fn volume_frame(&self) -> Option<VolumeFrame<'_>> {
        let source = self.source.as_ref()?;
        source.frame().ok()
    }

    fn write_descriptor_sets(&self) {
        log::info!("updating raycast descriptor sets");
        for frame_i in 0..MAX_FRAMES_IN_FLIGHT {
            let descriptor_set = self.descriptor_sets.vk_descriptor_set(frame_i);

            let uniform_buffer_info = [vk::DescriptorBufferInfo::default()
                .buffer(self.uniforms.vk_buffer(frame_i))
                .offset(0)
                .range(self.uniforms.type_size())];
            let volume_image_info = [vk::DescriptorImageInfo::default()
                .sampler(self.volume_texture.vk_sampler())
                .image_view(self.volume_texture.image_view())
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];
            let transfer_function_image_info = [vk::DescriptorImageInfo::default()
                .sampler(self.transfer_function_texture.vk_sampler())
                .image_view(self.transfer_function_texture.image_view())
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];
            let scene_color_image_info = [vk::DescriptorImageInfo::default()
                .sampler(self.scene_sampler.vk_sampler())
                .image_view(self.targets.scene_color.image_view())
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];
            let scene_depth_image_info = [vk::DescriptorImageInfo::default()
                .sampler(self.scene_sampler.vk_sampler())
                .image_view(self.targets.scene_depth.image_view())
                .image_layout(vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL)];
            let storage_image_info = |image: &ImageBuffer| {
                [vk::DescriptorImageInfo::default()
                    .image_view(image.image_view())
                    .image_layout(vk::ImageLayout::GENERAL)]
            };
            let color_image_info = storage_image_info(&self.targets.color);
            let normal_image_info = storage_image_info(&self.targets.normal);
            let depth_image_info = storage_image_info(&self.targets.depth);
            let range_buffer_info = [vk::DescriptorBufferInfo::default()
                .buffer(self.range_buffers[frame_i].vk_buffer())
                .offset(0)
                .range(vk::WHOLE_SIZE)];

            let write = |dst_binding: u32, descriptor_type: vk::DescriptorType| {
                vk::WriteDescriptorSet::default()
                    .dst_set(descriptor_set)
                    .dst_binding(dst_binding)
                    .dst_array_element(0)
                    .descriptor_type(descriptor_type)
            };
            let descriptor_writes = [
                write(binding::UNIFORMS, vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&uniform_buffer_info),
                write(binding::VOLUME, vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&volume_image_info),
                write(
                    binding::TRANSFER_FUNCTION,
                    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                )
                .image_info(&transfer_function_image_info),
                write(binding::SCENE_COLOR, vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&scene_color_image_info),
                write(binding::SCENE_DEPTH, vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&scene_depth_image_info),
                write(binding::COLOR, vk::DescriptorType::STORAGE_IMAGE)
                    .image_info(&color_image_info),
                write(binding::NORMAL, vk::DescriptorType::STORAGE_IMAGE)
                    .image_info(&normal_image_info),
                write(binding::DEPTH, vk::DescriptorType::STORAGE_IMAGE)
                    .image_info(&depth_image_info),
                write(binding::RANGE, vk::DescriptorType::STORAGE_BUFFER)
                    .buffer_info(&range_buffer_info),
            ];

            unsafe {
                self.device.update_descriptor_sets(&descriptor_writes, &[]);
            }
        }
    }

    fn full_viewport(&self, command_buffer: vk::CommandBuffer) {
        let extent = self.targets.extent();
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        }];
        let viewports = [vk::Viewport::default()
            .x(0.0)
            .y(0.0)
            .width(extent.width as f32)
            .height(extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0)];
        unsafe {
            self.device.cmd_set_scissor(command_buffer, 0, &scissors);
            self.device.cmd_set_viewport(command_buffer, 0, &viewports);
        }
    }

    fn record_chain_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        transform: &TransformParams,
    ) -> Result<()> {
        let clear_values = [
            // color
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.params.background,
                },
            },
            // depth
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];
        let render_pass_begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.pipelines.scene_render_pass())
            .framebuffer(self.targets.scene_framebuffer().vk_framebuffer())
            .render_area(self.targets.scene_framebuffer().render_area())
            .clear_values(&clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_begin_info,
                vk::SubpassContents::INLINE,
            );
        }
        self.full_viewport(command_buffer);
        let result = match &self.chain {
            Some(chain) => chain.draw(command_buffer, &transform.view_proj),
            None => Ok(()),
        };
        unsafe {
            self.device.cmd_end_render_pass(command_buffer);
        }
        result
    }

    fn record_range_reset(&self, command_buffer: vk::CommandBuffer, frame_index: usize) {
        let range_buffer = self.range_buffers[frame_index].vk_buffer();
        let reset = RangeFeedback::RESET;
        unsafe {
            self.device
                .cmd_fill_buffer(command_buffer, range_buffer, 0, 4, reset.min);
            self.device
                .cmd_fill_buffer(command_buffer, range_buffer, 4, 4, reset.max);
        }
        let barriers = [vk::BufferMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::TRANSFER)
            .src_access_mask(vk::AccessFlags2::TRANSFER_WRITE)
            .dst_stage_mask(vk::PipelineStageFlags2::COMPUTE_SHADER)
            .dst_access_mask(
                vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE,
            )
            .buffer(range_buffer)
            .offset(0)
            .size(vk::WHOLE_SIZE)];
        let dependency_info = vk::DependencyInfo::default().buffer_memory_barriers(&barriers);
        unsafe {
            self.device
                .cmd_pipeline_barrier2(command_buffer, &dependency_info);
        }
    }
}

impl DrawStrategy for Raycast {
    fn draw(
        &mut self,
        command_buffer: vk::CommandBuffer,
        frame_index: usize,
        transform: &TransformParams,
    ) -> Result<()> {
        if self.descriptors_dirty {
            self.write_descriptor_sets();
            self.descriptors_dirty = false;
        }
        let mode = self.params.mode;
        let extent = self.targets.extent();
        let descriptor_sets = [self.descriptor_sets.vk_descriptor_set(frame_index)];

        log::debug!("storage images: composite read -> raycast write");
        {
            let barriers = self.targets.storage_barriers(
                vk::PipelineStageFlags2::FRAGMENT_SHADER,
                vk::AccessFlags2::SHADER_STORAGE_READ,
                vk::PipelineStageFlags2::COMPUTE_SHADER,
                vk::AccessFlags2::SHADER_STORAGE_WRITE,
            );
            let dependency_info = vk::DependencyInfo::default().image_memory_barriers(&barriers);
            unsafe {
                self.device
                    .cmd_pipeline_barrier2(command_buffer, &dependency_info);
            }
        }

        log::debug!("draw chained scene");
        self.record_chain_pass(command_buffer, transform)?;

        log::debug!("update raycast uniforms");
        let uniforms = RaycastUniforms::new(
            transform,
            self.volume_info.as_ref(),
            &self.params,
            extent,
            self.chain.is_some(),
        );
        self.uniforms.update(frame_index, &uniforms)?;

        if mode == RaycastMode::Aggregate {
            log::debug!("reset range feedback");
            self.record_range_reset(command_buffer, frame_index);
        }

        log::debug!("dispatch {} raycast", mode.name());
        unsafe {
            self.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                self.pipelines.compute_pipeline(mode),
            );
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                self.pipelines.vk_pipeline_layout(),
                0,
                &descriptor_sets,
                &[],
            );
            self.device.cmd_dispatch(
                command_buffer,
                div_up(extent.width, RAYCAST_LOCAL_SIZE),
                div_up(extent.height, RAYCAST_LOCAL_SIZE),
                1,
            );
        }

        log::debug!("storage images: raycast write -> composite read");
        {
            let image_barriers = self.targets.storage_barriers(
                vk::PipelineStageFlags2::COMPUTE_SHADER,
                vk::AccessFlags2::SHADER_STORAGE_WRITE,
                vk::PipelineStageFlags2::FRAGMENT_SHADER,
                vk::AccessFlags2::SHADER_STORAGE_READ,
            );
            let buffer_barriers = [vk::BufferMemoryBarrier2::default()
                .src_stage_mask(vk::PipelineStageFlags2::COMPUTE_SHADER)
                .src_access_mask(vk::AccessFlags2::SHADER_STORAGE_WRITE)
                .dst_stage_mask(
                    vk::PipelineStageFlags2::FRAGMENT_SHADER | vk::PipelineStageFlags2::HOST,
                )
                .dst_access_mask(
                    vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::HOST_READ,
                )
                .buffer(self.range_buffers[frame_index].vk_buffer())
                .offset(0)
                .size(vk::WHOLE_SIZE)];
            let dependency_info = vk::DependencyInfo::default()
                .image_memory_barriers(&image_barriers)
                .buffer_memory_barriers(&buffer_barriers);
            unsafe {
                self.device
                    .cmd_pipeline_barrier2(command_buffer, &dependency_info);
            }
        }

        log::debug!("composite pass");
        let render_pass_begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.pipelines.composite_render_pass())
            .framebuffer(self.targets.composite_framebuffer().vk_framebuffer())
            .render_area(self.targets.composite_framebuffer().render_area());
        unsafe {
            self.device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_begin_info,
                vk::SubpassContents::INLINE,
            );
            self.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipelines.composite_pipeline(mode),
            );
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipelines.vk_pipeline_layout(),
                0,
                &descriptor_sets,
                &[],
            );
        }
        self.full_viewport(command_buffer);
        unsafe {
            // fullscreen triangle
            self.device.cmd_draw(command_buffer, 3, 1, 0, 0);
            self.device.cmd_end_render_pass(command_buffer);
        }

        Ok(())
    }

    fn output_render_target(&self) -> &ImageBuffer {
        &self.targets.output_color
    }

    fn resize(&mut self, extent: vk::Extent2D) -> Result<()> {
        if extent == self.targets.extent() {
            return Ok(());
        }
        self.targets = RenderTargets::new(
            extent,
            self.output_format,
            &self.pipelines,
            self.queue,
            self.command_pool.vk_command_pool(),
            self.physical_device,
            self.device.clone(),
            &self.instance,
        )?;
        self.descriptors_dirty = true;
        Ok(())
    }

    fn frame_finished(&mut self, frame_index: usize) -> Result<()> {
        if self.params.mode == RaycastMode::Aggregate {
            let feedback: RangeFeedback = self.range_buffers[frame_index].read_pod()?;
            self.last_value_range = feedback.decode();
        }
        Ok(())
    }
}
