use crate::common::{
    buffer::Buffer,
    command_buffer::run_single_time_command,
    image_buffer::{
        color_subresource_layers,
        color_subresource_range,
        ImageBuffer,
    },
};
use anyhow::Result;
use ash::vk;

/// Device local image filled once from host memory and left in `SHADER_READ_ONLY_OPTIMAL`.
pub struct Texture {
    image_buffer: ImageBuffer,
}

impl Texture {
    pub fn new(
        bytes: &[u8],
        image_create_info: &vk::ImageCreateInfo,
        view_type: vk::ImageViewType,
        queue: vk::Queue,
        command_pool: vk::CommandPool,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        instance: &ash::Instance,
    ) -> Result<Self> {
        let image_create_info = image_create_info
            .usage(image_create_info.usage | vk::ImageUsageFlags::TRANSFER_DST)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image_buffer = ImageBuffer::new(
            &image_create_info,
            view_type,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::ImageAspectFlags::COLOR,
            physical_device,
            device.clone(),
            instance,
        )?;

        let staging_buffer = Buffer::with_data(
            bytes,
            vk::BufferUsageFlags::TRANSFER_SRC,
            physical_device,
            device.clone(),
            instance,
        )?;

        run_single_time_command(command_pool, queue, &device, |command_buffer| {
            let barrier = vk::ImageMemoryBarrier2::default()
                .src_access_mask(vk::AccessFlags2::empty())
                .dst_access_mask(vk::AccessFlags2::TRANSFER_WRITE)
                .src_stage_mask(vk::PipelineStageFlags2::NONE)
                .dst_stage_mask(vk::PipelineStageFlags2::ALL_TRANSFER)
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image_buffer.image())
                .subresource_range(color_subresource_range());
            unsafe {
                device.cmd_pipeline_barrier2(
                    command_buffer,
                    &vk::DependencyInfo::default().image_memory_barriers(&[barrier]),
                );
            }

            // tightly packed rows and slices
            let region = vk::BufferImageCopy::default()
                .image_extent(image_create_info.extent)
                .image_subresource(color_subresource_layers());
            unsafe {
                device.cmd_copy_buffer_to_image(
                    command_buffer,
                    staging_buffer.vk_buffer(),
                    image_buffer.image(),
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            }

            let barrier = vk::ImageMemoryBarrier2::default()
                .src_access_mask(vk::AccessFlags2::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags2::SHADER_READ)
                .src_stage_mask(vk::PipelineStageFlags2::ALL_TRANSFER)
                .dst_stage_mask(
                    vk::PipelineStageFlags2::COMPUTE_SHADER
                        | vk::PipelineStageFlags2::FRAGMENT_SHADER,
                )
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image_buffer.image())
                .subresource_range(color_subresource_range());
            unsafe {
                device.cmd_pipeline_barrier2(
                    command_buffer,
                    &vk::DependencyInfo::default().image_memory_barriers(&[barrier]),
                );
            }
        })?;

        Ok(Self { image_buffer })
    }

    pub fn image_buffer(&self) -> &ImageBuffer {
        &self.image_buffer
    }

    pub fn image_view(&self) -> vk::ImageView {
        self.image_buffer.image_view()
    }
}
