use super::pipelines::{
    RaycastPipelines,
    OUTPUT_NORMAL_FORMAT,
    SCENE_COLOR_FORMAT,
    SCENE_DEPTH_FORMAT,
    STORAGE_COLOR_FORMAT,
    STORAGE_DEPTH_FORMAT,
};
use crate::common::{
    command_buffer::run_single_time_command,
    image_buffer::{
        color_subresource_range,
        ImageBuffer,
    },
    render_pass::Framebuffer,
};
use anyhow::Result;
use ash::vk;

/// Images that depend on the viewport size.
pub struct RenderTargets {
    scene_framebuffer: Framebuffer,
    composite_framebuffer: Framebuffer,
    pub color: ImageBuffer,
    pub normal: ImageBuffer,
    pub depth: ImageBuffer,
    pub scene_color: ImageBuffer,
    pub scene_depth: ImageBuffer,
    pub output_color: ImageBuffer,
    pub output_normal: ImageBuffer,
    extent: vk::Extent2D,
}

impl RenderTargets {
    pub fn new(
        extent: vk::Extent2D,
        output_format: vk::Format,
        pipelines: &RaycastPipelines,
        queue: vk::Queue,
        command_pool: vk::CommandPool,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        instance: &ash::Instance,
    ) -> Result<Self> {
        log::info!(
            "creating raycast render targets {}x{}",
            extent.width,
            extent.height
        );
        let storage_image = |format| {
            ImageBuffer::new_2d(
                format,
                extent,
                vk::ImageUsageFlags::STORAGE,
                vk::ImageAspectFlags::COLOR,
                physical_device,
                device.clone(),
                instance,
            )
        };
        let color = storage_image(STORAGE_COLOR_FORMAT)?;
        let normal = storage_image(STORAGE_COLOR_FORMAT)?;
        let depth = storage_image(STORAGE_DEPTH_FORMAT)?;

        let scene_color = ImageBuffer::new_2d(
            SCENE_COLOR_FORMAT,
            extent,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            vk::ImageAspectFlags::COLOR,
            physical_device,
            device.clone(),
            instance,
        )?;
        let scene_depth = ImageBuffer::new_2d(
            SCENE_DEPTH_FORMAT,
            extent,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            vk::ImageAspectFlags::DEPTH,
            physical_device,
            device.clone(),
            instance,
        )?;
        let output_color = ImageBuffer::new_2d(
            output_format,
            extent,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC,
            vk::ImageAspectFlags::COLOR,
            physical_device,
            device.clone(),
            instance,
        )?;
        let output_normal = ImageBuffer::new_2d(
            OUTPUT_NORMAL_FORMAT,
            extent,
            vk::ImageUsageFlags::COLOR_ATTACHMENT,
            vk::ImageAspectFlags::COLOR,
            physical_device,
            device.clone(),
            instance,
        )?;

        log::info!("transitioning storage images to general layout");
        run_single_time_command(command_pool, queue, &device, |command_buffer| {
            let barriers = [color.image(), normal.image(), depth.image()].map(|image| {
                vk::ImageMemoryBarrier2::default()
                    .src_stage_mask(vk::PipelineStageFlags2::NONE)
                    .src_access_mask(vk::AccessFlags2::NONE)
                    .dst_stage_mask(vk::PipelineStageFlags2::COMPUTE_SHADER)
                    .dst_access_mask(vk::AccessFlags2::SHADER_STORAGE_WRITE)
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(vk::ImageLayout::GENERAL)
                    .image(image)
                    .subresource_range(color_subresource_range())
            });
            let dependency_info = vk::DependencyInfo::default().image_memory_barriers(&barriers);
            unsafe {
                device.cmd_pipeline_barrier2(command_buffer, &dependency_info);
            }
        })?;

        let scene_framebuffer = Framebuffer::new(
            pipelines.scene_render_pass(),
            &[scene_color.image_view(), scene_depth.image_view()],
            extent,
            device.clone(),
        )?;
        let composite_framebuffer = Framebuffer::new(
            pipelines.composite_render_pass(),
            &[output_color.image_view(), output_normal.image_view()],
            extent,
            device,
        )?;

        Ok(Self {
            scene_framebuffer,
            composite_framebuffer,
            color,
            normal,
            depth,
            scene_color,
            scene_depth,
            output_color,
            output_normal,
            extent,
        })
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn scene_framebuffer(&self) -> &Framebuffer {
        &self.scene_framebuffer
    }

    pub fn composite_framebuffer(&self) -> &Framebuffer {
        &self.composite_framebuffer
    }

    /// Barriers for the three storage images between two passes.
    pub fn storage_barriers(
        &self,
        src_stage_mask: vk::PipelineStageFlags2,
        src_access_mask: vk::AccessFlags2,
        dst_stage_mask: vk::PipelineStageFlags2,
        dst_access_mask: vk::AccessFlags2,
    ) -> [vk::ImageMemoryBarrier2<'static>; 3] {
        [self.color.image(), self.normal.image(), self.depth.image()].map(|image| {
            vk::ImageMemoryBarrier2::default()
                .src_stage_mask(src_stage_mask)
                .src_access_mask(src_access_mask)
                .dst_stage_mask(dst_stage_mask)
                .dst_access_mask(dst_access_mask)
                .old_layout(vk::ImageLayout::GENERAL)
                .new_layout(vk::ImageLayout::GENERAL)
                .image(image)
                .subresource_range(color_subresource_range())
        })
    }
}
