use crate::common::{
    camera::TransformParams,
    image_buffer::ImageBuffer,
};
use anyhow::Result;
use ash::vk;

pub trait DrawStrategy {
    /// Records the frame into `command_buffer`. The output target ends in
    /// `COLOR_ATTACHMENT_OPTIMAL`.
    fn draw(
        &mut self,
        command_buffer: vk::CommandBuffer,
        frame_index: usize,
        transform: &TransformParams,
    ) -> Result<()>;

    fn output_render_target(&self) -> &ImageBuffer;

    fn resize(&mut self, extent: vk::Extent2D) -> Result<()>;

    /// Called once the fence of `frame_index` has signaled.
    fn frame_finished(&mut self, _frame_index: usize) -> Result<()> {
        Ok(())
    }
}
