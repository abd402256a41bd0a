pub mod bounding_box;

use anyhow::Result;
use ash::vk;
use nalgebra_glm::Mat4;
use raycast_volume::bbox::BoundingBox;

/// Renderer whose color and depth the volume is composited against. It draws inside the scene
/// render pass with the viewport already set.
pub trait ChainedRenderer {
    fn bounding_box(&self) -> BoundingBox;

    fn draw(&self, command_buffer: vk::CommandBuffer, view_proj: &Mat4) -> Result<()>;
}
