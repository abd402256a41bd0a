use anyhow::Result;
use ash::vk;

pub struct RenderPass {
    render_pass: vk::RenderPass,
    device: ash::Device,
}

impl RenderPass {
    pub fn new(create_info: &vk::RenderPassCreateInfo, device: ash::Device) -> Result<Self> {
        let render_pass = unsafe { device.create_render_pass(create_info, None)? };
        Ok(Self {
            render_pass,
            device,
        })
    }

    pub fn vk_render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// Single layer framebuffer over `attachments`, compatible with `render_pass`.
pub struct Framebuffer {
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
    device: ash::Device,
}

impl Framebuffer {
    pub fn new(
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
        device: ash::Device,
    ) -> Result<Self> {
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        let framebuffer = unsafe { device.create_framebuffer(&create_info, None)? };
        Ok(Self {
            framebuffer,
            extent,
            device,
        })
    }

    pub fn vk_framebuffer(&self) -> vk::Framebuffer {
        self.framebuffer
    }

    /// Render area covering the whole framebuffer.
    pub fn render_area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
