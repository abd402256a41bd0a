use super::{
    device::QueueFamilyIndices,
    surface::Surface,
};
use crate::common::consts::MAX_FRAMES_IN_FLIGHT;
use anyhow::{
    Context,
    Result,
};
use ash::vk;
use winit::dpi::PhysicalSize;

pub struct Swapchain {
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    swapchain_images: Vec<vk::Image>,
    swapchain_format: vk::Format,
    swapchain_extent: vk::Extent2D,
}

impl Swapchain {
    pub fn new(
        instance: &ash::Instance,
        device: &ash::Device,
        physical_device: vk::PhysicalDevice,
        surface: &Surface,
        queue_family: &QueueFamilyIndices,
        size: PhysicalSize<u32>,
    ) -> Result<Self> {
        Self::create(
            instance,
            device,
            physical_device,
            surface,
            queue_family,
            size,
            vk::SwapchainKHR::null(),
        )
    }

    /// Replaces the swapchain after a resize. Its images are only ever copy targets.
    /// The caller waits for the device to be idle.
    pub fn recreate(
        &mut self,
        instance: &ash::Instance,
        device: &ash::Device,
        physical_device: vk::PhysicalDevice,
        surface: &Surface,
        queue_family: &QueueFamilyIndices,
        size: PhysicalSize<u32>,
    ) -> Result<()> {
        *self = Self::create(
            instance,
            device,
            physical_device,
            surface,
            queue_family,
            size,
            self.swapchain,
        )?;
        Ok(())
    }

    fn create(
        instance: &ash::Instance,
        device: &ash::Device,
        physical_device: vk::PhysicalDevice,
        surface: &Surface,
        queue_family: &QueueFamilyIndices,
        size: PhysicalSize<u32>,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self> {
        let swapchain_support = surface.support(physical_device)?;
        let surface_format = choose_swapchain_format(&swapchain_support.formats)?;
        let present_mode = choose_swapchain_present_mode(&swapchain_support.present_modes);
        let extent = choose_swapchain_extent(&swapchain_support.capabilities, size);
        let image_count = choose_image_count(&swapchain_support.capabilities);

        let graphics_compute_family = queue_family.graphics_compute()?;
        let present_family = queue_family.present()?;
        let (image_sharing_mode, queue_family_indices) =
            if graphics_compute_family != present_family {
                (
                    vk::SharingMode::CONCURRENT,
                    vec![graphics_compute_family, present_family],
                )
            } else {
                (vk::SharingMode::EXCLUSIVE, vec![])
            };

        let swapchain_create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.vk_surface())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(image_sharing_mode)
            .queue_family_indices(queue_family_indices.as_slice())
            .pre_transform(swapchain_support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain_loader = ash::khr::swapchain::Device::new(instance, device);
        let swapchain = unsafe { swapchain_loader.create_swapchain(&swapchain_create_info, None)? };

        let swapchain_images = unsafe { swapchain_loader.get_swapchain_images(swapchain)? };

        log::info!(
            "swapchain: {} images, {:?}, {}x{}",
            swapchain_images.len(),
            surface_format.format,
            extent.width,
            extent.height
        );
        Ok(Swapchain {
            swapchain_loader,
            swapchain,
            swapchain_format: surface_format.format,
            swapchain_extent: extent,
            swapchain_images,
        })
    }

    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    pub fn vk_swapchain(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn vk_swapchain_image(&self, image_index: u32) -> vk::Image {
        self.swapchain_images[image_index as usize]
    }

    pub fn vk_swapchain_format(&self) -> vk::Format {
        self.swapchain_format
    }

    pub fn vk_swapchain_extent(&self) -> vk::Extent2D {
        self.swapchain_extent
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.swapchain_loader
                .destroy_swapchain(self.swapchain, None);
        }
    }
}

fn choose_swapchain_format(
    available_formats: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR> {
    // the output images are copied, not rendered, so a UNORM target keeps values untouched
    for available_format in available_formats {
        if available_format.format == vk::Format::B8G8R8A8_UNORM
            && available_format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        {
            return Ok(*available_format);
        }
    }

    available_formats
        .first()
        .copied()
        .context("surface reports no formats")
}

fn choose_swapchain_present_mode(
    available_present_modes: &[vk::PresentModeKHR],
) -> vk::PresentModeKHR {
    if available_present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = (MAX_FRAMES_IN_FLIGHT as u32).max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

fn choose_swapchain_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    size: PhysicalSize<u32>,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D::default()
            .width(size.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ))
            .height(size.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_follows_surface() {
        let mut capabilities = vk::SurfaceCapabilitiesKHR::default();
        capabilities.current_extent = vk::Extent2D {
            width: 640,
            height: 480,
        };
        let extent = choose_swapchain_extent(&capabilities, PhysicalSize::new(800, 600));
        assert_eq!((extent.width, extent.height), (640, 480));

        capabilities.current_extent.width = u32::MAX;
        capabilities.min_image_extent = vk::Extent2D {
            width: 1,
            height: 1,
        };
        capabilities.max_image_extent = vk::Extent2D {
            width: 700,
            height: 700,
        };
        let extent = choose_swapchain_extent(&capabilities, PhysicalSize::new(800, 600));
        assert_eq!((extent.width, extent.height), (700, 600));
    }

    #[test]
    fn test_image_count() {
        let mut capabilities = vk::SurfaceCapabilitiesKHR::default();
        capabilities.min_image_count = 3;
        assert_eq!(choose_image_count(&capabilities), 3);
        capabilities.min_image_count = 1;
        capabilities.max_image_count = 1;
        assert_eq!(choose_image_count(&capabilities), 1);
    }

    #[test]
    fn test_format_preference() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(
            choose_swapchain_format(&formats).unwrap().format,
            vk::Format::B8G8R8A8_UNORM
        );
        assert_eq!(
            choose_swapchain_format(&formats[..1]).unwrap().format,
            vk::Format::R8G8B8A8_SRGB
        );
        assert!(choose_swapchain_format(&[]).is_err());
    }
}
