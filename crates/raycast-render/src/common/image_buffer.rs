use super::memory::allocate_memory;
use anyhow::Result;
use ash::vk;

pub struct ImageBuffer {
    image: vk::Image,
    image_view: vk::ImageView,
    device: ash::Device,
    format: vk::Format,
    extent: vk::Extent3D,
    device_memory: vk::DeviceMemory,
}

impl ImageBuffer {
    pub fn new(
        image_create_info: &vk::ImageCreateInfo,
        view_type: vk::ImageViewType,
        memory_property_flags: vk::MemoryPropertyFlags,
        aspect_mask: vk::ImageAspectFlags,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        instance: &ash::Instance,
    ) -> Result<Self> {
        let image = unsafe { device.create_image(image_create_info, None)? };
        // owns the image from here on, the view and memory are filled in below
        let mut image_buffer = Self {
            image,
            image_view: vk::ImageView::null(),
            device,
            format: image_create_info.format,
            extent: image_create_info.extent,
            device_memory: vk::DeviceMemory::null(),
        };
        let device = &image_buffer.device;

        let memory_requirements = unsafe { device.get_image_memory_requirements(image) };
        image_buffer.device_memory = allocate_memory(
            &memory_requirements,
            memory_property_flags,
            physical_device,
            device,
            instance,
        )?;

        let bind_infos = [vk::BindImageMemoryInfo::default()
            .image(image)
            .memory(image_buffer.device_memory)
            .memory_offset(0)];
        unsafe {
            device.bind_image_memory2(&bind_infos)?;
        };

        let image_view_create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(image_create_info.format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect_mask)
                    .base_mip_level(0)
                    .level_count(image_create_info.mip_levels)
                    .base_array_layer(0)
                    .layer_count(image_create_info.array_layers),
            );
        image_buffer.image_view = unsafe { device.create_image_view(&image_view_create_info, None)? };

        Ok(image_buffer)
    }

    /// Single mip, single layer 2D image in device local memory.
    pub fn new_2d(
        format: vk::Format,
        extent: vk::Extent2D,
        usage: vk::ImageUsageFlags,
        aspect_mask: vk::ImageAspectFlags,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        instance: &ash::Instance,
    ) -> Result<Self> {
        Self::new(
            &vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(
                    vk::Extent3D::default()
                        .width(extent.width)
                        .height(extent.height)
                        .depth(1),
                )
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .array_layers(1)
                .mip_levels(1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .samples(vk::SampleCountFlags::TYPE_1),
            vk::ImageViewType::TYPE_2D,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            aspect_mask,
            physical_device,
            device,
            instance,
        )
    }

    pub fn image(&self) -> vk::Image {
        self.image
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn extent(&self) -> vk::Extent3D {
        self.extent
    }

    pub fn extent_2d(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.extent.width,
            height: self.extent.height,
        }
    }

    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }
}

impl Drop for ImageBuffer {
    fn drop(&mut self) {
        unsafe {
            if self.image_view != vk::ImageView::null() {
                self.device.destroy_image_view(self.image_view, None);
            }
            self.device.destroy_image(self.image, None);
            if self.device_memory != vk::DeviceMemory::null() {
                self.device.free_memory(self.device_memory, None);
            }
        }
    }
}

pub fn color_subresource_range() -> vk::ImageSubresourceRange {
    subresource_range(vk::ImageAspectFlags::COLOR)
}

pub fn subresource_range(aspect_mask: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

pub fn color_subresource_layers() -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level: 0,
        base_array_layer: 0,
        layer_count: 1,
    }
}
