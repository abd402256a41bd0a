use anyhow::Result;
use ash::vk;

pub struct TextureSampler {
    sampler: vk::Sampler,
    device: ash::Device,
}

impl TextureSampler {
    /// Unmipmapped sampler clamping to the edge texels on every axis.
    pub fn new(filter: vk::Filter, device: ash::Device) -> Result<Self> {
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .anisotropy_enable(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK)
            .unnormalized_coordinates(false)
            .max_lod(0.0);

        let sampler = unsafe { device.create_sampler(&create_info, None)? };
        Ok(Self { sampler, device })
    }

    pub fn vk_sampler(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for TextureSampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

/// Whether optimal tiled images of `format` can be sampled with a linear filter.
pub fn supports_linear_filter(
    format: vk::Format,
    physical_device: vk::PhysicalDevice,
    instance: &ash::Instance,
) -> bool {
    let properties =
        unsafe { instance.get_physical_device_format_properties(physical_device, format) };
    properties
        .optimal_tiling_features
        .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
}
