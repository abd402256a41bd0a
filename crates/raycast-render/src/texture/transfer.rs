use super::{
    texture::Texture,
    texture_sampler::TextureSampler,
};
use anyhow::{
    ensure,
    Result,
};
use ash::vk;
use raycast_volume::transfer::TransferFunction;

/// 1D RGBA32F lookup texture.
pub struct TransferFunctionTexture {
    texture: Texture,
    sampler: TextureSampler,
    version: u64,
}

impl TransferFunctionTexture {
    pub fn new(
        transfer_function: &TransferFunction,
        queue: vk::Queue,
        command_pool: vk::CommandPool,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        instance: &ash::Instance,
    ) -> Result<Self> {
        ensure!(
            transfer_function.resolution() > 0,
            "transfer function has no texels"
        );
        log::info!(
            "uploading transfer function version {} with {} texels",
            transfer_function.version,
            transfer_function.resolution()
        );
        let image_create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_1D)
            .format(vk::Format::R32G32B32A32_SFLOAT)
            .extent(vk::Extent3D {
                width: transfer_function.resolution() as u32,
                height: 1,
                depth: 1,
            })
            .usage(vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .array_layers(1)
            .mip_levels(1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .samples(vk::SampleCountFlags::TYPE_1);
        let texture = Texture::new(
            bytemuck::cast_slice(&transfer_function.texels),
            &image_create_info,
            vk::ImageViewType::TYPE_1D,
            queue,
            command_pool,
            physical_device,
            device.clone(),
            instance,
        )?;
        let sampler = TextureSampler::new(vk::Filter::LINEAR, device)?;

        Ok(Self {
            texture,
            sampler,
            version: transfer_function.version,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn image_view(&self) -> vk::ImageView {
        self.texture.image_view()
    }

    pub fn vk_sampler(&self) -> vk::Sampler {
        self.sampler.vk_sampler()
    }
}
