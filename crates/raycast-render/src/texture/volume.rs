use super::{
    texture::Texture,
    texture_sampler::{
        supports_linear_filter,
        TextureSampler,
    },
};
use anyhow::{
    ensure,
    Result,
};
use ash::vk;
use raycast_volume::{
    format::VolumeFormat,
    source::VolumeFrame,
};
use std::borrow::Cow;

pub fn vk_format(format: VolumeFormat) -> vk::Format {
    match format {
        VolumeFormat::R32Float => vk::Format::R32_SFLOAT,
        VolumeFormat::R8Unorm => vk::Format::R8_UNORM,
        VolumeFormat::R16Unorm => vk::Format::R16_UNORM,
        VolumeFormat::R16Snorm => vk::Format::R16_SNORM,
    }
}

/// Voxels of the first component, densely packed.
fn first_component<'a>(frame: &VolumeFrame<'a>, format: VolumeFormat) -> Result<Cow<'a, [u8]>> {
    let metadata = frame.metadata;
    ensure!(
        frame.data.len() >= metadata.byte_len(),
        "volume frame {} holds {} bytes, expected {}",
        frame.frame_id,
        frame.data.len(),
        metadata.byte_len()
    );
    let texel_size = format.bytes_per_voxel();
    if metadata.components == 1 {
        return Ok(Cow::Borrowed(&frame.data[..metadata.voxel_count() * texel_size]));
    }
    let stride = texel_size * metadata.components;
    let packed = frame
        .data
        .chunks_exact(stride)
        .take(metadata.voxel_count())
        .flat_map(|voxel| &voxel[..texel_size])
        .copied()
        .collect();
    Ok(Cow::Owned(packed))
}

/// 3D texture holding one volume frame.
pub struct VolumeTexture {
    texture: Texture,
    sampler: TextureSampler,
    format: VolumeFormat,
}

impl VolumeTexture {
    pub fn new(
        frame: &VolumeFrame,
        queue: vk::Queue,
        command_pool: vk::CommandPool,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        instance: &ash::Instance,
    ) -> Result<Self> {
        frame.metadata.validate()?;
        let format = VolumeFormat::from_metadata(frame.metadata)?;
        let texels = first_component(frame, format)?;
        let [width, height, depth] = frame.metadata.resolution;
        log::info!(
            "uploading volume frame {}: {}x{}x{} {:?}",
            frame.frame_id,
            width,
            height,
            depth,
            format
        );

        let image_create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_3D)
            .format(vk_format(format))
            .extent(vk::Extent3D {
                width,
                height,
                depth,
            })
            .usage(vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .array_layers(1)
            .mip_levels(1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .samples(vk::SampleCountFlags::TYPE_1);
        let texture = Texture::new(
            &texels,
            &image_create_info,
            vk::ImageViewType::TYPE_3D,
            queue,
            command_pool,
            physical_device,
            device.clone(),
            instance,
        )?;

        let filter = if supports_linear_filter(vk_format(format), physical_device, instance) {
            vk::Filter::LINEAR
        } else {
            log::warn!(
                "{:?} volumes cannot be filtered linearly on this device, falling back to nearest",
                format
            );
            vk::Filter::NEAREST
        };
        let sampler = TextureSampler::new(filter, device)?;

        Ok(Self {
            texture,
            sampler,
            format,
        })
    }

    pub fn image_view(&self) -> vk::ImageView {
        self.texture.image_view()
    }

    pub fn vk_sampler(&self) -> vk::Sampler {
        self.sampler.vk_sampler()
    }

    pub fn format(&self) -> VolumeFormat {
        self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raycast_volume::metadata::{
        GridType,
        Metadata,
        ScalarType,
    };

    fn metadata(components: usize) -> Metadata {
        Metadata {
            grid_type: GridType::Cartesian,
            scalar_type: ScalarType::UnsignedInteger,
            scalar_length: 1,
            components,
            resolution: [2, 1, 1],
            origin: [0.0; 3],
            extents: [1.0; 3],
            min_values: vec![0.0],
            max_values: vec![255.0],
            frame_count: 1,
        }
    }

    #[test]
    fn test_first_component() {
        let single = metadata(1);
        let data = [1u8, 2];
        let frame = VolumeFrame {
            frame_id: 0,
            data_hash: 0,
            metadata: &single,
            data: &data,
        };
        assert!(matches!(
            first_component(&frame, VolumeFormat::R8Unorm).unwrap(),
            Cow::Borrowed(&[1, 2])
        ));

        let pairs = metadata(2);
        let data = [1u8, 10, 2, 20];
        let frame = VolumeFrame {
            metadata: &pairs,
            data: &data,
            ..frame
        };
        assert_eq!(
            first_component(&frame, VolumeFormat::R8Unorm).unwrap().as_ref(),
            &[1, 2]
        );

        let short = [1u8];
        let frame = VolumeFrame {
            metadata: &single,
            data: &short,
            ..frame
        };
        assert!(first_component(&frame, VolumeFormat::R8Unorm).is_err());
    }

    #[test]
    fn test_vk_format() {
        assert_eq!(vk_format(VolumeFormat::R16Snorm), vk::Format::R16_SNORM);
        assert_eq!(vk_format(VolumeFormat::R32Float), vk::Format::R32_SFLOAT);
    }
}
