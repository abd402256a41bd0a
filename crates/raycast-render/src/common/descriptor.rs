use anyhow::Result;
use ash::vk;

/// Binding `index` of `descriptor_type`, one descriptor, visible to `stage_flags`.
pub fn layout_binding(
    index: u32,
    descriptor_type: vk::DescriptorType,
    stage_flags: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding<'static> {
    vk::DescriptorSetLayoutBinding::default()
        .binding(index)
        .descriptor_type(descriptor_type)
        .descriptor_count(1)
        .stage_flags(stage_flags)
}

/// Pool sizes for `set_count` sets laid out by `bindings`.
pub fn pool_sizes(
    bindings: &[vk::DescriptorSetLayoutBinding],
    set_count: u32,
) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for binding in bindings {
        let count = binding.descriptor_count * set_count;
        match sizes.iter_mut().find(|size| size.ty == binding.descriptor_type) {
            Some(size) => size.descriptor_count += count,
            None => sizes.push(
                vk::DescriptorPoolSize::default()
                    .ty(binding.descriptor_type)
                    .descriptor_count(count),
            ),
        }
    }
    sizes
}

pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: ash::Device,
}

impl DescriptorSetLayout {
    pub fn new(bindings: &[vk::DescriptorSetLayoutBinding], device: ash::Device) -> Result<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        let layout = unsafe { device.create_descriptor_set_layout(&create_info, None)? };
        Ok(Self { layout, device })
    }

    pub fn vk_descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Pool whose sets can be freed individually.
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: ash::Device,
}

impl DescriptorPool {
    pub fn new(
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
        device: ash::Device,
    ) -> Result<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);
        let pool = unsafe { device.create_descriptor_pool(&create_info, None)? };
        Ok(Self { pool, device })
    }

    pub fn vk_pool(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Descriptor sets allocated from a [`DescriptorPool`], one per frame in flight.
pub struct DescriptorSets {
    sets: Vec<vk::DescriptorSet>,
    pool: vk::DescriptorPool,
    device: ash::Device,
}

impl DescriptorSets {
    pub fn allocate(
        set_layouts: &[vk::DescriptorSetLayout],
        pool: &DescriptorPool,
        device: ash::Device,
    ) -> Result<Self> {
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool.vk_pool())
            .set_layouts(set_layouts);
        let sets = unsafe { device.allocate_descriptor_sets(&allocate_info)? };
        Ok(Self {
            sets,
            pool: pool.vk_pool(),
            device,
        })
    }

    pub fn vk_descriptor_set(&self, index: usize) -> vk::DescriptorSet {
        self.sets[index]
    }
}

impl Drop for DescriptorSets {
    fn drop(&mut self) {
        unsafe {
            if let Err(error) = self.device.free_descriptor_sets(self.pool, &self.sets) {
                log::error!("failed to free descriptor sets: {}", error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_sizes_merge_types() {
        let bindings = [
            layout_binding(0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::COMPUTE),
            layout_binding(
                1,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::COMPUTE,
            ),
            layout_binding(
                2,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
            ),
        ];
        let sizes = pool_sizes(&bindings, 2);
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 2);
        assert_eq!(sizes[1].descriptor_count, 4);
    }
}
