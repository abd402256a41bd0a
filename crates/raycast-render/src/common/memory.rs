use anyhow::{
    Context,
    Result,
};
use ash::vk;

/// First memory type allowed by `type_filter` that has all of `required` set.
pub fn memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let count = memory_properties.memory_type_count as usize;
    memory_properties.memory_types[..count]
        .iter()
        .enumerate()
        .find(|(i, memory_type)| {
            type_filter & (1 << i) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|(i, _)| i as u32)
}

/// Dedicated allocation satisfying `requirements`. The caller binds and frees it.
pub fn allocate_memory(
    requirements: &vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
    instance: &ash::Instance,
) -> Result<vk::DeviceMemory> {
    let memory_properties =
        unsafe { instance.get_physical_device_memory_properties(physical_device) };
    let index = memory_type_index(&memory_properties, requirements.memory_type_bits, properties)
        .with_context(|| {
            format!(
                "no memory type with {:?} in filter {:#b}",
                properties, requirements.memory_type_bits
            )
        })?;
    let allocate_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(index);
    Ok(unsafe { device.allocate_memory(&allocate_info, None)? })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (i, &flag) in flags.iter().enumerate() {
            properties.memory_types[i].property_flags = flag;
        }
        properties
    }

    #[test]
    fn test_memory_type_index() {
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let properties = properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL, host]);

        assert_eq!(
            memory_type_index(&properties, 0b11, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Some(0)
        );
        assert_eq!(
            memory_type_index(&properties, 0b11, vk::MemoryPropertyFlags::HOST_VISIBLE),
            Some(1)
        );
        // filtered out by the resource
        assert_eq!(
            memory_type_index(&properties, 0b01, vk::MemoryPropertyFlags::HOST_VISIBLE),
            None
        );
    }
}
