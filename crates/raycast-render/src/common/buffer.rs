use super::memory::allocate_memory;
use anyhow::{
    ensure,
    Result,
};
use ash::vk;
use bytemuck::Pod;

/// A buffer with its own allocation. Host visible buffers stay mapped for their whole lifetime.
pub struct Buffer {
    buffer: vk::Buffer,
    device: ash::Device,
    device_memory: vk::DeviceMemory,
    memory_property_flags: vk::MemoryPropertyFlags,
    mapped_memory: *mut std::ffi::c_void,
    size: vk::DeviceSize,
}

impl Buffer {
    pub fn new(
        size: vk::DeviceSize,
        usage_flags: vk::BufferUsageFlags,
        memory_property_flags: vk::MemoryPropertyFlags,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        instance: &ash::Instance,
    ) -> Result<Self> {
        ensure!(size > 0, "buffers must not be empty");
        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage_flags)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&create_info, None)? };
        let mem_requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let device_memory = match allocate_memory(
            &mem_requirements,
            memory_property_flags,
            physical_device,
            &device,
            instance,
        ) {
            Ok(device_memory) => device_memory,
            Err(error) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(error);
            }
        };

        let mut buffer = Self {
            buffer,
            device,
            device_memory,
            memory_property_flags,
            mapped_memory: std::ptr::null_mut(),
            size,
        };
        unsafe {
            buffer
                .device
                .bind_buffer_memory(buffer.buffer, buffer.device_memory, 0)?;
        }
        if memory_property_flags.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
            buffer.mapped_memory = unsafe {
                buffer.device.map_memory(
                    buffer.device_memory,
                    0,
                    vk::WHOLE_SIZE,
                    vk::MemoryMapFlags::empty(),
                )?
            };
        }
        Ok(buffer)
    }

    /// Host visible buffer filled with `data`.
    pub fn with_data<T: Pod>(
        data: &[T],
        usage_flags: vk::BufferUsageFlags,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        instance: &ash::Instance,
    ) -> Result<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let buffer = Self::new(
            bytes.len() as vk::DeviceSize,
            usage_flags,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            physical_device,
            device,
            instance,
        )?;
        buffer.write(bytes)?;
        Ok(buffer)
    }

    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        ensure!(
            !self.mapped_memory.is_null(),
            "buffer is not host visible"
        );
        ensure!(
            bytes.len() as vk::DeviceSize <= self.size,
            "writing {} bytes into a buffer of {} bytes",
            bytes.len(),
            self.size
        );
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped_memory as *mut u8, bytes.len());
        }
        if !self
            .memory_property_flags
            .contains(vk::MemoryPropertyFlags::HOST_COHERENT)
        {
            let mapped_range = [vk::MappedMemoryRange::default()
                .memory(self.device_memory)
                .size(vk::WHOLE_SIZE)];
            unsafe {
                self.device.flush_mapped_memory_ranges(&mapped_range)?;
            }
        }
        Ok(())
    }

    pub fn write_pod<T: Pod>(&self, value: &T) -> Result<()> {
        self.write(bytemuck::bytes_of(value))
    }

    /// Reads a `T` from the start of the mapping. The caller makes sure the GPU is done with it.
    pub fn read_pod<T: Pod>(&self) -> Result<T> {
        ensure!(
            !self.mapped_memory.is_null(),
            "buffer is not host visible"
        );
        ensure!(
            std::mem::size_of::<T>() as vk::DeviceSize <= self.size,
            "buffer too small"
        );
        if !self
            .memory_property_flags
            .contains(vk::MemoryPropertyFlags::HOST_COHERENT)
        {
            let mapped_range = [vk::MappedMemoryRange::default()
                .memory(self.device_memory)
                .size(vk::WHOLE_SIZE)];
            unsafe {
                self.device.invalidate_mapped_memory_ranges(&mapped_range)?;
            }
        }
        let bytes = unsafe {
            std::slice::from_raw_parts(self.mapped_memory as *const u8, std::mem::size_of::<T>())
        };
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    pub fn vk_buffer(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if !self.mapped_memory.is_null() {
                self.device.unmap_memory(self.device_memory);
            }
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.device_memory, None);
        }
    }
}
