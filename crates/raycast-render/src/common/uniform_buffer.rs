use super::{
    buffer::Buffer,
    consts::MAX_FRAMES_IN_FLIGHT,
};
use anyhow::Result;
use ash::vk;
use bytemuck::Pod;

/// One host visible uniform buffer per frame in flight.
pub struct UniformBuffer<T: Pod> {
    buffers: Vec<Buffer>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Pod> UniformBuffer<T> {
    pub fn new(
        data: T,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        instance: &ash::Instance,
    ) -> Result<Self> {
        let mut buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let buffer = Buffer::with_data(
                std::slice::from_ref(&data),
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                physical_device,
                device.clone(),
                instance,
            )?;
            buffers.push(buffer);
        }
        Ok(Self {
            buffers,
            _marker: std::marker::PhantomData,
        })
    }

    pub fn vk_buffer(&self, frame_index: usize) -> vk::Buffer {
        self.buffers[frame_index].vk_buffer()
    }

    pub fn update(&self, frame_index: usize, data: &T) -> Result<()> {
        self.buffers[frame_index].write_pod(data)
    }

    pub fn type_size(&self) -> vk::DeviceSize {
        std::mem::size_of::<T>() as vk::DeviceSize
    }
}
