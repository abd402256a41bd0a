use crate::common::consts::MAX_FRAMES_IN_FLIGHT;
use anyhow::Result;
use ash::vk;

pub struct SyncObjects {
    image_available_semaphores: Vec<vk::Semaphore>,
    render_finished_semaphores: Vec<vk::Semaphore>,
    inflight_fences: Vec<vk::Fence>,
    device: ash::Device,
}

impl SyncObjects {
    pub fn new(device: ash::Device) -> Result<Self> {
        let semaphore_create_info = vk::SemaphoreCreateInfo::default();
        let fence_create_info = vk::FenceCreateInfo::default();

        let mut sync_objects = Self {
            image_available_semaphores: Vec::with_capacity(MAX_FRAMES_IN_FLIGHT),
            render_finished_semaphores: Vec::with_capacity(MAX_FRAMES_IN_FLIGHT),
            inflight_fences: Vec::with_capacity(MAX_FRAMES_IN_FLIGHT),
            device,
        };

        // pushed one by one so that a failure still releases what was created
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            unsafe {
                let semaphore = sync_objects
                    .device
                    .create_semaphore(&semaphore_create_info, None)?;
                sync_objects.image_available_semaphores.push(semaphore);
                let semaphore = sync_objects
                    .device
                    .create_semaphore(&semaphore_create_info, None)?;
                sync_objects.render_finished_semaphores.push(semaphore);
                let fence = sync_objects
                    .device
                    .create_fence(&fence_create_info, None)?;
                sync_objects.inflight_fences.push(fence);
            }
        }

        Ok(sync_objects)
    }

    pub fn image_available_semaphore(&self, frame_index: usize) -> vk::Semaphore {
        self.image_available_semaphores[frame_index]
    }

    pub fn render_finished_semaphore(&self, frame_index: usize) -> vk::Semaphore {
        self.render_finished_semaphores[frame_index]
    }

    pub fn inflight_fence(&self, frame_index: usize) -> vk::Fence {
        self.inflight_fences[frame_index]
    }
}

impl Drop for SyncObjects {
    fn drop(&mut self) {
        unsafe {
            for &semaphore in self.image_available_semaphores.iter() {
                self.device.destroy_semaphore(semaphore, None);
            }
            for &semaphore in self.render_finished_semaphores.iter() {
                self.device.destroy_semaphore(semaphore, None);
            }
            for &fence in self.inflight_fences.iter() {
                self.device.destroy_fence(fence, None);
            }
        }
    }
}
