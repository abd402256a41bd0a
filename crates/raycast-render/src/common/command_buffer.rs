use anyhow::{
    Context,
    Result,
};
use ash::vk;

/// Pool for the graphics and compute queue family. Its buffers can be reset one by one.
pub struct CommandPool {
    command_pool: vk::CommandPool,
    device: ash::Device,
}

impl CommandPool {
    pub fn new(queue_family_index: u32, device: ash::Device) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = unsafe { device.create_command_pool(&create_info, None)? };
        Ok(Self {
            command_pool,
            device,
        })
    }

    pub fn vk_command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    pub fn allocate(&self, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        allocate_primary(&self.device, self.command_pool, count)
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

fn allocate_primary(
    device: &ash::Device,
    command_pool: vk::CommandPool,
    count: u32,
) -> Result<Vec<vk::CommandBuffer>> {
    let allocate_info = vk::CommandBufferAllocateInfo::default()
        .command_buffer_count(count)
        .command_pool(command_pool)
        .level(vk::CommandBufferLevel::PRIMARY);
    Ok(unsafe { device.allocate_command_buffers(&allocate_info)? })
}

fn begin_single_time_command(
    command_pool: vk::CommandPool,
    device: &ash::Device,
) -> Result<vk::CommandBuffer> {
    let command_buffer = allocate_primary(device, command_pool, 1)?
        .into_iter()
        .next()
        .context("failed to allocate command buffer")?;

    let begin_info =
        vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

    unsafe {
        device.begin_command_buffer(command_buffer, &begin_info)?;
    }

    Ok(command_buffer)
}

/// Submits `command_buffer`, waits for the queue and frees it.
fn end_single_time_command(
    command_buffer: vk::CommandBuffer,
    queue: vk::Queue,
    command_pool: vk::CommandPool,
    device: &ash::Device,
) -> Result<()> {
    let command_buffers = [command_buffer];
    let result = unsafe {
        device.end_command_buffer(command_buffer).and_then(|_| {
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            device.queue_submit(queue, &[submit_info], vk::Fence::null())?;
            device.queue_wait_idle(queue)
        })
    };
    unsafe {
        device.free_command_buffers(command_pool, &command_buffers);
    }
    Ok(result?)
}

/// Records `record` into a one time command buffer and runs it to completion.
pub fn run_single_time_command<F>(
    command_pool: vk::CommandPool,
    queue: vk::Queue,
    device: &ash::Device,
    record: F,
) -> Result<()>
where
    F: FnOnce(vk::CommandBuffer),
{
    let command_buffer = begin_single_time_command(command_pool, device)?;
    record(command_buffer);
    end_single_time_command(command_buffer, queue, command_pool, device)
}
