//! Command pool and command buffer management
//!
//! One pool on the graphics family with RESET_COMMAND_BUFFER so per-frame
//! buffers can be re-recorded individually. Swapchain recreation frees and
//! reallocates the per-frame buffers rather than resetting the whole pool.

use ash::{vk, Device};

use crate::vulkan::{VulkanError, VulkanResult, MAX_FRAMES_IN_FLIGHT};

/// Command pool wrapper owning one primary command buffer per in-flight frame
pub struct CommandBufferManager {
    device: Device,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    graphics_queue: vk::Queue,
}

impl CommandBufferManager {
    /// Create a pool on `queue_family_index` and allocate the per-frame
    /// buffers
    pub fn new(
        device: Device,
        queue_family_index: u32,
        graphics_queue: vk::Queue,
    ) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device
                .create_command_pool(&pool_create_info, None)
                .map_err(VulkanError::Api)?
        };

        let command_buffers =
            match Self::allocate_buffers(&device, command_pool, MAX_FRAMES_IN_FLIGHT as u32) {
                Ok(buffers) => buffers,
                Err(err) => {
                    unsafe { device.destroy_command_pool(command_pool, None) };
                    return Err(err);
                }
            };

        Ok(Self {
            device,
            command_pool,
            command_buffers,
            graphics_queue,
        })
    }

    fn allocate_buffers(
        device: &Device,
        pool: vk::CommandPool,
        count: u32,
    ) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)
        }
    }

    /// Command buffer for in-flight frame `frame`
    pub fn command_buffer(&self, frame: usize) -> vk::CommandBuffer {
        self.command_buffers[frame]
    }

    /// Reset the per-frame buffer so it can be recorded again
    pub fn reset(&self, frame: usize) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(
                    self.command_buffers[frame],
                    vk::CommandBufferResetFlags::empty(),
                )
                .map_err(VulkanError::Api)
        }
    }

    /// Free and reallocate the per-frame command buffers.
    ///
    /// Used during swapchain recreation; the caller must have ensured the
    /// buffers are no longer pending execution.
    pub fn recreate_command_buffers(&mut self) -> VulkanResult<()> {
        unsafe {
            self.device
                .free_command_buffers(self.command_pool, &self.command_buffers);
        }
        self.command_buffers =
            Self::allocate_buffers(&self.device, self.command_pool, MAX_FRAMES_IN_FLIGHT as u32)?;
        Ok(())
    }

    /// Record and synchronously submit a one-off command buffer.
    ///
    /// Allocates a transient buffer, records `record` into it, submits on the
    /// graphics queue and waits for the queue to drain before freeing it.
    pub fn submit_one_time<F>(&self, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let buffers = Self::allocate_buffers(&self.device, self.command_pool, 1)?;
        let command_buffer = buffers[0];

        let result = self.submit_one_time_inner(command_buffer, record);

        unsafe {
            self.device
                .free_command_buffers(self.command_pool, &buffers);
        }

        result
    }

    fn submit_one_time_inner<F>(
        &self,
        command_buffer: vk::CommandBuffer,
        record: F,
    ) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        record(&self.device, command_buffer);

        unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
            self.device
                .queue_submit(self.graphics_queue, &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::Api)?;
            self.device
                .queue_wait_idle(self.graphics_queue)
                .map_err(VulkanError::Api)?;
        }

        Ok(())
    }
}

impl Drop for CommandBufferManager {
    fn drop(&mut self) {
        unsafe {
            // All command buffers must be finished before the pool goes away
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
