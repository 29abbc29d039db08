//! Frame synchronization primitives
//!
//! RAII wrappers for semaphores and fences plus the per-frame bundles that
//! let CPU recording run ahead of the GPU by [`MAX_FRAMES_IN_FLIGHT`] frames.

use ash::{vk, Device};

use crate::vulkan::{VulkanError, VulkanResult};

/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Next frame slot after `current`, wrapping at `count`
pub(crate) fn next_frame(current: usize, count: usize) -> usize {
    (current + 1) % count
}

/// Binary semaphore with RAII cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create an unsignaled semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, semaphore })
    }

    /// Raw semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, signaled when `signaled` so the first frame's wait
    /// does not block forever
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe {
            device
                .create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, fence })
    }

    /// Block until the fence signals
    pub fn wait(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(VulkanError::Api)
        }
    }

    /// Return the fence to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.fence])
                .map_err(VulkanError::Api)
        }
    }

    /// Raw fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects for one in-flight frame
pub struct FrameSync {
    /// Signaled when the acquired swapchain image is ready to render to
    pub image_available: Semaphore,
    /// Signaled when rendering to the image has finished
    pub render_finished: Semaphore,
    /// Signaled when the GPU has consumed this frame's command buffer
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the full sync bundle; the fence starts signaled
    pub fn new(device: Device) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device, true)?,
        })
    }
}

/// Rotating set of per-frame sync bundles
pub struct FrameSynchronizer {
    frames: Vec<FrameSync>,
    current: usize,
}

impl FrameSynchronizer {
    /// Create sync bundles for [`MAX_FRAMES_IN_FLIGHT`] frames
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let frames = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| FrameSync::new(device.clone()))
            .collect::<VulkanResult<Vec<_>>>()?;
        Ok(Self { frames, current: 0 })
    }

    /// Sync bundle for the current frame slot
    pub fn current(&self) -> &FrameSync {
        &self.frames[self.current]
    }

    /// Index of the current frame slot
    pub fn current_frame(&self) -> usize {
        self.current
    }

    /// Rotate to the next frame slot
    pub fn advance(&mut self) {
        self.current = next_frame(self.current, self.frames.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_frame_cycles_through_all_slots() {
        let mut frame = 0;
        let mut visited = Vec::new();
        for _ in 0..MAX_FRAMES_IN_FLIGHT * 2 {
            visited.push(frame);
            frame = next_frame(frame, MAX_FRAMES_IN_FLIGHT);
        }
        assert_eq!(visited, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_next_frame_wraps_at_count() {
        assert_eq!(next_frame(MAX_FRAMES_IN_FLIGHT - 1, MAX_FRAMES_IN_FLIGHT), 0);
        assert_eq!(next_frame(2, 3), 0);
        assert_eq!(next_frame(0, 3), 1);
    }
}
