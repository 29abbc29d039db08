//! GPU memory allocation via the Vulkan Memory Allocator
//!
//! Thin wrapper over `vk_mem::Allocator` that translates results into
//! [`VulkanError`] and centralizes the unsafe allocation calls. Buffer and
//! image wrappers hold an `Arc` of this type so the allocator outlives
//! every allocation it made.

use ash::vk;
use vk_mem::Alloc;

use crate::vulkan::{VulkanError, VulkanResult};

/// Owned memory allocator shared by all GPU resources
pub struct GpuAllocator {
    allocator: vk_mem::Allocator,
}

impl GpuAllocator {
    /// Create an allocator for the given device
    pub fn new(
        instance: &ash::Instance,
        device: &ash::Device,
        physical_device: vk::PhysicalDevice,
    ) -> VulkanResult<Self> {
        let create_info = vk_mem::AllocatorCreateInfo::new(instance, device, physical_device);
        let allocator = vk_mem::Allocator::new(create_info).map_err(VulkanError::Api)?;
        Ok(Self { allocator })
    }

    /// Create a buffer with memory bound according to `allocation_info`
    pub fn create_buffer(
        &self,
        buffer_info: &vk::BufferCreateInfo,
        allocation_info: &vk_mem::AllocationCreateInfo,
    ) -> VulkanResult<(vk::Buffer, vk_mem::Allocation)> {
        unsafe {
            self.allocator
                .create_buffer(buffer_info, allocation_info)
                .map_err(VulkanError::Api)
        }
    }

    /// Destroy a buffer and free its memory
    pub fn destroy_buffer(&self, buffer: vk::Buffer, allocation: &mut vk_mem::Allocation) {
        unsafe {
            self.allocator.destroy_buffer(buffer, allocation);
        }
    }

    /// Create an image with memory bound according to `allocation_info`
    pub fn create_image(
        &self,
        image_info: &vk::ImageCreateInfo,
        allocation_info: &vk_mem::AllocationCreateInfo,
    ) -> VulkanResult<(vk::Image, vk_mem::Allocation)> {
        unsafe {
            self.allocator
                .create_image(image_info, allocation_info)
                .map_err(VulkanError::Api)
        }
    }

    /// Destroy an image and free its memory
    pub fn destroy_image(&self, image: vk::Image, allocation: &mut vk_mem::Allocation) {
        unsafe {
            self.allocator.destroy_image(image, allocation);
        }
    }

    /// Map an allocation into host address space
    pub fn map_memory(&self, allocation: &mut vk_mem::Allocation) -> VulkanResult<*mut u8> {
        unsafe { self.allocator.map_memory(allocation).map_err(VulkanError::Api) }
    }

    /// Unmap a previously mapped allocation
    pub fn unmap_memory(&self, allocation: &mut vk_mem::Allocation) {
        unsafe {
            self.allocator.unmap_memory(allocation);
        }
    }
}
