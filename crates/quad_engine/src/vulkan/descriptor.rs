//! Descriptor layout, pool and per-frame set management
//!
//! Binding 0 is the per-frame uniform buffer (vertex stage) and binding 1
//! the sampled texture (fragment stage). The pool is sized for exactly one
//! set per in-flight frame; nothing else allocates from it.

use ash::{vk, Device};

use crate::vulkan::buffer::UniformBuffers;
use crate::vulkan::{VulkanError, VulkanResult, MAX_FRAMES_IN_FLIGHT};

/// Descriptor resources with RAII cleanup
pub struct DescriptorManager {
    device: Device,
    layout: vk::DescriptorSetLayout,
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
}

impl DescriptorManager {
    /// Create the layout, pool and one set per in-flight frame
    pub fn new(device: Device) -> VulkanResult<Self> {
        let bindings = [
            vk::DescriptorSetLayoutBinding::builder()
                .binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX)
                .build(),
            vk::DescriptorSetLayoutBinding::builder()
                .binding(1)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT)
                .build(),
        ];

        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let layout = unsafe {
            device
                .create_descriptor_set_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };

        let frame_count = MAX_FRAMES_IN_FLIGHT as u32;
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: frame_count,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: frame_count,
            },
        ];

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets(frame_count);

        let pool = unsafe {
            match device.create_descriptor_pool(&pool_info, None) {
                Ok(pool) => pool,
                Err(err) => {
                    device.destroy_descriptor_set_layout(layout, None);
                    return Err(VulkanError::Api(err));
                }
            }
        };

        let layouts = vec![layout; MAX_FRAMES_IN_FLIGHT];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);

        let sets = unsafe {
            match device.allocate_descriptor_sets(&alloc_info) {
                Ok(sets) => sets,
                Err(err) => {
                    device.destroy_descriptor_pool(pool, None);
                    device.destroy_descriptor_set_layout(layout, None);
                    return Err(VulkanError::Api(err));
                }
            }
        };

        Ok(Self {
            device,
            layout,
            pool,
            sets,
        })
    }

    /// Point every set at the per-frame uniform buffers and the texture.
    ///
    /// Called once after resource creation and again whenever the texture
    /// image view changes.
    pub fn write_sets(
        &self,
        uniform_buffers: &UniformBuffers,
        texture_view: vk::ImageView,
        sampler: vk::Sampler,
    ) {
        for (frame, &set) in self.sets.iter().enumerate() {
            let buffer_info = [vk::DescriptorBufferInfo {
                buffer: uniform_buffers.handle(frame),
                offset: 0,
                range: uniform_buffers.buffer_size(),
            }];

            let image_info = [vk::DescriptorImageInfo {
                sampler,
                image_view: texture_view,
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            }];

            let writes = [
                vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&buffer_info)
                    .build(),
                vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(1)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&image_info)
                    .build(),
            ];

            unsafe {
                self.device.update_descriptor_sets(&writes, &[]);
            }
        }
    }

    /// Descriptor set layout for pipeline creation
    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Descriptor set for frame slot `frame`
    pub fn set(&self, frame: usize) -> vk::DescriptorSet {
        assert!(frame < self.sets.len(), "frame index out of range");
        self.sets[frame]
    }
}

impl Drop for DescriptorManager {
    fn drop(&mut self) {
        unsafe {
            // Sets are freed with the pool
            self.device.destroy_descriptor_pool(self.pool, None);
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}
