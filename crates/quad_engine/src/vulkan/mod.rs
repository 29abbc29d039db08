//! Vulkan rendering backend
//!
//! Module layout follows the ownership graph: `instance` owns the Vulkan
//! instance and presentation surface, `device` selects and opens the GPU,
//! `allocator` wraps device memory, and the remaining modules build the
//! swapchain, resources, and pipeline on top. The [`Renderer`] at the top
//! owns every component and drives the per-frame protocol.

pub mod allocator;
pub mod buffer;
pub mod commands;
pub mod descriptor;
pub mod device;
pub mod instance;
pub mod pipeline;
pub mod renderer;
pub mod swapchain;
pub mod sync;
pub mod texture;

pub use allocator::GpuAllocator;
pub use buffer::{IndexBuffer, UniformBuffers, VertexBuffer};
pub use commands::CommandBufferManager;
pub use descriptor::DescriptorManager;
pub use device::{LogicalDevice, PhysicalDeviceInfo};
pub use instance::VulkanInstance;
pub use pipeline::GraphicsPipeline;
pub use renderer::Renderer;
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSync, FrameSynchronizer, Semaphore, MAX_FRAMES_IN_FLIGHT};
pub use texture::{SamplerManager, Texture};

use ash::vk;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// No physical device passed the suitability checks
    #[error("No capable GPU found")]
    NoSuitableDevice,

    /// Vulkan context or resource initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Image layout transition outside the two supported pairs
    #[error("Unsupported image layout transition: {old:?} -> {new:?}")]
    UnsupportedTransition {
        /// Layout the image is currently in
        old: vk::ImageLayout,
        /// Layout that was requested
        new: vk::ImageLayout,
    },

    /// A required file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path of the unreadable file
        path: String,
        /// Underlying IO error
        source: std::io::Error,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;
