//! GPU buffer resources
//!
//! All buffers are allocated through the shared [`GpuAllocator`] and cleaned
//! up by `Drop`, so a failure partway through a staged upload unwinds the
//! already-created objects automatically.
//!
//! Vertex and index data travel through a host-visible staging buffer into
//! DEVICE_LOCAL memory. Uniform buffers stay host-visible and persistently
//! mapped for the lifetime of the renderer.

use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;

use crate::camera::UniformBufferObject;
use crate::geometry::Vertex;
use crate::vulkan::allocator::GpuAllocator;
use crate::vulkan::commands::CommandBufferManager;
use crate::vulkan::{VulkanError, VulkanResult, MAX_FRAMES_IN_FLIGHT};

/// A buffer plus its memory allocation, freed on drop
pub struct GpuBuffer {
    allocator: Arc<GpuAllocator>,
    buffer: vk::Buffer,
    allocation: vk_mem::Allocation,
    size: vk::DeviceSize,
    mapped: Option<*mut u8>,
}

// The mapped pointer is only written from the thread that owns the buffer.
unsafe impl Send for GpuBuffer {}

impl GpuBuffer {
    /// Allocate a buffer of `size` bytes with the given usage
    pub fn new(
        allocator: Arc<GpuAllocator>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        allocation_info: &vk_mem::AllocationCreateInfo,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let (buffer, allocation) = allocator.create_buffer(&buffer_info, allocation_info)?;

        Ok(Self {
            allocator,
            buffer,
            allocation,
            size,
            mapped: None,
        })
    }

    /// Host-visible staging buffer sized for `size` bytes
    pub fn staging(allocator: Arc<GpuAllocator>, size: vk::DeviceSize) -> VulkanResult<Self> {
        let allocation_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferHost,
            flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
            ..Default::default()
        };
        Self::new(
            allocator,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            &allocation_info,
        )
    }

    /// Device-local buffer that can receive transfer writes
    pub fn device_local(
        allocator: Arc<GpuAllocator>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let allocation_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };
        Self::new(
            allocator,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            &allocation_info,
        )
    }

    /// Raw buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Allocated size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Map the buffer and keep it mapped until drop or [`Self::unmap`]
    pub fn map(&mut self) -> VulkanResult<*mut u8> {
        if let Some(ptr) = self.mapped {
            return Ok(ptr);
        }
        let ptr = self.allocator.map_memory(&mut self.allocation)?;
        self.mapped = Some(ptr);
        Ok(ptr)
    }

    /// Unmap a previously mapped buffer
    pub fn unmap(&mut self) {
        if self.mapped.take().is_some() {
            self.allocator.unmap_memory(&mut self.allocation);
        }
    }

    /// Copy `data` into the buffer through a transient mapping
    pub fn write_slice<T: Pod>(&mut self, data: &[T]) -> VulkanResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        debug_assert!(bytes.len() as vk::DeviceSize <= self.size);

        let was_mapped = self.mapped.is_some();
        let ptr = self.map()?;
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
        }
        if !was_mapped {
            self.unmap();
        }
        Ok(())
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        self.unmap();
        self.allocator.destroy_buffer(self.buffer, &mut self.allocation);
    }
}

/// Upload `data` into a new DEVICE_LOCAL buffer via a staging copy.
///
/// The staging buffer is a local and is destroyed on every exit path,
/// including errors from the copy submission.
fn upload_to_device_local<T: Pod>(
    allocator: &Arc<GpuAllocator>,
    commands: &CommandBufferManager,
    data: &[T],
    usage: vk::BufferUsageFlags,
) -> VulkanResult<GpuBuffer> {
    let size = std::mem::size_of_val(data) as vk::DeviceSize;
    if size == 0 {
        return Err(VulkanError::InitializationFailed(
            "cannot upload an empty buffer".to_string(),
        ));
    }

    let mut staging = GpuBuffer::staging(allocator.clone(), size)?;
    staging.write_slice(data)?;

    let device_buffer = GpuBuffer::device_local(allocator.clone(), size, usage)?;

    let src = staging.handle();
    let dst = device_buffer.handle();
    commands.submit_one_time(|device, command_buffer| {
        let region = vk::BufferCopy::builder().size(size).build();
        unsafe {
            device.cmd_copy_buffer(command_buffer, src, dst, &[region]);
        }
    })?;

    Ok(device_buffer)
}

/// Device-local vertex buffer for the quad mesh
pub struct VertexBuffer {
    buffer: GpuBuffer,
    vertex_count: u32,
}

impl VertexBuffer {
    /// Upload `vertices` into device-local memory
    pub fn new(
        allocator: &Arc<GpuAllocator>,
        commands: &CommandBufferManager,
        vertices: &[Vertex],
    ) -> VulkanResult<Self> {
        let buffer = upload_to_device_local(
            allocator,
            commands,
            vertices,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        Ok(Self {
            buffer,
            vertex_count: vertices.len() as u32,
        })
    }

    /// Raw buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Number of vertices uploaded
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

/// Device-local 16-bit index buffer
pub struct IndexBuffer {
    buffer: GpuBuffer,
    index_count: u32,
}

impl IndexBuffer {
    /// Upload `indices` into device-local memory
    pub fn new(
        allocator: &Arc<GpuAllocator>,
        commands: &CommandBufferManager,
        indices: &[u16],
    ) -> VulkanResult<Self> {
        let buffer = upload_to_device_local(
            allocator,
            commands,
            indices,
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;
        Ok(Self {
            buffer,
            index_count: indices.len() as u32,
        })
    }

    /// Raw buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Number of indices uploaded
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Index type matching the uploaded data
    pub fn index_type(&self) -> vk::IndexType {
        vk::IndexType::UINT16
    }
}

/// Per-frame uniform buffers, persistently mapped
///
/// One buffer per in-flight frame so a frame being recorded never writes
/// over data the GPU is still reading.
pub struct UniformBuffers {
    buffers: Vec<GpuBuffer>,
    mapped: Vec<*mut u8>,
}

// Mapped pointers are only dereferenced by the owning renderer thread.
unsafe impl Send for UniformBuffers {}

impl UniformBuffers {
    /// Allocate and map one uniform buffer per in-flight frame
    pub fn new(allocator: &Arc<GpuAllocator>) -> VulkanResult<Self> {
        let size = std::mem::size_of::<UniformBufferObject>() as vk::DeviceSize;
        let allocation_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferHost,
            flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE
                | vk_mem::AllocationCreateFlags::MAPPED,
            ..Default::default()
        };

        let mut buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut mapped = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let mut buffer = GpuBuffer::new(
                allocator.clone(),
                size,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                &allocation_info,
            )?;
            let ptr = buffer.map()?;
            buffers.push(buffer);
            mapped.push(ptr);
        }

        Ok(Self { buffers, mapped })
    }

    /// Write `ubo` into the buffer for frame slot `frame`
    pub fn write(&self, frame: usize, ubo: &UniformBufferObject) {
        assert!(frame < self.mapped.len(), "frame index out of range");
        let bytes = bytemuck::bytes_of(ubo);
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped[frame], bytes.len());
        }
    }

    /// Raw buffer handle for frame slot `frame`
    pub fn handle(&self, frame: usize) -> vk::Buffer {
        self.buffers[frame].handle()
    }

    /// Size of one uniform buffer in bytes
    pub fn buffer_size(&self) -> vk::DeviceSize {
        std::mem::size_of::<UniformBufferObject>() as vk::DeviceSize
    }
}
