//! GPU upload round-trip test
//!
//! Stages a known byte pattern into a device-local buffer, copies it back
//! into a host-visible buffer and compares. Needs a Vulkan-capable GPU, so
//! it is ignored by default; run with `cargo test -- --ignored` on a machine
//! with a driver installed.

use std::sync::Arc;

use ash::vk;
use quad_engine::vulkan::allocator::GpuAllocator;
use quad_engine::vulkan::buffer::GpuBuffer;
use quad_engine::vulkan::commands::CommandBufferManager;

struct TestGpu {
    _entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    graphics_family: u32,
    graphics_queue: vk::Queue,
}

impl TestGpu {
    /// Headless bring-up: no surface, no swapchain, first graphics queue.
    fn new() -> Option<Self> {
        let entry = unsafe { ash::Entry::load() }.ok()?;

        let app_info = vk::ApplicationInfo::builder().api_version(vk::API_VERSION_1_0);
        let create_info = vk::InstanceCreateInfo::builder().application_info(&app_info);
        let instance = unsafe { entry.create_instance(&create_info, None) }.ok()?;

        let physical_devices = unsafe { instance.enumerate_physical_devices() }.ok()?;
        for physical_device in physical_devices {
            let families =
                unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
            let Some(graphics_family) = families
                .iter()
                .position(|f| f.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            else {
                continue;
            };
            let graphics_family = graphics_family as u32;

            let queue_infos = [vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(graphics_family)
                .queue_priorities(&[1.0])
                .build()];
            let device_info = vk::DeviceCreateInfo::builder().queue_create_infos(&queue_infos);
            let Ok(device) =
                (unsafe { instance.create_device(physical_device, &device_info, None) })
            else {
                continue;
            };
            let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };

            return Some(Self {
                _entry: entry,
                instance,
                physical_device,
                device,
                graphics_family,
                graphics_queue,
            });
        }

        unsafe { instance.destroy_instance(None) };
        None
    }
}

#[test]
#[ignore = "requires a Vulkan-capable GPU and driver"]
fn test_staged_upload_reads_back_identical_bytes() {
    let Some(gpu) = TestGpu::new() else {
        panic!("no Vulkan device available");
    };

    let allocator =
        Arc::new(GpuAllocator::new(&gpu.instance, &gpu.device, gpu.physical_device).unwrap());
    let commands = CommandBufferManager::new(
        gpu.device.clone(),
        gpu.graphics_family,
        gpu.graphics_queue,
    )
    .unwrap();

    let pattern: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    let size = pattern.len() as vk::DeviceSize;

    let mut staging = GpuBuffer::staging(allocator.clone(), size).unwrap();
    staging.write_slice(&pattern).unwrap();

    let device_local = GpuBuffer::device_local(
        allocator.clone(),
        size,
        vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_SRC,
    )
    .unwrap();

    let readback_info = vk_mem::AllocationCreateInfo {
        usage: vk_mem::MemoryUsage::AutoPreferHost,
        flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM,
        ..Default::default()
    };
    let mut readback = GpuBuffer::new(
        allocator.clone(),
        size,
        vk::BufferUsageFlags::TRANSFER_DST,
        &readback_info,
    )
    .unwrap();

    let src = staging.handle();
    let mid = device_local.handle();
    let dst = readback.handle();
    commands
        .submit_one_time(|device, command_buffer| {
            let region = vk::BufferCopy::builder().size(size).build();
            unsafe {
                device.cmd_copy_buffer(command_buffer, src, mid, &[region]);
                let barrier = vk::BufferMemoryBarrier::builder()
                    .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                    .dst_access_mask(vk::AccessFlags::TRANSFER_READ)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .buffer(mid)
                    .offset(0)
                    .size(size)
                    .build();
                device.cmd_pipeline_barrier(
                    command_buffer,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[barrier],
                    &[],
                );
                device.cmd_copy_buffer(command_buffer, mid, dst, &[region]);
            }
        })
        .unwrap();

    let ptr = readback.map().unwrap();
    let contents = unsafe { std::slice::from_raw_parts(ptr, pattern.len()) }.to_vec();
    readback.unmap();

    assert_eq!(contents, pattern);
}
