//! Frame orchestration
//!
//! [`Renderer`] wires every Vulkan component together and drives the
//! per-frame protocol: wait on the frame fence, acquire, update uniforms,
//! record, submit, present, advance. Swapchain recreation runs through the
//! [`RebuildSteps`] seam so its ordering can be tested without a device.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use ash::vk;

use crate::camera::{UniformBufferObject, ZoomControl};
use crate::config::RendererConfig;
use crate::geometry::{QUAD_INDICES, QUAD_VERTICES};
use crate::vulkan::allocator::GpuAllocator;
use crate::vulkan::buffer::{IndexBuffer, UniformBuffers, VertexBuffer};
use crate::vulkan::commands::CommandBufferManager;
use crate::vulkan::descriptor::DescriptorManager;
use crate::vulkan::device::{LogicalDevice, PhysicalDeviceInfo};
use crate::vulkan::instance::VulkanInstance;
use crate::vulkan::pipeline::GraphicsPipeline;
use crate::vulkan::swapchain::Swapchain;
use crate::vulkan::sync::FrameSynchronizer;
use crate::vulkan::texture::{SamplerManager, Texture};
use crate::vulkan::{VulkanError, VulkanResult};
use crate::window::Window;

const DEFAULT_SAMPLER: &str = "linear_repeat";

/// The ordered steps of swapchain recreation.
///
/// Splitting the sequence from its execution keeps the ordering itself
/// testable; the live implementation borrows the renderer's components.
pub(crate) trait RebuildSteps {
    /// Current framebuffer size in pixels
    fn framebuffer_extent(&mut self) -> (u32, u32);
    /// Block until a window event arrives (used while minimized)
    fn wait_for_window_event(&mut self);
    /// Wait for all GPU work to finish
    fn wait_device_idle(&mut self) -> VulkanResult<()>;
    /// Destroy framebuffers referencing the old swapchain views
    fn destroy_framebuffers(&mut self);
    /// Recreate the swapchain at `extent`
    fn rebuild_swapchain(&mut self, extent: vk::Extent2D) -> VulkanResult<()>;
    /// Recreate framebuffers over the new image views
    fn recreate_framebuffers(&mut self) -> VulkanResult<()>;
    /// Free and reallocate the per-frame command buffers
    fn recreate_command_buffers(&mut self) -> VulkanResult<()>;
}

/// Drive one full swapchain recreation.
///
/// Blocks while the framebuffer is degenerate (minimized window), then
/// tears down and rebuilds strictly in dependency order.
pub(crate) fn run_rebuild<S: RebuildSteps>(steps: &mut S) -> VulkanResult<()> {
    let (mut width, mut height) = steps.framebuffer_extent();
    while width == 0 || height == 0 {
        steps.wait_for_window_event();
        (width, height) = steps.framebuffer_extent();
    }

    steps.wait_device_idle()?;
    steps.destroy_framebuffers();
    steps.rebuild_swapchain(vk::Extent2D { width, height })?;
    steps.recreate_framebuffers()?;
    steps.recreate_command_buffers()?;
    Ok(())
}

struct LiveRebuild<'a> {
    window: &'a mut Window,
    instance: &'a VulkanInstance,
    device: &'a LogicalDevice,
    swapchain: &'a mut Swapchain,
    pipeline: &'a mut GraphicsPipeline,
    commands: &'a mut CommandBufferManager,
}

impl RebuildSteps for LiveRebuild<'_> {
    fn framebuffer_extent(&mut self) -> (u32, u32) {
        self.window.get_framebuffer_size()
    }

    fn wait_for_window_event(&mut self) {
        self.window.wait_events();
    }

    fn wait_device_idle(&mut self) -> VulkanResult<()> {
        self.device.wait_idle()
    }

    fn destroy_framebuffers(&mut self) {
        self.pipeline.destroy_framebuffers();
    }

    fn rebuild_swapchain(&mut self, extent: vk::Extent2D) -> VulkanResult<()> {
        self.swapchain.rebuild(&self.instance.surface_loader, extent)
    }

    fn recreate_framebuffers(&mut self) -> VulkanResult<()> {
        self.pipeline
            .create_framebuffers(self.swapchain.image_views(), self.swapchain.extent())
    }

    fn recreate_command_buffers(&mut self) -> VulkanResult<()> {
        self.commands.recreate_command_buffers()
    }
}

/// Complete Vulkan renderer for the textured quad
///
/// Field order matters: components drop before the allocator, which drops
/// before the logical device, which drops before the instance.
pub struct Renderer {
    pipeline: GraphicsPipeline,
    descriptors: DescriptorManager,
    texture: Texture,
    samplers: SamplerManager,
    uniform_buffers: UniformBuffers,
    index_buffer: IndexBuffer,
    vertex_buffer: VertexBuffer,
    frames: FrameSynchronizer,
    commands: CommandBufferManager,
    swapchain: Swapchain,
    allocator: Arc<GpuAllocator>,
    device: LogicalDevice,
    instance: VulkanInstance,
    zoom: ZoomControl,
    clear_color: [f32; 4],
    start_time: Instant,
    framebuffer_resized: bool,
}

impl Renderer {
    /// Bring up the full Vulkan stack for `window`
    pub fn new(window: &mut Window, config: &RendererConfig) -> VulkanResult<Self> {
        let instance =
            VulkanInstance::new(window, &config.application_name, config.enable_validation)?;

        let physical_device_info = PhysicalDeviceInfo::select(
            &instance.instance,
            instance.surface,
            &instance.surface_loader,
        )?;

        let device = LogicalDevice::new(&instance.instance, &physical_device_info)?;

        let allocator = Arc::new(GpuAllocator::new(
            &instance.instance,
            &device.device,
            physical_device_info.device,
        )?);

        let (width, height) = window.get_framebuffer_size();
        let swapchain = Swapchain::new(
            device.device.clone(),
            device.swapchain_loader.clone(),
            physical_device_info.device,
            instance.surface,
            &instance.surface_loader,
            physical_device_info.graphics_family,
            physical_device_info.present_family,
            vk::Extent2D { width, height },
        )?;

        let commands = CommandBufferManager::new(
            device.device.clone(),
            device.graphics_family,
            device.graphics_queue,
        )?;

        let frames = FrameSynchronizer::new(&device.device)?;

        let vertex_buffer = VertexBuffer::new(&allocator, &commands, &QUAD_VERTICES)?;
        let index_buffer = IndexBuffer::new(&allocator, &commands, &QUAD_INDICES)?;
        let uniform_buffers = UniformBuffers::new(&allocator)?;

        let mut samplers = SamplerManager::new(device.device.clone());
        let sampler = samplers.create_default_sampler(
            DEFAULT_SAMPLER,
            physical_device_info.properties.limits.max_sampler_anisotropy,
        )?;

        let texture = Texture::from_file(
            device.device.clone(),
            allocator.clone(),
            &commands,
            Path::new(&config.texture),
        )?;

        let descriptors = DescriptorManager::new(device.device.clone())?;
        descriptors.write_sets(&uniform_buffers, texture.image_view(), sampler);

        let mut pipeline = GraphicsPipeline::new(
            device.device.clone(),
            swapchain.format(),
            descriptors.layout(),
            Path::new(&config.vertex_shader),
            Path::new(&config.fragment_shader),
        )?;
        pipeline.create_framebuffers(swapchain.image_views(), swapchain.extent())?;

        log::info!(
            "Renderer initialized ({} swapchain images, {}x{})",
            swapchain.image_count(),
            swapchain.extent().width,
            swapchain.extent().height
        );

        Ok(Self {
            pipeline,
            descriptors,
            texture,
            samplers,
            uniform_buffers,
            index_buffer,
            vertex_buffer,
            frames,
            commands,
            swapchain,
            allocator,
            device,
            instance,
            zoom: ZoomControl::new(),
            clear_color: config.clear_color,
            start_time: Instant::now(),
            framebuffer_resized: false,
        })
    }

    /// Render and present one frame.
    ///
    /// An out-of-date swapchain at acquire time triggers recreation and
    /// skips the frame; a suboptimal or out-of-date result at present time
    /// finishes the frame first, then recreates.
    pub fn draw_frame(&mut self, window: &mut Window) -> VulkanResult<()> {
        let frame = self.frames.current_frame();
        self.frames.current().in_flight.wait()?;

        let image_index = match self
            .swapchain
            .acquire_next_image(self.frames.current().image_available.handle())
        {
            Ok((index, _suboptimal)) => index,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.recreate_swapchain(window)?;
                return Ok(());
            }
            Err(err) => return Err(VulkanError::Api(err)),
        };

        // Only reset once we know this frame will submit, otherwise an
        // early return would leave the fence unsignaled forever.
        self.frames.current().in_flight.reset()?;

        let extent = self.swapchain.extent();
        let ubo = UniformBufferObject::new(
            self.start_time.elapsed().as_secs_f32(),
            self.zoom.level(),
            extent.width,
            extent.height,
        );
        self.uniform_buffers.write(frame, &ubo);

        self.commands.reset(frame)?;
        let command_buffer = self.commands.command_buffer(frame);
        self.pipeline.record_command_buffer(
            command_buffer,
            image_index,
            extent,
            self.clear_color,
            self.vertex_buffer.handle(),
            self.index_buffer.handle(),
            self.index_buffer.index_type(),
            self.index_buffer.index_count(),
            self.descriptors.set(frame),
        )?;

        let wait_semaphores = [self.frames.current().image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [self.frames.current().render_finished.handle()];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .device
                .queue_submit(
                    self.device.graphics_queue,
                    &[submit_info.build()],
                    self.frames.current().in_flight.handle(),
                )
                .map_err(VulkanError::Api)?;
        }

        let swapchains = [self.swapchain.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let present_result = unsafe {
            self.device
                .swapchain_loader
                .queue_present(self.device.present_queue, &present_info)
        };

        let needs_recreation = match present_result {
            Ok(suboptimal) => suboptimal || self.framebuffer_resized,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => true,
            Err(err) => return Err(VulkanError::Api(err)),
        };

        if needs_recreation {
            self.framebuffer_resized = false;
            self.recreate_swapchain(window)?;
        }

        self.frames.advance();
        Ok(())
    }

    fn recreate_swapchain(&mut self, window: &mut Window) -> VulkanResult<()> {
        let mut steps = LiveRebuild {
            window,
            instance: &self.instance,
            device: &self.device,
            swapchain: &mut self.swapchain,
            pipeline: &mut self.pipeline,
            commands: &mut self.commands,
        };
        run_rebuild(&mut steps)
    }

    /// Note that the framebuffer size changed; recreation happens after the
    /// next presented frame
    pub fn flag_resized(&mut self) {
        self.framebuffer_resized = true;
    }

    /// Apply a scroll wheel offset to the camera zoom
    pub fn on_scroll(&mut self, yoffset: f32) {
        self.zoom.apply_scroll(yoffset);
    }

    /// Current zoom level
    pub fn zoom_level(&self) -> f32 {
        self.zoom.level()
    }

    /// Reload the texture, from `path` if given or the current source file
    /// otherwise, and rebind it to every descriptor set
    pub fn reload_texture(&mut self, path: Option<&Path>) -> VulkanResult<()> {
        self.device.wait_idle()?;
        self.texture.reload(&self.commands, path)?;
        let sampler = self
            .samplers
            .get(DEFAULT_SAMPLER)
            .ok_or_else(|| VulkanError::InitializationFailed("default sampler missing".to_string()))?;
        self.descriptors
            .write_sets(&self.uniform_buffers, self.texture.image_view(), sampler);
        Ok(())
    }

    /// Block until the GPU has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.device.wait_idle()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // The last submitted frame may still be executing when an error
        // propagates out of draw_frame; sync objects and buffers must not
        // be destroyed under it.
        let _ = self.device.wait_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingRebuild {
        extent_sequence: Vec<(u32, u32)>,
        calls: Vec<&'static str>,
    }

    impl RebuildSteps for RecordingRebuild {
        fn framebuffer_extent(&mut self) -> (u32, u32) {
            self.calls.push("framebuffer_extent");
            if self.extent_sequence.len() > 1 {
                self.extent_sequence.remove(0)
            } else {
                self.extent_sequence[0]
            }
        }

        fn wait_for_window_event(&mut self) {
            self.calls.push("wait_for_window_event");
        }

        fn wait_device_idle(&mut self) -> VulkanResult<()> {
            self.calls.push("wait_device_idle");
            Ok(())
        }

        fn destroy_framebuffers(&mut self) {
            self.calls.push("destroy_framebuffers");
        }

        fn rebuild_swapchain(&mut self, _extent: vk::Extent2D) -> VulkanResult<()> {
            self.calls.push("rebuild_swapchain");
            Ok(())
        }

        fn recreate_framebuffers(&mut self) -> VulkanResult<()> {
            self.calls.push("recreate_framebuffers");
            Ok(())
        }

        fn recreate_command_buffers(&mut self) -> VulkanResult<()> {
            self.calls.push("recreate_command_buffers");
            Ok(())
        }
    }

    #[test]
    fn test_rebuild_runs_steps_in_dependency_order() {
        let mut steps = RecordingRebuild {
            extent_sequence: vec![(800, 600)],
            ..Default::default()
        };
        run_rebuild(&mut steps).unwrap();
        assert_eq!(
            steps.calls,
            vec![
                "framebuffer_extent",
                "wait_device_idle",
                "destroy_framebuffers",
                "rebuild_swapchain",
                "recreate_framebuffers",
                "recreate_command_buffers",
            ]
        );
    }

    #[test]
    fn test_rebuild_blocks_while_framebuffer_degenerate() {
        // Minimized for two polls, then restored.
        let mut steps = RecordingRebuild {
            extent_sequence: vec![(0, 0), (0, 600), (800, 600)],
            ..Default::default()
        };
        run_rebuild(&mut steps).unwrap();
        assert_eq!(
            steps.calls,
            vec![
                "framebuffer_extent",
                "wait_for_window_event",
                "framebuffer_extent",
                "wait_for_window_event",
                "framebuffer_extent",
                "wait_device_idle",
                "destroy_framebuffers",
                "rebuild_swapchain",
                "recreate_framebuffers",
                "recreate_command_buffers",
            ]
        );
    }

    #[test]
    fn test_renderer_has_explicit_teardown() {
        // Compile-time guard: teardown must wait for the GPU before field
        // drops destroy sync objects the device may still be signaling.
        #[allow(clippy::drop_bounds)]
        fn requires_explicit_drop<T: Drop>() {}
        requires_explicit_drop::<Renderer>();
    }

    #[test]
    fn test_rebuild_stops_on_device_error() {
        struct FailingRebuild {
            calls: Vec<&'static str>,
        }

        impl RebuildSteps for FailingRebuild {
            fn framebuffer_extent(&mut self) -> (u32, u32) {
                (640, 480)
            }
            fn wait_for_window_event(&mut self) {}
            fn wait_device_idle(&mut self) -> VulkanResult<()> {
                self.calls.push("wait_device_idle");
                Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST))
            }
            fn destroy_framebuffers(&mut self) {
                self.calls.push("destroy_framebuffers");
            }
            fn rebuild_swapchain(&mut self, _extent: vk::Extent2D) -> VulkanResult<()> {
                self.calls.push("rebuild_swapchain");
                Ok(())
            }
            fn recreate_framebuffers(&mut self) -> VulkanResult<()> {
                self.calls.push("recreate_framebuffers");
                Ok(())
            }
            fn recreate_command_buffers(&mut self) -> VulkanResult<()> {
                self.calls.push("recreate_command_buffers");
                Ok(())
            }
        }

        let mut steps = FailingRebuild { calls: Vec::new() };
        assert!(run_rebuild(&mut steps).is_err());
        assert_eq!(steps.calls, vec!["wait_device_idle"]);
    }
}
