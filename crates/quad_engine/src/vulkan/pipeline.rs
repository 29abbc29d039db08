//! Render pass, graphics pipeline and framebuffer management
//!
//! The pipeline is fixed for the textured quad: one subpass writing a single
//! color attachment that ends in PRESENT_SRC, dynamic viewport and scissor
//! so window resizes never force a pipeline rebuild.

use std::fs::File;
use std::path::Path;

use ash::{vk, Device};

use crate::geometry::Vertex;
use crate::vulkan::{VulkanError, VulkanResult};

/// Load a SPIR-V module from `path`
fn load_shader_module(device: &Device, path: &Path) -> VulkanResult<vk::ShaderModule> {
    let mut file = File::open(path).map_err(|source| VulkanError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let code = ash::util::read_spv(&mut file).map_err(|source| VulkanError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
    unsafe {
        device
            .create_shader_module(&create_info, None)
            .map_err(VulkanError::Api)
    }
}

/// Graphics pipeline plus its render pass and framebuffers, RAII cleaned up
pub struct GraphicsPipeline {
    device: Device,
    render_pass: vk::RenderPass,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    framebuffers: Vec<vk::Framebuffer>,
}

impl GraphicsPipeline {
    /// Build the render pass and pipeline from compiled shader files
    pub fn new(
        device: Device,
        color_format: vk::Format,
        descriptor_layout: vk::DescriptorSetLayout,
        vertex_shader_path: &Path,
        fragment_shader_path: &Path,
    ) -> VulkanResult<Self> {
        let render_pass = Self::create_render_pass(&device, color_format)?;

        let pipeline_result = Self::create_pipeline(
            &device,
            render_pass,
            descriptor_layout,
            vertex_shader_path,
            fragment_shader_path,
        );

        let (pipeline_layout, pipeline) = match pipeline_result {
            Ok(handles) => handles,
            Err(err) => {
                unsafe { device.destroy_render_pass(render_pass, None) };
                return Err(err);
            }
        };

        Ok(Self {
            device,
            render_pass,
            pipeline_layout,
            pipeline,
            framebuffers: Vec::new(),
        })
    }

    fn create_render_pass(device: &Device, color_format: vk::Format) -> VulkanResult<vk::RenderPass> {
        let color_attachment = vk::AttachmentDescription::builder()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();

        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };

        let color_refs = [color_ref];
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .build();

        // Wait for the acquire semaphore's stage before writing color output
        let dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .build();

        let attachments = [color_attachment];
        let subpasses = [subpass];
        let dependencies = [dependency];
        let render_pass_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        unsafe {
            device
                .create_render_pass(&render_pass_info, None)
                .map_err(VulkanError::Api)
        }
    }

    fn create_pipeline(
        device: &Device,
        render_pass: vk::RenderPass,
        descriptor_layout: vk::DescriptorSetLayout,
        vertex_shader_path: &Path,
        fragment_shader_path: &Path,
    ) -> VulkanResult<(vk::PipelineLayout, vk::Pipeline)> {
        let vertex_module = load_shader_module(device, vertex_shader_path)?;
        let fragment_module = match load_shader_module(device, fragment_shader_path) {
            Ok(module) => module,
            Err(err) => {
                unsafe { device.destroy_shader_module(vertex_module, None) };
                return Err(err);
            }
        };

        let result = Self::create_pipeline_with_modules(
            device,
            render_pass,
            descriptor_layout,
            vertex_module,
            fragment_module,
        );

        unsafe {
            device.destroy_shader_module(vertex_module, None);
            device.destroy_shader_module(fragment_module, None);
        }

        result
    }

    fn create_pipeline_with_modules(
        device: &Device,
        render_pass: vk::RenderPass,
        descriptor_layout: vk::DescriptorSetLayout,
        vertex_module: vk::ShaderModule,
        fragment_module: vk::ShaderModule,
    ) -> VulkanResult<(vk::PipelineLayout, vk::Pipeline)> {
        let entry_point = unsafe {
            std::ffi::CStr::from_bytes_with_nul_unchecked(b"main\0")
        };

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module)
                .name(entry_point)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_module)
                .name(entry_point)
                .build(),
        ];

        let binding_descriptions = [Vertex::binding_description()];
        let attribute_descriptions = Vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&binding_descriptions)
            .vertex_attribute_descriptions(&attribute_descriptions);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Actual viewport and scissor are set at record time
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build();

        let blend_attachments = [color_blend_attachment];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let set_layouts = [descriptor_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
        let pipeline_layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(pipeline_layout)
            .render_pass(render_pass)
            .subpass(0)
            .build();

        let pipeline = unsafe {
            match device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
            {
                Ok(pipelines) => pipelines[0],
                Err((_, err)) => {
                    device.destroy_pipeline_layout(pipeline_layout, None);
                    return Err(VulkanError::Api(err));
                }
            }
        };

        Ok((pipeline_layout, pipeline))
    }

    /// Create one framebuffer per swapchain image view
    pub fn create_framebuffers(
        &mut self,
        image_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<()> {
        self.destroy_framebuffers();

        let mut framebuffers = Vec::with_capacity(image_views.len());
        for &view in image_views {
            let attachments = [view];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(self.render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer = unsafe {
                match self.device.create_framebuffer(&framebuffer_info, None) {
                    Ok(framebuffer) => framebuffer,
                    Err(err) => {
                        for created in framebuffers {
                            self.device.destroy_framebuffer(created, None);
                        }
                        return Err(VulkanError::Api(err));
                    }
                }
            };
            framebuffers.push(framebuffer);
        }

        self.framebuffers = framebuffers;
        Ok(())
    }

    /// Destroy all framebuffers; called before swapchain teardown
    pub fn destroy_framebuffers(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.destroy_framebuffer(framebuffer, None);
            }
        }
        self.framebuffers.clear();
    }

    /// Record the full draw for one frame into `command_buffer`
    pub fn record_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
        vertex_buffer: vk::Buffer,
        index_buffer: vk::Buffer,
        index_type: vk::IndexType,
        index_count: u32,
        descriptor_set: vk::DescriptorSet,
    ) -> VulkanResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear_color,
            },
        }];

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(self.render_pass)
            .framebuffer(self.framebuffers[image_index as usize])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );

            self.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            );

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            self.device.cmd_set_viewport(command_buffer, 0, &[viewport]);

            let scissor = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            };
            self.device.cmd_set_scissor(command_buffer, 0, &[scissor]);

            self.device
                .cmd_bind_vertex_buffers(command_buffer, 0, &[vertex_buffer], &[0]);
            self.device
                .cmd_bind_index_buffer(command_buffer, index_buffer, 0, index_type);

            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                &[descriptor_set],
                &[],
            );

            self.device
                .cmd_draw_indexed(command_buffer, index_count, 1, 0, 0, 0);

            self.device.cmd_end_render_pass(command_buffer);
            self.device
                .end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;
        }

        Ok(())
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        self.destroy_framebuffers();
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}
