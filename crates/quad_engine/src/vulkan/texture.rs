//! Sampled texture loading and sampler management
//!
//! Textures are decoded to RGBA8, staged through a host-visible buffer and
//! transitioned into SHADER_READ_ONLY_OPTIMAL. Only the two transitions the
//! upload path needs are supported; anything else is a hard error rather
//! than a guessed barrier.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ash::{vk, Device};

use crate::vulkan::allocator::GpuAllocator;
use crate::vulkan::buffer::GpuBuffer;
use crate::vulkan::commands::CommandBufferManager;
use crate::vulkan::{VulkanError, VulkanResult};

/// Pipeline stages and access masks for a supported layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TransitionMasks {
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
}

/// Barrier parameters for `old` to `new`, or an error for any pair outside
/// the upload protocol.
pub(crate) fn transition_masks(
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> VulkanResult<TransitionMasks> {
    match (old, new) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => {
            Ok(TransitionMasks {
                src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage: vk::PipelineStageFlags::TRANSFER,
                src_access: vk::AccessFlags::empty(),
                dst_access: vk::AccessFlags::TRANSFER_WRITE,
            })
        }
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => {
            Ok(TransitionMasks {
                src_stage: vk::PipelineStageFlags::TRANSFER,
                dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
                src_access: vk::AccessFlags::TRANSFER_WRITE,
                dst_access: vk::AccessFlags::SHADER_READ,
            })
        }
        (old, new) => Err(VulkanError::UnsupportedTransition { old, new }),
    }
}

/// Named sampler registry with RAII cleanup
///
/// All samplers share the device lifetime; lookups by name keep pipeline
/// setup decoupled from sampler creation order.
pub struct SamplerManager {
    device: Device,
    samplers: HashMap<String, vk::Sampler>,
}

impl SamplerManager {
    /// Create an empty registry
    pub fn new(device: Device) -> Self {
        Self {
            device,
            samplers: HashMap::new(),
        }
    }

    /// Create and register a linear-filtered repeat-addressed sampler with
    /// the device's maximum anisotropy
    pub fn create_default_sampler(
        &mut self,
        name: &str,
        max_anisotropy: f32,
    ) -> VulkanResult<vk::Sampler> {
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(max_anisotropy)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(0.0);

        let sampler = unsafe {
            self.device
                .create_sampler(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        if let Some(old) = self.samplers.insert(name.to_string(), sampler) {
            unsafe { self.device.destroy_sampler(old, None) };
        }

        Ok(sampler)
    }

    /// Look up a sampler by name
    pub fn get(&self, name: &str) -> Option<vk::Sampler> {
        self.samplers.get(name).copied()
    }
}

impl Drop for SamplerManager {
    fn drop(&mut self) {
        unsafe {
            for sampler in self.samplers.values() {
                self.device.destroy_sampler(*sampler, None);
            }
        }
    }
}

/// Sampled 2D texture in SHADER_READ_ONLY_OPTIMAL layout
pub struct Texture {
    device: Device,
    allocator: Arc<GpuAllocator>,
    image: vk::Image,
    allocation: Option<vk_mem::Allocation>,
    image_view: vk::ImageView,
    path: PathBuf,
    width: u32,
    height: u32,
}

impl Texture {
    /// Load an image file, upload it and leave it shader-readable.
    ///
    /// A missing texture is a startup failure, not something to paper over
    /// with a placeholder.
    pub fn from_file(
        device: Device,
        allocator: Arc<GpuAllocator>,
        commands: &CommandBufferManager,
        path: &Path,
    ) -> VulkanResult<Self> {
        let (pixels, width, height) = Self::decode_rgba8(path)?;

        let (image, allocation, image_view) =
            Self::upload(&device, &allocator, commands, &pixels, width, height)?;

        log::info!("Loaded texture {} ({}x{})", path.display(), width, height);

        Ok(Self {
            device,
            allocator,
            image,
            allocation: Some(allocation),
            image_view,
            path: path.to_path_buf(),
            width,
            height,
        })
    }

    /// Replace the GPU image from `new_path`, or re-read the current source
    /// file when `None`. The stored path is updated on success.
    ///
    /// The caller must ensure no frame is sampling the old image, typically
    /// by waiting for the device to go idle first.
    pub fn reload(
        &mut self,
        commands: &CommandBufferManager,
        new_path: Option<&Path>,
    ) -> VulkanResult<()> {
        let path = new_path.map_or_else(|| self.path.clone(), Path::to_path_buf);
        let (pixels, width, height) = Self::decode_rgba8(&path)?;

        let (image, allocation, image_view) =
            Self::upload(&self.device, &self.allocator, commands, &pixels, width, height)?;

        self.destroy_resources();
        self.image = image;
        self.allocation = Some(allocation);
        self.image_view = image_view;
        self.width = width;
        self.height = height;
        self.path = path;

        log::info!("Reloaded texture {}", self.path.display());
        Ok(())
    }

    fn decode_rgba8(path: &Path) -> VulkanResult<(Vec<u8>, u32, u32)> {
        if path.as_os_str().is_empty() {
            return Err(VulkanError::InitializationFailed(
                "texture path is empty".to_string(),
            ));
        }

        let dynamic_image = image::open(path).map_err(|err| match err {
            image::ImageError::IoError(source) => VulkanError::Io {
                path: path.display().to_string(),
                source,
            },
            other => VulkanError::InitializationFailed(format!(
                "failed to decode texture {}: {other}",
                path.display()
            )),
        })?;

        let rgba = dynamic_image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok((rgba.into_raw(), width, height))
    }

    fn upload(
        device: &Device,
        allocator: &Arc<GpuAllocator>,
        commands: &CommandBufferManager,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> VulkanResult<(vk::Image, vk_mem::Allocation, vk::ImageView)> {
        let size = pixels.len() as vk::DeviceSize;
        let mut staging = GpuBuffer::staging(allocator.clone(), size)?;
        staging.write_slice(pixels)?;

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(vk::Format::R8G8B8A8_SRGB)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let allocation_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };

        let (image, mut allocation) = allocator.create_image(&image_info, &allocation_info)?;

        let upload_result = Self::record_upload(commands, staging.handle(), image, width, height)
            .and_then(|()| Self::create_view(device, image));

        match upload_result {
            Ok(image_view) => Ok((image, allocation, image_view)),
            Err(err) => {
                allocator.destroy_image(image, &mut allocation);
                Err(err)
            }
        }
    }

    fn record_upload(
        commands: &CommandBufferManager,
        staging: vk::Buffer,
        image: vk::Image,
        width: u32,
        height: u32,
    ) -> VulkanResult<()> {
        let to_transfer = transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;
        let to_shader = transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        commands.submit_one_time(|device, command_buffer| {
            Self::cmd_barrier(
                device,
                command_buffer,
                image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                to_transfer,
            );

            let region = vk::BufferImageCopy::builder()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D {
                    width,
                    height,
                    depth: 1,
                })
                .build();

            unsafe {
                device.cmd_copy_buffer_to_image(
                    command_buffer,
                    staging,
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            }

            Self::cmd_barrier(
                device,
                command_buffer,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                to_shader,
            );
        })
    }

    fn cmd_barrier(
        device: &Device,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
        masks: TransitionMasks,
    ) {
        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_access_mask(masks.src_access)
            .dst_access_mask(masks.dst_access)
            .build();

        unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                masks.src_stage,
                masks.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }

    fn create_view(device: &Device, image: vk::Image) -> VulkanResult<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(vk::Format::R8G8B8A8_SRGB)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe {
            device
                .create_image_view(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// Shader-readable image view
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    /// Texture dimensions in pixels
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn destroy_resources(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.image_view, None);
        }
        if let Some(mut allocation) = self.allocation.take() {
            self.allocator.destroy_image(self.image, &mut allocation);
        }
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.destroy_resources();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_to_transfer_dst() {
        let masks = transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap();
        assert_eq!(masks.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(masks.src_access, vk::AccessFlags::empty());
        assert_eq!(masks.dst_access, vk::AccessFlags::TRANSFER_WRITE);
    }

    #[test]
    fn test_transfer_dst_to_shader_read() {
        let masks = transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(masks.src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
        assert_eq!(masks.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.dst_access, vk::AccessFlags::SHADER_READ);
    }

    #[test]
    fn test_unknown_transition_is_rejected() {
        let result = transition_masks(
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        assert!(matches!(
            result,
            Err(VulkanError::UnsupportedTransition { .. })
        ));
    }

    #[test]
    fn test_reverse_of_supported_pair_is_rejected() {
        let result = transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::UNDEFINED,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_rgba8_reads_pixels() {
        let path = std::env::temp_dir().join("quad_engine_decode_test.png");
        image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let (pixels, width, height) = Texture::decode_rgba8(&path).unwrap();
        assert_eq!((width, height), (2, 2));
        assert_eq!(pixels.len(), 16);
        assert_eq!(&pixels[..4], &[10, 20, 30, 255]);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_decode_rgba8_rejects_empty_path() {
        let result = Texture::decode_rgba8(Path::new(""));
        assert!(matches!(
            result,
            Err(VulkanError::InitializationFailed(_))
        ));
    }
}
