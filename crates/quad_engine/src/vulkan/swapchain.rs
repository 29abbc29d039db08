//! Vulkan swapchain management
//!
//! Handles swapchain creation, recreation, and image view lifetime following
//! RAII principles. The selection policies (format, present mode, extent,
//! image count) are pure functions so they can be tested without a device.

use ash::extensions::khr::{Surface as SurfaceLoader, Swapchain as SwapchainLoader};
use ash::vk;
use ash::Device;

use crate::vulkan::{VulkanError, VulkanResult};

/// Prefer B8G8R8A8 sRGB with an sRGB color space; otherwise take the first
/// advertised format.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .find(|sf| {
            sf.format == vk::Format::B8G8R8A8_SRGB
                && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .copied()
        .unwrap_or(formats[0])
}

/// Prefer MAILBOX when available, falling back to the always-present FIFO.
fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    modes
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Resolve the swapchain extent from the surface capabilities.
///
/// When the surface reports a fixed extent it must be used verbatim; the
/// sentinel width of `u32::MAX` means the window size decides, clamped to
/// the supported range.
fn choose_swap_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: framebuffer_extent.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: framebuffer_extent.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// Image sharing across the graphics and present queue families.
///
/// EXCLUSIVE when one family fills both roles; CONCURRENT listing both
/// families when they differ, since a presented image would otherwise need
/// an explicit queue ownership transfer.
fn choose_sharing_config(graphics_family: u32, present_family: u32) -> (vk::SharingMode, Vec<u32>) {
    if graphics_family == present_family {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (
            vk::SharingMode::CONCURRENT,
            vec![graphics_family, present_family],
        )
    }
}

/// One more image than the minimum, capped by the maximum when one exists.
///
/// A `max_image_count` of zero means the implementation places no upper
/// bound on the image count.
fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Swapchain wrapper with RAII cleanup
///
/// Owns the swapchain handle together with one image view per swapchain
/// image. `rebuild` replaces both in place so dependents can keep a stable
/// reference across window resizes.
pub struct Swapchain {
    device: Device,
    swapchain_loader: SwapchainLoader,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    graphics_family: u32,
    present_family: u32,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a new swapchain for `surface`
    pub fn new(
        device: Device,
        swapchain_loader: SwapchainLoader,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &SurfaceLoader,
        graphics_family: u32,
        present_family: u32,
        framebuffer_extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let (swapchain, images, image_views, format, extent) = Self::create_swapchain(
            &device,
            &swapchain_loader,
            physical_device,
            surface,
            surface_loader,
            graphics_family,
            present_family,
            framebuffer_extent,
            vk::SwapchainKHR::null(),
        )?;

        Ok(Self {
            device,
            swapchain_loader,
            physical_device,
            surface,
            graphics_family,
            present_family,
            swapchain,
            images,
            image_views,
            format,
            extent,
        })
    }

    /// Replace the swapchain and image views in place for a new framebuffer
    /// size.
    ///
    /// Callers must have waited for the device to go idle and torn down any
    /// framebuffers referencing the old image views before calling this.
    pub fn rebuild(
        &mut self,
        surface_loader: &SurfaceLoader,
        framebuffer_extent: vk::Extent2D,
    ) -> VulkanResult<()> {
        self.destroy_resources();

        let (swapchain, images, image_views, format, extent) = Self::create_swapchain(
            &self.device,
            &self.swapchain_loader,
            self.physical_device,
            self.surface,
            surface_loader,
            self.graphics_family,
            self.present_family,
            framebuffer_extent,
            vk::SwapchainKHR::null(),
        )?;

        self.swapchain = swapchain;
        self.images = images;
        self.image_views = image_views;
        self.format = format;
        self.extent = extent;

        log::debug!("Swapchain rebuilt at {}x{}", extent.width, extent.height);
        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn create_swapchain(
        device: &Device,
        swapchain_loader: &SwapchainLoader,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &SurfaceLoader,
        graphics_family: u32,
        present_family: u32,
        framebuffer_extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> VulkanResult<(
        vk::SwapchainKHR,
        Vec<vk::Image>,
        Vec<vk::ImageView>,
        vk::SurfaceFormatKHR,
        vk::Extent2D,
    )> {
        let surface_caps = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(VulkanError::Api)?
        };

        let surface_formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(VulkanError::Api)?
        };

        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(VulkanError::Api)?
        };

        // Device selection already rejected surfaces with no formats or modes
        if surface_formats.is_empty() || present_modes.is_empty() {
            return Err(VulkanError::InitializationFailed(
                "surface advertises no formats or present modes".to_string(),
            ));
        }

        let format = choose_surface_format(&surface_formats);
        let present_mode = choose_present_mode(&present_modes);
        let extent = choose_swap_extent(&surface_caps, framebuffer_extent);
        let image_count = choose_image_count(&surface_caps);
        let (sharing_mode, family_indices) =
            choose_sharing_config(graphics_family, present_family);

        let swapchain_create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&swapchain_create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = unsafe {
            swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(VulkanError::Api)?
        };

        let image_views: Result<Vec<_>, _> = images
            .iter()
            .map(|&image| {
                let create_info = vk::ImageViewCreateInfo::builder()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format.format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::IDENTITY,
                        g: vk::ComponentSwizzle::IDENTITY,
                        b: vk::ComponentSwizzle::IDENTITY,
                        a: vk::ComponentSwizzle::IDENTITY,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                unsafe { device.create_image_view(&create_info, None) }
            })
            .collect();

        let image_views = image_views.map_err(VulkanError::Api)?;
        debug_assert_eq!(images.len(), image_views.len());

        Ok((swapchain, images, image_views, format, extent))
    }

    /// Acquire the next presentable image, signaling `semaphore` when ready
    pub fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
    ) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// Raw swapchain handle for present calls
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Image views, one per swapchain image
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Number of swapchain images actually created
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Surface format the swapchain was created with
    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    /// Current swapchain extent in pixels
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn destroy_resources(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.image_views.clear();
            self.images.clear();
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
                self.swapchain = vk::SwapchainKHR::null();
            }
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_resources();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    fn capabilities(
        min_count: u32,
        max_count: u32,
        current: vk::Extent2D,
        min_extent: vk::Extent2D,
        max_extent: vk::Extent2D,
    ) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_count,
            max_image_count: max_count,
            current_extent: current,
            min_image_extent: min_extent,
            max_image_extent: max_extent,
            ..Default::default()
        }
    }

    #[test]
    fn test_format_prefers_bgra_srgb() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn test_format_falls_back_to_first() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::R5G6B5_UNORM_PACK16, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_present_mode_prefers_mailbox() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn test_present_mode_defaults_to_fifo() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_extent_uses_fixed_surface_extent() {
        let caps = capabilities(
            2,
            8,
            vk::Extent2D { width: 800, height: 600 },
            vk::Extent2D { width: 1, height: 1 },
            vk::Extent2D { width: 4096, height: 4096 },
        );
        let extent = choose_swap_extent(&caps, vk::Extent2D { width: 1920, height: 1080 });
        assert_eq!(extent.width, 800);
        assert_eq!(extent.height, 600);
    }

    #[test]
    fn test_extent_clamps_window_size_when_unconstrained() {
        let caps = capabilities(
            2,
            8,
            vk::Extent2D { width: u32::MAX, height: u32::MAX },
            vk::Extent2D { width: 100, height: 100 },
            vk::Extent2D { width: 1000, height: 1000 },
        );
        let extent = choose_swap_extent(&caps, vk::Extent2D { width: 5000, height: 50 });
        assert_eq!(extent.width, 1000);
        assert_eq!(extent.height, 100);
    }

    #[test]
    fn test_sharing_exclusive_when_families_alias() {
        let (mode, families) = choose_sharing_config(0, 0);
        assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
        assert!(families.is_empty());
    }

    #[test]
    fn test_sharing_concurrent_across_split_families() {
        let (mode, families) = choose_sharing_config(0, 2);
        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(families, vec![0, 2]);
    }

    #[test]
    fn test_image_count_min_plus_one() {
        let caps = capabilities(
            2,
            8,
            vk::Extent2D::default(),
            vk::Extent2D::default(),
            vk::Extent2D::default(),
        );
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn test_image_count_capped_by_max() {
        let caps = capabilities(
            3,
            3,
            vk::Extent2D::default(),
            vk::Extent2D::default(),
            vk::Extent2D::default(),
        );
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn test_image_count_zero_max_means_unbounded() {
        let caps = capabilities(
            4,
            0,
            vk::Extent2D::default(),
            vk::Extent2D::default(),
            vk::Extent2D::default(),
        );
        assert_eq!(choose_image_count(&caps), 5);
    }
}
