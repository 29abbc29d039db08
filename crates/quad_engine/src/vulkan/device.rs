//! Physical device selection and logical device management
//!
//! Selection scores every enumerated GPU and keeps the best one that also
//! passes the suitability checks. Scoring and suitability are evaluated
//! independently: a fast but unsuitable device is never picked.

use ash::extensions::khr::{Surface as SurfaceLoader, Swapchain as SwapchainLoader};
use ash::vk;
use ash::{Device, Instance};
use std::collections::HashSet;
use std::ffi::CStr;

use crate::vulkan::{VulkanError, VulkanResult};

/// Fixed score bonus for discrete GPUs over integrated ones
const DISCRETE_GPU_BONUS: i64 = 1000;

/// Suitability and score of one enumerated device, used to pick a winner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeviceCandidate {
    /// Whether the device passed every suitability check
    pub suitable: bool,
    /// Raw score; only compared between suitable devices
    pub score: i64,
}

/// Score a device from its advertised properties.
///
/// Discrete GPUs get a large fixed bonus; the maximum 2D image dimension
/// breaks ties between devices of the same class.
pub(crate) fn score_device(device_type: vk::PhysicalDeviceType, max_image_dimension_2d: u32) -> i64 {
    let mut score = i64::from(max_image_dimension_2d);
    if device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += DISCRETE_GPU_BONUS;
    }
    score
}

/// Index of the best suitable candidate, or `None` when nothing qualifies.
///
/// Unsuitable devices are skipped regardless of score.
pub(crate) fn pick_best(candidates: &[DeviceCandidate]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.suitable)
        .max_by_key(|(_, c)| c.score)
        .map(|(index, _)| index)
}

/// Selected physical device and its capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features
    pub features: vk::PhysicalDeviceFeatures,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family (may equal `graphics_family`)
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    /// Select the highest-scoring suitable device for rendering to `surface`
    pub fn select(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &SurfaceLoader,
    ) -> VulkanResult<Self> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        let mut candidates = Vec::with_capacity(devices.len());
        let mut evaluated = Vec::with_capacity(devices.len());
        for &device in &devices {
            let properties = unsafe { instance.get_physical_device_properties(device) };
            let info = Self::evaluate_device(instance, device, surface, surface_loader)?;
            candidates.push(DeviceCandidate {
                suitable: info.is_some(),
                score: score_device(properties.device_type, properties.limits.max_image_dimension2_d),
            });
            evaluated.push(info);
        }

        let winner = pick_best(&candidates).ok_or(VulkanError::NoSuitableDevice)?;
        let info = evaluated
            .into_iter()
            .nth(winner)
            .flatten()
            .ok_or(VulkanError::NoSuitableDevice)?;

        log::info!("Selected GPU: {} (score {})", unsafe {
            CStr::from_ptr(info.properties.device_name.as_ptr()).to_string_lossy()
        }, candidates[winner].score);

        Ok(info)
    }

    /// Check one device against the suitability requirements.
    ///
    /// Returns `Ok(None)` when the device is healthy but unsuitable, and an
    /// error only when a Vulkan query itself fails.
    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &SurfaceLoader,
    ) -> VulkanResult<Option<Self>> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(device) };

        // Graphics and present queue families (may alias)
        let mut graphics_family = None;
        let mut present_family = None;

        for (index, family) in queue_families.iter().enumerate() {
            let index = index as u32;

            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics_family.is_none() {
                graphics_family = Some(index);
            }

            let present_support = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .map_err(VulkanError::Api)?
            };

            if present_support && present_family.is_none() {
                present_family = Some(index);
            }

            if graphics_family.is_some() && present_family.is_some() {
                break;
            }
        }

        let (Some(graphics_family), Some(present_family)) = (graphics_family, present_family)
        else {
            return Ok(None);
        };

        // Swapchain extension support
        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };

        let has_swapchain = extensions.iter().any(|available| {
            let extension_name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            extension_name == SwapchainLoader::name()
        });
        if !has_swapchain {
            return Ok(None);
        }

        // The surface must offer at least one format and one present mode
        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(device, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(device, surface)
                .map_err(VulkanError::Api)?
        };
        if formats.is_empty() || present_modes.is_empty() {
            return Ok(None);
        }

        if features.sampler_anisotropy == vk::FALSE {
            return Ok(None);
        }

        Ok(Some(Self {
            device,
            properties,
            features,
            graphics_family,
            present_family,
        }))
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Open a logical device with graphics and present queues
    pub fn new(instance: &Instance, physical_device_info: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let unique_families: HashSet<u32> = [
            physical_device_info.graphics_family,
            physical_device_info.present_family,
        ]
        .iter()
        .copied()
        .collect();

        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&[1.0])
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];

        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(true)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical_device_info.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue =
            unsafe { device.get_device_queue(physical_device_info.graphics_family, 0) };
        let present_queue =
            unsafe { device.get_device_queue(physical_device_info.present_family, 0) };

        let swapchain_loader = SwapchainLoader::new(instance, &device);

        log::debug!(
            "Logical device created (graphics family {}, present family {})",
            physical_device_info.graphics_family,
            physical_device_info.present_family
        );

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            graphics_family: physical_device_info.graphics_family,
            present_family: physical_device_info.present_family,
            swapchain_loader,
        })
    }

    /// Block until all submitted GPU work has completed
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle().map_err(VulkanError::Api) }
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            // Ensure device is idle before destruction
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discrete_outscores_integrated() {
        let discrete = score_device(vk::PhysicalDeviceType::DISCRETE_GPU, 4096);
        let integrated = score_device(vk::PhysicalDeviceType::INTEGRATED_GPU, 4096);
        assert!(discrete > integrated);
        assert_eq!(discrete - integrated, DISCRETE_GPU_BONUS);
    }

    #[test]
    fn test_image_dimension_breaks_ties() {
        let big = score_device(vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        let small = score_device(vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        assert!(big > small);
    }

    #[test]
    fn test_pick_best_returns_highest_scoring_suitable() {
        let candidates = [
            DeviceCandidate { suitable: true, score: 5096 },
            DeviceCandidate { suitable: true, score: 17384 },
            DeviceCandidate { suitable: true, score: 9192 },
        ];
        assert_eq!(pick_best(&candidates), Some(1));
    }

    #[test]
    fn test_pick_best_never_selects_unsuitable() {
        // The unsuitable device has the highest raw score.
        let candidates = [
            DeviceCandidate { suitable: false, score: 1_000_000 },
            DeviceCandidate { suitable: true, score: 42 },
        ];
        assert_eq!(pick_best(&candidates), Some(1));
    }

    #[test]
    fn test_pick_best_empty_list() {
        assert_eq!(pick_best(&[]), None);
    }

    #[test]
    fn test_pick_best_all_unsuitable() {
        let candidates = [
            DeviceCandidate { suitable: false, score: 100 },
            DeviceCandidate { suitable: false, score: 200 },
        ];
        assert_eq!(pick_best(&candidates), None);
    }
}
