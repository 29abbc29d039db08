//! Per-frame uniform payload and zoom control
//!
//! The quad rotates about +Z at 90 degrees per second under a fixed look-at
//! camera. Scroll input narrows or widens the field of view through
//! [`ZoomControl`]; the combined model/view/projection matrices are packed
//! into a [`UniformBufferObject`] and written into the current frame's
//! persistently mapped uniform buffer.

use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix4, Point3, Vector3};

/// Smallest permitted zoom level
pub const ZOOM_MIN: f32 = 0.1;
/// Largest permitted zoom level
pub const ZOOM_MAX: f32 = 5.0;
/// Zoom change per unit of scroll offset
const SCROLL_SENSITIVITY: f32 = 0.1;

/// Model/view/projection matrices as written into GPU memory
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct UniformBufferObject {
    /// Model transform (rotation about +Z)
    pub model: [[f32; 4]; 4],
    /// View transform (fixed look-at)
    pub view: [[f32; 4]; 4],
    /// Perspective projection with Vulkan's inverted Y clip space
    pub proj: [[f32; 4]; 4],
}

impl UniformBufferObject {
    /// Build the uniform payload for one frame.
    ///
    /// `elapsed` is seconds since application start, `zoom` the clamped zoom
    /// level, and `width`/`height` the current swapchain extent. The
    /// projection's Y axis is flipped because Vulkan's clip space points down
    /// while nalgebra follows the OpenGL convention.
    pub fn new(elapsed: f32, zoom: f32, width: u32, height: u32) -> Self {
        let angle = elapsed * 90.0f32.to_radians();
        let model =
            nalgebra::Rotation3::from_axis_angle(&Vector3::z_axis(), angle).to_homogeneous();

        let view = Matrix4::look_at_rh(
            &Point3::new(2.0, 2.0, 2.0),
            &Point3::origin(),
            &Vector3::z(),
        );

        let fovy = 45.0f32.to_radians() / zoom;
        let aspect = width as f32 / height as f32;
        let mut proj = Matrix4::new_perspective(aspect, fovy, 0.1, 10.0);
        proj[(1, 1)] *= -1.0;

        Self {
            model: model.into(),
            view: view.into(),
            proj: proj.into(),
        }
    }
}

/// Zoom scalar adjusted by scroll input, always clamped to
/// [`ZOOM_MIN`, `ZOOM_MAX`].
///
/// Only ever read and written on the render thread, so no synchronization is
/// needed.
#[derive(Debug, Clone, Copy)]
pub struct ZoomControl {
    level: f32,
}

impl ZoomControl {
    /// Create a control at the neutral zoom level
    pub fn new() -> Self {
        Self { level: 1.0 }
    }

    /// Apply a scroll offset. Positive offsets zoom out, matching the
    /// original scroll-wheel direction.
    pub fn apply_scroll(&mut self, offset: f32) {
        self.level = (self.level - offset * SCROLL_SENSITIVITY).clamp(ZOOM_MIN, ZOOM_MAX);
    }

    /// Current zoom level
    pub fn level(&self) -> f32 {
        self.level
    }
}

impl Default for ZoomControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zoom_starts_neutral() {
        assert_relative_eq!(ZoomControl::new().level(), 1.0);
    }

    #[test]
    fn test_zoom_clamps_large_positive_scroll() {
        let mut zoom = ZoomControl::new();
        zoom.apply_scroll(1000.0);
        assert_relative_eq!(zoom.level(), ZOOM_MIN);
    }

    #[test]
    fn test_zoom_clamps_large_negative_scroll() {
        let mut zoom = ZoomControl::new();
        zoom.apply_scroll(-1000.0);
        assert_relative_eq!(zoom.level(), ZOOM_MAX);
    }

    #[test]
    fn test_zoom_small_steps_accumulate() {
        let mut zoom = ZoomControl::new();
        zoom.apply_scroll(1.0);
        assert_relative_eq!(zoom.level(), 0.9);
        zoom.apply_scroll(-2.0);
        assert_relative_eq!(zoom.level(), 1.1, epsilon = 1e-6);
    }

    #[test]
    fn test_projection_y_axis_flipped() {
        let ubo = UniformBufferObject::new(0.0, 1.0, 800, 600);
        assert!(ubo.proj[1][1] < 0.0);
    }

    #[test]
    fn test_zoom_narrows_field_of_view() {
        let wide = UniformBufferObject::new(0.0, 1.0, 800, 600);
        let narrow = UniformBufferObject::new(0.0, 2.0, 800, 600);
        // A narrower FOV scales up the projection diagonal.
        assert!(narrow.proj[0][0] > wide.proj[0][0]);
    }

    #[test]
    fn test_model_rotation_advances_with_time() {
        let start = UniformBufferObject::new(0.0, 1.0, 800, 600);
        let later = UniformBufferObject::new(1.0, 1.0, 800, 600);
        // Identity at t=0, rotated 90 degrees about +Z after one second.
        assert_relative_eq!(start.model[0][0], 1.0);
        assert_relative_eq!(later.model[0][0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(later.model[0][1], 1.0, epsilon = 1e-6);
    }
}
