//! # Quad Engine
//!
//! A compact Vulkan renderer that draws a single rotating, textured quad.
//! The crate owns the full GPU lifecycle: device selection, swapchain
//! presentation, buffer/texture memory, descriptor binding, and per-frame
//! synchronization, including the swapchain recreation protocol on window
//! resize or surface loss.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quad_engine::{RendererConfig, Window, vulkan::Renderer};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RendererConfig::default();
//!     let mut window = Window::new(&config)?;
//!     let mut renderer = Renderer::new(&mut window, &config)?;
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         renderer.draw_frame(&mut window)?;
//!     }
//!     renderer.wait_idle()?;
//!     Ok(())
//! }
//! ```

pub mod camera;
pub mod config;
pub mod geometry;
pub mod vulkan;
pub mod window;

pub use camera::{UniformBufferObject, ZoomControl};
pub use config::{Config, ConfigError, RendererConfig};
pub use geometry::{Vertex, QUAD_INDICES, QUAD_VERTICES};
pub use vulkan::{Renderer, VulkanError, VulkanResult};
pub use window::{Window, WindowError};
