//! Window management using GLFW
//!
//! Provides cross-platform window creation and event handling for Vulkan.
//! The renderer only relies on the small capability surface exposed here:
//! framebuffer size queries, blocking event waits while minimized, and the
//! Vulkan surface/extension hooks.

use thiserror::Error;

use crate::config::RendererConfig;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW failed to initialize
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// Any other GLFW-reported failure
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    /// Create a window sized and titled per `config`
    pub fn new(config: &RendererConfig) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|_| WindowError::InitializationFailed)?;

        // Vulkan renders without an OpenGL context
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = if config.fullscreen {
            glfw.with_primary_monitor(|glfw, monitor| match monitor {
                Some(monitor) => glfw.create_window(
                    config.window_width,
                    config.window_height,
                    &config.application_name,
                    glfw::WindowMode::FullScreen(monitor),
                ),
                None => glfw.create_window(
                    config.window_width,
                    config.window_height,
                    &config.application_name,
                    glfw::WindowMode::Windowed,
                ),
            })
        } else {
            glfw.create_window(
                config.window_width,
                config.window_height,
                &config.application_name,
                glfw::WindowMode::Windowed,
            )
        }
        .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);
        window.set_scroll_polling(true);

        Ok(Self {
            glfw,
            window,
            events,
        })
    }

    /// Whether the user has requested the window to close
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request the window to close
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Process pending window-system events without blocking
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
    }

    /// Block until at least one window-system event arrives.
    ///
    /// Used while the framebuffer is degenerate (minimized window) to avoid
    /// spinning during swapchain recreation.
    pub fn wait_events(&mut self) {
        self.glfw.wait_events();
    }

    /// Drain buffered events received since the last poll
    pub fn flush_events(&self) -> glfw::FlushedMessages<'_, (f64, glfw::WindowEvent)> {
        glfw::flush_messages(&self.events)
    }

    /// Current framebuffer size in pixels (may be zero while minimized)
    pub fn get_framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width as u32, height as u32)
    }

    /// Get required Vulkan instance extensions from GLFW
    pub fn get_required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| {
                WindowError::GlfwError("Failed to get required extensions".to_string())
            })
    }

    /// Create a Vulkan surface using GLFW's built-in functionality
    pub fn create_vulkan_surface(
        &mut self,
        instance: ash::vk::Instance,
    ) -> WindowResult<ash::vk::SurfaceKHR> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!(
                "Failed to create Vulkan surface: {:?}",
                result
            )))
        }
    }
}
