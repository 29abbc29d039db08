//! Configuration system
//!
//! Applications customize the renderer through [`RendererConfig`] instead of
//! hardcoding values in the rendering code. Configs load from TOML or RON
//! files through the [`Config`] trait.

pub use serde::{Deserialize, Serialize};

/// Configuration trait for types that load from and save to disk
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, Default::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Renderer and window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for the Vulkan instance and window title
    pub application_name: String,
    /// Initial window width in pixels
    pub window_width: u32,
    /// Initial window height in pixels
    pub window_height: u32,
    /// Create the window fullscreen on the primary monitor
    pub fullscreen: bool,
    /// Path to the compiled vertex shader (SPIR-V)
    pub vertex_shader: String,
    /// Path to the compiled fragment shader (SPIR-V)
    pub fragment_shader: String,
    /// Path to the quad texture image
    pub texture: String,
    /// Background clear color [R, G, B, A] (0.0-1.0 range)
    pub clear_color: [f32; 4],
    /// Whether to enable Vulkan validation layers (debug builds only)
    pub enable_validation: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "Textured Quad".to_string(),
            window_width: 900,
            window_height: 750,
            fullscreen: false,
            vertex_shader: "shaders/quad.vert.spv".to_string(),
            fragment_shader: "shaders/quad.frag.spv".to_string(),
            texture: "data/texture.png".to_string(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            enable_validation: true,
        }
    }
}

impl Config for RendererConfig {}

impl RendererConfig {
    /// Load from `path`, falling back to defaults when the file is absent
    pub fn load_or_default(path: &str) -> Result<Self, ConfigError> {
        match Self::load_from_file(path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {path}, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_dimensions() {
        let config = RendererConfig::default();
        assert_eq!(config.window_width, 900);
        assert_eq!(config.window_height, 750);
        assert!(!config.fullscreen);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: RendererConfig =
            toml::from_str("window_width = 640\nwindow_height = 480\n").unwrap();
        assert_eq!(config.window_width, 640);
        assert_eq!(config.window_height, 480);
        assert_eq!(config.vertex_shader, "shaders/quad.vert.spv");
    }

    #[test]
    fn test_load_missing_file_falls_back_to_default() {
        let config = RendererConfig::load_or_default("does/not/exist.toml").unwrap();
        assert_eq!(config.application_name, "Textured Quad");
    }

    #[test]
    fn test_unsupported_format_rejected() {
        assert!(matches!(
            RendererConfig::load_from_file("config.yaml"),
            Err(ConfigError::UnsupportedFormat(_)) | Err(ConfigError::Io(_))
        ));
    }
}
