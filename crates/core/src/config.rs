//! Renderer configuration.
//!
//! Startup options come from an optional TOML file; every key has a default,
//! so a partial file (or no file at all) is valid. [`RenderSettings`] is the
//! subset that can change while the renderer is running.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Smallest accepted render scale.
pub const MIN_RENDER_SCALE: f32 = 0.3;
/// Largest accepted render scale.
pub const MAX_RENDER_SCALE: f32 = 1.0;

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub window: WindowConfig,
    pub render: RenderConfig,
    pub logging: LoggingConfig,
}

/// `[window]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1700,
            height: 900,
            title: "Frame Renderer".to_string(),
        }
    }
}

/// `[render]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Fraction of the draw image used each frame; clamped on use.
    pub render_scale: f32,
    /// Index of the background compute effect.
    pub background_effect: usize,
    /// Request validation layers when they are installed.
    pub validation: bool,
    /// Directory holding the compiled SPIR-V shaders.
    pub shader_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            render_scale: 1.0,
            background_effect: 0,
            validation: true,
            shader_dir: PathBuf::from("shaders"),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: crate::DEFAULT_FILTER.to_string(),
        }
    }
}

impl RendererConfig {
    /// Read configuration from `path`, or `None` if there is no such file.
    ///
    /// Nothing is logged here: the file supplies the log filter, so it is
    /// read before logging is installed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file exists but cannot be read, and
    /// [`Error::Config`] if it is not valid TOML for this layout.
    pub fn read(path: impl AsRef<Path>) -> Result<Option<Self>> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => Self::from_toml_str(&contents).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Runtime settings seeded from this configuration.
    pub fn render_settings(&self) -> RenderSettings {
        let mut settings = RenderSettings {
            render_scale: MAX_RENDER_SCALE,
            background_effect: self.render.background_effect,
        };
        settings.set_render_scale(self.render.render_scale);
        settings
    }
}

/// Settings the UI may change between frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    render_scale: f32,
    /// Index of the active background effect.
    pub background_effect: usize,
}

impl RenderSettings {
    pub fn render_scale(&self) -> f32 {
        self.render_scale
    }

    /// Set the render scale, clamped to `[MIN_RENDER_SCALE, MAX_RENDER_SCALE]`.
    /// NaN resets to full scale.
    pub fn set_render_scale(&mut self, scale: f32) {
        self.render_scale = if scale.is_nan() {
            MAX_RENDER_SCALE
        } else {
            scale.clamp(MIN_RENDER_SCALE, MAX_RENDER_SCALE)
        };
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            render_scale: MAX_RENDER_SCALE,
            background_effect: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = RendererConfig::from_toml_str("").unwrap();
        assert_eq!(config, RendererConfig::default());
        assert_eq!(config.window.width, 1700);
        assert_eq!(config.window.height, 900);
    }

    #[test]
    fn test_partial_document_overrides_only_given_keys() {
        let config = RendererConfig::from_toml_str(
            r#"
            [render]
            render_scale = 0.5
            background_effect = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.render.render_scale, 0.5);
        assert_eq!(config.render.background_effect, 2);
        assert_eq!(config.window, WindowConfig::default());
    }

    #[test]
    fn test_malformed_document_is_config_error() {
        let err = RendererConfig::from_toml_str("[window]\nwidth = \"wide\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_file_reads_as_none() {
        let config = RendererConfig::read("definitely/not/here/frame.toml").unwrap();
        assert_eq!(config, None);
    }

    #[test]
    fn test_existing_file_is_parsed() {
        let path = std::env::temp_dir().join(format!("frame-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[logging]\nfilter = \"warn\"\n").unwrap();

        let config = RendererConfig::read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let config = config.unwrap();
        assert_eq!(config.logging.filter, "warn");
        assert_eq!(config.render, RenderConfig::default());
    }

    #[test]
    fn test_validation_defaults_on() {
        assert!(RenderConfig::default().validation);
    }

    #[test]
    fn test_render_scale_is_clamped() {
        let mut settings = RenderSettings::default();
        settings.set_render_scale(0.1);
        assert_eq!(settings.render_scale(), MIN_RENDER_SCALE);
        settings.set_render_scale(4.0);
        assert_eq!(settings.render_scale(), MAX_RENDER_SCALE);
        settings.set_render_scale(0.75);
        assert_eq!(settings.render_scale(), 0.75);
        settings.set_render_scale(f32::NAN);
        assert_eq!(settings.render_scale(), MAX_RENDER_SCALE);
    }

    #[test]
    fn test_settings_from_config_clamp_scale() {
        let config = RendererConfig::from_toml_str("[render]\nrender_scale = 0.01").unwrap();
        assert_eq!(config.render_settings().render_scale(), MIN_RENDER_SCALE);
    }
}
