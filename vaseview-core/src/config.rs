//! Viewer configuration, loadable from TOML

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Rgb;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level viewer configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub frame: FrameConfig,
    pub lighting: LightingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Margin multiplier applied to the exact-fit framing distance
    pub backoff: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            backoff: 2.0,
        }
    }
}

impl CameraConfig {
    pub fn fov_radians(&self) -> f32 {
        self.fov_degrees.to_radians()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Fraction of the pending orbit delta applied per frame
    pub damping: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            damping: 0.25,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 1.0,
            max_distance: 500.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub fps: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self { fps: 30 }
    }
}

impl FrameConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub background: Rgb,
    pub ambient: f32,
    pub key_intensity: f32,
    pub key_direction: [f32; 3],
    pub back_intensity: f32,
    pub back_direction: [f32; 3],
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            background: Rgb::from_hex(0xf5f5f5),
            ambient: 0.7,
            key_intensity: 0.8,
            key_direction: [1.0, 1.0, 1.0],
            back_intensity: 0.4,
            back_direction: [-1.0, -1.0, -1.0],
        }
    }
}

impl ViewerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let camera = &self.camera;
        if !(camera.fov_degrees > 0.0 && camera.fov_degrees < 180.0) {
            return Err(invalid("camera.fov_degrees", "must be within (0, 180)"));
        }
        if !(camera.near > 0.0 && camera.far > camera.near) {
            return Err(invalid("camera.far", "need 0 < near < far"));
        }
        // A corner of the box sits half a box closer than its center
        let min_backoff = 1.0 + (camera.fov_radians() / 2.0).tan();
        if !(camera.backoff > 1.0 && camera.backoff >= min_backoff) {
            return Err(invalid(
                "camera.backoff",
                format!("must be > 1 and >= {min_backoff:.3} for this field of view"),
            ));
        }

        let controls = &self.controls;
        if !(controls.damping > 0.0 && controls.damping <= 1.0) {
            return Err(invalid("controls.damping", "must be within (0, 1]"));
        }
        if !(controls.min_distance > 0.0 && controls.max_distance > controls.min_distance) {
            return Err(invalid(
                "controls.max_distance",
                "need 0 < min_distance < max_distance",
            ));
        }

        if self.frame.fps == 0 {
            return Err(invalid("frame.fps", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        ViewerConfig::default().validate().unwrap();
        assert_eq!(FrameConfig::default().interval(), Duration::from_secs_f64(1.0 / 30.0));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ViewerConfig::from_toml_str(
            r##"
            [camera]
            fov_degrees = 45.0

            [lighting]
            background = "#000000"
            "##,
        )
        .unwrap();
        assert_eq!(config.camera.fov_degrees, 45.0);
        assert_eq!(config.camera.backoff, 2.0);
        assert_eq!(config.lighting.background, Rgb::new(0, 0, 0));
        assert_eq!(config.controls, ControlsConfig::default());
    }

    #[test]
    fn test_backoff_too_small_for_fov() {
        let err = ViewerConfig::from_toml_str("[camera]\nfov_degrees = 120.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "camera.backoff", .. }));
    }

    #[test]
    fn test_rejects_bad_damping() {
        let err = ViewerConfig::from_toml_str("[controls]\ndamping = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "controls.damping", .. }));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            ViewerConfig::from_toml_str("[camera\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
