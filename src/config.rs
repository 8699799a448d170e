//! # Viewer configuration
//!
//! Every group deserializes with per-field defaults, so a host can supply a
//! partial JSON document and get the stock viewer for everything else.
//!
//! ## Usage
//!
//! ```rust
//! use model_viewer::config::ViewerConfig;
//!
//! let config = ViewerConfig::from_json_str(r##"{ "camera": { "fov": 50 }, "helper": { "grid": { "show": true } } }"##)?;
//! assert_eq!(config.camera.fov, 50.0);
//! assert_eq!(config.camera.near, 0.1);
//! assert!(config.helper.grid.show);
//! # Ok::<(), model_viewer::ViewerError>(())
//! ```

use std::f32::consts::PI;

use cgmath::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::ViewerResult;
use crate::gfx::color::Color;
use crate::loader::LoaderOptions;

/// `{x, y, z}` as it appears in configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<Position> for Vector3<f32> {
    fn from(p: Position) -> Self {
        Vector3::new(p.x, p.y, p.z)
    }
}

impl From<Vector3<f32>> for Position {
    fn from(v: Vector3<f32>) -> Self {
        Position::new(v.x, v.y, v.z)
    }
}

// ---- camera ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: Position,
    pub target: Position,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 75.0,
            near: 0.1,
            far: 1000.0,
            position: Position::new(0.0, 100.0, 200.0),
            target: Position::default(),
        }
    }
}

// ---- controls ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlsConfig {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.05,
            auto_rotate: false,
            auto_rotate_speed: 2.0,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            min_distance: 1.0,
            max_distance: 1000.0,
        }
    }
}

// ---- lights ----

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowCameraConfig {
    pub near: f32,
    pub far: f32,
    pub left: Option<f32>,
    pub right: Option<f32>,
    pub top: Option<f32>,
    pub bottom: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShadowConfig {
    pub enabled: bool,
    pub map_size: u32,
    pub bias: f32,
    pub radius: f32,
    pub blur_samples: u32,
    pub camera: ShadowCameraConfig,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            map_size: 1024,
            bias: -0.001,
            radius: 4.0,
            blur_samples: 8,
            camera: ShadowCameraConfig {
                near: 0.5,
                far: 500.0,
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AmbientConfig {
    pub enabled: bool,
    pub intensity: f32,
    pub color: Color,
    /// Ground color of the hemisphere light standing in for ambient
    pub ground_color: Color,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: 0.5,
            color: Color::WHITE,
            ground_color: Color::from_hex(0x444444),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalConfig {
    pub enabled: bool,
    pub intensity: f32,
    pub color: Color,
    pub position: Position,
    pub shadow: ShadowConfig,
    /// Show the debug helper on build
    pub helper: bool,
}

impl Default for DirectionalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: 1.0,
            color: Color::WHITE,
            position: Position::new(50.0, 50.0, 50.0),
            shadow: ShadowConfig {
                enabled: true,
                map_size: 4096,
                camera: ShadowCameraConfig {
                    near: 1.0,
                    far: 1000.0,
                    left: Some(-100.0),
                    right: Some(100.0),
                    top: Some(100.0),
                    bottom: Some(-100.0),
                },
                ..Default::default()
            },
            helper: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointConfig {
    pub enabled: bool,
    pub intensity: f32,
    pub color: Color,
    pub position: Position,
    pub distance: f32,
    pub decay: f32,
    pub shadow: ShadowConfig,
    pub helper: bool,
}

impl Default for PointConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            intensity: 1.0,
            color: Color::WHITE,
            position: Position::default(),
            distance: 400.0,
            decay: 1.0,
            shadow: ShadowConfig::default(),
            helper: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotConfig {
    pub enabled: bool,
    pub intensity: f32,
    pub color: Color,
    pub position: Position,
    pub target: Position,
    /// Cone half-angle in radians
    pub angle: f32,
    pub penumbra: f32,
    pub distance: f32,
    pub decay: f32,
    pub shadow: ShadowConfig,
    pub helper: bool,
}

impl Default for SpotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            intensity: 1.0,
            color: Color::WHITE,
            position: Position::new(10.0, 10.0, 10.0),
            target: Position::default(),
            angle: PI / 6.0,
            penumbra: 0.1,
            distance: 200.0,
            decay: 2.0,
            shadow: ShadowConfig {
                enabled: true,
                ..Default::default()
            },
            helper: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LightsConfig {
    pub ambient: AmbientConfig,
    pub directional: DirectionalConfig,
    pub point: PointConfig,
    pub spot: SpotConfig,
}

// ---- helpers ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub show: bool,
    pub size: f32,
    pub divisions: u32,
    pub color: Color,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            show: false,
            size: 1000.0,
            divisions: 100,
            color: Color::from_hex(0x888888),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxesConfig {
    pub show: bool,
    pub size: f32,
}

impl Default for AxesConfig {
    fn default() -> Self {
        Self {
            show: false,
            size: 400.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorConfig {
    pub show: bool,
    /// Edge length of the square floor plane
    pub size: f32,
    pub color: Color,
    pub opacity: f32,
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self {
            show: true,
            size: 1000.0,
            color: Color::from_hex(0x666666),
            opacity: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub show: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { show: true }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HelperConfig {
    pub grid: GridConfig,
    pub axes: AxesConfig,
    pub floor: FloorConfig,
    pub stats: StatsConfig,
}

// ---- background ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundKind {
    #[default]
    Color,
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    #[serde(rename = "type")]
    pub kind: BackgroundKind,
    /// A color for `color`, a URL for `image`
    pub value: String,
    pub opacity: f32,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            kind: BackgroundKind::Color,
            value: "#f0f2f5".to_string(),
            opacity: 1.0,
        }
    }
}

// ---- renderer ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShadowMapKind {
    Basic,
    Pcf,
    #[default]
    PcfSoft,
    Vsm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToneMapping {
    None,
    Linear,
    Reinhard,
    #[default]
    AcesFilmic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RendererConfig {
    pub antialias: bool,
    pub alpha: bool,
    pub shadow_map: ShadowMapKind,
    pub tone_mapping: ToneMapping,
    pub tone_mapping_exposure: f32,
    /// Render at the host's device pixel ratio
    pub pixel_ratio: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            antialias: true,
            alpha: true,
            shadow_map: ShadowMapKind::PcfSoft,
            tone_mapping: ToneMapping::AcesFilmic,
            tone_mapping_exposure: 1.0,
            pixel_ratio: 1.0,
        }
    }
}

// ---- model ----

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Render every material of a newly installed model as wireframe
    pub wireframe: bool,
}

/// Complete viewer configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub lights: LightsConfig,
    pub helper: HelperConfig,
    pub background: BackgroundConfig,
    pub renderer: RendererConfig,
    pub model: ModelConfig,
    pub loader: LoaderOptions,
}

impl ViewerConfig {
    pub fn from_json_str(json: &str) -> ViewerResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> ViewerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::default();
        assert_eq!(config.camera.fov, 75.0);
        assert_eq!(config.camera.position, Position::new(0.0, 100.0, 200.0));
        assert!(config.controls.enable_damping);
        assert_eq!(config.controls.damping_factor, 0.05);
        assert!(config.lights.ambient.enabled);
        assert!(!config.lights.point.enabled);
        assert_eq!(config.lights.directional.shadow.map_size, 4096);
        assert_eq!(config.helper.floor.color, Color::from_hex(0x666666));
        assert_eq!(config.helper.grid.divisions, 100);
        assert_eq!(config.background.value, "#f0f2f5");
        assert_eq!(config.loader.target_size, Some(100.0));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ViewerConfig::from_json_str(
            r##"{
                "lights": { "point": { "enabled": true, "position": { "y": 30 } } },
                "controls": { "autoRotate": true },
                "helper": { "floor": { "color": "#abc" } },
                "background": { "type": "image", "value": "sky.png" }
            }"##,
        )
        .unwrap();
        assert!(config.lights.point.enabled);
        assert_eq!(config.lights.point.position, Position::new(0.0, 30.0, 0.0));
        assert_eq!(config.lights.point.distance, 400.0);
        assert!(config.controls.auto_rotate);
        assert_eq!(config.controls.auto_rotate_speed, 2.0);
        assert_eq!(config.helper.floor.color, Color::from_hex(0xaabbcc));
        assert_eq!(config.background.kind, BackgroundKind::Image);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let result = ViewerConfig::from_json_str("{ \"camera\": 3 }");
        assert!(matches!(result, Err(crate::ViewerError::Config(_))));
    }

    #[test]
    fn test_json_round_trip() {
        let config = ViewerConfig::default();
        let json = config.to_json_string().unwrap();
        assert_eq!(ViewerConfig::from_json_str(&json).unwrap(), config);
    }
}
