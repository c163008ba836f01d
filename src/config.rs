// src/config.rs
//! Showroom configuration, loaded once at startup from JSON.
//!
//! Every section has defaults so a partial file (or none) yields the stock showroom.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogEntry, ModelRulesConfig};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: 45.0,
            near: 0.1,
            far: 1000.0,
            position: [4.5, 2.0, 6.0],
            target: [0.0, 0.5, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    /// Exponential damping rate (1/s); higher settles faster.
    pub damping: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Polar angle bounds in radians, measured from +Y.
    pub min_polar: f32,
    pub max_polar: f32,
    /// Radians per pixel of drag.
    pub rotate_speed: f32,
    /// Zoom factor per wheel line.
    pub zoom_speed: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            damping: 8.0,
            min_distance: 3.0,
            max_distance: 15.0,
            min_polar: 0.2,
            max_polar: std::f32::consts::FRAC_PI_2 - 0.05,
            rotate_speed: 0.005,
            zoom_speed: 0.1,
        }
    }
}

impl OrbitConfig {
    /// Rejects non-finite values and inverted distance or polar ranges.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::Config(serde::de::Error::custom(reason));
        let fields = [
            ("damping", self.damping),
            ("min_distance", self.min_distance),
            ("max_distance", self.max_distance),
            ("min_polar", self.min_polar),
            ("max_polar", self.max_polar),
            ("rotate_speed", self.rotate_speed),
            ("zoom_speed", self.zoom_speed),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, value)| !value.is_finite()) {
            return Err(invalid(format!("controls.{name} must be finite, got {value}")));
        }
        if self.min_distance > self.max_distance {
            return Err(invalid(format!(
                "controls.min_distance ({}) exceeds max_distance ({})",
                self.min_distance, self.max_distance
            )));
        }
        if self.min_polar > self.max_polar {
            return Err(invalid(format!(
                "controls.min_polar ({}) exceeds max_polar ({})",
                self.min_polar, self.max_polar
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub ambient_intensity: f32,
    pub sun_intensity: f32,
    pub sun_position: [f32; 3],
    pub shadow_map_size: u32,
    pub shadow_extent: f32,
    pub accent_colors: [[f32; 3]; 2],
    pub accent_intensity: f32,
    pub environment_intensity: f32,
    pub ground_size: f32,
    pub ground_height: f32,
    pub exposure: f32,
    pub clear_color: [f32; 3],
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            ambient_intensity: 0.4,
            sun_intensity: 1.5,
            sun_position: [5.0, 10.0, 7.5],
            shadow_map_size: 2048,
            shadow_extent: 8.0,
            accent_colors: [[0.0, 0.6, 1.0], [1.0, 0.2, 0.6]],
            accent_intensity: 2.0,
            environment_intensity: 0.6,
            ground_size: 50.0,
            ground_height: -0.01,
            exposure: 1.0,
            clear_color: [0.07, 0.07, 0.08],
        }
    }
}

/// Compressed-geometry decoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Location of the Draco decoder runtime.
    pub draco_runtime: PathBuf,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            draco_runtime: PathBuf::from("/draco/"),
        }
    }
}

/// How overlapping `load_model` calls resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupersedePolicy {
    /// Only the most recently issued request may attach its model.
    #[default]
    LatestRequestWins,
    /// Every successful completion replaces the active model; the last to finish stays.
    LastCompletionWins,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShowroomConfig {
    /// Directory model locators are resolved against.
    pub asset_root: PathBuf,
    pub camera: CameraConfig,
    pub controls: OrbitConfig,
    pub lighting: LightingConfig,
    pub models: ModelRulesConfig,
    pub decoder: DecoderConfig,
    pub supersede: SupersedePolicy,
    pub catalog: Vec<CatalogEntry>,
}

impl Default for ShowroomConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("assets"),
            camera: CameraConfig::default(),
            controls: OrbitConfig::default(),
            lighting: LightingConfig::default(),
            models: ModelRulesConfig::default(),
            decoder: DecoderConfig::default(),
            supersede: SupersedePolicy::default(),
            catalog: crate::catalog::builtin_catalog(),
        }
    }
}

impl ShowroomConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.controls.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)
            .map_err(|e| e.context(format!("parsing {}", path.display())))?;
        log::info!(
            "Loaded showroom config from {} ({} catalog entries)",
            path.display(),
            config.catalog.len()
        );
        Ok(config)
    }
}
