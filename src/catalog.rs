// src/catalog.rs
//! Vehicle catalog entries and the per-model rules keyed by catalog identifier.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::materials::PaintVariant;

/// Uniform scale applied to models authored in centimeter units.
pub const CENTIMETER_SCALE: f32 = 100.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub model_asset_path: Option<String>,
    pub cover_image_path: String,
    #[serde(default)]
    pub image_paths: Vec<String>,
}

impl CatalogEntry {
    pub fn has_model(&self) -> bool {
        self.model_asset_path.is_some()
    }
}

fn entry(id: &str, title: &str, model: Option<&str>) -> CatalogEntry {
    CatalogEntry {
        id: id.to_string(),
        title: title.to_string(),
        model_asset_path: model.map(str::to_string),
        cover_image_path: format!("/images/{id}/cover.jpg"),
        image_paths: (1..=3).map(|i| format!("/images/{id}/{i}.jpg")).collect(),
    }
}

/// Stock catalog used when the config file provides none.
pub fn builtin_catalog() -> Vec<CatalogEntry> {
    vec![
        entry("gallardo", "Lamborghini Gallardo", Some("/models/gallardo.glb")),
        entry("porsche911", "Porsche 911", Some("/models/porsche911.glb")),
        entry("mustang", "Ford Mustang", Some("/models/mustang.glb")),
        entry("ferrari", "Ferrari F40", Some("/models/ferrari.glb")),
        entry("jetta", "Volkswagen Jetta", None),
    ]
}

/// Allow-lists driving material classification, paint choice and unit scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelRulesConfig {
    /// Identifiers whose meshes go through the classifier.
    pub paintable: Vec<String>,
    /// Identifiers authored in centimeters.
    pub centimeter_units: Vec<String>,
    /// Paintable identifiers that use the alternate body paint.
    pub alternate_paint: Vec<String>,
    /// Vertical placement of every model.
    pub ground_offset: f32,
}

impl Default for ModelRulesConfig {
    fn default() -> Self {
        Self {
            paintable: vec!["gallardo".into(), "porsche911".into(), "mustang".into()],
            centimeter_units: vec!["gallardo".into()],
            alternate_paint: vec!["mustang".into()],
            ground_offset: 0.0,
        }
    }
}

/// Everything the orchestrator needs to know about one asset before walking its meshes.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProfile {
    pub identifier: String,
    pub paintable: bool,
    pub paint: PaintVariant,
    pub scale: f32,
    pub ground_offset: f32,
}

/// Compiled form of [`ModelRulesConfig`].
#[derive(Debug, Clone)]
pub struct ModelRules {
    paintable: HashSet<String>,
    centimeter_units: HashSet<String>,
    alternate_paint: HashSet<String>,
    ground_offset: f32,
}

impl ModelRules {
    pub fn new(config: &ModelRulesConfig) -> Self {
        let lower = |ids: &[String]| ids.iter().map(|id| id.to_lowercase()).collect();
        Self {
            paintable: lower(&config.paintable),
            centimeter_units: lower(&config.centimeter_units),
            alternate_paint: lower(&config.alternate_paint),
            ground_offset: config.ground_offset,
        }
    }

    pub fn scale_for(&self, identifier: &str) -> f32 {
        if self.centimeter_units.contains(&identifier.to_lowercase()) {
            CENTIMETER_SCALE
        } else {
            1.0
        }
    }

    pub fn profile(&self, identifier: &str) -> ModelProfile {
        let key = identifier.to_lowercase();
        let paint = if self.alternate_paint.contains(&key) {
            PaintVariant::Alternate
        } else {
            PaintVariant::Primary
        };
        ModelProfile {
            paintable: self.paintable.contains(&key),
            paint,
            scale: self.scale_for(&key),
            ground_offset: self.ground_offset,
            identifier: key,
        }
    }

    /// Profile for a bare asset locator, keyed by its file stem.
    pub fn profile_for_path(&self, asset_path: &str) -> ModelProfile {
        self.profile(&identifier_from_path(asset_path))
    }
}

impl Default for ModelRules {
    fn default() -> Self {
        Self::new(&ModelRulesConfig::default())
    }
}

/// Catalog identifier implied by a model locator: its lower-cased file stem.
pub fn identifier_from_path(asset_path: &str) -> String {
    Path::new(asset_path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(asset_path)
        .to_lowercase()
}
