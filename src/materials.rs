// src/materials.rs
// Showroom surface descriptors and the shading parameters the renderer uploads.
//
// The four showroom surfaces are built once per orchestrator and shared through `Arc`;
// meshes hold references, never copies, and nothing mutates a descriptor after creation.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

/// glTF's default index of refraction (F0 of 4%).
pub const DEFAULT_IOR: f32 = 1.5;

/// Which of the two body paints an asset requests.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum PaintVariant {
    #[default]
    Primary,
    Alternate,
}

/// Immutable physically-based surface configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceDescriptor {
    pub name: &'static str,
    pub base_color: [f32; 3],
    pub metalness: f32,
    pub roughness: f32,
    pub clearcoat: Option<f32>,
    pub clearcoat_roughness: f32,
    pub transmission: Option<f32>,
    pub ior: f32,
}

impl SurfaceDescriptor {
    pub fn body_primary() -> Self {
        Self {
            name: "showroom_body_primary",
            base_color: [0.55, 0.02, 0.03],
            metalness: 0.9,
            roughness: 0.35,
            clearcoat: Some(1.0),
            clearcoat_roughness: 0.08,
            transmission: None,
            ior: DEFAULT_IOR,
        }
    }

    pub fn body_alternate() -> Self {
        Self {
            name: "showroom_body_alternate",
            base_color: [0.02, 0.05, 0.22],
            metalness: 0.85,
            roughness: 0.3,
            clearcoat: Some(1.0),
            clearcoat_roughness: 0.05,
            transmission: None,
            ior: DEFAULT_IOR,
        }
    }

    pub fn trim() -> Self {
        Self {
            name: "showroom_trim",
            base_color: [0.75, 0.75, 0.78],
            metalness: 1.0,
            roughness: 0.15,
            clearcoat: None,
            clearcoat_roughness: 0.0,
            transmission: None,
            ior: DEFAULT_IOR,
        }
    }

    pub fn glass() -> Self {
        Self {
            name: "showroom_glass",
            base_color: [0.92, 0.95, 1.0],
            metalness: 0.0,
            roughness: 0.02,
            clearcoat: None,
            clearcoat_roughness: 0.0,
            transmission: Some(0.9),
            ior: DEFAULT_IOR,
        }
    }

    pub fn shading(&self) -> ShadingParams {
        ShadingParams {
            base_color: [self.base_color[0], self.base_color[1], self.base_color[2], 1.0],
            metalness: self.metalness,
            roughness: self.roughness,
            clearcoat: self.clearcoat.unwrap_or(0.0),
            clearcoat_roughness: self.clearcoat_roughness,
            transmission: self.transmission.unwrap_or(0.0),
            ior: self.ior,
        }
    }
}

/// Material as authored in the model file, kept for meshes the classifier leaves alone.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthoredMaterial {
    pub name: String,
    pub base_color: [f32; 4],
    pub metalness: f32,
    pub roughness: f32,
    pub blend: bool,
}

impl Default for AuthoredMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            metalness: 1.0,
            roughness: 1.0,
            blend: false,
        }
    }
}

/// What a mesh is currently shaded with.
#[derive(Clone, Debug)]
pub enum MaterialRef {
    Authored(Arc<AuthoredMaterial>),
    Surface(Arc<SurfaceDescriptor>),
}

impl MaterialRef {
    /// Current surface identifier, fed to the classifier.
    pub fn name(&self) -> &str {
        match self {
            MaterialRef::Authored(material) => &material.name,
            MaterialRef::Surface(surface) => surface.name,
        }
    }

    pub fn shading(&self) -> ShadingParams {
        match self {
            MaterialRef::Authored(material) => ShadingParams {
                base_color: material.base_color,
                metalness: material.metalness,
                roughness: material.roughness,
                clearcoat: 0.0,
                clearcoat_roughness: 0.0,
                transmission: if material.blend {
                    1.0 - material.base_color[3]
                } else {
                    0.0
                },
                ior: DEFAULT_IOR,
            },
            MaterialRef::Surface(surface) => surface.shading(),
        }
    }

    pub fn is_surface(&self, surface: &Arc<SurfaceDescriptor>) -> bool {
        matches!(self, MaterialRef::Surface(current) if Arc::ptr_eq(current, surface))
    }
}

/// Flattened shading inputs consumed by the renderer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ShadingParams {
    pub base_color: [f32; 4],
    pub metalness: f32,
    pub roughness: f32,
    pub clearcoat: f32,
    pub clearcoat_roughness: f32,
    pub transmission: f32,
    pub ior: f32,
}

impl ShadingParams {
    #[inline]
    pub fn is_transparent(&self) -> bool {
        self.transmission > 0.0
    }
}

/// GPU layout of the per-draw surface block; matches `Draw.base_color`, `Draw.surface` and
/// `Draw.coat` in `showroom.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MaterialParams {
    pub base_color_factor: [f32; 4],
    /// x = metalness, y = roughness, z = clearcoat, w = transmission
    pub surface: [f32; 4],
    /// x = clearcoat roughness, y = index of refraction
    pub coat: [f32; 4],
}

impl From<ShadingParams> for MaterialParams {
    fn from(params: ShadingParams) -> Self {
        Self {
            base_color_factor: params.base_color,
            surface: [
                params.metalness,
                params.roughness,
                params.clearcoat,
                params.transmission,
            ],
            coat: [params.clearcoat_roughness, params.ior, 0.0, 0.0],
        }
    }
}

/// The fixed showroom surface set.
#[derive(Clone, Debug)]
pub struct MaterialSet {
    pub body_primary: Arc<SurfaceDescriptor>,
    pub body_alternate: Arc<SurfaceDescriptor>,
    pub trim: Arc<SurfaceDescriptor>,
    pub glass: Arc<SurfaceDescriptor>,
}

impl MaterialSet {
    pub fn new() -> Self {
        Self {
            body_primary: Arc::new(SurfaceDescriptor::body_primary()),
            body_alternate: Arc::new(SurfaceDescriptor::body_alternate()),
            trim: Arc::new(SurfaceDescriptor::trim()),
            glass: Arc::new(SurfaceDescriptor::glass()),
        }
    }

    pub fn body(&self, variant: PaintVariant) -> &Arc<SurfaceDescriptor> {
        match variant {
            PaintVariant::Primary => &self.body_primary,
            PaintVariant::Alternate => &self.body_alternate,
        }
    }
}

impl Default for MaterialSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_switch_selects_variant() {
        let set = MaterialSet::new();
        assert!(Arc::ptr_eq(set.body(PaintVariant::Primary), &set.body_primary));
        assert!(Arc::ptr_eq(set.body(PaintVariant::Alternate), &set.body_alternate));
        assert_ne!(set.body_primary.base_color, set.body_alternate.base_color);
    }

    #[test]
    fn glass_is_transmissive_and_body_is_clearcoated() {
        let set = MaterialSet::new();
        assert!(set.glass.shading().is_transparent());
        assert_eq!(set.body_primary.shading().clearcoat, 1.0);
        assert!(!set.trim.shading().is_transparent());
    }

    #[test]
    fn material_ref_reports_current_name() {
        let set = MaterialSet::new();
        let authored = MaterialRef::Authored(Arc::new(AuthoredMaterial {
            name: "Paint_Red".into(),
            ..AuthoredMaterial::default()
        }));
        assert_eq!(authored.name(), "Paint_Red");
        let swapped = MaterialRef::Surface(set.trim.clone());
        assert_eq!(swapped.name(), "showroom_trim");
        assert!(swapped.is_surface(&set.trim));
        assert!(!swapped.is_surface(&set.glass));
    }

    #[test]
    fn blended_authored_material_maps_alpha_to_transmission() {
        let material = MaterialRef::Authored(Arc::new(AuthoredMaterial {
            name: "tint".into(),
            base_color: [0.1, 0.1, 0.1, 0.25],
            blend: true,
            ..AuthoredMaterial::default()
        }));
        assert!((material.shading().transmission - 0.75).abs() < 1e-6);
    }

    #[test]
    fn gpu_params_pack_surface_terms() {
        let params = MaterialParams::from(SurfaceDescriptor::glass().shading());
        assert_eq!(params.surface, [0.0, 0.02, 0.0, 0.9]);
        assert_eq!(params.coat[1], DEFAULT_IOR);
        assert_eq!(std::mem::size_of::<MaterialParams>(), 48);
    }

    #[test]
    fn paint_coat_roughness_reaches_gpu_params() {
        let primary = MaterialParams::from(SurfaceDescriptor::body_primary().shading());
        let alternate = MaterialParams::from(SurfaceDescriptor::body_alternate().shading());
        assert_eq!(primary.coat[0], 0.08);
        assert_eq!(alternate.coat[0], 0.05);
        let authored = MaterialRef::Authored(Arc::new(AuthoredMaterial::default())).shading();
        assert_eq!(authored.ior, DEFAULT_IOR);
    }
}
