// src/lighting.rs
// Showroom lighting rig: ambient fill, shadow-casting sun, two accent spots,
// a shadow-receiving ground plane and a room-style environment.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::config::LightingConfig;
use crate::materials::{AuthoredMaterial, MaterialRef};
use crate::scene::{Geometry, Mesh, PlacedLight, SceneNode, Transform};

/// Maximum spotlights packed into the frame uniform.
pub const MAX_SPOT_LIGHTS: usize = 2;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ShadowSettings {
    pub map_size: u32,
    /// Half-width of the orthographic shadow frustum.
    pub extent: f32,
    pub near: f32,
    pub far: f32,
    pub bias: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            map_size: 2048,
            extent: 8.0,
            near: 0.5,
            far: 50.0,
            bias: 0.0015,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Light {
    Ambient {
        color: [f32; 3],
        intensity: f32,
    },
    /// Shines from its node position towards `target`.
    Directional {
        color: [f32; 3],
        intensity: f32,
        target: Vec3,
        shadow: Option<ShadowSettings>,
    },
    Spot {
        color: [f32; 3],
        intensity: f32,
        target: Vec3,
        /// Outer cone half-angle in radians.
        angle: f32,
        /// Fraction of the cone that fades out, 0..1.
        penumbra: f32,
    },
}

/// Image-based lighting approximation of a neutral interior room: bright ceiling,
/// darker floor, blended by surface orientation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Environment {
    pub ceiling: [f32; 3],
    pub floor: [f32; 3],
    pub intensity: f32,
}

impl Environment {
    pub fn room(intensity: f32) -> Self {
        Self {
            ceiling: [0.95, 0.95, 0.97],
            floor: [0.28, 0.27, 0.26],
            intensity,
        }
    }

    /// Diffuse irradiance for a world-space normal.
    pub fn irradiance(&self, normal: Vec3) -> Vec3 {
        let t = normal.normalize_or_zero().y * 0.5 + 0.5;
        Vec3::from(self.floor).lerp(Vec3::from(self.ceiling), t) * self.intensity
    }
}

/// Light nodes plus the ground plane for the showroom.
pub fn showroom_rig(config: &LightingConfig) -> Vec<SceneNode> {
    let shadow = ShadowSettings {
        map_size: config.shadow_map_size,
        extent: config.shadow_extent,
        ..ShadowSettings::default()
    };

    let mut nodes = vec![
        SceneNode::light(
            "ambient_fill",
            Light::Ambient {
                color: [1.0, 1.0, 1.0],
                intensity: config.ambient_intensity,
            },
        ),
        SceneNode::light(
            "key_light",
            Light::Directional {
                color: [1.0, 0.98, 0.95],
                intensity: config.sun_intensity,
                target: Vec3::ZERO,
                shadow: Some(shadow),
            },
        )
        .with_transform(Transform::from_translation(Vec3::from(config.sun_position))),
    ];

    let spots = [
        ("accent_left", config.accent_colors[0], Vec3::new(-5.0, 5.0, 5.0)),
        ("accent_right", config.accent_colors[1], Vec3::new(5.0, 5.0, -5.0)),
    ];
    for (name, color, position) in spots {
        nodes.push(
            SceneNode::light(
                name,
                Light::Spot {
                    color,
                    intensity: config.accent_intensity,
                    target: Vec3::ZERO,
                    angle: std::f32::consts::FRAC_PI_6,
                    penumbra: 0.5,
                },
            )
            .with_transform(Transform::from_translation(position)),
        );
    }

    nodes.push(ground_plane(config));
    nodes
}

fn ground_plane(config: &LightingConfig) -> SceneNode {
    let material = MaterialRef::Authored(Arc::new(AuthoredMaterial {
        name: "showroom_floor".into(),
        base_color: [0.18, 0.18, 0.2, 1.0],
        metalness: 0.0,
        roughness: 0.8,
        blend: false,
    }));
    let mut mesh = Mesh::new(Arc::new(Geometry::plane(config.ground_size)), material);
    mesh.receive_shadow = true;
    SceneNode::mesh("ground", mesh)
        .with_transform(Transform::from_translation(Vec3::new(0.0, config.ground_height, 0.0)))
}

/// GPU layout of the lighting part of the frame uniform; matches `Frame` in `showroom.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct LightUniforms {
    pub light_view_proj: [[f32; 4]; 4],
    pub ambient: [f32; 4],
    /// xyz = direction towards the sun, w = shadow bias
    pub sun_dir: [f32; 4],
    /// rgb premultiplied by intensity, w = 1 when the sun casts shadows
    pub sun_color: [f32; 4],
    /// xyz = position, w = cos(outer angle)
    pub spot_pos: [[f32; 4]; MAX_SPOT_LIGHTS],
    /// xyz = direction, w = cos(inner angle)
    pub spot_dir: [[f32; 4]; MAX_SPOT_LIGHTS],
    pub spot_color: [[f32; 4]; MAX_SPOT_LIGHTS],
    /// rgb ceiling colour, w = intensity
    pub env_ceiling: [f32; 4],
    pub env_floor: [f32; 4],
}

impl LightUniforms {
    /// Pack placed lights; extra lights beyond what the shader supports are ignored.
    pub fn pack(lights: &[PlacedLight], environment: Option<&Environment>) -> Self {
        let mut out = Self::zeroed();
        out.light_view_proj = Mat4::IDENTITY.to_cols_array_2d();
        let mut spots = 0usize;
        let mut has_sun = false;

        for placed in lights {
            match &placed.light {
                Light::Ambient { color, intensity } => {
                    for i in 0..3 {
                        out.ambient[i] += color[i] * intensity;
                    }
                }
                Light::Directional {
                    color,
                    intensity,
                    target,
                    shadow,
                } if !has_sun => {
                    has_sun = true;
                    let dir = (placed.position - *target).normalize_or_zero();
                    out.sun_dir = [dir.x, dir.y, dir.z, shadow.map_or(0.0, |s| s.bias)];
                    out.sun_color = [
                        color[0] * intensity,
                        color[1] * intensity,
                        color[2] * intensity,
                        if shadow.is_some() { 1.0 } else { 0.0 },
                    ];
                    if let Some(settings) = shadow {
                        out.light_view_proj =
                            shadow_view_proj(placed.position, *target, settings).to_cols_array_2d();
                    }
                }
                Light::Directional { .. } => {
                    log::debug!("ignoring additional directional light");
                }
                Light::Spot {
                    color,
                    intensity,
                    target,
                    angle,
                    penumbra,
                } => {
                    if spots == MAX_SPOT_LIGHTS {
                        continue;
                    }
                    let dir = (*target - placed.position).normalize_or_zero();
                    let inner = angle * (1.0 - penumbra.clamp(0.0, 1.0));
                    out.spot_pos[spots] = [
                        placed.position.x,
                        placed.position.y,
                        placed.position.z,
                        angle.cos(),
                    ];
                    out.spot_dir[spots] = [dir.x, dir.y, dir.z, inner.cos()];
                    out.spot_color[spots] =
                        [color[0] * intensity, color[1] * intensity, color[2] * intensity, 1.0];
                    spots += 1;
                }
            }
        }

        if let Some(env) = environment {
            out.env_ceiling = [env.ceiling[0], env.ceiling[1], env.ceiling[2], env.intensity];
            out.env_floor = [env.floor[0], env.floor[1], env.floor[2], env.intensity];
        }
        out
    }

    pub fn casts_shadows(&self) -> bool {
        self.sun_color[3] > 0.5
    }
}

/// Orthographic light-space matrix covering the showroom floor around `target`.
pub fn shadow_view_proj(position: Vec3, target: Vec3, settings: &ShadowSettings) -> Mat4 {
    let up = if (position - target).normalize_or_zero().abs_diff_eq(Vec3::Y, 1e-3) {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let view = Mat4::look_at_rh(position, target, up);
    let e = settings.extent;
    let proj = Mat4::orthographic_rh(-e, e, -e, e, settings.near, settings.far);
    proj * view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NodeKind;

    fn rig() -> Vec<SceneNode> {
        showroom_rig(&LightingConfig::default())
    }

    #[test]
    fn rig_has_expected_fixtures() {
        let nodes = rig();
        let lights: Vec<&Light> = nodes
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Light(light) => Some(light),
                _ => None,
            })
            .collect();
        assert_eq!(lights.len(), 4);
        assert!(matches!(lights[0], Light::Ambient { .. }));
        assert!(matches!(lights[1], Light::Directional { shadow: Some(_), .. }));
        assert_eq!(lights.iter().filter(|l| matches!(l, Light::Spot { .. })).count(), 2);

        let ground = nodes.iter().find(|n| n.name == "ground").expect("ground plane");
        match &ground.kind {
            NodeKind::Mesh(mesh) => {
                assert!(mesh.receive_shadow);
                assert!(!mesh.cast_shadow);
            }
            _ => panic!("ground should be a mesh"),
        }
    }

    #[test]
    fn pack_places_sun_and_spots() {
        let mut graph = crate::scene::SceneGraph::new();
        for node in rig() {
            graph.attach(node);
        }
        let env = Environment::room(1.0);
        let uniforms = LightUniforms::pack(&graph.lights(), Some(&env));
        assert!(uniforms.casts_shadows());
        assert!(uniforms.sun_dir[1] > 0.0);
        for spot in 0..MAX_SPOT_LIGHTS {
            assert!(uniforms.spot_color[spot][3] > 0.0);
            // cos(inner) >= cos(outer)
            assert!(uniforms.spot_dir[spot][3] >= uniforms.spot_pos[spot][3]);
        }
        assert_eq!(uniforms.env_ceiling[3], 1.0);
    }

    #[test]
    fn room_environment_is_brighter_overhead() {
        let env = Environment::room(1.0);
        assert!(env.irradiance(Vec3::Y).length() > env.irradiance(Vec3::NEG_Y).length());
    }

    #[test]
    fn shadow_projection_maps_target_inside_clip() {
        let settings = ShadowSettings::default();
        let m = shadow_view_proj(Vec3::new(5.0, 10.0, 7.5), Vec3::ZERO, &settings);
        let clip = m.project_point3(Vec3::ZERO);
        assert!(clip.x.abs() < 1e-4 && clip.y.abs() < 1e-4);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }
}
