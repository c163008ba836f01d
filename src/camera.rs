// src/camera.rs
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::config::CameraConfig;

/// Host surface size in physical pixels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            scale_factor: 1.0,
        }
    }

    /// Width over height; a collapsed surface reports 1.0 so the projection stays finite.
    pub fn aspect(&self) -> f32 {
        if self.width == 0 || self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Perspective camera looking at a target point.
#[derive(Clone, Debug, PartialEq)]
pub struct PerspectiveCamera {
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
}

impl PerspectiveCamera {
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            fov_y_deg: config.fov_deg,
            aspect,
            near: config.near,
            far: config.far,
            position: Vec3::from(config.position),
            target: Vec3::from(config.target),
        }
    }

    /// Right-handed, Y up.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    /// Perspective projection with 0..1 depth.
    pub fn proj_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_deg.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_proj_matrix(&self) -> Mat4 {
        self.proj_matrix() * self.view_matrix()
    }

    /// Update aspect ratio (call on resize).
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }
}

/// GPU camera uniform (matches `Camera` in `showroom.wgsl`).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    /// Column-major 4x4 matrix
    pub view_proj: [[f32; 4]; 4],
    pub position: [f32; 4], // w unused
}

impl CameraUniform {
    pub fn from_camera(camera: &PerspectiveCamera) -> Self {
        Self {
            view_proj: camera.view_proj_matrix().to_cols_array_2d(),
            position: camera.position.extend(1.0).to_array(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_viewport_keeps_finite_aspect() {
        assert_eq!(Viewport::new(0, 720).aspect(), 1.0);
        assert!((Viewport::new(1280, 720).aspect() - 16.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn target_projects_to_screen_centre() {
        let camera = PerspectiveCamera::new(&CameraConfig::default(), 16.0 / 9.0);
        let clip = camera.view_proj_matrix().project_point3(camera.target);
        assert!(clip.x.abs() < 1e-4 && clip.y.abs() < 1e-4);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }

    #[test]
    fn set_aspect_changes_projection() {
        let mut camera = PerspectiveCamera::new(&CameraConfig::default(), 1.0);
        let before = camera.proj_matrix();
        camera.set_aspect(2.0);
        assert_ne!(before, camera.proj_matrix());
    }
}
