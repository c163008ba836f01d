// src/camera_controller.rs
// Damped orbit controls around a fixed target.
//
// Input accumulates as pending deltas; each update consumes the fraction
// `1 - exp(-damping * dt)` of what is pending, so motion eases out independent of frame rate.

use glam::Vec3;

use crate::camera::PerspectiveCamera;
use crate::config::OrbitConfig;

/// Pending deltas below this are snapped to zero.
const SETTLE_EPSILON: f32 = 1e-5;

pub struct OrbitController {
    target: Vec3,
    /// Angle around +Y, radians.
    azimuth: f32,
    /// Angle from +Y, radians.
    polar: f32,
    distance: f32,

    pending_azimuth: f32,
    pending_polar: f32,
    /// Pending log-scale change of distance.
    pending_zoom: f32,

    config: OrbitConfig,
}

impl OrbitController {
    /// Start from the camera's current placement, clamped to the configured bounds.
    pub fn new(camera: &PerspectiveCamera, config: OrbitConfig) -> Self {
        let offset = camera.position - camera.target;
        let distance = offset.length().max(f32::EPSILON);
        let polar = (offset.y / distance).clamp(-1.0, 1.0).acos();
        let azimuth = offset.x.atan2(offset.z);

        let mut controller = Self {
            target: camera.target,
            azimuth,
            polar,
            distance,
            pending_azimuth: 0.0,
            pending_polar: 0.0,
            pending_zoom: 0.0,
            config,
        };
        controller.clamp();
        controller
    }

    /// Queue a rotation in radians.
    pub fn rotate(&mut self, d_azimuth: f32, d_polar: f32) {
        self.pending_azimuth += d_azimuth;
        self.pending_polar += d_polar;
    }

    /// Queue a drag in pixels.
    pub fn drag(&mut self, dx: f32, dy: f32) {
        let speed = self.config.rotate_speed;
        self.rotate(-dx * speed, -dy * speed);
    }

    /// Queue a zoom; positive `lines` moves closer.
    pub fn zoom(&mut self, lines: f32) {
        self.pending_zoom -= lines * self.config.zoom_speed;
    }

    /// Advance the damping by `dt` seconds. Returns whether the orbit moved.
    pub fn update(&mut self, dt: f32) -> bool {
        if !self.is_moving() {
            return false;
        }
        let t = if self.config.damping <= 0.0 {
            1.0
        } else {
            1.0 - (-self.config.damping * dt.max(0.0)).exp()
        };

        let step_azimuth = self.pending_azimuth * t;
        let step_polar = self.pending_polar * t;
        let step_zoom = self.pending_zoom * t;
        self.pending_azimuth -= step_azimuth;
        self.pending_polar -= step_polar;
        self.pending_zoom -= step_zoom;

        self.azimuth += step_azimuth;
        self.polar += step_polar;
        self.distance *= step_zoom.exp();
        self.clamp();

        for pending in [
            &mut self.pending_azimuth,
            &mut self.pending_polar,
            &mut self.pending_zoom,
        ] {
            if pending.abs() < SETTLE_EPSILON {
                *pending = 0.0;
            }
        }
        true
    }

    pub fn is_moving(&self) -> bool {
        self.pending_azimuth != 0.0 || self.pending_polar != 0.0 || self.pending_zoom != 0.0
    }

    /// Write the orbit placement into the camera.
    pub fn apply(&self, camera: &mut PerspectiveCamera) {
        camera.target = self.target;
        camera.position = self.position();
    }

    pub fn position(&self) -> Vec3 {
        let (sin_polar, cos_polar) = self.polar.sin_cos();
        let (sin_azimuth, cos_azimuth) = self.azimuth.sin_cos();
        self.target
            + Vec3::new(
                sin_polar * sin_azimuth,
                cos_polar,
                sin_polar * cos_azimuth,
            ) * self.distance
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn polar(&self) -> f32 {
        self.polar
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    fn clamp(&mut self) {
        self.polar = clamp_between(self.polar, self.config.min_polar, self.config.max_polar);
        self.distance =
            clamp_between(self.distance, self.config.min_distance, self.config.max_distance);
    }
}

/// Like `f32::clamp`, but tolerates swapped bounds and NaN bounds instead of panicking.
fn clamp_between(value: f32, a: f32, b: f32) -> f32 {
    let (lo, hi) = (a.min(b), a.max(b));
    value.max(lo).min(hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraConfig;

    fn controller() -> (OrbitController, PerspectiveCamera) {
        let camera = PerspectiveCamera::new(&CameraConfig::default(), 1.0);
        (OrbitController::new(&camera, OrbitConfig::default()), camera)
    }

    #[test]
    fn starts_at_camera_placement() {
        let (orbit, camera) = controller();
        assert!((orbit.position() - camera.position).length() < 1e-4);
    }

    #[test]
    fn idle_update_reports_no_motion() {
        let (mut orbit, _) = controller();
        assert!(!orbit.update(1.0 / 60.0));
    }

    #[test]
    fn damping_converges_to_full_delta() {
        let (mut orbit, _) = controller();
        let start = orbit.azimuth();
        orbit.rotate(0.5, 0.0);
        assert!(orbit.update(1.0 / 60.0));
        let partial = orbit.azimuth() - start;
        assert!(partial > 0.0 && partial < 0.5);
        for _ in 0..600 {
            orbit.update(1.0 / 60.0);
        }
        assert!((orbit.azimuth() - start - 0.5).abs() < 1e-3);
        assert!(!orbit.is_moving());
    }

    #[test]
    fn polar_and_distance_stay_bounded() {
        let (mut orbit, mut camera) = controller();
        let config = OrbitConfig::default();
        orbit.rotate(0.0, 10.0);
        orbit.zoom(-100.0);
        for _ in 0..600 {
            orbit.update(1.0 / 60.0);
        }
        assert!(orbit.polar() <= config.max_polar + 1e-6);
        assert!(orbit.distance() <= config.max_distance + 1e-4);

        orbit.rotate(0.0, -10.0);
        orbit.zoom(100.0);
        for _ in 0..600 {
            orbit.update(1.0 / 60.0);
        }
        assert!(orbit.polar() >= config.min_polar - 1e-6);
        assert!(orbit.distance() >= config.min_distance - 1e-4);

        orbit.apply(&mut camera);
        // never below the floor
        assert!(camera.position.y > camera.target.y);
    }

    #[test]
    fn inverted_bounds_do_not_panic() {
        let camera = PerspectiveCamera::new(&CameraConfig::default(), 1.0);
        let config = OrbitConfig {
            min_distance: 3.0,
            max_distance: 2.0,
            max_polar: f32::NAN,
            ..OrbitConfig::default()
        };
        let mut orbit = OrbitController::new(&camera, config);
        orbit.zoom(-50.0);
        for _ in 0..120 {
            orbit.update(1.0 / 60.0);
        }
        assert!(orbit.distance() >= 2.0 && orbit.distance() <= 3.0);
        assert!(orbit.polar().is_finite());
    }
}
