// camera.rs - viewer orientation and field of view for the sphere

use glam::{Mat4, Quat, Vec3};

pub const DEFAULT_FOV: f32 = 75.0;
pub const MIN_FOV: f32 = 5.0;
pub const MAX_FOV: f32 = 120.0;

const NEAR: f32 = 0.1;
const FAR: f32 = 1000.0;

/// Stands in for head tracking: yaw/pitch in degrees, vertical FOV in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanoramaCamera {
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub sensitivity_scale: f32,
}

impl Default for PanoramaCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl PanoramaCamera {
    pub fn new() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            fov: DEFAULT_FOV,
            sensitivity_scale: 1.0,
        }
    }

    pub fn reset(&mut self) {
        let sensitivity_scale = self.sensitivity_scale;
        *self = Self {
            sensitivity_scale,
            ..Self::new()
        };
    }

    /// Drags the panorama with the cursor: one pixel moves the view by the
    /// angle one pixel spans at the current FOV.
    pub fn drag(&mut self, dx: f32, dy: f32, width: f32, height: f32) {
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        let v_fov = self.fov.to_radians();
        let aspect = width / height;
        let h_fov = 2.0 * ((v_fov / 2.0).tan() * aspect).atan();

        let yaw_per_px = (h_fov / width).to_degrees();
        let pitch_per_px = (v_fov / height).to_degrees();

        self.yaw = (self.yaw + dx * yaw_per_px * self.sensitivity_scale).rem_euclid(360.0);
        self.pitch = (self.pitch + dy * pitch_per_px * self.sensitivity_scale).clamp(-90.0, 90.0);
    }

    /// Wheel zoom, 2.5° per line.
    pub fn zoom(&mut self, lines: f32) {
        self.fov = (self.fov - lines * 2.5).clamp(MIN_FOV, MAX_FOV);
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw.to_radians())
            * Quat::from_rotation_x(self.pitch.to_radians())
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation() * Vec3::NEG_Z
    }

    /// Perspective times a rotation-only view; the viewer sits at the sphere center.
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        let projection = Mat4::perspective_rh(self.fov.to_radians(), aspect.max(1e-3), NEAR, FAR);
        let view = Mat4::from_quat(self.orientation().inverse());
        projection * view
    }

    /// Column-major MVP as consumed by the sphere renderer.
    pub fn mvp_columns(&self, aspect: f32) -> [f32; 16] {
        self.view_projection(aspect).to_cols_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn project(camera: &PanoramaCamera, p: Vec3) -> Vec3 {
        let clip = camera.view_projection(1.0) * Vec4::new(p.x, p.y, p.z, 1.0);
        clip.truncate() / clip.w
    }

    #[test]
    fn default_camera_looks_at_sphere_center() {
        let camera = PanoramaCamera::new();
        let ndc = project(&camera, Vec3::new(0.0, 0.0, -50.0));
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn yaw_turns_toward_negative_x() {
        let camera = PanoramaCamera {
            yaw: 90.0,
            ..PanoramaCamera::new()
        };
        assert!((camera.forward() - Vec3::NEG_X).length() < 1e-5);
        let ndc = project(&camera, Vec3::new(-1.0, 0.0, 0.0));
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
    }

    #[test]
    fn drag_clamps_pitch_and_wraps_yaw() {
        let mut camera = PanoramaCamera::new();
        camera.drag(0.0, 100_000.0, 800.0, 600.0);
        assert_eq!(camera.pitch, 90.0);
        camera.drag(-10.0, 0.0, 800.0, 600.0);
        assert!(camera.yaw > 300.0 && camera.yaw < 360.0);
    }

    #[test]
    fn drag_ignores_empty_viewport() {
        let mut camera = PanoramaCamera::new();
        camera.drag(10.0, 10.0, 0.0, 600.0);
        assert_eq!(camera, PanoramaCamera::new());
    }

    #[test]
    fn zoom_is_clamped() {
        let mut camera = PanoramaCamera::new();
        camera.zoom(1000.0);
        assert_eq!(camera.fov, MIN_FOV);
        camera.zoom(-1000.0);
        assert_eq!(camera.fov, MAX_FOV);
        camera.sensitivity_scale = 2.0;
        camera.reset();
        assert_eq!(camera.fov, DEFAULT_FOV);
        assert_eq!(camera.sensitivity_scale, 2.0);
    }

    #[test]
    fn mvp_columns_match_matrix() {
        let camera = PanoramaCamera::new();
        let cols = camera.mvp_columns(1.5);
        assert_eq!(Mat4::from_cols_array(&cols), camera.view_projection(1.5));
    }
}
