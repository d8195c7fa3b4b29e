//! Orbit camera producing per-frame view state.

use glam::{Mat4, Vec3};

use crate::math::ViewState;

/// Perspective camera looking at a target.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: std::f32::consts::FRAC_PI_4,
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    /// Create a camera at `position` looking at `target`.
    pub fn looking_at(position: Vec3, target: Vec3, aspect: f32) -> Self {
        Self {
            position,
            target,
            aspect,
            ..Default::default()
        }
    }

    /// Place the camera on a horizontal circle around `center`.
    ///
    /// `angle` is in radians, measured from +Z towards +X.
    pub fn orbit(&mut self, center: Vec3, radius: f32, height: f32, angle: f32) {
        self.target = center;
        self.position = center + Vec3::new(radius * angle.sin(), height, radius * angle.cos());
    }

    /// Set the aspect ratio.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    /// Projection and modelview for the current camera pose.
    pub fn view_state(&self) -> ViewState {
        ViewState::new(self.projection_matrix(), self.view_matrix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn orbit_keeps_radius() {
        let mut camera = Camera::default();
        camera.orbit(Vec3::ONE, 4.0, 0.0, 1.3);
        assert_relative_eq!(camera.position.distance(Vec3::ONE), 4.0, epsilon = 1e-5);
        assert_eq!(camera.target, Vec3::ONE);
    }

    #[test]
    fn view_state_eye_matches_position() {
        let camera = Camera::looking_at(Vec3::new(-5.0, 0.5, 0.5), Vec3::new(1.0, 0.5, 0.5), 1.0);
        let eye = camera.view_state().eye_position();
        assert_relative_eq!(eye.x, -5.0, epsilon = 1e-4);
        assert_relative_eq!(eye.y, 0.5, epsilon = 1e-4);
    }
}
