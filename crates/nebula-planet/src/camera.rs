//! Minimal look-at camera producing f64 view state.

use glam::{DMat4, DVec3};
use nebula_lod::ViewState;

/// A perspective camera in planet space.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: DVec3,
    pub target: DVec3,
    /// Vertical field of view in radians.
    pub fov: f64,
    /// Width / height.
    pub aspect: f64,
    /// Near clip plane distance (always positive).
    pub near: f64,
    /// Far clip plane distance (always positive, > near).
    pub far: f64,
}

impl Camera {
    /// A camera at `position` looking at `target`, with clip planes scaled
    /// to the distance between them.
    pub fn looking_at(position: DVec3, target: DVec3, fov: f64, aspect: f64) -> Self {
        let distance = position.distance(target).max(1.0);
        Self {
            position,
            target,
            fov,
            aspect,
            near: (distance * 1e-4).max(0.1),
            far: distance * 4.0 + 1.0,
        }
    }

    /// Unit vector from the camera toward its target.
    pub fn forward(&self) -> DVec3 {
        (self.target - self.position).normalize_or(DVec3::NEG_Z)
    }

    /// World up used for the view basis; switches away from +Y when looking
    /// along it.
    pub fn up(&self) -> DVec3 {
        if self.forward().cross(DVec3::Y).length_squared() < 1e-12 {
            DVec3::Z
        } else {
            DVec3::Y
        }
    }

    pub fn view_matrix(&self) -> DMat4 {
        DMat4::look_at_rh(self.position, self.target, self.up())
    }

    /// Perspective projection with depth in [0, 1].
    pub fn projection_matrix(&self) -> DMat4 {
        DMat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> DMat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn set_aspect_ratio(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = f64::from(width) / f64::from(height);
        }
    }

    /// Altitude above a sphere of `radius` centred at the origin.
    pub fn altitude(&self, radius: f64) -> f64 {
        self.position.length() - radius
    }

    pub fn view_state(&self, screen_height: u32) -> ViewState {
        ViewState {
            position: self.position,
            view_proj: self.view_proj(),
            screen_height,
            fov_radians: self.fov,
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::looking_at(
            DVec3::new(0.0, 0.0, 3.0 * 6_371_000.0),
            DVec3::ZERO,
            std::f64::consts::FRAC_PI_3,
            16.0 / 9.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_math::Frustum;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_target_is_centred_on_screen() {
        let camera = Camera::looking_at(DVec3::new(3.0, 4.0, 12.0), DVec3::new(1.0, -2.0, 0.5), 1.0, 1.5);
        let clip = camera.view_proj() * camera.target.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < EPSILON && ndc.y.abs() < EPSILON, "target at {ndc:?}");
        assert!((0.0..=1.0).contains(&ndc.z), "depth {} outside [0, 1]", ndc.z);
    }

    #[test]
    fn test_looking_along_y_has_valid_basis() {
        let camera = Camera::looking_at(DVec3::new(0.0, 1.0e7, 0.0), DVec3::ZERO, 1.0, 1.0);
        assert_eq!(camera.up(), DVec3::Z);
        assert!(camera.view_proj().is_finite());
        let frustum = Frustum::from_view_proj(&camera.view_proj());
        assert!(frustum.contains_point(DVec3::ZERO));
    }

    #[test]
    fn test_view_state_carries_camera() {
        let mut camera = Camera::default();
        camera.set_aspect_ratio(1920, 1080);
        assert!((camera.aspect - 16.0 / 9.0).abs() < EPSILON);
        camera.set_aspect_ratio(1920, 0);
        assert!((camera.aspect - 16.0 / 9.0).abs() < EPSILON);

        let view = camera.view_state(720);
        assert_eq!(view.position, camera.position);
        assert_eq!(view.screen_height, 720);
        assert_eq!(view.fov_radians, camera.fov);
        assert!((camera.altitude(6_371_000.0) - 2.0 * 6_371_000.0).abs() < 1e-6);
    }
}
