//! Per-frame view state supplied by the windowing layer.

use glam::{DMat4, DVec3};

use crate::DEFAULT_FOV_RADIANS;

/// Camera position and projection for one frame, in planet-local f64 space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    pub position: DVec3,
    pub view_proj: DMat4,
    pub screen_height: u32,
    pub fov_radians: f64,
}

impl ViewState {
    /// A perspective camera at `position` looking at `target` with a square
    /// aspect ratio.
    #[must_use]
    pub fn looking_at(position: DVec3, target: DVec3, screen_height: u32) -> Self {
        let forward = (target - position).normalize_or_zero();
        let up = if forward.cross(DVec3::Y).length_squared() < 1e-12 {
            DVec3::Z
        } else {
            DVec3::Y
        };
        let distance = position.distance(target).max(1.0);
        let near = (distance * 1e-4).max(0.1);
        let far = distance * 4.0 + 1.0;
        let view = DMat4::look_at_rh(position, target, up);
        let proj = DMat4::perspective_rh(DEFAULT_FOV_RADIANS, 1.0, near, far);
        Self {
            position,
            view_proj: proj * view,
            screen_height,
            fov_radians: DEFAULT_FOV_RADIANS,
        }
    }

    /// Altitude above a sphere of `radius` centred at the origin.
    #[inline]
    #[must_use]
    pub fn altitude(&self, radius: f64) -> f64 {
        self.position.length() - radius
    }
}
