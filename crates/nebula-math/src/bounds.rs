//! Bounding spheres in planet-local f64 space.

use glam::DVec3;

/// A bounding sphere relative to the planet center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

impl BoundingSphere {
    #[must_use]
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }

    /// The sphere circumscribing an axis-aligned cube of the given half-size.
    #[must_use]
    pub fn from_cube(center: DVec3, half_size: f64) -> Self {
        Self {
            center,
            radius: half_size * 3f64.sqrt(),
        }
    }

    /// Returns true if `point` lies inside or on the sphere.
    #[must_use]
    pub fn contains_point(&self, point: DVec3) -> bool {
        self.center.distance_squared(point) <= self.radius * self.radius
    }
}
