//! View frustum in planet-local f64 space.
//!
//! Uses the Gribb/Hartmann method to extract six inward-pointing planes from
//! a view-projection matrix with a `[0, 1]` clip-space depth range (the
//! convention of `glam`'s `perspective_rh`).

use glam::{DMat4, DVec3, DVec4};

/// Three-way result of a containment test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intersection {
    Inside,
    Intersecting,
    Outside,
}

/// Six normalized planes `(nx, ny, nz, d)`; a point `p` is inside a plane
/// when `n·p + d >= 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct Frustum {
    planes: [DVec4; 6],
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix.
    #[must_use]
    pub fn from_view_proj(vp: &DMat4) -> Self {
        let row0 = vp.row(0);
        let row1 = vp.row(1);
        let row2 = vp.row(2);
        let row3 = vp.row(3);

        let mut planes = [
            row3 + row0, // left
            row3 - row0, // right
            row3 + row1, // bottom
            row3 - row1, // top
            row2,        // near
            row3 - row2, // far
        ];

        for plane in &mut planes {
            let len = plane.truncate().length();
            if len > 1e-12 {
                *plane /= len;
            }
        }

        Self { planes }
    }

    /// The normalized planes in left, right, bottom, top, near, far order.
    #[must_use]
    pub fn planes(&self) -> &[DVec4; 6] {
        &self.planes
    }

    /// Signed distance of `point` to plane `i`; positive is inside.
    #[inline]
    #[must_use]
    pub fn signed_distance(&self, i: usize, point: DVec3) -> f64 {
        let plane = self.planes[i];
        plane.truncate().dot(point) + plane.w
    }

    #[must_use]
    pub fn contains_point(&self, point: DVec3) -> bool {
        (0..6).all(|i| self.signed_distance(i, point) >= 0.0)
    }

    /// Test a bounding sphere against the frustum.
    #[must_use]
    pub fn test_sphere(&self, center: DVec3, radius: f64) -> Intersection {
        let mut all_inside = true;
        for i in 0..6 {
            let d = self.signed_distance(i, center);
            if d < -radius {
                return Intersection::Outside;
            }
            if d < radius {
                all_inside = false;
            }
        }
        if all_inside {
            Intersection::Inside
        } else {
            Intersection::Intersecting
        }
    }

    /// Returns false only when the sphere lies entirely outside one plane.
    #[inline]
    #[must_use]
    pub fn intersects_sphere(&self, center: DVec3, radius: f64) -> bool {
        self.test_sphere(center, radius) != Intersection::Outside
    }
}
