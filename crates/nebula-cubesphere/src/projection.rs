//! Cube ↔ sphere projection and boundary snapping.
//!
//! The forward mapping is the Everitt/Mathworld volume-preserving formula.
//! All functions work in double precision: single-precision cube coordinates
//! drift by ~10⁻⁷, which becomes metres of crack at planetary radius.

use glam::DVec3;

/// Patch bounds within this distance of ±1 are snapped to exactly ±1.
pub const BOUNDS_SNAP_EPSILON: f64 = 1e-5;

/// Generated vertex cube coordinates within this distance of ±1 are snapped.
pub const VERTEX_SNAP_EPSILON: f64 = 1e-8;

/// Replace every component within `epsilon` of ±1 with exactly ±1.
#[inline]
#[must_use]
pub fn snap_to_face_boundary(point: DVec3, epsilon: f64) -> DVec3 {
    #[inline]
    fn snap(c: f64, epsilon: f64) -> f64 {
        if (c - 1.0).abs() < epsilon {
            1.0
        } else if (c + 1.0).abs() < epsilon {
            -1.0
        } else {
            c
        }
    }
    DVec3::new(
        snap(point.x, epsilon),
        snap(point.y, epsilon),
        snap(point.z, epsilon),
    )
}

/// Map a point on the unit cube surface onto the unit sphere.
///
/// ```text
/// sx = x * sqrt(1 - y²/2 - z²/2 + y²z²/3)
/// sy = y * sqrt(1 - x²/2 - z²/2 + x²z²/3)
/// sz = z * sqrt(1 - x²/2 - y²/2 + x²y²/3)
/// ```
///
/// The result is normalized, so the output is a unit vector for any non-zero
/// input. Equal cube points give bit-identical sphere points.
#[inline]
#[must_use]
pub fn cube_to_sphere(cube_point: DVec3) -> DVec3 {
    let x2 = cube_point.x * cube_point.x;
    let y2 = cube_point.y * cube_point.y;
    let z2 = cube_point.z * cube_point.z;

    DVec3::new(
        cube_point.x * (1.0 - y2 / 2.0 - z2 / 2.0 + y2 * z2 / 3.0).max(0.0).sqrt(),
        cube_point.y * (1.0 - x2 / 2.0 - z2 / 2.0 + x2 * z2 / 3.0).max(0.0).sqrt(),
        cube_point.z * (1.0 - x2 / 2.0 - y2 / 2.0 + x2 * y2 / 3.0).max(0.0).sqrt(),
    )
    .normalize()
}

/// Radial projection of a direction onto the cube surface: divide by the
/// dominant axis magnitude. A zero vector maps to zero.
#[inline]
#[must_use]
pub fn sphere_to_cube(sphere_point: DVec3) -> DVec3 {
    let max = sphere_point.abs().max_element();
    if max <= 0.0 {
        return DVec3::ZERO;
    }
    sphere_point / max
}
