//! Screen-space error, altitude-driven LOD thresholds and face culling.

use glam::DVec3;
use nebula_cubesphere::CubeFace;

use crate::ViewState;

/// Vertical field of view assumed when the host does not supply one.
pub const DEFAULT_FOV_RADIANS: f64 = std::f64::consts::FRAC_PI_3;

const MIN_PIXEL_ERROR: f64 = 0.1;
const MAX_PIXEL_ERROR: f64 = 10_000.0;

/// Estimated pixel error of rendering a patch at its current level.
///
/// `patch_center` is in planet space (metres); `patch_size` is the patch
/// extent in cube units (2 for a root face). The geometric error is
/// `patch_size · radius · 0.1`; it is divided by the viewer distance (at
/// least 1 m) and scaled by `screen_height / fov`. The result is clamped to
/// `[0.1, 10000]`.
#[must_use]
pub fn screen_space_error(
    patch_center: DVec3,
    patch_size: f64,
    view: &ViewState,
    radius: f64,
) -> f64 {
    let distance = view.position.distance(patch_center).max(1.0);
    let geometric_error = patch_size * radius * 0.1;
    let angular_error = geometric_error / distance;
    let fov = if view.fov_radians > 0.0 {
        view.fov_radians
    } else {
        DEFAULT_FOV_RADIANS
    };
    let pixel_error = angular_error * (f64::from(view.screen_height) / fov);
    pixel_error.clamp(MIN_PIXEL_ERROR, MAX_PIXEL_ERROR)
}

/// Pixel-error threshold above which a patch or octree node subdivides.
///
/// Piecewise constant in `altitude / radius`: coarse from orbit, fine near
/// the ground.
#[must_use]
pub fn lod_threshold(altitude: f64, radius: f64) -> f64 {
    let ratio = altitude / radius;
    if ratio > 10.0 {
        25.0
    } else if ratio > 5.0 {
        15.0
    } else if ratio > 2.0 {
        10.0
    } else if ratio > 1.0 {
        7.0
    } else if ratio > 0.5 {
        5.0
    } else if ratio > 0.15 {
        4.0
    } else if ratio > 0.01 {
        2.5
    } else if ratio > 0.001 {
        1.5
    } else if ratio > 1e-5 {
        1.0
    } else {
        0.5
    }
}

/// Back-face test for a whole cube face.
///
/// Culls when `dot(face_normal, normalize(view_pos))` falls below a
/// threshold that relaxes as the viewer descends: −0.3 below 1% of the
/// radius, −0.2 below 10%, −0.1 otherwise. A viewer inside the sphere never
/// culls.
#[must_use]
pub fn should_cull_face(face: CubeFace, view_pos: DVec3, radius: f64) -> bool {
    let distance = view_pos.length();
    if distance <= radius {
        return false;
    }
    let altitude_ratio = (distance - radius) / radius;
    let threshold = if altitude_ratio < 0.01 {
        -0.3
    } else if altitude_ratio < 0.1 {
        -0.2
    } else {
        -0.1
    };
    face.normal().dot(view_pos / distance) < threshold
}
