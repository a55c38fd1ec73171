//! Axis-aligned quadtree patches in cube space and their UV→cube transforms.
//!
//! A [`GlobalPatch`] is a flat rectangle lying on one cube face: one of its
//! three extents is zero (the face's fixed axis). The six root patches are
//! the cube faces; each subdivision splits the two free axes at their
//! midpoints. Every bound within [`BOUNDS_SNAP_EPSILON`] of ±1 is snapped to
//! exactly ±1 so that patches on neighbouring faces share bit-identical edges.

use glam::{DMat4, DVec3, DVec4};
use thiserror::Error;

use crate::CubeFace;
use crate::projection::{BOUNDS_SNAP_EPSILON, VERTEX_SNAP_EPSILON, snap_to_face_boundary};

/// A range below this marks the fixed (face) axis of a patch.
pub const FIXED_AXIS_EPSILON: f64 = 1e-6;

/// The four patch edges in UV space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PatchEdge {
    /// `v = 1`
    Top = 0,
    /// `u = 1`
    Right = 1,
    /// `v = 0`
    Bottom = 2,
    /// `u = 0`
    Left = 3,
}

impl PatchEdge {
    pub const ALL: [PatchEdge; 4] = [
        PatchEdge::Top,
        PatchEdge::Right,
        PatchEdge::Bottom,
        PatchEdge::Left,
    ];

    /// UV endpoints of the edge, ordered by increasing free parameter.
    #[must_use]
    pub fn uv_endpoints(self) -> ([f64; 2], [f64; 2]) {
        match self {
            PatchEdge::Top => ([0.0, 1.0], [1.0, 1.0]),
            PatchEdge::Right => ([1.0, 0.0], [1.0, 1.0]),
            PatchEdge::Bottom => ([0.0, 0.0], [1.0, 0.0]),
            PatchEdge::Left => ([0.0, 0.0], [0.0, 1.0]),
        }
    }
}

/// Failure to build a transform for a patch.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PatchError {
    /// The patch has no single fixed axis or its bounds are inverted.
    #[error("degenerate patch transform: min {min:?}, max {max:?}")]
    DegenerateTransform { min: DVec3, max: DVec3 },
}

/// A quadtree node in cube space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlobalPatch {
    pub min_bounds: DVec3,
    pub max_bounds: DVec3,
    pub center: DVec3,
    pub level: u32,
    pub face: CubeFace,
}

impl GlobalPatch {
    /// Build a patch from bounds, snapping near-boundary components to ±1.
    #[must_use]
    pub fn new(min_bounds: DVec3, max_bounds: DVec3, level: u32, face: CubeFace) -> Self {
        let min_bounds = snap_to_face_boundary(min_bounds, BOUNDS_SNAP_EPSILON);
        let max_bounds = snap_to_face_boundary(max_bounds, BOUNDS_SNAP_EPSILON);
        Self {
            min_bounds,
            max_bounds,
            center: (min_bounds + max_bounds) * 0.5,
            level,
            face,
        }
    }

    /// Extent along each axis.
    #[inline]
    #[must_use]
    pub fn range(&self) -> DVec3 {
        self.max_bounds - self.min_bounds
    }

    /// The axis whose range is zero, or `None` if the patch is degenerate.
    #[must_use]
    pub fn fixed_axis(&self) -> Option<usize> {
        let range = self.range();
        let mut fixed = None;
        for axis in 0..3 {
            if range[axis].abs() < FIXED_AXIS_EPSILON {
                if fixed.is_some() {
                    return None;
                }
                fixed = Some(axis);
            }
        }
        fixed
    }

    /// Largest extent in cube units; a root patch has size 2.
    #[inline]
    #[must_use]
    pub fn size(&self) -> f64 {
        self.range().max_element()
    }

    /// Returns true if `point` lies within the bounds (inclusive, with `epsilon` slack).
    #[must_use]
    pub fn contains(&self, point: DVec3, epsilon: f64) -> bool {
        (0..3).all(|i| {
            point[i] >= self.min_bounds[i] - epsilon && point[i] <= self.max_bounds[i] + epsilon
        })
    }

    /// Split into four children, ordered (min,min), (max,min), (max,max),
    /// (min,max) over the face's (U, V) axes.
    ///
    /// Returns `None` for a degenerate patch.
    #[must_use]
    pub fn subdivide(&self) -> Option<[GlobalPatch; 4]> {
        let fixed = self.fixed_axis()?;
        let (ua, va) = free_axes(self.face, fixed);
        let mid = self.center;
        let level = self.level + 1;

        let child = |u_lo: f64, u_hi: f64, v_lo: f64, v_hi: f64| {
            let mut lo = self.min_bounds;
            let mut hi = self.max_bounds;
            lo[ua] = u_lo;
            hi[ua] = u_hi;
            lo[va] = v_lo;
            hi[va] = v_hi;
            GlobalPatch::new(lo, hi, level, self.face)
        };

        let (u0, u1, um) = (self.min_bounds[ua], self.max_bounds[ua], mid[ua]);
        let (v0, v1, vm) = (self.min_bounds[va], self.max_bounds[va], mid[va]);
        Some([
            child(u0, um, v0, vm),
            child(um, u1, v0, vm),
            child(um, u1, vm, v1),
            child(u0, um, vm, v1),
        ])
    }

    /// Build the affine map `(u, v, 0, 1) ↦ cube position`.
    ///
    /// Column 0 carries the U range along the face's U axis, column 1 the V
    /// range along its V axis, column 3 the patch origin with the fixed axis
    /// set to the (snapped) boundary value.
    pub fn create_transform(&self) -> Result<DMat4, PatchError> {
        let degenerate = || PatchError::DegenerateTransform {
            min: self.min_bounds,
            max: self.max_bounds,
        };
        let range = self.range();
        if (0..3).any(|i| range[i] < 0.0) {
            return Err(degenerate());
        }
        let fixed = self.fixed_axis().ok_or_else(degenerate)?;
        let (ua, va) = free_axes(self.face, fixed);

        let mut u_col = DVec4::ZERO;
        u_col[ua] = range[ua];
        let mut v_col = DVec4::ZERO;
        v_col[va] = range[va];

        let mut origin = DVec3::ZERO;
        origin[ua] = self.min_bounds[ua];
        origin[va] = self.min_bounds[va];
        origin[fixed] = snap_fixed(self.min_bounds[fixed]);

        Ok(DMat4::from_cols(
            u_col,
            v_col,
            DVec4::ZERO,
            origin.extend(1.0),
        ))
    }

    /// Evaluate the patch at `(u, v)` and snap the result onto the face boundary.
    pub fn uv_to_cube(&self, u: f64, v: f64) -> Result<DVec3, PatchError> {
        let transform = self.create_transform()?;
        Ok(apply_transform(&transform, u, v))
    }

    /// Cube-space endpoints of one edge, ordered by increasing parameter.
    pub fn edge_endpoints(&self, edge: PatchEdge) -> Result<(DVec3, DVec3), PatchError> {
        let transform = self.create_transform()?;
        let (a, b) = edge.uv_endpoints();
        Ok((
            apply_transform(&transform, a[0], a[1]),
            apply_transform(&transform, b[0], b[1]),
        ))
    }
}

/// Apply a patch transform to `(u, v)` and snap the cube position.
#[inline]
#[must_use]
pub fn apply_transform(transform: &DMat4, u: f64, v: f64) -> DVec3 {
    let p = transform.transform_point3(DVec3::new(u, v, 0.0));
    snap_to_face_boundary(p, VERTEX_SNAP_EPSILON)
}

/// The six cube faces as level-0 patches, indexed by face id.
#[must_use]
pub fn root_patches() -> [GlobalPatch; 6] {
    let p = |min: [f64; 3], max: [f64; 3], face| {
        GlobalPatch::new(DVec3::from_array(min), DVec3::from_array(max), 0, face)
    };
    [
        p([1.0, -1.0, -1.0], [1.0, 1.0, 1.0], CubeFace::PosX),
        p([-1.0, -1.0, -1.0], [-1.0, 1.0, 1.0], CubeFace::NegX),
        p([-1.0, 1.0, -1.0], [1.0, 1.0, 1.0], CubeFace::PosY),
        p([-1.0, -1.0, -1.0], [1.0, -1.0, 1.0], CubeFace::NegY),
        p([-1.0, -1.0, 1.0], [1.0, 1.0, 1.0], CubeFace::PosZ),
        p([-1.0, -1.0, -1.0], [1.0, 1.0, -1.0], CubeFace::NegZ),
    ]
}

/// The (U, V) axes for a patch with the given fixed axis. A patch whose
/// fixed axis disagrees with its face falls back to the fixed axis' pairing.
fn free_axes(face: CubeFace, fixed: usize) -> (usize, usize) {
    if face.fixed_axis() == fixed {
        face.uv_axes()
    } else {
        match fixed {
            0 => (2, 1),
            1 => (0, 2),
            _ => (0, 1),
        }
    }
}

fn snap_fixed(value: f64) -> f64 {
    if (value.abs() - 1.0).abs() < BOUNDS_SNAP_EPSILON {
        value.signum()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-12;

    #[test]
    fn test_root_patches_are_faces() {
        for (i, root) in root_patches().iter().enumerate() {
            assert_eq!(root.face.id() as usize, i);
            assert_eq!(root.level, 0);
            assert_eq!(root.fixed_axis(), Some(root.face.fixed_axis()));
            assert_eq!(root.center, root.face.normal(), "root {i} center is not the face normal");
            assert_eq!(root.size(), 2.0);
        }
    }

    #[test]
    fn test_root_transform_maps_uv_corners_to_face_corners() {
        for root in root_patches() {
            let (ua, va) = root.face.uv_axes();
            let t = root.create_transform().unwrap();
            for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                let p = apply_transform(&t, u, v);
                let mut expected = root.face.normal();
                expected[ua] = if u == 0.0 { -1.0 } else { 1.0 };
                expected[va] = if v == 0.0 { -1.0 } else { 1.0 };
                assert_eq!(p, expected, "{:?} corner ({u},{v}) mapped to {p:?}", root.face);
            }
        }
    }

    #[test]
    fn test_roots_cover_cube_surface() {
        // Sample points on the cube boundary; each must lie in at least one
        // root, and strictly interior points in exactly one.
        let roots = root_patches();
        let steps = 8;
        for face in CubeFace::ALL {
            let (ua, va) = face.uv_axes();
            for i in 0..=steps {
                for j in 0..=steps {
                    let mut p = face.normal();
                    p[ua] = -1.0 + 2.0 * i as f64 / steps as f64;
                    p[va] = -1.0 + 2.0 * j as f64 / steps as f64;
                    let hits = roots.iter().filter(|r| r.contains(p, 0.0)).count();
                    let on_edge = i == 0 || j == 0 || i == steps || j == steps;
                    if on_edge {
                        assert!(hits >= 2, "edge point {p:?} covered by {hits} roots");
                    } else {
                        assert_eq!(hits, 1, "interior point {p:?} covered by {hits} roots");
                    }
                }
            }
        }
    }

    #[test]
    fn test_shared_root_edges_match_bit_exactly() {
        let roots = root_patches();
        let mut shared = 0;
        for a in &roots {
            for b in &roots {
                if a.face == b.face {
                    continue;
                }
                for ea in PatchEdge::ALL {
                    for eb in PatchEdge::ALL {
                        let (a0, a1) = a.edge_endpoints(ea).unwrap();
                        let (b0, b1) = b.edge_endpoints(eb).unwrap();
                        if (a0 == b0 && a1 == b1) || (a0 == b1 && a1 == b0) {
                            shared += 1;
                        }
                    }
                }
            }
        }
        // 12 cube edges, each seen from both sides.
        assert_eq!(shared, 24, "expected every cube edge to be shared exactly");
    }

    #[test]
    fn test_subdivision_closure() {
        for parent in root_patches() {
            let children = parent.subdivide().unwrap();
            let mut lo = children[0].min_bounds;
            let mut hi = children[0].max_bounds;
            let mut area = 0.0;
            for c in &children {
                lo = lo.min(c.min_bounds);
                hi = hi.max(c.max_bounds);
                let r = c.range();
                let (ua, va) = c.face.uv_axes();
                area += r[ua] * r[va];
                assert_eq!(c.level, 1);
                assert_eq!(c.fixed_axis(), parent.fixed_axis());
            }
            assert_eq!(lo, parent.min_bounds, "children of {:?} do not reach min", parent.face);
            assert_eq!(hi, parent.max_bounds, "children of {:?} do not reach max", parent.face);
            assert!((area - 4.0).abs() < EPSILON, "children area {area} != parent area");

            // Pairwise interiors are disjoint.
            for (i, a) in children.iter().enumerate() {
                for b in children.iter().skip(i + 1) {
                    let overlap = (0..3)
                        .filter(|&k| k != parent.face.fixed_axis())
                        .all(|k| a.min_bounds[k] < b.max_bounds[k] && b.min_bounds[k] < a.max_bounds[k]);
                    assert!(!overlap, "children {a:?} and {b:?} overlap");
                }
            }
        }
    }

    #[test]
    fn test_repeated_subdivision_tiles_the_face() {
        let mut patches = vec![root_patches()[2]];
        for _ in 0..3 {
            patches = patches.iter().flat_map(|p| p.subdivide().unwrap()).collect();
        }
        assert_eq!(patches.len(), 64);
        let area: f64 = patches.iter().map(|p| p.range().x * p.range().z).sum();
        assert!((area - 4.0).abs() < EPSILON, "level-3 tiles cover {area}, expected 4");
        assert!(patches.iter().all(|p| p.level == 3 && p.min_bounds.y == 1.0));
    }

    #[test]
    fn test_subdivide_order_on_x_face() {
        let root = root_patches()[0];
        let c = root.subdivide().unwrap();
        // U is Z, V is Y on X faces.
        assert_eq!(c[0].min_bounds, DVec3::new(1.0, -1.0, -1.0));
        assert_eq!(c[0].max_bounds, DVec3::new(1.0, 0.0, 0.0));
        assert_eq!(c[1].min_bounds, DVec3::new(1.0, -1.0, 0.0));
        assert_eq!(c[2].max_bounds, DVec3::new(1.0, 1.0, 1.0));
        assert_eq!(c[3].min_bounds, DVec3::new(1.0, 0.0, -1.0));
    }

    #[test]
    fn test_bounds_are_snapped() {
        let p = GlobalPatch::new(
            DVec3::new(1.0 - 1e-7, -0.5, -0.5),
            DVec3::new(1.0 + 1e-7, 0.5, 0.5),
            3,
            CubeFace::PosX,
        );
        assert_eq!(p.min_bounds.x, 1.0);
        assert_eq!(p.max_bounds.x, 1.0);
    }

    #[test]
    fn test_degenerate_patch_is_rejected() {
        let no_flat_axis = GlobalPatch::new(DVec3::splat(-0.5), DVec3::splat(0.5), 1, CubeFace::PosX);
        assert!(matches!(
            no_flat_axis.create_transform(),
            Err(PatchError::DegenerateTransform { .. })
        ));
        assert!(no_flat_axis.subdivide().is_none());

        let two_flat_axes = GlobalPatch::new(
            DVec3::new(1.0, 0.5, -0.5),
            DVec3::new(1.0, 0.5, 0.5),
            1,
            CubeFace::PosX,
        );
        assert!(two_flat_axes.create_transform().is_err());

        let inverted = GlobalPatch::new(
            DVec3::new(1.0, 0.5, 0.5),
            DVec3::new(1.0, -0.5, -0.5),
            1,
            CubeFace::PosX,
        );
        assert!(inverted.create_transform().is_err());
    }

    #[test]
    fn test_cross_face_edge_parametrisation_agrees() {
        let px = GlobalPatch::new(DVec3::new(1.0, 0.5, -0.5), DVec3::new(1.0, 1.0, 0.5), 2, CubeFace::PosX);
        let py = GlobalPatch::new(DVec3::new(0.5, 1.0, -0.5), DVec3::new(1.0, 1.0, 0.5), 2, CubeFace::PosY);
        for k in 0..=8 {
            let t = k as f64 / 8.0;
            let a = px.uv_to_cube(t, 1.0).unwrap();
            let b = py.uv_to_cube(1.0, t).unwrap();
            assert!((a - b).length() < 1e-6, "edge sample {t}: {a:?} vs {b:?}");
        }
    }
}
