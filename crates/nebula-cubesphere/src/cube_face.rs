//! The six faces of the cube-sphere and their basis vectors.

use glam::DVec3;

/// The six faces of the cube that forms the cube-sphere.
///
/// The discriminant is the face id shared with GPU code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CubeFace {
    /// +X face
    PosX = 0,
    /// −X face
    NegX = 1,
    /// +Y face
    PosY = 2,
    /// −Y face
    NegY = 3,
    /// +Z face
    PosZ = 4,
    /// −Z face
    NegZ = 5,
}

impl CubeFace {
    /// All six faces in face-id order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PosX,
        CubeFace::NegX,
        CubeFace::PosY,
        CubeFace::NegY,
        CubeFace::PosZ,
        CubeFace::NegZ,
    ];

    /// Decode a face id; `None` outside `0..6`.
    #[must_use]
    pub fn from_id(id: u8) -> Option<CubeFace> {
        Self::ALL.get(id as usize).copied()
    }

    /// The face id (`0..6`).
    #[inline]
    #[must_use]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// The opposite face (e.g., `PosX` → `NegX`).
    #[must_use]
    pub fn opposite(self) -> CubeFace {
        match self {
            CubeFace::PosX => CubeFace::NegX,
            CubeFace::NegX => CubeFace::PosX,
            CubeFace::PosY => CubeFace::NegY,
            CubeFace::NegY => CubeFace::PosY,
            CubeFace::PosZ => CubeFace::NegZ,
            CubeFace::NegZ => CubeFace::PosZ,
        }
    }

    /// Index (0 = X, 1 = Y, 2 = Z) of the axis this face is perpendicular to.
    #[inline]
    #[must_use]
    pub fn fixed_axis(self) -> usize {
        (self as usize) / 2
    }

    /// `+1.0` for positive faces, `-1.0` for negative faces.
    #[inline]
    #[must_use]
    pub fn sign(self) -> f64 {
        if (self as u8) % 2 == 0 { 1.0 } else { -1.0 }
    }

    /// Axis indices `(u_axis, v_axis)` the patch UV parameters map onto.
    ///
    /// X faces map U→Z and V→Y; Y faces U→X and V→Z; Z faces U→X and V→Y.
    /// Patches on faces that share an edge then parametrise that edge by the
    /// same cube coordinate, which keeps their edge vertices identical.
    #[inline]
    #[must_use]
    pub fn uv_axes(self) -> (usize, usize) {
        match self.fixed_axis() {
            0 => (2, 1),
            1 => (0, 2),
            _ => (0, 1),
        }
    }

    /// Outward-pointing unit normal for this face.
    #[must_use]
    pub fn normal(self) -> DVec3 {
        match self {
            CubeFace::PosX => DVec3::X,
            CubeFace::NegX => DVec3::NEG_X,
            CubeFace::PosY => DVec3::Y,
            CubeFace::NegY => DVec3::NEG_Y,
            CubeFace::PosZ => DVec3::Z,
            CubeFace::NegZ => DVec3::NEG_Z,
        }
    }

    /// Orientation basis `(up, right)` used by the GPU layer; `up × right`
    /// equals the face normal.
    #[must_use]
    pub fn basis(self) -> (DVec3, DVec3) {
        match self {
            CubeFace::PosX => (DVec3::Y, DVec3::Z),
            CubeFace::NegX => (DVec3::Y, DVec3::NEG_Z),
            CubeFace::PosY => (DVec3::Z, DVec3::X),
            CubeFace::NegY => (DVec3::NEG_Z, DVec3::X),
            CubeFace::PosZ => (DVec3::Y, DVec3::NEG_X),
            CubeFace::NegZ => (DVec3::Y, DVec3::X),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_ids_round_trip() {
        for face in CubeFace::ALL {
            assert_eq!(CubeFace::from_id(face.id()), Some(face));
        }
        assert_eq!(CubeFace::from_id(6), None);
    }

    #[test]
    fn test_opposite_face_normals_are_antiparallel() {
        for face in CubeFace::ALL {
            let n = face.normal();
            let opp_n = face.opposite().normal();
            assert!(
                (n + opp_n).length() < 1e-12,
                "Normals for {face:?} and {:?} are not antiparallel",
                face.opposite()
            );
        }
    }

    #[test]
    fn test_normal_matches_fixed_axis_and_sign() {
        for face in CubeFace::ALL {
            let n = face.normal();
            assert_eq!(n[face.fixed_axis()], face.sign(), "bad axis/sign for {face:?}");
        }
    }

    #[test]
    fn test_up_cross_right_equals_normal() {
        for face in CubeFace::ALL {
            let (up, right) = face.basis();
            let cross = up.cross(right);
            assert!(
                (cross - face.normal()).length() < 1e-12,
                "up x right != normal for {face:?}: got {cross:?}"
            );
            assert!(up.dot(right).abs() < 1e-12, "basis of {face:?} is not orthogonal");
        }
    }

    #[test]
    fn test_uv_axes_exclude_fixed_axis() {
        for face in CubeFace::ALL {
            let (u, v) = face.uv_axes();
            assert_ne!(u, v);
            assert_ne!(u, face.fixed_axis(), "U axis of {face:?} is the fixed axis");
            assert_ne!(v, face.fixed_axis(), "V axis of {face:?} is the fixed axis");
        }
    }
}
