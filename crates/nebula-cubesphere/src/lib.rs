//! Cube-sphere geometry: cube↔sphere projection, boundary snapping, and the
//! global patch quadtree with its UV→cube transforms.

mod cube_face;
mod patch;
mod projection;

pub use cube_face::CubeFace;
pub use patch::{
    FIXED_AXIS_EPSILON, GlobalPatch, PatchEdge, PatchError, apply_transform, root_patches,
};
pub use projection::{
    BOUNDS_SNAP_EPSILON, VERTEX_SNAP_EPSILON, cube_to_sphere, snap_to_face_boundary,
    sphere_to_cube,
};
