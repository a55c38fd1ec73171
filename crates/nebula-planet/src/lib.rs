//! Frame assembly for a procedural planet.
//!
//! A [`Planet`] owns the voxel octree, the spherical quadtree and a pool of
//! patch meshing workers. Each frame it selects visible octree nodes and
//! quadtree patches for the current view, meshes the patches in parallel,
//! extracts the voxel surface near the ground, and returns everything as a
//! single [`RenderPayload`].

mod camera;
mod error;
mod mode;
mod payload;
mod planet;

pub use camera::Camera;
pub use error::PlanetError;
pub use mode::{RenderingMode, TransitionConfig, TransitionUniform};
pub use payload::{FrameStats, RenderPayload};
pub use planet::{Planet, PlanetConfig, SurfaceSource};
