//! Errors raised while building a [`Planet`](crate::Planet).

use nebula_lod::QuadtreeError;
use nebula_mesh::VertexGenError;
use nebula_voxel::OctreeError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanetError {
    #[error("invalid planet config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Octree(#[from] OctreeError),
    #[error(transparent)]
    Quadtree(#[from] QuadtreeError),
    #[error(transparent)]
    VertexGen(#[from] VertexGenError),
}
