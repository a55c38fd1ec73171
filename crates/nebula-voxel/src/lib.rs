//! Volumetric planet storage: eight-byte mixed-material voxels in a sparse
//! octree, procedural generation, and per-frame GPU node extraction.

mod error;
mod generation;
mod mixed;
mod octree;
mod render_data;

pub use error::{InstanceError, OctreeError};
pub use mixed::{MixedVoxel, SLOT_COUNT, SPARSE_SOLID_RATIO};
pub use octree::{
    MAX_OCTREE_DEPTH, NodeContent, OctreeNode, OctreePlanet, OctreeStats, ROOT_HALF_SIZE_FACTOR,
    octant_index, octant_offset,
};
pub use render_data::{
    FLAG_LEAF, GpuNode, INVALID_INDEX, InstanceData, OctreeRenderData, RenderStats,
    build_instances, material_class, validate_instances,
};
