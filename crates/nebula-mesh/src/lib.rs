//! Mesh generation: terrain patch meshes on the cube-sphere and iso-surface
//! extraction from voxel density fields.

mod error;
mod patch_mesh;
mod pipeline;
pub mod surface;
mod vertex_gen;

pub use error::VertexGenError;
pub use patch_mesh::{GpuPatchVertex, PatchMesh, PatchVertex};
pub use pipeline::{PatchMeshingPipeline, PatchResult};
pub use surface::{
    DensityMode, ExtractedMesh, ExtractionRegion, ExtractorKind, SimpleCubesExtractor,
    SurfaceExtractor, SurfaceVertex, TransvoxelExtractor, VoxelDensity, extractor_for,
};
pub use vertex_gen::{CacheStats, CpuVertexGenerator, VertexGenConfig};
