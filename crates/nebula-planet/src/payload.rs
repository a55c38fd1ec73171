//! Per-frame output handed to the GPU layer.

use glam::DVec3;
use nebula_lod::{QuadtreeStats, VisiblePatch};
use nebula_materials::{GpuMaterial, MATERIAL_COUNT};
use nebula_mesh::{ExtractedMesh, GpuPatchVertex, PatchMesh};
use nebula_voxel::{GpuNode, InstanceData, MixedVoxel, RenderStats};

use crate::mode::{RenderingMode, TransitionUniform};

/// Counters describing one prepared frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    pub mode: RenderingMode,
    pub altitude: f64,
    pub octree: RenderStats,
    pub quadtree: QuadtreeStats,
    pub patch_meshes: usize,
    /// Patches dropped because their transform was degenerate.
    pub skipped_patches: usize,
    pub patch_vertices: usize,
    pub patch_triangles: usize,
    pub surface_triangles: usize,
    pub instances: usize,
}

/// Everything the GPU layer needs to draw one frame. Built fresh each frame
/// and consumed as a whole.
#[derive(Clone, Debug)]
pub struct RenderPayload {
    pub view_position: DVec3,
    pub mode: RenderingMode,
    pub transition: TransitionUniform,
    pub gpu_nodes: Vec<GpuNode>,
    /// Eight voxels per entry of `gpu_nodes`, at `GpuNode::voxel_index`.
    pub gpu_voxels: Vec<MixedVoxel>,
    /// Emitted nodes in depth-first traversal order.
    pub visible_node_indices: Vec<u32>,
    /// Cube instances for the instancing renderer.
    pub instances: Vec<InstanceData>,
    /// The quadtree selection; `patch_meshes` holds a mesh for each entry
    /// that meshed successfully, in the same order.
    pub visible_patches: Vec<VisiblePatch>,
    pub patch_meshes: Vec<PatchMesh>,
    /// Voxel iso-surface around the viewer, present near the ground.
    pub surface_mesh: Option<ExtractedMesh>,
    pub material_table_snapshot: [GpuMaterial; MATERIAL_COUNT],
    pub stats: FrameStats,
}

impl RenderPayload {
    pub fn node_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.gpu_nodes)
    }

    pub fn voxel_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.gpu_voxels)
    }

    pub fn material_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.material_table_snapshot)
    }

    /// Patch vertices relative to the view position, one buffer per mesh.
    pub fn patch_vertex_buffers(&self) -> Vec<Vec<GpuPatchVertex>> {
        self.patch_meshes
            .iter()
            .map(|mesh| mesh.to_gpu_vertices(self.view_position))
            .collect()
    }

    /// True when the frame has nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.gpu_nodes.is_empty()
            && self.patch_meshes.is_empty()
            && self.surface_mesh.as_ref().is_none_or(ExtractedMesh::is_empty)
    }
}
