//! Terrain patch meshes and their GPU vertex layout.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use glam::{DVec3, Vec3};
use nebula_cubesphere::CubeFace;
use static_assertions::assert_eq_size;

/// A vertex of a terrain patch, in planet space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatchVertex {
    pub position: DVec3,
    /// Unit sphere normal at the vertex.
    pub normal: Vec3,
    /// Patch-local parameters in `[0, 1]`.
    pub uv: [f32; 2],
    /// Height above the base radius, in metres.
    pub height: f32,
    pub morph_factor: f32,
    pub face_id: u8,
}

/// Vertex record uploaded for patch rendering.
///
/// `position` is relative to the view position so that 32-bit floats keep
/// sub-metre precision near the camera.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuPatchVertex {
    pub position: [f32; 3],
    pub height: f32,
    pub normal: [f32; 3],
    pub morph_factor: f32,
    pub uv: [f32; 2],
    pub face_id: u32,
    pub _padding: u32,
}

assert_eq_size!(GpuPatchVertex, [u8; 48]);

/// The mesh of one visible patch: a surface grid followed by an optional
/// skirt ring.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchMesh {
    pub face: CubeFace,
    pub level: u32,
    pub vertices: Vec<PatchVertex>,
    /// Triangle list, three indices per triangle, wound counter-clockwise
    /// when seen from outside the planet.
    pub indices: Vec<u32>,
    pub main_vertices: Range<usize>,
    pub main_indices: Range<usize>,
    pub skirt_vertices: Range<usize>,
    pub skirt_indices: Range<usize>,
}

impl PatchMesh {
    pub fn new(face: CubeFace, level: u32) -> Self {
        Self {
            face,
            level,
            vertices: Vec::new(),
            indices: Vec::new(),
            main_vertices: 0..0,
            main_indices: 0..0,
            skirt_vertices: 0..0,
            skirt_indices: 0..0,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn has_skirt(&self) -> bool {
        !self.skirt_indices.is_empty()
    }

    /// Triangles of the surface grid only.
    pub fn main_triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices[self.main_indices.clone()]
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
    }

    /// Convert to GPU records positioned relative to `view_pos`.
    pub fn to_gpu_vertices(&self, view_pos: DVec3) -> Vec<GpuPatchVertex> {
        self.vertices
            .iter()
            .map(|v| GpuPatchVertex {
                position: (v.position - view_pos).as_vec3().to_array(),
                height: v.height,
                normal: v.normal.to_array(),
                morph_factor: v.morph_factor,
                uv: v.uv,
                face_id: u32::from(v.face_id),
                _padding: 0,
            })
            .collect()
    }
}
