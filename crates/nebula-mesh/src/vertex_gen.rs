//! CPU generation of terrain patch meshes.
//!
//! A patch is sampled on a regular UV grid. Each sample goes through the
//! patch transform (with the ±1 boundary snap), is projected onto the unit
//! sphere and displaced by the height of that sphere normal. Patches next to
//! a coarser neighbour move their off-grid edge vertices onto the
//! neighbour's edge, and an optional skirt ring hides sub-pixel seams.

use std::sync::Arc;

use glam::{DMat4, DVec3};
use nebula_cubesphere::{GlobalPatch, PatchEdge, apply_transform, cube_to_sphere};
use nebula_lod::VisiblePatch;
use nebula_terrain::HeightSource;
use rustc_hash::FxHashMap;

use crate::error::VertexGenError;
use crate::patch_mesh::{PatchMesh, PatchVertex};

/// Settings for [`CpuVertexGenerator`].
#[derive(Clone, Debug, PartialEq)]
pub struct VertexGenConfig {
    pub planet_radius: f64,
    /// Vertices per patch edge; at least 2. Use `2^k + 1` so that edge
    /// stepping lines up with coarser neighbours.
    pub resolution: u32,
    pub enable_skirts: bool,
    /// How far below the surface the skirt ring hangs, in metres.
    pub skirt_depth: f64,
    pub enable_vertex_caching: bool,
    /// Cache capacity in samples; the cache is emptied when it fills up.
    pub max_cache_size: usize,
}

impl Default for VertexGenConfig {
    fn default() -> Self {
        Self {
            planet_radius: 6_371_000.0,
            resolution: 65,
            enable_skirts: true,
            skirt_depth: 500.0,
            enable_vertex_caching: true,
            max_cache_size: 100_000,
        }
    }
}

impl VertexGenConfig {
    pub fn validate(&self) -> Result<(), VertexGenError> {
        if !(self.planet_radius.is_finite() && self.planet_radius > 0.0) {
            return Err(VertexGenError::InvalidConfig(format!(
                "planet radius must be positive, got {}",
                self.planet_radius
            )));
        }
        if self.resolution < 2 {
            return Err(VertexGenError::InvalidConfig(format!(
                "resolution must be at least 2, got {}",
                self.resolution
            )));
        }
        if !(self.skirt_depth.is_finite() && self.skirt_depth >= 0.0) {
            return Err(VertexGenError::InvalidConfig(format!(
                "skirt depth must be non-negative, got {}",
                self.skirt_depth
            )));
        }
        Ok(())
    }
}

/// Sample cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Samples currently cached.
    pub size: usize,
    /// Grid vertices produced since construction.
    pub vertices_generated: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct SurfaceSample {
    normal: DVec3,
    height: f64,
}

#[derive(Clone, Copy, Debug)]
struct GridPoint {
    position: DVec3,
    normal: DVec3,
    height: f64,
}

/// Builds [`PatchMesh`]es from patches and a height source.
///
/// The sample cache belongs to one generator; parallel meshing gives every
/// worker its own generator.
pub struct CpuVertexGenerator {
    config: VertexGenConfig,
    height: Arc<dyn HeightSource>,
    cache: FxHashMap<[u64; 3], SurfaceSample>,
    stats: CacheStats,
}

impl CpuVertexGenerator {
    pub fn new(
        config: VertexGenConfig,
        height: Arc<dyn HeightSource>,
    ) -> Result<Self, VertexGenError> {
        config.validate()?;
        Ok(Self {
            config,
            height,
            cache: FxHashMap::default(),
            stats: CacheStats::default(),
        })
    }

    pub fn config(&self) -> &VertexGenConfig {
        &self.config
    }

    pub fn height_source(&self) -> &Arc<dyn HeightSource> {
        &self.height
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            size: self.cache.len(),
            ..self.stats
        }
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Mesh a patch chosen by the quadtree, stepping every edge that borders
    /// a coarser patch.
    pub fn generate_visible(&mut self, visible: &VisiblePatch) -> Result<PatchMesh, VertexGenError> {
        let transform = visible.patch.create_transform()?;
        let coarser = PatchEdge::ALL.map(|edge| visible.coarser_neighbor_delta(edge));
        Ok(self.generate(&visible.patch, &transform, coarser, visible.morph_factor))
    }

    /// Mesh `patch` through `transform`.
    ///
    /// `coarser_neighbors[edge as usize]` is how many levels coarser the
    /// patch across that edge is; 0 leaves the edge at full resolution.
    pub fn generate(
        &mut self,
        patch: &GlobalPatch,
        transform: &DMat4,
        coarser_neighbors: [u32; 4],
        morph_factor: f32,
    ) -> PatchMesh {
        let n = self.config.resolution as usize;
        let last = (n - 1) as f64;
        let radius = self.config.planet_radius;

        let mut grid = Vec::with_capacity(n * n);
        for j in 0..n {
            for i in 0..n {
                let cube = apply_transform(transform, i as f64 / last, j as f64 / last);
                let sample = self.sample(cube);
                grid.push(GridPoint {
                    position: sample.normal * (radius + sample.height),
                    normal: sample.normal,
                    height: sample.height,
                });
            }
        }
        self.stats.vertices_generated += grid.len() as u64;

        for edge in PatchEdge::ALL {
            step_edge(&mut grid, n, edge, coarser_neighbors[edge as usize]);
        }

        // Counter-clockwise in UV faces outward iff U × V agrees with the
        // face normal.
        let u_axis = transform.x_axis.truncate();
        let v_axis = transform.y_axis.truncate();
        let outward_ccw = u_axis.cross(v_axis).dot(patch.face.normal()) >= 0.0;

        let face_id = patch.face.id();
        let mut mesh = PatchMesh::new(patch.face, patch.level);
        mesh.vertices.reserve(n * n + 4 * (n - 1));
        for (k, point) in grid.iter().enumerate() {
            let (i, j) = (k % n, k / n);
            mesh.vertices.push(PatchVertex {
                position: point.position,
                normal: point.normal.as_vec3(),
                uv: [(i as f64 / last) as f32, (j as f64 / last) as f32],
                height: point.height as f32,
                morph_factor,
                face_id,
            });
        }
        mesh.main_vertices = 0..mesh.vertices.len();

        let index = |i: usize, j: usize| (j * n + i) as u32;
        for j in 0..n - 1 {
            for i in 0..n - 1 {
                let (a, b, c, d) = (index(i, j), index(i + 1, j), index(i + 1, j + 1), index(i, j + 1));
                if outward_ccw {
                    mesh.indices.extend_from_slice(&[a, b, c, a, c, d]);
                } else {
                    mesh.indices.extend_from_slice(&[a, c, b, a, d, c]);
                }
            }
        }
        mesh.main_indices = 0..mesh.indices.len();

        if self.config.enable_skirts {
            self.push_skirt(&mut mesh, n, outward_ccw);
        }
        mesh
    }

    /// Hang a ring of vertices `skirt_depth` below the patch border and join
    /// it to the border with outward-facing quads.
    fn push_skirt(&self, mesh: &mut PatchMesh, n: usize, outward_ccw: bool) {
        let ring = border_ring(n);
        let depth = self.config.skirt_depth;
        let first_skirt = mesh.vertices.len();
        let first_index = mesh.indices.len();

        for &top in &ring {
            let mut vertex = mesh.vertices[top];
            vertex.position -= vertex.position.normalize_or_zero() * depth;
            vertex.height -= depth as f32;
            mesh.vertices.push(vertex);
        }

        for k in 0..ring.len() {
            let next = (k + 1) % ring.len();
            let (ta, tb) = (ring[k] as u32, ring[next] as u32);
            let (sa, sb) = ((first_skirt + k) as u32, (first_skirt + next) as u32);
            if outward_ccw {
                mesh.indices.extend_from_slice(&[ta, sa, sb, ta, sb, tb]);
            } else {
                mesh.indices.extend_from_slice(&[ta, sb, sa, ta, tb, sb]);
            }
        }

        mesh.skirt_vertices = first_skirt..mesh.vertices.len();
        mesh.skirt_indices = first_index..mesh.indices.len();
    }

    fn sample(&mut self, cube: DVec3) -> SurfaceSample {
        if !self.config.enable_vertex_caching || self.config.max_cache_size == 0 {
            self.stats.misses += 1;
            return self.evaluate(cube);
        }
        let key = cache_key(cube);
        if let Some(sample) = self.cache.get(&key) {
            self.stats.hits += 1;
            return *sample;
        }
        self.stats.misses += 1;
        let sample = self.evaluate(cube);
        if self.cache.len() >= self.config.max_cache_size {
            self.cache.clear();
        }
        self.cache.insert(key, sample);
        sample
    }

    fn evaluate(&self, cube: DVec3) -> SurfaceSample {
        let normal = cube_to_sphere(cube);
        SurfaceSample {
            normal,
            height: self.height.height(normal),
        }
    }
}

fn cache_key(cube: DVec3) -> [u64; 3] {
    // +0.0 and -0.0 are the same cube position.
    let bits = |c: f64| if c == 0.0 { 0 } else { c.to_bits() };
    [bits(cube.x), bits(cube.y), bits(cube.z)]
}

/// Grid index of the `k`-th vertex along `edge`, in increasing parameter
/// order.
fn edge_index(n: usize, edge: PatchEdge, k: usize) -> usize {
    let (i, j) = match edge {
        PatchEdge::Top => (k, n - 1),
        PatchEdge::Right => (n - 1, k),
        PatchEdge::Bottom => (k, 0),
        PatchEdge::Left => (0, k),
    };
    j * n + i
}

/// Move edge vertices that a neighbour `delta` levels coarser does not have
/// onto the straight segment between the enclosing coarse samples.
fn step_edge(grid: &mut [GridPoint], n: usize, edge: PatchEdge, delta: u32) {
    if delta == 0 {
        return;
    }
    let step = 1usize.checked_shl(delta).unwrap_or(usize::MAX).min(n - 1);
    if step <= 1 {
        return;
    }
    for k in 0..n {
        let offset = k % step;
        if offset == 0 {
            continue;
        }
        let k0 = k - offset;
        let k1 = (k0 + step).min(n - 1);
        if k1 == k {
            continue;
        }
        let t = offset as f64 / (k1 - k0) as f64;
        let a = grid[edge_index(n, edge, k0)];
        let b = grid[edge_index(n, edge, k1)];
        let target = &mut grid[edge_index(n, edge, k)];
        target.position = a.position.lerp(b.position, t);
        target.height = a.height + (b.height - a.height) * t;
        target.normal = a.normal.lerp(b.normal, t).normalize_or(a.normal);
    }
}

/// Border vertex indices walking counter-clockwise in UV.
fn border_ring(n: usize) -> Vec<usize> {
    let mut ring = Vec::with_capacity(4 * (n - 1));
    ring.extend(0..n - 1);
    ring.extend((0..n - 1).map(|j| j * n + (n - 1)));
    ring.extend((1..n).rev().map(|i| (n - 1) * n + i));
    ring.extend((1..n).rev().map(|j| j * n));
    ring
}
