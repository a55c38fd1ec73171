//! Marching-cubes extraction over regular cells.
//!
//! Corners with density below zero are inside. Each crossed cell edge gets
//! one vertex, interpolated from its lower lattice corner so that the two
//! regions sharing a face compute the same position. Triangles are turned
//! to face from the inside corners toward the outside corners of the edges
//! they span.

use glam::DVec3;
use nebula_terrain::DensitySource;

use super::tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, TRI_TABLE};
use super::{ExtractedMesh, ExtractionRegion, MeshBuilder, SurfaceExtractor};

/// Production surface extractor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransvoxelExtractor {
    /// Use field gradients for vertex normals where they are usable;
    /// otherwise accumulated face normals.
    pub gradient_normals: bool,
}

impl Default for TransvoxelExtractor {
    fn default() -> Self {
        Self {
            gradient_normals: true,
        }
    }
}

impl SurfaceExtractor for TransvoxelExtractor {
    fn name(&self) -> &'static str {
        "transvoxel"
    }

    fn extract(&self, region: &ExtractionRegion, source: &dyn DensitySource) -> ExtractedMesh {
        if region.is_empty() {
            return ExtractedMesh::default();
        }
        let [nx, ny, nz] = region.cells.map(|c| c as usize);
        let (px, py) = (nx + 1, ny + 1);

        let mut densities = Vec::with_capacity(px * py * (nz + 1));
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    densities.push(source.density(region.point([i as i64, j as i64, k as i64])));
                }
            }
        }
        let density_at = |c: [usize; 3]| densities[(c[2] * py + c[1]) * px + c[0]];
        let point_at = |c: [usize; 3]| region.point(c.map(|v| v as i64));

        let mut builder = MeshBuilder::new(region.voxel_size);
        let mut edge_vertex = [0u32; 12];
        let mut edge_outward = [DVec3::ZERO; 12];

        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let corners = CORNER_OFFSETS
                        .map(|o| [i + o[0] as usize, j + o[1] as usize, k + o[2] as usize]);
                    let d = corners.map(density_at);

                    let case = d
                        .iter()
                        .enumerate()
                        .filter(|(_, v)| **v < 0.0)
                        .fold(0usize, |acc, (n, _)| acc | (1 << n));
                    if case == 0 || case == 255 {
                        continue;
                    }

                    let crossed = EDGE_TABLE[case];
                    for (e, &[a, b]) in EDGE_CORNERS.iter().enumerate() {
                        if crossed & (1 << e) == 0 {
                            continue;
                        }
                        let (lo, hi) = if corners[a] <= corners[b] { (a, b) } else { (b, a) };
                        let (p_lo, p_hi) = (point_at(corners[lo]), point_at(corners[hi]));
                        let (d_lo, d_hi) = (d[lo], d[hi]);
                        let t = (d_lo / (d_lo - d_hi)).clamp(0.0, 1.0);
                        let position = p_lo + (p_hi - p_lo) * t;

                        let (inside, outside) = if d_lo < 0.0 { (p_lo, p_hi) } else { (p_hi, p_lo) };
                        edge_vertex[e] = builder.vertex(position, || source.colour(inside));
                        edge_outward[e] = outside - inside;
                    }

                    for tri in TRI_TABLE[case].chunks_exact(3).take_while(|t| t[0] >= 0) {
                        let edges = [tri[0], tri[1], tri[2]].map(|e| e as usize);
                        let outward = edges.iter().map(|&e| edge_outward[e]).sum::<DVec3>();
                        builder.triangle(edges.map(|e| edge_vertex[e]), outward);
                    }
                }
            }
        }

        let gradient = self
            .gradient_normals
            .then_some((source, region.voxel_size * 0.5));
        builder.finish(gradient)
    }
}
