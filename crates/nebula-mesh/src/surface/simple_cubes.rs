//! Blocky debug extraction: one quad per face between an inside cell and an
//! outside cell, classified by the density at the cell centre.

use glam::DVec3;
use nebula_terrain::DensitySource;

use super::{ExtractedMesh, ExtractionRegion, MeshBuilder, SurfaceExtractor};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimpleCubesExtractor;

const DIRECTIONS: [[i64; 3]; 6] = [
    [1, 0, 0],
    [-1, 0, 0],
    [0, 1, 0],
    [0, -1, 0],
    [0, 0, 1],
    [0, 0, -1],
];

impl SurfaceExtractor for SimpleCubesExtractor {
    fn name(&self) -> &'static str {
        "simple-cubes"
    }

    fn extract(&self, region: &ExtractionRegion, source: &dyn DensitySource) -> ExtractedMesh {
        if region.is_empty() {
            return ExtractedMesh::default();
        }
        let [nx, ny, nz] = region.cells.map(i64::from);
        let half = DVec3::splat(region.voxel_size * 0.5);

        // Cell centres with a one-cell halo so boundary faces see their
        // outside neighbours.
        let (sx, sy) = (nx + 2, ny + 2);
        let mut inside = Vec::with_capacity((sx * sy * (nz + 2)) as usize);
        for k in -1..=nz {
            for j in -1..=ny {
                for i in -1..=nx {
                    inside.push(source.density(region.point([i, j, k]) + half) < 0.0);
                }
            }
        }
        let is_inside = |c: [i64; 3]| inside[(((c[2] + 1) * sy + c[1] + 1) * sx + c[0] + 1) as usize];

        let mut builder = MeshBuilder::new(region.voxel_size);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let cell = [i, j, k];
                    if !is_inside(cell) {
                        continue;
                    }
                    let centre = region.point(cell) + half;
                    for dir in DIRECTIONS {
                        let neighbour = [i + dir[0], j + dir[1], k + dir[2]];
                        if is_inside(neighbour) {
                            continue;
                        }
                        let corners = face_corners(cell, dir).map(|c| {
                            builder.vertex(region.point(c), || source.colour(centre))
                        });
                        let outward = DVec3::new(dir[0] as f64, dir[1] as f64, dir[2] as f64);
                        builder.triangle([corners[0], corners[1], corners[2]], outward);
                        builder.triangle([corners[0], corners[2], corners[3]], outward);
                    }
                }
            }
        }
        builder.finish(None)
    }
}

/// Lattice corners of the face of `cell` facing `dir`, in cyclic order.
fn face_corners(cell: [i64; 3], dir: [i64; 3]) -> [[i64; 3]; 4] {
    let axis = dir.iter().position(|&d| d != 0).unwrap_or(0);
    let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
    let mut base = cell;
    if dir[axis] > 0 {
        base[axis] += 1;
    }
    let offset = |du: i64, dv: i64| {
        let mut c = base;
        c[u] += du;
        c[v] += dv;
        c
    };
    [offset(0, 0), offset(1, 0), offset(1, 1), offset(0, 1)]
}
