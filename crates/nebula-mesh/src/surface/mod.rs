//! Iso-surface extraction from signed density fields.
//!
//! Regions are boxes of cells on the global lattice `voxel_size · ℤ³`.
//! Every region samples the field at the same world positions, so
//! neighbouring regions agree on their shared faces.

mod simple_cubes;
mod tables;
mod transvoxel;
mod voxel_density;

use glam::{DVec3, Vec3};
use nebula_terrain::DensitySource;
use nebula_voxel::OctreePlanet;
use rustc_hash::FxHashMap;

pub use simple_cubes::SimpleCubesExtractor;
pub use transvoxel::TransvoxelExtractor;
pub use voxel_density::{DensityMode, VoxelDensity};

/// Vertices closer than this fraction of the voxel size are merged.
pub const WELD_EPSILON_FACTOR: f64 = 0.001;

/// A vertex of an extracted surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceVertex {
    pub position: DVec3,
    pub normal: Vec3,
    pub colour: Vec3,
}

/// Indexed triangle mesh produced by a [`SurfaceExtractor`]. Triangles are
/// wound counter-clockwise seen from the empty side.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractedMesh {
    pub vertices: Vec<SurfaceVertex>,
    pub indices: Vec<u32>,
}

impl ExtractedMesh {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Enclosed volume by the divergence theorem; meaningful for closed
    /// meshes only.
    pub fn volume(&self) -> f64 {
        self.triangles()
            .map(|t| {
                let [a, b, c] = t.map(|i| self.vertices[i as usize].position);
                a.dot(b.cross(c))
            })
            .sum::<f64>()
            / 6.0
    }
}

/// A box of cells on the lattice `voxel_size · ℤ³`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtractionRegion {
    /// Lattice coordinates of the minimum corner.
    pub min_cell: [i64; 3],
    /// Cells along each axis.
    pub cells: [u32; 3],
    pub voxel_size: f64,
}

impl ExtractionRegion {
    pub fn new(min_cell: [i64; 3], cells: [u32; 3], voxel_size: f64) -> Self {
        Self {
            min_cell,
            cells,
            voxel_size,
        }
    }

    /// The smallest lattice-aligned region containing `[min, max]`.
    pub fn covering(min: DVec3, max: DVec3, voxel_size: f64) -> Self {
        let lo = (min / voxel_size).floor();
        let hi = (max / voxel_size).ceil();
        let span = (hi - lo).max(DVec3::ZERO);
        Self {
            min_cell: [lo.x as i64, lo.y as i64, lo.z as i64],
            cells: [span.x as u32, span.y as u32, span.z as u32],
            voxel_size,
        }
    }

    /// A cube of `cells³` cells centred on the lattice point nearest `center`.
    pub fn around(center: DVec3, cells: u32, voxel_size: f64) -> Self {
        let c = (center / voxel_size).round();
        let half = i64::from(cells / 2);
        Self {
            min_cell: [c.x as i64 - half, c.y as i64 - half, c.z as i64 - half],
            cells: [cells; 3],
            voxel_size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.contains(&0) || !(self.voxel_size.is_finite() && self.voxel_size > 0.0)
    }

    /// World position of the lattice point `offset` cells from the minimum
    /// corner.
    pub fn point(&self, offset: [i64; 3]) -> DVec3 {
        DVec3::new(
            (self.min_cell[0] + offset[0]) as f64 * self.voxel_size,
            (self.min_cell[1] + offset[1]) as f64 * self.voxel_size,
            (self.min_cell[2] + offset[2]) as f64 * self.voxel_size,
        )
    }

    pub fn min_corner(&self) -> DVec3 {
        self.point([0; 3])
    }

    pub fn max_corner(&self) -> DVec3 {
        self.point(self.cells.map(i64::from))
    }
}

/// Turns a density field into a triangle mesh.
pub trait SurfaceExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Extract the zero level set of `source` inside `region`. An empty
    /// region yields an empty mesh.
    fn extract(&self, region: &ExtractionRegion, source: &dyn DensitySource) -> ExtractedMesh;

    /// Extract the renderable matter of a voxel planet.
    fn extract_planet(
        &self,
        region: &ExtractionRegion,
        planet: &OctreePlanet,
        mode: DensityMode,
    ) -> ExtractedMesh {
        self.extract(region, &VoxelDensity::new(planet, mode))
    }
}

/// Available extractor implementations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExtractorKind {
    #[default]
    Transvoxel,
    /// Blocky faces between solid and empty cells; for debugging.
    SimpleCubes,
}

pub fn extractor_for(kind: ExtractorKind) -> Box<dyn SurfaceExtractor> {
    match kind {
        ExtractorKind::Transvoxel => Box::new(TransvoxelExtractor::default()),
        ExtractorKind::SimpleCubes => Box::new(SimpleCubesExtractor),
    }
}

/// Accumulates welded vertices and oriented triangles.
pub(crate) struct MeshBuilder {
    mesh: ExtractedMesh,
    lookup: FxHashMap<[i64; 3], u32>,
    inv_epsilon: f64,
    face_normals: Vec<DVec3>,
}

impl MeshBuilder {
    pub(crate) fn new(voxel_size: f64) -> Self {
        Self {
            mesh: ExtractedMesh::default(),
            lookup: FxHashMap::default(),
            inv_epsilon: 1.0 / (voxel_size * WELD_EPSILON_FACTOR),
            face_normals: Vec::new(),
        }
    }

    /// Index of the vertex at `position`, creating it if no vertex lies in
    /// the same weld bucket.
    pub(crate) fn vertex(&mut self, position: DVec3, colour: impl FnOnce() -> Vec3) -> u32 {
        let q = (position * self.inv_epsilon).round();
        let key = [q.x as i64, q.y as i64, q.z as i64];
        if let Some(&index) = self.lookup.get(&key) {
            return index;
        }
        let index = self.mesh.vertices.len() as u32;
        self.mesh.vertices.push(SurfaceVertex {
            position,
            normal: Vec3::ZERO,
            colour: colour(),
        });
        self.face_normals.push(DVec3::ZERO);
        self.lookup.insert(key, index);
        index
    }

    /// Add a triangle facing along `outward`. Triangles that collapsed
    /// during welding are dropped.
    pub(crate) fn triangle(&mut self, [a, b, c]: [u32; 3], outward: DVec3) {
        if a == b || b == c || a == c {
            return;
        }
        let p = |i: u32| self.mesh.vertices[i as usize].position;
        let mut normal = (p(b) - p(a)).cross(p(c) - p(a));
        let (b, c) = if normal.dot(outward) < 0.0 {
            normal = -normal;
            (c, b)
        } else {
            (b, c)
        };
        self.mesh.indices.extend_from_slice(&[a, b, c]);
        for i in [a, b, c] {
            self.face_normals[i as usize] += normal;
        }
    }

    /// Finish with area-weighted face normals, or with field gradients
    /// (step `h`) where they agree with the faces.
    pub(crate) fn finish(mut self, gradient: Option<(&dyn DensitySource, f64)>) -> ExtractedMesh {
        for (vertex, face) in self.mesh.vertices.iter_mut().zip(&self.face_normals) {
            let face = face.normalize_or_zero();
            let normal = gradient
                .map(|(source, h)| source.gradient(vertex.position, h))
                .filter(|g| g.length_squared() > 1e-18 && (face == DVec3::ZERO || g.dot(face) > 0.0))
                .map_or(face, DVec3::normalize);
            vertex.normal = normal.as_vec3();
        }
        self.mesh
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use nebula_terrain::SphereDensity;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_region_points_are_lattice_aligned() {
        let a = ExtractionRegion::new([-4, 0, 2], [4, 4, 4], 0.5);
        let b = ExtractionRegion::new([0, 0, 2], [4, 4, 4], 0.5);
        // The shared face of two neighbouring regions maps to identical points.
        assert_eq!(a.point([4, 1, 3]), b.point([0, 1, 3]));
        assert_eq!(a.min_corner(), DVec3::new(-2.0, 0.0, 1.0));
        assert_eq!(a.max_corner(), DVec3::new(0.0, 2.0, 3.0));
    }

    #[test]
    fn test_region_covering_and_around() {
        let r = ExtractionRegion::covering(DVec3::splat(-6.0), DVec3::splat(6.0), 0.5);
        assert_eq!(r.min_cell, [-12; 3]);
        assert_eq!(r.cells, [24; 3]);
        let c = ExtractionRegion::around(DVec3::new(0.26, 0.0, -0.24), 8, 0.5);
        assert_eq!(c.min_cell, [-3, -4, -4]);
        assert!((c.max_corner().x - 2.5).abs() < EPSILON);
    }

    #[test]
    fn test_empty_region_yields_empty_mesh() {
        let sphere = SphereDensity {
            center: DVec3::ZERO,
            radius: 1.0,
        };
        let regions = [
            ExtractionRegion::new([0; 3], [0, 4, 4], 0.5),
            ExtractionRegion::new([0; 3], [4; 3], 0.0),
        ];
        for region in regions {
            assert!(region.is_empty());
            for kind in [ExtractorKind::Transvoxel, ExtractorKind::SimpleCubes] {
                assert!(extractor_for(kind).extract(&region, &sphere).is_empty());
            }
        }
    }

    #[test]
    fn test_builder_welds_and_drops_degenerates() {
        let mut b = MeshBuilder::new(1.0);
        let v0 = b.vertex(DVec3::ZERO, || Vec3::ONE);
        let v0_again = b.vertex(DVec3::splat(1e-5), || Vec3::ZERO);
        assert_eq!(v0, v0_again);
        let v1 = b.vertex(DVec3::X, || Vec3::ONE);
        let v2 = b.vertex(DVec3::Y, || Vec3::ONE);
        b.triangle([v0, v0_again, v1], DVec3::Z);
        b.triangle([v0, v2, v1], DVec3::Z);
        let mesh = b.finish(None);
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.vertices[0].colour, Vec3::ONE);
        // Flipped so that the normal faces +Z.
        assert_eq!(mesh.indices, vec![v0, v1, v2]);
        assert!((mesh.vertices[0].normal - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn test_extractor_kinds() {
        assert_eq!(extractor_for(ExtractorKind::default()).name(), "transvoxel");
        assert_eq!(extractor_for(ExtractorKind::SimpleCubes).name(), "simple-cubes");
    }
}
