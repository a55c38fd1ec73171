use glam::{DVec3, Vec3};
use nebula_terrain::DensitySource;
use nebula_voxel::OctreePlanet;

/// How voxel contents map to density.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DensityMode {
    /// −1 for renderable voxels, +1 otherwise.
    #[default]
    Binary,
    /// `1 − 2·solid_fraction`, so partially filled voxels pull the surface.
    Blended,
}

/// An [`OctreePlanet`] viewed as a density field. Points outside the tree
/// read as vacuum.
#[derive(Clone, Copy)]
pub struct VoxelDensity<'a> {
    planet: &'a OctreePlanet,
    mode: DensityMode,
}

impl<'a> VoxelDensity<'a> {
    pub fn new(planet: &'a OctreePlanet, mode: DensityMode) -> Self {
        Self { planet, mode }
    }

    pub fn mode(&self) -> DensityMode {
        self.mode
    }
}

impl DensitySource for VoxelDensity<'_> {
    fn density(&self, p: DVec3) -> f64 {
        let voxel = self.planet.get_voxel(p);
        match self.mode {
            DensityMode::Binary => {
                if voxel.is_renderable() {
                    -1.0
                } else {
                    1.0
                }
            }
            DensityMode::Blended => 1.0 - 2.0 * f64::from(voxel.solid_fraction()),
        }
    }

    fn colour(&self, p: DVec3) -> Vec3 {
        self.planet.get_voxel(p).colour()
    }
}
