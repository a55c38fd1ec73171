//! Procedural fill of an [`OctreePlanet`].
//!
//! Nodes are refined unconditionally for the first few levels and after
//! that only where they straddle the planet surface, so the tree is dense
//! around the crust and coarse elsewhere. Leaf voxels are classified by
//! their centre: a rock core, a continent/ocean band beneath the surface,
//! and air above it.

use glam::DVec3;
use nebula_materials::MaterialId;
use noise::{NoiseFn, Simplex};

use crate::octree::{OctreeNode, octant_offset};
use crate::{MixedVoxel, OctreePlanet};

/// Levels refined regardless of surface proximity.
const UNCONDITIONAL_LEVELS: u32 = 3;

/// Voxels deeper than this fraction of the radius are solid core.
const CORE_FRACTION: f64 = 0.9;

const CONTINENT_THRESHOLD: f64 = 0.15;
const SHORELINE_THRESHOLD: f64 = 0.05;
const DEEP_OCEAN_THRESHOLD: f64 = -0.3;

#[derive(Clone, Copy, Debug, Default)]
struct GenerationCounts {
    nodes: usize,
    leaves: usize,
    surface_leaves: usize,
}

struct Generator {
    radius: f64,
    max_depth: u32,
    noise: Simplex,
    counts: GenerationCounts,
}

impl OctreePlanet {
    /// Replace the tree with freshly generated terrain. The same seed always
    /// produces the same tree.
    pub fn generate(&mut self, seed: u64) {
        let mut generator = Generator {
            radius: self.radius(),
            max_depth: self.max_depth(),
            noise: Simplex::new((seed ^ (seed >> 32)) as u32),
            counts: GenerationCounts::default(),
        };
        let root_half = self.root.half_size();
        self.root = generator.build(DVec3::ZERO, root_half, 0);
        self.set_seed(seed);

        let counts = generator.counts;
        tracing::info!(
            "Generated octree planet: seed={}, nodes={}, leaves={}, surface leaves={}",
            seed,
            counts.nodes,
            counts.leaves,
            counts.surface_leaves
        );
    }
}

impl Generator {
    fn build(&mut self, center: DVec3, half_size: f64, level: u32) -> OctreeNode {
        self.counts.nodes += 1;
        let reach = half_size * 3f64.sqrt();
        let distance = center.length();
        let touches_planet = distance - reach < self.radius;
        let straddles = (distance - self.radius).abs() < reach;

        let refine = level < self.max_depth
            && touches_planet
            && (level < UNCONDITIONAL_LEVELS || straddles);

        if refine {
            let child_half = half_size * 0.5;
            let children: [OctreeNode; 8] = std::array::from_fn(|i| {
                self.build(center + octant_offset(i) * child_half, child_half, level + 1)
            });
            return OctreeNode::internal(center, half_size, level, children);
        }

        self.counts.leaves += 1;
        if straddles {
            self.counts.surface_leaves += 1;
        }
        let voxels = std::array::from_fn(|i| {
            self.classify(center + octant_offset(i) * (half_size * 0.5))
        });
        OctreeNode::leaf(center, half_size, level, voxels)
    }

    fn classify(&self, pos: DVec3) -> MixedVoxel {
        let distance = pos.length();
        if distance > self.radius {
            let mut air = MixedVoxel::pure(MaterialId::Air);
            air.set_temperature(10);
            air.set_pressure(0);
            return air;
        }
        if distance < self.radius * CORE_FRACTION {
            let mut core = MixedVoxel::pure(MaterialId::Rock);
            core.set_temperature(255);
            core.set_pressure(255);
            return core;
        }

        let n = pos / distance;
        // libm keeps the pattern bit-identical across platforms.
        let latitude = libm::asin(n.z.clamp(-1.0, 1.0));
        let longitude = libm::atan2(n.y, n.x);
        let pattern = libm::sin(latitude * 3.0) * libm::cos(longitude * 2.0);
        let perturbation = self.noise.get([n.x * 2.0, n.y * 2.0, n.z * 2.0]);
        let continent = 0.5 * pattern + 0.5 * perturbation;

        let mut voxel = if continent > CONTINENT_THRESHOLD {
            MixedVoxel::pure(MaterialId::Rock)
        } else if continent > SHORELINE_THRESHOLD {
            MixedVoxel::mix(MaterialId::Rock, 128, MaterialId::Water, 127)
        } else if continent > DEEP_OCEAN_THRESHOLD {
            MixedVoxel::pure(MaterialId::Water)
        } else {
            MixedVoxel::mix(MaterialId::Water, 200, MaterialId::Sand, 55)
        };
        voxel.set_temperature(120);
        voxel.set_pressure(150);
        voxel
    }
}
