//! Planet surface height as a function of the sphere normal.
//!
//! Three fBm layers (continents, mountains, surface detail) are combined and
//! oceans are deepened below sea level. The input is always a unit sphere
//! normal, so patches on different cube faces that meet at a point (including
//! the three-face cube corners) sample the same height.

use glam::DVec3;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::heightmap::{HeightmapParams, HeightmapSampler};

/// Anything that maps a unit sphere normal to a height in metres above the
/// base radius.
pub trait HeightSource: Send + Sync {
    fn height(&self, normal: DVec3) -> f64;

    /// Bound on `|height|`, used to pad bounding volumes.
    fn max_abs_height(&self) -> f64;
}

/// A perfectly smooth sphere.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlatHeight;

impl HeightSource for FlatHeight {
    fn height(&self, _normal: DVec3) -> f64 {
        0.0
    }

    fn max_abs_height(&self) -> f64 {
        0.0
    }
}

/// Amplitudes of the height layers, in metres.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainHeightConfig {
    pub seed: u64,
    pub continent_amplitude: f64,
    /// Offset applied to the continent layer; negative values raise the sea.
    pub continent_bias: f64,
    pub mountain_amplitude: f64,
    pub detail_amplitude: f64,
    /// Deepest ocean floor, as a positive depth.
    pub max_ocean_depth: f64,
}

impl Default for TerrainHeightConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            continent_amplitude: 2000.0,
            continent_bias: -500.0,
            mountain_amplitude: 1200.0,
            detail_amplitude: 200.0,
            max_ocean_depth: 3000.0,
        }
    }
}

/// Procedural planet height.
pub struct PlanetHeight {
    continents: HeightmapSampler,
    mountains: HeightmapSampler,
    details: HeightmapSampler,
    config: TerrainHeightConfig,
}

impl PlanetHeight {
    pub fn new(config: TerrainHeightConfig) -> Self {
        // Independent layer seeds from one world seed.
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let layer = |seed: u32, base_frequency: f64, octaves: u32| {
            HeightmapSampler::new(HeightmapParams {
                seed,
                octaves,
                base_frequency,
                ..HeightmapParams::default()
            })
        };
        Self {
            continents: layer(rng.next_u32(), 3.0, 4),
            mountains: layer(rng.next_u32(), 8.0, 3),
            details: layer(rng.next_u32(), 20.0, 2),
            config,
        }
    }

    pub fn config(&self) -> &TerrainHeightConfig {
        &self.config
    }
}

impl HeightSource for PlanetHeight {
    fn height(&self, normal: DVec3) -> f64 {
        let c = &self.config;
        let continents =
            (self.continents.sample_normalized(normal) * 2.0 - 1.0) * c.continent_amplitude
                + c.continent_bias;
        let mountains = if continents > 0.0 {
            self.mountains.sample_normalized(normal) * c.mountain_amplitude
        } else {
            0.0
        };
        let details = self.details.sample_normalized(normal) * c.detail_amplitude
            - c.detail_amplitude * 0.5;

        let height = continents + 0.7 * mountains + 0.3 * details;
        if height < 0.0 {
            (height * 0.8 - 500.0).max(-c.max_ocean_depth)
        } else {
            height
        }
    }

    fn max_abs_height(&self) -> f64 {
        let c = &self.config;
        let peak = c.continent_amplitude + c.continent_bias.max(0.0)
            + 0.7 * c.mountain_amplitude
            + 0.15 * c.detail_amplitude;
        peak.max(c.max_ocean_depth)
    }
}

impl<F> HeightSource for F
where
    F: Fn(DVec3) -> f64 + Send + Sync,
{
    fn height(&self, normal: DVec3) -> f64 {
        self(normal)
    }

    fn max_abs_height(&self) -> f64 {
        0.0
    }
}
