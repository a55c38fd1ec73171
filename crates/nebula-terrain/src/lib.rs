//! Procedural terrain: fractal noise sampled on the unit sphere, the planet
//! height profile, and signed density fields for surface extraction.

mod density;
mod heightmap;
mod terrain_height;

pub use density::{DensitySource, SphereDensity, TerrainDensity};
pub use heightmap::{HeightmapParams, HeightmapSampler};
pub use terrain_height::{FlatHeight, HeightSource, PlanetHeight, TerrainHeightConfig};
