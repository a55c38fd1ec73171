//! The scripted camera descent and the mapping from on-disk settings to a
//! [`PlanetConfig`].

use glam::DVec3;
use nebula_config::{Config, DensitySetting, ExtractorSetting, SurfaceSetting};
use nebula_lod::QuadtreeConfig;
use nebula_mesh::{DensityMode, ExtractorKind, VertexGenConfig};
use nebula_planet::{Camera, Planet, PlanetConfig, RenderPayload, SurfaceSource, TransitionConfig};
use nebula_terrain::TerrainHeightConfig;

/// Simulated time between frames of the descent.
pub const FRAME_DT: f64 = 1.0 / 60.0;

/// Direction from the planet centre along which the camera descends.
const DESCENT_AXIS: DVec3 = DVec3::new(0.3, 0.4, 0.866);

/// Build the planet settings described by `config`.
pub fn planet_config(config: &Config) -> PlanetConfig {
    PlanetConfig {
        radius: config.planet.radius_m,
        max_depth: config.planet.max_depth,
        terrain: TerrainHeightConfig {
            seed: config.planet.seed,
            ..TerrainHeightConfig::default()
        },
        vertex_gen: VertexGenConfig {
            planet_radius: config.planet.radius_m,
            resolution: config.patches.patch_resolution,
            enable_skirts: config.patches.enable_skirts,
            skirt_depth: config.patches.skirt_depth_m,
            enable_vertex_caching: config.patches.enable_vertex_caching,
            max_cache_size: config.patches.max_cache_size,
        },
        quadtree: QuadtreeConfig {
            planet_radius: config.planet.radius_m,
            max_level: config.quadtree.max_level,
            min_pixel_error: config.quadtree.min_pixel_error,
            morph_region: config.quadtree.morph_region,
            max_nodes: config.quadtree.max_nodes,
            enable_face_culling: config.quadtree.enable_face_culling,
            enable_frustum_culling: config.quadtree.enable_frustum_culling,
            ..QuadtreeConfig::default()
        },
        extractor: match config.extraction.extractor {
            ExtractorSetting::Transvoxel => ExtractorKind::Transvoxel,
            ExtractorSetting::SimpleCubes => ExtractorKind::SimpleCubes,
        },
        density_mode: match config.extraction.density_mode {
            DensitySetting::Binary => DensityMode::Binary,
            DensitySetting::Blended => DensityMode::Blended,
        },
        surface_source: match config.extraction.surface_source {
            SurfaceSetting::Voxels => SurfaceSource::Voxels,
            SurfaceSetting::Terrain => SurfaceSource::Terrain,
        },
        region_cells: config.extraction.region_cells,
        transitions: TransitionConfig {
            start_altitude: config.transitions.transition_start_altitude_m,
            end_altitude: config.transitions.transition_end_altitude_m,
            enabled: config.transitions.enable_transitions,
        },
        screen_height: config.view.screen_height,
        fov_radians: config.view.fov_degrees.to_radians(),
        ..PlanetConfig::default()
    }
}

/// Altitudes visited by the descent: geometric steps from `start` down to
/// `end`, both included.
pub fn descent_altitudes(start: f64, end: f64, frames: u32) -> Vec<f64> {
    match frames {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let (start, end) = (start.max(1.0), end.max(1.0));
            let ratio = (end / start).powf(1.0 / f64::from(frames - 1));
            (0..frames).map(|i| start * ratio.powi(i as i32)).collect()
        }
    }
}

/// Fly the camera down toward the surface and prepare one payload per
/// altitude, handing each to `on_frame`.
pub fn run_descent(planet: &mut Planet, config: &Config, mut on_frame: impl FnMut(&RenderPayload)) {
    let radius = config.planet.radius_m;
    let start = config.view.start_altitude(radius);
    let end = 0.5 * config.transitions.transition_end_altitude_m;
    let axis = DESCENT_AXIS.normalize();

    for altitude in descent_altitudes(start, end, config.view.frames) {
        let position = axis * (radius + altitude);
        let camera = Camera::looking_at(position, DVec3::ZERO, config.view.fov_degrees.to_radians(), 16.0 / 9.0);
        let payload = planet.prepare_frame(&camera.view_state(config.view.screen_height), FRAME_DT);
        on_frame(&payload);
    }
}
