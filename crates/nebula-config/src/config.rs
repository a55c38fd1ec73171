//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name of the configuration inside its directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

/// Deepest octree the generator accepts.
pub const MAX_OCTREE_DEPTH: u32 = 16;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Planet shape and generation.
    pub planet: PlanetConfig,
    /// Surface patch meshing.
    pub patches: PatchConfig,
    /// Quadtree level-of-detail selection.
    pub quadtree: QuadtreeConfig,
    /// Voxel surface extraction.
    pub extraction: ExtractionConfig,
    /// Viewport and scripted camera.
    pub view: ViewConfig,
    /// Patch / voxel surface transition altitudes.
    pub transitions: TransitionConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Planet shape and generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlanetConfig {
    /// Planet radius in meters.
    pub radius_m: f64,
    /// Maximum octree subdivision depth.
    pub max_depth: u32,
    /// World seed for voxel and height generation.
    pub seed: u64,
}

/// Surface patch meshing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PatchConfig {
    /// Vertices per patch edge.
    pub patch_resolution: u32,
    /// Hang a skirt below every patch border.
    pub enable_skirts: bool,
    /// How far skirts reach below the surface, in meters.
    pub skirt_depth_m: f64,
    /// Reuse height samples between patches.
    pub enable_vertex_caching: bool,
    /// Cached samples kept before the cache is cleared.
    pub max_cache_size: usize,
}

/// Quadtree level-of-detail selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuadtreeConfig {
    /// Deepest patch level.
    pub max_level: u32,
    /// Floor on the subdivision threshold, in pixels.
    pub min_pixel_error: f64,
    /// Fraction of the threshold over which patches geomorph.
    pub morph_region: f64,
    /// Visible patch budget per frame.
    pub max_nodes: usize,
    /// Skip cube faces turned away from the viewer.
    pub enable_face_culling: bool,
    /// Skip patches outside the view frustum.
    pub enable_frustum_culling: bool,
}

/// Which iso-surface extractor meshes the voxel planet.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum ExtractorSetting {
    #[default]
    Transvoxel,
    SimpleCubes,
}

/// How voxel contents turn into density for extraction.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DensitySetting {
    #[default]
    Binary,
    Blended,
}

/// Field the near-ground surface is extracted from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SurfaceSetting {
    #[default]
    Voxels,
    Terrain,
}

/// Voxel surface extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    pub extractor: ExtractorSetting,
    /// Cells per axis of the region meshed around the viewer.
    pub region_cells: u32,
    pub density_mode: DensitySetting,
    pub surface_source: SurfaceSetting,
}

/// Viewport and scripted camera.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewConfig {
    /// Viewport height in pixels.
    pub screen_height: u32,
    /// Vertical field of view in degrees.
    pub fov_degrees: f64,
    /// Camera starting altitude above the surface in meters. Non-positive
    /// values start at twice the planet radius.
    pub start_altitude_m: f64,
    /// Frames rendered by the scripted descent.
    pub frames: u32,
}

/// Patch / voxel surface transition altitudes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransitionConfig {
    /// Above this altitude only patches are drawn.
    pub transition_start_altitude_m: f64,
    /// Below this altitude only the voxel surface is drawn.
    pub transition_end_altitude_m: f64,
    /// Cross-fade between the two; otherwise switch hard at the end altitude.
    pub enable_transitions: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for PlanetConfig {
    fn default() -> Self {
        Self {
            radius_m: 6_371_000.0,
            max_depth: 7,
            seed: 42,
        }
    }
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            patch_resolution: 65,
            enable_skirts: true,
            skirt_depth_m: 500.0,
            enable_vertex_caching: true,
            max_cache_size: 100_000,
        }
    }
}

impl Default for QuadtreeConfig {
    fn default() -> Self {
        Self {
            max_level: 10,
            min_pixel_error: 1.0,
            morph_region: 0.3,
            max_nodes: 10_000,
            enable_face_culling: true,
            enable_frustum_culling: true,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            extractor: ExtractorSetting::Transvoxel,
            region_cells: 32,
            density_mode: DensitySetting::Binary,
            surface_source: SurfaceSetting::Voxels,
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            screen_height: 1080,
            fov_degrees: 60.0,
            start_altitude_m: 0.0,
            frames: 8,
        }
    }
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            transition_start_altitude_m: 1_000.0,
            transition_end_altitude_m: 500.0,
            enable_transitions: true,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl ViewConfig {
    /// Starting altitude, resolving the non-positive default to `2 · radius`.
    pub fn start_altitude(&self, radius_m: f64) -> f64 {
        if self.start_altitude_m > 0.0 {
            self.start_altitude_m
        } else {
            2.0 * radius_m
        }
    }
}

/// `<os config dir>/nebula`, if the platform has a config directory.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("nebula"))
}

// --- Validation ---

impl Config {
    /// Reject settings the planet cannot be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::InvalidConfig(msg));
        if !(self.planet.radius_m.is_finite() && self.planet.radius_m > 0.0) {
            return invalid(format!("radius_m must be positive, got {}", self.planet.radius_m));
        }
        if self.planet.max_depth > MAX_OCTREE_DEPTH {
            return invalid(format!(
                "max_depth {} exceeds {MAX_OCTREE_DEPTH}",
                self.planet.max_depth
            ));
        }
        if self.patches.patch_resolution < 2 {
            return invalid(format!(
                "patch_resolution must be at least 2, got {}",
                self.patches.patch_resolution
            ));
        }
        if self.patches.skirt_depth_m < 0.0 {
            return invalid(format!(
                "skirt_depth_m must not be negative, got {}",
                self.patches.skirt_depth_m
            ));
        }
        if self.extraction.region_cells == 0 {
            return invalid("region_cells must be positive".to_string());
        }
        if self.view.screen_height == 0 || !(self.view.fov_degrees > 0.0 && self.view.fov_degrees < 180.0) {
            return invalid(format!(
                "bad viewport: height {}, fov {}°",
                self.view.screen_height, self.view.fov_degrees
            ));
        }
        if self.transitions.transition_end_altitude_m > self.transitions.transition_start_altitude_m {
            return invalid(format!(
                "transition end altitude {} above start altitude {}",
                self.transitions.transition_end_altitude_m,
                self.transitions.transition_start_altitude_m
            ));
        }
        Ok(())
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("radius_m: 6371000.0"), "{ron_str}");
        assert!(ron_str.contains("patch_resolution: 65"));
        assert!(ron_str.contains("extractor: Transvoxel"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.extraction.extractor = ExtractorSetting::SimpleCubes;
        config.extraction.density_mode = DensitySetting::Blended;
        config.extraction.surface_source = SurfaceSetting::Terrain;
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(planet: (seed: 7), patches: ())";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.planet.seed, 7);
        assert_eq!(config.planet.max_depth, 7);
        assert_eq!(config.quadtree, QuadtreeConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases: [fn(&mut Config); 6] = [
            |c| c.planet.radius_m = 0.0,
            |c| c.planet.max_depth = 17,
            |c| c.patches.patch_resolution = 1,
            |c| c.extraction.region_cells = 0,
            |c| c.view.fov_degrees = 180.0,
            |c| c.transitions.transition_end_altitude_m = 2_000.0,
        ];
        for (i, break_it) in cases.iter().enumerate() {
            let mut config = Config::default();
            break_it(&mut config);
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidConfig(_))),
                "case {i} accepted"
            );
        }
    }

    #[test]
    fn test_start_altitude_defaults_to_two_radii() {
        let view = ViewConfig::default();
        assert_eq!(view.start_altitude(1000.0), 2000.0);
        let set = ViewConfig {
            start_altitude_m: 300.0,
            ..ViewConfig::default()
        };
        assert_eq!(set.start_altitude(1000.0), 300.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.planet.radius_m = 1000.0;
        config.view.frames = 3;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nebula");
        let config = Config::load_or_create(&nested).unwrap();
        assert_eq!(config, Config::default());
        assert!(nested.join(CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.planet.seed = 1234;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.map(|c| c.planet.seed), Some(1234));
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();
        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{{not valid}}").unwrap();
        let result = Config::load_or_create(dir.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_ron_comments_accepted() {
        let ron_str = "// planet settings\n(\n  // none yet\n)";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config, Config::default());
    }
}
