//! Configuration for the planet tools.
//!
//! Settings persist to disk as `config.ron`, every section falls back to its
//! defaults when missing, and command-line flags override what was loaded.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CONFIG_FILE_NAME, Config, DebugConfig, DensitySetting, ExtractionConfig, ExtractorSetting,
    MAX_OCTREE_DEPTH, PatchConfig, PlanetConfig, QuadtreeConfig, SurfaceSetting, TransitionConfig,
    ViewConfig, default_config_dir,
};
pub use error::ConfigError;
