//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, ExtractorSetting};

/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "nebula", about = "Procedural planet geometry pipeline")]
pub struct CliArgs {
    /// Planet radius in meters.
    #[arg(long)]
    pub radius: Option<f64>,

    /// Maximum octree depth.
    #[arg(long)]
    pub depth: Option<u32>,

    /// World seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Vertices per patch edge.
    #[arg(long)]
    pub resolution: Option<u32>,

    /// Voxel surface extractor.
    #[arg(long, value_enum)]
    pub extractor: Option<ExtractorSetting>,

    /// Frames rendered by the scripted descent.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(radius) = args.radius {
            self.planet.radius_m = radius;
        }
        if let Some(depth) = args.depth {
            self.planet.max_depth = depth;
        }
        if let Some(seed) = args.seed {
            self.planet.seed = seed;
        }
        if let Some(resolution) = args.resolution {
            self.patches.patch_resolution = resolution;
        }
        if let Some(extractor) = args.extractor {
            self.extraction.extractor = extractor;
        }
        if let Some(frames) = args.frames {
            self.view.frames = frames;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            radius: Some(1000.0),
            seed: Some(7),
            extractor: Some(ExtractorSetting::SimpleCubes),
            ..CliArgs::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.planet.radius_m, 1000.0);
        assert_eq!(config.planet.seed, 7);
        assert_eq!(config.extraction.extractor, ExtractorSetting::SimpleCubes);
        // Non-overridden fields retain defaults
        assert_eq!(config.planet.max_depth, 7);
        assert_eq!(config.patches.patch_resolution, 65);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::try_parse_from([
            "nebula",
            "--depth",
            "5",
            "--resolution",
            "33",
            "--extractor",
            "simple-cubes",
            "--frames",
            "2",
            "--log-level",
            "debug",
        ])
        .unwrap();
        let mut config = Config::default();
        config.apply_cli_overrides(&args);
        assert_eq!(config.planet.max_depth, 5);
        assert_eq!(config.patches.patch_resolution, 33);
        assert_eq!(config.extraction.extractor, ExtractorSetting::SimpleCubes);
        assert_eq!(config.view.frames, 2);
        assert_eq!(config.debug.log_level, "debug");
        assert!(args.config.is_none());
    }
}
