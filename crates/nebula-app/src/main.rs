//! Headless planet driver: loads the configuration, builds and generates a
//! planet, then flies a scripted descent logging what each frame produced.

mod descent;

use std::path::PathBuf;

use clap::Parser;
use nebula_config::{CliArgs, Config, ConfigError, default_config_dir};
use nebula_planet::{Planet, PlanetError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Planet(#[from] PlanetError),
}

fn run(config: &Config) -> Result<(), AppError> {
    config.validate()?;
    let mut planet = Planet::new(descent::planet_config(config))?;
    planet.generate(config.planet.seed)?;
    let stats = planet.octree().stats();
    info!(
        "generated seed {}: {} nodes, {} leaves ({} renderable), voxel size {:.1} m",
        config.planet.seed,
        stats.total_nodes,
        stats.leaf_nodes,
        stats.renderable_leaves,
        planet.voxel_size()
    );

    descent::run_descent(&mut planet, config, |payload| {
        let s = &payload.stats;
        info!(
            "frame {} at {:.0} m ({:?}): {} nodes, {} instances, {} patches / {} triangles, {} surface triangles",
            s.frame,
            s.altitude,
            s.mode,
            payload.gpu_nodes.len(),
            s.instances,
            s.patch_meshes,
            s.patch_triangles,
            s.surface_triangles
        );
        if s.skipped_patches > 0 {
            tracing::warn!("frame {}: {} patches skipped", s.frame, s.skipped_patches);
        }
    });
    Ok(())
}

fn main() {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(default_config_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    nebula_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    if let Err(e) = run(&config) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
