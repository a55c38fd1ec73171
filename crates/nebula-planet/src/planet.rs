//! The [`Planet`] façade: owns the voxel octree, the spherical quadtree and
//! the meshing workers, and assembles one [`RenderPayload`] per frame.

use std::sync::Arc;

use glam::{DMat4, DVec3};
use nebula_lod::{QuadtreeConfig, SphericalQuadtree, ViewState, VisiblePatch};
use nebula_materials::MaterialTable;
use nebula_mesh::{
    DensityMode, ExtractedMesh, ExtractionRegion, ExtractorKind, PatchMesh, PatchMeshingPipeline,
    SurfaceExtractor, VertexGenConfig, extractor_for,
};
use nebula_terrain::{HeightSource, PlanetHeight, TerrainDensity, TerrainHeightConfig};
use nebula_voxel::{MixedVoxel, OctreePlanet, build_instances, validate_instances};

use crate::error::PlanetError;
use crate::mode::{TransitionConfig, TransitionUniform};
use crate::payload::{FrameStats, RenderPayload};

/// Field the near-ground surface mesh is extracted from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SurfaceSource {
    /// The voxel octree, so edits show up in the mesh.
    #[default]
    Voxels,
    /// The analytic terrain height field the patches are built from.
    Terrain,
}

/// Everything needed to build a [`Planet`].
#[derive(Clone, Debug, PartialEq)]
pub struct PlanetConfig {
    /// Planet radius in metres; copied into the vertex and quadtree configs.
    pub radius: f64,
    pub max_depth: u32,
    pub terrain: TerrainHeightConfig,
    pub vertex_gen: VertexGenConfig,
    pub quadtree: QuadtreeConfig,
    pub extractor: ExtractorKind,
    pub density_mode: DensityMode,
    pub surface_source: SurfaceSource,
    /// Cells per axis of the extraction region around the viewer.
    pub region_cells: u32,
    pub transitions: TransitionConfig,
    pub screen_height: u32,
    pub fov_radians: f64,
    /// Meshing threads; 0 picks one per spare CPU core.
    pub mesh_workers: usize,
    /// Patches queued or being meshed at once.
    pub mesh_budget: usize,
}

impl Default for PlanetConfig {
    fn default() -> Self {
        Self {
            radius: 6_371_000.0,
            max_depth: 7,
            terrain: TerrainHeightConfig::default(),
            vertex_gen: VertexGenConfig::default(),
            quadtree: QuadtreeConfig::default(),
            extractor: ExtractorKind::default(),
            density_mode: DensityMode::default(),
            surface_source: SurfaceSource::default(),
            region_cells: 32,
            transitions: TransitionConfig::default(),
            screen_height: 1080,
            fov_radians: std::f64::consts::FRAC_PI_3,
            mesh_workers: 0,
            mesh_budget: 256,
        }
    }
}

impl PlanetConfig {
    pub fn validate(&self) -> Result<(), PlanetError> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(PlanetError::InvalidConfig(format!(
                "radius must be positive, got {}",
                self.radius
            )));
        }
        if self.region_cells == 0 {
            return Err(PlanetError::InvalidConfig(
                "extraction region needs at least one cell".to_string(),
            ));
        }
        if self.screen_height == 0 || !(self.fov_radians > 0.0 && self.fov_radians < std::f64::consts::PI) {
            return Err(PlanetError::InvalidConfig(format!(
                "bad viewport: height {}, fov {}",
                self.screen_height, self.fov_radians
            )));
        }
        if self.transitions.end_altitude > self.transitions.start_altitude {
            return Err(PlanetError::InvalidConfig(format!(
                "transition end altitude {} above start altitude {}",
                self.transitions.end_altitude, self.transitions.start_altitude
            )));
        }
        if self.mesh_budget == 0 {
            return Err(PlanetError::InvalidConfig(
                "mesh budget must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn vertex_config(&self) -> VertexGenConfig {
        VertexGenConfig {
            planet_radius: self.radius,
            ..self.vertex_gen.clone()
        }
    }

    /// Quadtree settings with patch bounds padded by the terrain's largest
    /// displacement.
    fn quadtree_config(&self, terrain: &dyn HeightSource) -> QuadtreeConfig {
        QuadtreeConfig {
            planet_radius: self.radius,
            max_terrain_height: terrain.max_abs_height(),
            ..self.quadtree.clone()
        }
    }

    fn worker_count(&self) -> usize {
        if self.mesh_workers > 0 {
            return self.mesh_workers;
        }
        let cpus = num_cpus::get().max(2);
        (cpus - 1).max(1)
    }
}

/// A procedural planet ready to produce render payloads.
pub struct Planet {
    config: PlanetConfig,
    octree: OctreePlanet,
    quadtree: SphericalQuadtree,
    terrain: Arc<TerrainDensity<PlanetHeight>>,
    pipeline: PatchMeshingPipeline,
    extractor: Box<dyn SurfaceExtractor>,
    frame: u64,
}

impl Planet {
    /// Build an empty planet. Nothing is generated until
    /// [`generate`](Self::generate).
    pub fn new(config: PlanetConfig) -> Result<Self, PlanetError> {
        config.validate()?;
        let octree = OctreePlanet::new(config.radius, config.max_depth)?;
        let terrain = Arc::new(TerrainDensity::new(
            config.radius,
            PlanetHeight::new(config.terrain.clone()),
        ));
        let quadtree = SphericalQuadtree::new(config.quadtree_config(terrain.as_ref()))?;
        let pipeline = Self::spawn_pipeline(&config, &terrain)?;
        let extractor = extractor_for(config.extractor);
        tracing::info!(
            "planet created: radius {} m, depth {}, {} meshing workers, {} extractor",
            config.radius,
            config.max_depth,
            pipeline.worker_count(),
            extractor.name()
        );
        Ok(Self {
            config,
            octree,
            quadtree,
            terrain,
            pipeline,
            extractor,
            frame: 0,
        })
    }

    fn spawn_pipeline(
        config: &PlanetConfig,
        terrain: &Arc<TerrainDensity<PlanetHeight>>,
    ) -> Result<PatchMeshingPipeline, PlanetError> {
        let height: Arc<dyn HeightSource> = terrain.clone();
        Ok(PatchMeshingPipeline::new(
            config.worker_count(),
            config.mesh_budget,
            config.vertex_config(),
            height,
        )?)
    }

    /// Fill the octree and reseed the terrain height used by patches.
    pub fn generate(&mut self, seed: u64) -> Result<(), PlanetError> {
        self.octree.generate(seed);
        self.config.terrain.seed = seed;
        let terrain = Arc::new(TerrainDensity::new(
            self.config.radius,
            PlanetHeight::new(self.config.terrain.clone()),
        ));
        self.quadtree = SphericalQuadtree::new(self.config.quadtree_config(terrain.as_ref()))?;
        self.pipeline = Self::spawn_pipeline(&self.config, &terrain)?;
        self.terrain = terrain;
        Ok(())
    }

    pub fn config(&self) -> &PlanetConfig {
        &self.config
    }

    pub fn octree(&self) -> &OctreePlanet {
        &self.octree
    }

    /// The terrain field patches are displaced by.
    pub fn terrain(&self) -> &TerrainDensity<PlanetHeight> {
        &self.terrain
    }

    pub fn seed(&self) -> Option<u64> {
        self.octree.seed()
    }

    /// Frames prepared so far.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Edge length of a voxel at the deepest octree level.
    pub fn voxel_size(&self) -> f64 {
        self.octree.root().half_size() / f64::from(1u32 << self.config.max_depth.min(31))
    }

    /// Write one voxel. Call between frames.
    pub fn set_voxel(&mut self, pos: DVec3, voxel: MixedVoxel) -> bool {
        self.octree.set_voxel(pos, voxel)
    }

    /// Prepare a frame from a raw view position and view-projection matrix,
    /// using the configured viewport. Morph factors snap to their targets.
    pub fn prepare_render_data(&mut self, view_pos: DVec3, view_proj: DMat4) -> RenderPayload {
        let view = ViewState {
            position: view_pos,
            view_proj,
            screen_height: self.config.screen_height,
            fov_radians: self.config.fov_radians,
        };
        self.prepare_frame(&view, 0.0)
    }

    /// Prepare a frame `dt` seconds after the previous one.
    pub fn prepare_frame(&mut self, view: &ViewState, dt: f64) -> RenderPayload {
        self.frame += 1;
        let altitude = view.altitude(self.config.radius);
        let mode = self.config.transitions.classify(altitude);

        let octree = self.octree.prepare_render_data(view);
        let mut instances = build_instances(&octree);
        if let Err(e) = validate_instances(&instances) {
            tracing::warn!("dropping {} cube instances: {}", instances.len(), e);
            instances.clear();
        }

        let (visible_patches, patch_meshes, skipped_patches) = if mode.draws_patches() {
            self.mesh_patches(view, dt)
        } else {
            (Vec::new(), Vec::new(), 0)
        };
        let surface_mesh = mode
            .draws_voxel_surface()
            .then(|| self.extract_surface(view.position));

        let stats = FrameStats {
            frame: self.frame,
            mode,
            altitude,
            octree: octree.stats,
            quadtree: *self.quadtree.stats(),
            patch_meshes: patch_meshes.len(),
            skipped_patches,
            patch_vertices: patch_meshes.iter().map(|m| m.vertices.len()).sum(),
            patch_triangles: patch_meshes.iter().map(PatchMesh::triangle_count).sum(),
            surface_triangles: surface_mesh.as_ref().map_or(0, ExtractedMesh::triangle_count),
            instances: instances.len(),
        };
        tracing::debug!(
            "frame {}: {:?} at {:.0} m, {} nodes, {} instances, {} patches ({} triangles), {} surface triangles",
            stats.frame,
            stats.mode,
            stats.altitude,
            octree.nodes.len(),
            stats.instances,
            stats.patch_meshes,
            stats.patch_triangles,
            stats.surface_triangles
        );

        RenderPayload {
            view_position: view.position,
            mode,
            transition: TransitionUniform::new(mode),
            gpu_nodes: octree.nodes,
            gpu_voxels: octree.voxels,
            visible_node_indices: octree.visible_node_indices,
            instances,
            visible_patches,
            patch_meshes,
            surface_mesh,
            material_table_snapshot: MaterialTable::global().snapshot_for_gpu(),
            stats,
        }
    }

    /// Select patches and mesh them on the worker pool. Patches whose mesh
    /// fails are logged and left out.
    fn mesh_patches(
        &mut self,
        view: &ViewState,
        dt: f64,
    ) -> (Vec<VisiblePatch>, Vec<PatchMesh>, usize) {
        let selected = self.quadtree.update(view, dt).to_vec();
        let results = self.pipeline.mesh_all(&selected);

        let mut visible = Vec::with_capacity(results.len());
        let mut meshes = Vec::with_capacity(results.len());
        let mut skipped = selected.len() - results.len();
        for result in results {
            match result.mesh {
                Ok(mesh) => {
                    visible.push(selected[result.id]);
                    meshes.push(mesh);
                }
                Err(e) => {
                    tracing::warn!("skipping patch {:?}: {}", selected[result.id].patch, e);
                    skipped += 1;
                }
            }
        }
        (visible, meshes, skipped)
    }

    fn extract_surface(&self, position: DVec3) -> ExtractedMesh {
        let region = ExtractionRegion::around(position, self.config.region_cells, self.voxel_size());
        match self.config.surface_source {
            SurfaceSource::Voxels => {
                self.extractor
                    .extract_planet(&region, &self.octree, self.config.density_mode)
            }
            SurfaceSource::Terrain => self.extractor.extract(&region, self.terrain.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Camera;
    use crate::mode::RenderingMode;
    use nebula_materials::MaterialId;
    use nebula_terrain::DensitySource;
    use rustc_hash::FxHashSet;

    const SMALL_RADIUS: f64 = 1000.0;

    fn small_config() -> PlanetConfig {
        PlanetConfig {
            radius: SMALL_RADIUS,
            max_depth: 5,
            terrain: TerrainHeightConfig {
                continent_amplitude: 20.0,
                continent_bias: -5.0,
                mountain_amplitude: 12.0,
                detail_amplitude: 2.0,
                max_ocean_depth: 30.0,
                ..Default::default()
            },
            vertex_gen: VertexGenConfig {
                resolution: 9,
                skirt_depth: 5.0,
                ..Default::default()
            },
            quadtree: QuadtreeConfig {
                max_level: 4,
                ..Default::default()
            },
            region_cells: 48,
            mesh_workers: 2,
            ..Default::default()
        }
    }

    fn generated(config: PlanetConfig, seed: u64) -> Planet {
        let mut planet = Planet::new(config).unwrap();
        planet.generate(seed).unwrap();
        planet
    }

    fn look_from(planet: &mut Planet, position: DVec3) -> RenderPayload {
        let camera = Camera::looking_at(position, DVec3::ZERO, planet.config().fov_radians, 1.0);
        planet.prepare_render_data(position, camera.view_proj())
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        let bad_radius = PlanetConfig {
            radius: 0.0,
            ..small_config()
        };
        assert!(matches!(Planet::new(bad_radius), Err(PlanetError::InvalidConfig(_))));

        let bad_depth = PlanetConfig {
            max_depth: 17,
            ..small_config()
        };
        assert!(matches!(Planet::new(bad_depth), Err(PlanetError::Octree(_))));

        let mut inverted = small_config();
        inverted.transitions.end_altitude = 2_000.0;
        assert!(Planet::new(inverted).is_err());

        let mut coarse = small_config();
        coarse.vertex_gen.resolution = 1;
        assert!(matches!(Planet::new(coarse), Err(PlanetError::VertexGen(_))));

        let mut deep = small_config();
        deep.quadtree.max_level = 11;
        assert!(matches!(Planet::new(deep), Err(PlanetError::Quadtree(_))));
    }

    #[test]
    fn test_orbital_view_of_earth_sized_planet() {
        let config = PlanetConfig {
            radius: 6.371e6,
            max_depth: 7,
            vertex_gen: VertexGenConfig {
                resolution: 9,
                ..Default::default()
            },
            mesh_workers: 2,
            ..Default::default()
        };
        let mut planet = generated(config, 42);
        let payload = look_from(&mut planet, DVec3::new(0.0, 0.0, 1.9113e7));

        let nodes = payload.gpu_nodes.len();
        assert!((8..=10_000).contains(&nodes), "{nodes} nodes emitted");
        let leaves: Vec<_> = payload.gpu_nodes.iter().filter(|n| n.flags & 1 == 1).collect();
        assert!(!leaves.is_empty(), "no leaf nodes emitted");
        let rock_or_water = leaves
            .iter()
            .filter(|n| matches!(n.dominant_material(), MaterialId::Rock | MaterialId::Water))
            .count();
        assert!(
            rock_or_water * 2 > leaves.len(),
            "only {rock_or_water} of {} leaves are rock or water",
            leaves.len()
        );
        assert_eq!(leaves.len(), payload.stats.octree.leaf_nodes);
        assert!(validate_instances(&payload.instances).is_ok());
        assert_eq!(payload.stats.instances, payload.instances.len());

        assert_eq!(payload.mode, RenderingMode::QuadtreeOnly);
        assert!(payload.surface_mesh.is_none());
        assert!(!payload.patch_meshes.is_empty());
        assert_eq!(payload.patch_meshes.len(), payload.visible_patches.len());
        assert_eq!(payload.stats.skipped_patches, 0);
        assert_eq!(payload.gpu_voxels.len(), nodes * 8);
        assert_eq!(payload.visible_node_indices.len(), nodes);
        assert_eq!(
            payload.material_table_snapshot,
            MaterialTable::global().snapshot_for_gpu()
        );
    }

    #[test]
    fn test_two_viewpoints_cover_the_surface() {
        let mut planet = generated(small_config(), 42);
        let a = look_from(&mut planet, DVec3::new(0.0, 0.0, 2.0 * SMALL_RADIUS));
        let b = look_from(&mut planet, DVec3::new(2.0 * SMALL_RADIUS, 0.0, 0.0));

        let key = |n: &nebula_voxel::GpuNode| (n.center.map(f32::to_bits), n.level);
        let set_a: FxHashSet<_> = a.gpu_nodes.iter().map(key).collect();
        let set_b: FxHashSet<_> = b.gpu_nodes.iter().map(key).collect();
        assert!(set_a.intersection(&set_b).next().is_some(), "views share no nodes");

        let emitted: Vec<_> = a.gpu_nodes.iter().chain(&b.gpu_nodes).collect();
        let covered = |p: DVec3| {
            emitted.iter().any(|n| {
                let c = DVec3::new(f64::from(n.center[0]), f64::from(n.center[1]), f64::from(n.center[2]));
                let h = f64::from(n.half_size) * (1.0 + 1e-5);
                (p - c).abs().max_element() <= h
            })
        };

        let views = [DVec3::Z, DVec3::X];
        let (mut facing, mut hit) = (0usize, 0usize);
        planet.octree().traverse(|node| {
            let renderable = node.voxels().is_some_and(|v| v.iter().any(MixedVoxel::is_renderable));
            if !renderable || node.center().length() < 0.5 * SMALL_RADIUS {
                return;
            }
            let n = node.center().normalize();
            if views.iter().any(|v| n.dot(*v) > 0.3) {
                facing += 1;
                if covered(node.center()) {
                    hit += 1;
                }
            }
        });
        assert!(facing > 0);
        assert!(
            hit * 10 >= facing * 9,
            "{hit} of {facing} surface-facing leaves covered"
        );
    }

    #[test]
    fn test_payload_is_deterministic() {
        let eye = DVec3::new(0.4, 1.3, 1.1) * SMALL_RADIUS;
        let mut first = generated(small_config(), 9);
        let mut second = generated(small_config(), 9);
        let a = look_from(&mut first, eye);
        let b = look_from(&mut second, eye);

        assert_eq!(a.node_bytes(), b.node_bytes());
        assert_eq!(a.voxel_bytes(), b.voxel_bytes());
        assert_eq!(a.visible_node_indices, b.visible_node_indices);
        assert_eq!(
            bytemuck::cast_slice::<_, u8>(&a.instances),
            bytemuck::cast_slice::<_, u8>(&b.instances)
        );
        assert_eq!(a.visible_patches, b.visible_patches);
        assert_eq!(a.patch_meshes, b.patch_meshes);
        let (va, vb) = (a.patch_vertex_buffers(), b.patch_vertex_buffers());
        assert_eq!(va.len(), vb.len());
        for (x, y) in va.iter().zip(&vb) {
            assert_eq!(bytemuck::cast_slice::<_, u8>(x), bytemuck::cast_slice::<_, u8>(y));
        }
    }

    #[test]
    fn test_near_surface_extracts_voxel_surface() {
        let mut planet = generated(small_config(), 42);
        let payload = look_from(&mut planet, DVec3::new(0.0, 0.0, SMALL_RADIUS + 100.0));
        assert_eq!(payload.mode, RenderingMode::OctreeTransvoxel);
        assert!(payload.patch_meshes.is_empty());
        let surface = payload.surface_mesh.as_ref().unwrap();
        assert!(!surface.is_empty(), "no voxel surface below the viewer");
        assert_eq!(payload.stats.surface_triangles, surface.triangle_count());
        assert_eq!(payload.transition.blend_factor, 1.0);
    }

    #[test]
    fn test_transition_zone_draws_both_surfaces() {
        let mut planet = generated(small_config(), 42);
        let payload = look_from(&mut planet, DVec3::new(0.0, 0.0, SMALL_RADIUS + 750.0));
        assert_eq!(payload.mode, RenderingMode::TransitionZone { blend: 0.5 });
        assert!(!payload.patch_meshes.is_empty());
        assert!(payload.surface_mesh.as_ref().is_some_and(|m| !m.is_empty()));
        assert!(!payload.is_empty());
    }

    #[test]
    fn test_terrain_surface_source_follows_height_field() {
        let config = PlanetConfig {
            surface_source: SurfaceSource::Terrain,
            ..small_config()
        };
        let mut planet = generated(config, 42);
        let payload = look_from(&mut planet, DVec3::new(0.0, 0.0, SMALL_RADIUS + 100.0));
        let surface = payload.surface_mesh.as_ref().unwrap();
        assert!(!surface.is_empty(), "no terrain surface below the viewer");

        let terrain = planet.terrain();
        let tolerance = planet.voxel_size();
        for v in &surface.vertices {
            let off = terrain.density(v.position);
            assert!(off.abs() < tolerance, "vertex {:?} is {off} m off the terrain", v.position);
        }
    }

    #[test]
    fn test_patch_bounds_are_padded_by_the_terrain() {
        let mut planet = Planet::new(small_config()).unwrap();
        let bound = planet.terrain().max_abs_height();
        assert!(bound > 0.0);
        assert_eq!(planet.quadtree.config().max_terrain_height, bound);

        planet.generate(5).unwrap();
        assert_eq!(planet.quadtree.config().max_terrain_height, planet.terrain().max_abs_height());
        assert_eq!(planet.terrain().radius(), SMALL_RADIUS);
    }

    #[test]
    fn test_frames_are_counted_and_reseeding_applies() {
        let mut planet = generated(small_config(), 1);
        assert_eq!(planet.seed(), Some(1));
        let camera = Camera::looking_at(DVec3::new(0.0, 0.0, 3.0 * SMALL_RADIUS), DVec3::ZERO, 1.0, 1.0);
        let view = camera.view_state(720);
        for _ in 0..3 {
            planet.prepare_frame(&view, 1.0 / 60.0);
        }
        assert_eq!(planet.frame_count(), 3);

        planet.generate(2).unwrap();
        assert_eq!(planet.seed(), Some(2));
        assert_eq!(planet.config().terrain.seed, 2);
        let payload = planet.prepare_frame(&view, 1.0 / 60.0);
        assert_eq!(payload.stats.frame, 4);
    }

    #[test]
    fn test_voxel_size_matches_leaf_octants() {
        let planet = Planet::new(small_config()).unwrap();
        let expected = SMALL_RADIUS * 1.5 / 32.0;
        assert!((planet.voxel_size() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_voxel_writes_show_up_in_the_payload() {
        let mut planet = Planet::new(small_config()).unwrap();
        let eye = DVec3::new(0.0, 0.0, 3.0 * SMALL_RADIUS);
        assert!(look_from(&mut planet, eye).gpu_nodes.is_empty());
        assert!(planet.set_voxel(DVec3::new(10.0, 20.0, 900.0), MixedVoxel::pure(MaterialId::Lava)));
        let payload = look_from(&mut planet, eye);
        assert!(!payload.gpu_nodes.is_empty());
        assert!(!payload.instances.is_empty());
    }
}
