//! Parallel patch meshing: a pool of worker threads, each owning its own
//! [`CpuVertexGenerator`], fed one frame's patch selection at a time.

use std::sync::Arc;
use std::thread::JoinHandle;

use nebula_lod::VisiblePatch;
use nebula_terrain::HeightSource;

use crate::error::VertexGenError;
use crate::patch_mesh::PatchMesh;
use crate::vertex_gen::{CpuVertexGenerator, VertexGenConfig};

/// A selected patch and its index in the frame's selection.
#[derive(Clone, Copy, Debug)]
struct PatchTask {
    id: usize,
    patch: VisiblePatch,
}

/// The mesh of one patch of a frame's selection.
#[derive(Debug)]
pub struct PatchResult {
    /// Index of the patch in the slice given to
    /// [`mesh_all`](PatchMeshingPipeline::mesh_all).
    pub id: usize,
    pub mesh: Result<PatchMesh, VertexGenError>,
}

/// Meshes a frame's visible patches on a pool of worker threads.
///
/// Patches are plain values and the height source is immutable, so workers
/// never lock shared state. Each worker keeps a private sample cache, which
/// carries over between frames.
pub struct PatchMeshingPipeline {
    task_sender: Option<crossbeam_channel::Sender<PatchTask>>,
    result_receiver: crossbeam_channel::Receiver<PatchResult>,
    worker_handles: Vec<JoinHandle<()>>,
    /// Patches handed to workers and not yet collected.
    window: usize,
}

impl PatchMeshingPipeline {
    /// Spawn `worker_count` meshing threads (at least one) that keep at most
    /// `window` patches (at least one) in flight.
    pub fn new(
        worker_count: usize,
        window: usize,
        config: VertexGenConfig,
        height: Arc<dyn HeightSource>,
    ) -> Result<Self, VertexGenError> {
        config.validate()?;
        let window = window.max(1);
        let (task_tx, task_rx) = crossbeam_channel::bounded(window);
        let (result_tx, result_rx) = crossbeam_channel::unbounded();

        let worker_count = worker_count.max(1);
        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let rx: crossbeam_channel::Receiver<PatchTask> = task_rx.clone();
            let tx = result_tx.clone();
            let mut generator = CpuVertexGenerator::new(config.clone(), Arc::clone(&height))?;

            handles.push(std::thread::spawn(move || {
                while let Ok(task) = rx.recv() {
                    let mesh = generator.generate_visible(&task.patch);
                    if tx.send(PatchResult { id: task.id, mesh }).is_err() {
                        break;
                    }
                }
            }));
        }

        Ok(Self {
            task_sender: Some(task_tx),
            result_receiver: result_rx,
            worker_handles: handles,
            window,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_handles.len()
    }

    /// Mesh every patch and wait for all of them. Results come back ordered
    /// by the patch's index in `patches`. Returns nothing once the pipeline
    /// has been shut down.
    pub fn mesh_all(&self, patches: &[VisiblePatch]) -> Vec<PatchResult> {
        let Some(sender) = &self.task_sender else {
            return Vec::new();
        };
        let mut results = Vec::with_capacity(patches.len());
        let mut queue = patches.iter().copied().enumerate();
        let mut outstanding = 0;
        loop {
            while outstanding < self.window {
                let Some((id, patch)) = queue.next() else {
                    break;
                };
                if sender.send(PatchTask { id, patch }).is_err() {
                    tracing::warn!("meshing workers exited; patch {} left unmeshed", id);
                    break;
                }
                outstanding += 1;
            }
            if outstanding == 0 {
                break;
            }
            match self.result_receiver.recv() {
                Ok(result) => {
                    results.push(result);
                    outstanding -= 1;
                }
                Err(_) => break,
            }
        }
        results.sort_unstable_by_key(|r| r.id);
        results
    }

    /// Close the task channel and join every worker.
    pub fn shutdown(&mut self) {
        self.task_sender.take();
        for handle in self.worker_handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for PatchMeshingPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use nebula_cubesphere::{GlobalPatch, root_patches};
    use nebula_terrain::{PlanetHeight, TerrainHeightConfig};

    fn config() -> VertexGenConfig {
        VertexGenConfig {
            resolution: 9,
            ..Default::default()
        }
    }

    fn height() -> Arc<dyn HeightSource> {
        Arc::new(PlanetHeight::new(TerrainHeightConfig::default()))
    }

    fn visible(patch: GlobalPatch) -> VisiblePatch {
        VisiblePatch {
            patch,
            morph_factor: 0.0,
            screen_space_error: 0.0,
            neighbor_levels: [patch.level; 4],
        }
    }

    fn frame_patches() -> Vec<VisiblePatch> {
        root_patches()
            .iter()
            .flat_map(|root| root.subdivide().unwrap())
            .map(visible)
            .collect()
    }

    #[test]
    fn test_mesh_all_matches_sequential_generation() {
        let pipeline = PatchMeshingPipeline::new(4, 8, config(), height()).unwrap();
        let patches = frame_patches();
        let results = pipeline.mesh_all(&patches);
        assert_eq!(results.len(), patches.len());

        let mut sequential = CpuVertexGenerator::new(config(), height()).unwrap();
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.id, i);
            let expected = sequential.generate_visible(&patches[i]).unwrap();
            assert_eq!(result.mesh.as_ref().unwrap(), &expected, "patch {i} differs");
        }
    }

    #[test]
    fn test_degenerate_patch_reports_error() {
        let pipeline = PatchMeshingPipeline::new(2, 4, config(), height()).unwrap();
        let bad = GlobalPatch::new(DVec3::splat(-1.0), DVec3::splat(1.0), 0, root_patches()[0].face);
        let results = pipeline.mesh_all(&[visible(root_patches()[0]), visible(bad)]);
        assert_eq!(results.len(), 2);
        assert!(results[0].mesh.is_ok());
        assert!(matches!(results[1].mesh, Err(VertexGenError::Patch(_))));
    }

    #[test]
    fn test_window_of_one_still_meshes_every_patch() {
        let pipeline = PatchMeshingPipeline::new(3, 0, config(), height()).unwrap();
        assert_eq!(pipeline.worker_count(), 3);
        let patches = frame_patches();
        let results = pipeline.mesh_all(&patches);
        assert_eq!(results.len(), patches.len());
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.id, i);
            assert_eq!(result.mesh.as_ref().unwrap().face, patches[i].patch.face);
        }
        assert!(pipeline.mesh_all(&[]).is_empty());
    }

    #[test]
    fn test_consecutive_frames_reuse_workers() {
        let pipeline = PatchMeshingPipeline::new(2, 4, config(), height()).unwrap();
        let patches = frame_patches();
        let first = pipeline.mesh_all(&patches);
        let second = pipeline.mesh_all(&patches[..5]);
        assert_eq!(second.len(), 5);
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.mesh, b.mesh, "patch {} changed between frames", a.id);
        }
    }

    #[test]
    fn test_shutdown_stops_meshing() {
        let mut pipeline = PatchMeshingPipeline::new(2, 4, config(), height()).unwrap();
        pipeline.shutdown();
        assert_eq!(pipeline.worker_count(), 0);
        assert!(pipeline.mesh_all(&frame_patches()).is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = VertexGenConfig {
            resolution: 0,
            ..Default::default()
        };
        assert!(PatchMeshingPipeline::new(2, 4, bad, height()).is_err());
    }
}
