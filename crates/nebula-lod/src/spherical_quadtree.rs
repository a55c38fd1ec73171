//! Per-frame spherical quadtree selection.
//!
//! Starting from the six cube faces, each patch whose screen-space error
//! exceeds the altitude threshold is subdivided until the error is
//! acceptable or the level cap is reached. The selection is a flat list of
//! [`VisiblePatch`]es; adjacency is recovered afterwards from cube-space edge
//! lines, so no node stores pointers to its neighbours.

use std::collections::VecDeque;

use glam::DVec3;
use nebula_cubesphere::{GlobalPatch, PatchEdge, cube_to_sphere, root_patches};
use nebula_math::Frustum;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{ViewState, lod_threshold, screen_space_error, should_cull_face};

/// Hard cap on quadtree depth.
pub const ABSOLUTE_MAX_LEVEL: u32 = 10;

/// Altitudes below this are clamped before computing the threshold.
const MIN_THRESHOLD_ALTITUDE: f64 = 100.0;

/// Errors reported when constructing a [`SphericalQuadtree`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuadtreeError {
    #[error("invalid quadtree config: {0}")]
    InvalidConfig(String),
}

/// Tuning for patch selection.
#[derive(Clone, Debug, PartialEq)]
pub struct QuadtreeConfig {
    pub planet_radius: f64,
    /// Deepest level selection may reach (at most [`ABSOLUTE_MAX_LEVEL`]).
    pub max_level: u32,
    /// Lower bound on the subdivision threshold, in pixels.
    pub min_pixel_error: f64,
    /// Fraction of the threshold over which patches morph toward their parent.
    pub morph_region: f64,
    /// Budget of visible patches per frame.
    pub max_nodes: usize,
    pub enable_face_culling: bool,
    pub enable_frustum_culling: bool,
    /// Rate at which morph factors chase their target, per second.
    pub morph_speed: f64,
    /// Largest terrain displacement, used to pad patch bounding spheres.
    pub max_terrain_height: f64,
}

impl Default for QuadtreeConfig {
    fn default() -> Self {
        Self {
            planet_radius: 6_371_000.0,
            max_level: ABSOLUTE_MAX_LEVEL,
            min_pixel_error: 1.0,
            morph_region: 0.3,
            max_nodes: 10_000,
            enable_face_culling: true,
            enable_frustum_culling: true,
            morph_speed: 2.0,
            max_terrain_height: 10_000.0,
        }
    }
}

impl QuadtreeConfig {
    fn validate(&self) -> Result<(), QuadtreeError> {
        if !(self.planet_radius.is_finite() && self.planet_radius > 0.0) {
            return Err(QuadtreeError::InvalidConfig(format!(
                "planet radius must be positive, got {}",
                self.planet_radius
            )));
        }
        if self.max_level > ABSOLUTE_MAX_LEVEL {
            return Err(QuadtreeError::InvalidConfig(format!(
                "max level {} exceeds {ABSOLUTE_MAX_LEVEL}",
                self.max_level
            )));
        }
        if self.min_pixel_error <= 0.0 {
            return Err(QuadtreeError::InvalidConfig(
                "pixel error must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.morph_region) {
            return Err(QuadtreeError::InvalidConfig(format!(
                "morph region {} outside [0, 1]",
                self.morph_region
            )));
        }
        if self.max_nodes < 6 {
            return Err(QuadtreeError::InvalidConfig(
                "node budget must admit the six root faces".to_string(),
            ));
        }
        Ok(())
    }
}

/// A patch selected for rendering this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisiblePatch {
    pub patch: GlobalPatch,
    /// 0 = full detail, 1 = fully morphed to the parent level.
    pub morph_factor: f32,
    pub screen_space_error: f32,
    /// Level of the adjacent patch on each [`PatchEdge`] (top, right,
    /// bottom, left); the patch's own level when no neighbour was selected.
    pub neighbor_levels: [u32; 4],
}

impl VisiblePatch {
    /// Level difference to a coarser neighbour on `edge`, or 0.
    #[inline]
    #[must_use]
    pub fn coarser_neighbor_delta(&self, edge: PatchEdge) -> u32 {
        self.patch.level.saturating_sub(self.neighbor_levels[edge as usize])
    }
}

/// Counters from the most recent update.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct QuadtreeStats {
    pub visible_patches: usize,
    pub culled_faces: usize,
    pub frustum_culled: usize,
    pub skipped_degenerate: usize,
    pub budget_exhausted: bool,
    pub deepest_level: u32,
    pub error_threshold: f64,
}

/// Identity of a patch across frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PatchKey {
    face: u8,
    level: u32,
    min: [u64; 3],
}

impl PatchKey {
    fn of(patch: &GlobalPatch) -> Self {
        Self {
            face: patch.face.id(),
            level: patch.level,
            min: patch.min_bounds.to_array().map(canonical_bits),
        }
    }
}

/// Line an axis-aligned cube-space edge lies on: the varying axis and the
/// two fixed coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct EdgeLine {
    axis: u8,
    fixed: [u64; 2],
}

struct EdgeSpan {
    patch: usize,
    lo: f64,
    hi: f64,
}

/// The view-dependent quadtree over the six cube faces.
pub struct SphericalQuadtree {
    config: QuadtreeConfig,
    visible: Vec<VisiblePatch>,
    previous_morph: FxHashMap<PatchKey, f32>,
    stats: QuadtreeStats,
}

impl SphericalQuadtree {
    /// Create a quadtree; fails on a non-positive radius, a level cap above
    /// [`ABSOLUTE_MAX_LEVEL`] or a non-positive pixel error.
    pub fn new(config: QuadtreeConfig) -> Result<Self, QuadtreeError> {
        config.validate()?;
        Ok(Self {
            config,
            visible: Vec::new(),
            previous_morph: FxHashMap::default(),
            stats: QuadtreeStats::default(),
        })
    }

    pub fn config(&self) -> &QuadtreeConfig {
        &self.config
    }

    /// Patches selected by the last [`update`](Self::update).
    pub fn visible_patches(&self) -> &[VisiblePatch] {
        &self.visible
    }

    pub fn stats(&self) -> &QuadtreeStats {
        &self.stats
    }

    /// Re-select visible patches for `view`. `dt` (seconds) smooths morph
    /// factors of patches that stay selected; pass 0 to snap to targets.
    pub fn update(&mut self, view: &ViewState, dt: f64) -> &[VisiblePatch] {
        let radius = self.config.planet_radius;
        let altitude = view.altitude(radius).max(MIN_THRESHOLD_ALTITUDE);
        let threshold = lod_threshold(altitude, radius).max(self.config.min_pixel_error);
        let frustum = self
            .config
            .enable_frustum_culling
            .then(|| Frustum::from_view_proj(&view.view_proj));

        let mut stats = QuadtreeStats {
            error_threshold: threshold,
            ..QuadtreeStats::default()
        };

        let mut pending: VecDeque<GlobalPatch> = VecDeque::new();
        for root in root_patches() {
            if self.config.enable_face_culling
                && should_cull_face(root.face, view.position, radius)
            {
                stats.culled_faces += 1;
                continue;
            }
            pending.push_back(root);
        }

        // Breadth-first so a limited budget refines coarse levels evenly.
        // `leaves` counts pending plus selected patches and never exceeds
        // the budget, so the selection keeps covering the visible surface.
        let mut leaves = pending.len();
        let mut selected = Vec::new();
        while let Some(patch) = pending.pop_front() {
            let world_center = cube_to_sphere(patch.center) * radius;
            if let Some(frustum) = &frustum {
                let bound = patch.size() * radius + self.config.max_terrain_height;
                if !frustum.intersects_sphere(world_center, bound) {
                    stats.frustum_culled += 1;
                    leaves -= 1;
                    continue;
                }
            }

            let error = screen_space_error(world_center, patch.size(), view, radius);
            if error > threshold && patch.level < self.config.max_level {
                if leaves + 3 > self.config.max_nodes {
                    stats.budget_exhausted = true;
                } else if let Some(children) = patch.subdivide() {
                    leaves += 3;
                    pending.extend(children);
                    continue;
                } else {
                    warn!(?patch, "skipping degenerate patch");
                    stats.skipped_degenerate += 1;
                    leaves -= 1;
                    continue;
                }
            }
            selected.push(VisiblePatch {
                patch,
                morph_factor: 0.0,
                screen_space_error: error as f32,
                neighbor_levels: [patch.level; 4],
            });
        }

        if stats.budget_exhausted {
            warn!(
                budget = self.config.max_nodes,
                "quadtree node budget exhausted; coarser patches kept"
            );
        }

        assign_neighbor_levels(&mut selected);
        self.apply_morph(&mut selected, threshold, dt);

        stats.visible_patches = selected.len();
        stats.deepest_level = selected.iter().map(|p| p.patch.level).max().unwrap_or(0);
        debug!(
            patches = stats.visible_patches,
            culled_faces = stats.culled_faces,
            deepest = stats.deepest_level,
            threshold,
            "quadtree updated"
        );

        self.stats = stats;
        self.visible = selected;
        &self.visible
    }

    fn apply_morph(&mut self, selected: &mut [VisiblePatch], threshold: f64, dt: f64) {
        let region = self.config.morph_region;
        let blend = (self.config.morph_speed * dt).clamp(0.0, 1.0) as f32;
        let mut next = FxHashMap::default();
        for patch in selected.iter_mut() {
            let target = morph_target(f64::from(patch.screen_space_error) / threshold, region);
            let key = PatchKey::of(&patch.patch);
            let morph = match self.previous_morph.get(&key) {
                Some(&prev) if dt > 0.0 => prev + (target - prev) * blend,
                _ => target,
            };
            patch.morph_factor = morph.clamp(0.0, 1.0);
            next.insert(key, patch.morph_factor);
        }
        self.previous_morph = next;
    }
}

/// Morph factor for an error normalized by the threshold.
fn morph_target(normalized_error: f64, region: f64) -> f32 {
    if region <= 0.0 {
        return if normalized_error > 1.0 { 1.0 } else { 0.0 };
    }
    nebula_math::smoothstep(1.0 - region, 1.0, normalized_error) as f32
}

/// Fill `neighbor_levels` with the maximum level of any patch sharing a
/// positive-length stretch of each edge, on the same face or across a cube
/// edge.
fn assign_neighbor_levels(patches: &mut [VisiblePatch]) {
    let mut lines: FxHashMap<EdgeLine, Vec<EdgeSpan>> = FxHashMap::default();
    let mut edges: Vec<[Option<(EdgeLine, f64, f64)>; 4]> = Vec::with_capacity(patches.len());

    for (index, visible) in patches.iter().enumerate() {
        let mut per_edge = [None; 4];
        for edge in PatchEdge::ALL {
            let Ok((a, b)) = visible.patch.edge_endpoints(edge) else {
                continue;
            };
            let Some((line, lo, hi)) = edge_line(a, b) else {
                continue;
            };
            lines.entry(line).or_default().push(EdgeSpan { patch: index, lo, hi });
            per_edge[edge as usize] = Some((line, lo, hi));
        }
        edges.push(per_edge);
    }

    for (index, per_edge) in edges.iter().enumerate() {
        for (slot, entry) in per_edge.iter().enumerate() {
            let Some((line, lo, hi)) = entry else {
                continue;
            };
            let Some(spans) = lines.get(line) else {
                continue;
            };
            let neighbour = spans
                .iter()
                .filter(|s| s.patch != index && s.hi.min(*hi) - s.lo.max(*lo) > 1e-12)
                .map(|s| patches[s.patch].patch.level)
                .max();
            if let Some(level) = neighbour {
                patches[index].neighbor_levels[slot] = level;
            }
        }
    }
}

fn edge_line(a: DVec3, b: DVec3) -> Option<(EdgeLine, f64, f64)> {
    let d = (b - a).abs();
    let axis = if d.x > 0.0 {
        0
    } else if d.y > 0.0 {
        1
    } else if d.z > 0.0 {
        2
    } else {
        return None;
    };
    let others = match axis {
        0 => [a.y, a.z],
        1 => [a.x, a.z],
        _ => [a.x, a.y],
    };
    Some((
        EdgeLine {
            axis: axis as u8,
            fixed: others.map(canonical_bits),
        },
        a[axis].min(b[axis]),
        a[axis].max(b[axis]),
    ))
}

/// Bit pattern with `-0.0` folded onto `0.0`.
fn canonical_bits(value: f64) -> u64 {
    if value == 0.0 { 0 } else { value.to_bits() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DMat4;
    use nebula_cubesphere::CubeFace;

    const RADIUS: f64 = 6_371_000.0;

    fn view_from(position: DVec3) -> ViewState {
        ViewState::looking_at(position, DVec3::ZERO, 1080)
    }

    fn tree(config: QuadtreeConfig) -> SphericalQuadtree {
        SphericalQuadtree::new(config).unwrap()
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        let bad_radius = QuadtreeConfig {
            planet_radius: 0.0,
            ..QuadtreeConfig::default()
        };
        assert!(matches!(
            SphericalQuadtree::new(bad_radius),
            Err(QuadtreeError::InvalidConfig(_))
        ));
        let too_deep = QuadtreeConfig {
            max_level: ABSOLUTE_MAX_LEVEL + 1,
            ..QuadtreeConfig::default()
        };
        assert!(SphericalQuadtree::new(too_deep).is_err());
    }

    #[test]
    fn test_distant_view_selects_few_coarse_patches() {
        let mut qt = tree(QuadtreeConfig::default());
        let patches = qt.update(&view_from(DVec3::new(0.0, 0.0, 200.0 * RADIUS)), 0.0);
        assert!(!patches.is_empty());
        assert!(patches.len() <= 6, "far view selected {} patches", patches.len());
        assert!(patches.iter().all(|p| p.patch.level == 0));
    }

    #[test]
    fn test_closer_view_refines_near_patches() {
        let mut qt = tree(QuadtreeConfig {
            max_level: 8,
            ..QuadtreeConfig::default()
        });
        qt.update(&view_from(DVec3::new(0.0, 0.0, 3.0 * RADIUS)), 0.0);
        let far_deepest = qt.stats().deepest_level;
        let near = qt.update(&view_from(DVec3::new(0.0, 0.0, 1.05 * RADIUS)), 0.0).to_vec();
        let near_deepest = qt.stats().deepest_level;
        assert!(
            near_deepest > far_deepest,
            "descending should refine: level {far_deepest} -> {near_deepest}"
        );

        // The patch under the camera is the finest one.
        let below = DVec3::new(1e-4, 1e-4, 1.0);
        let under = near
            .iter()
            .find(|p| p.patch.face == CubeFace::PosZ && p.patch.contains(below, 0.0))
            .unwrap();
        assert_eq!(under.patch.level, near_deepest);
    }

    #[test]
    fn test_far_side_faces_are_skipped_close_to_the_surface() {
        let mut qt = tree(QuadtreeConfig::default());
        qt.update(&view_from(DVec3::new(0.0, 0.0, 1.01 * RADIUS)), 0.0);
        assert!(qt.stats().culled_faces >= 1);
        assert!(
            qt.visible_patches().iter().all(|p| p.patch.face != CubeFace::NegZ),
            "back face survived culling"
        );
    }

    #[test]
    fn test_culled_faces_contribute_no_patches() {
        let mut qt = tree(QuadtreeConfig {
            enable_frustum_culling: false,
            ..QuadtreeConfig::default()
        });
        let position = DVec3::new(1.0, -0.15, 0.0).normalize() * 100.0 * RADIUS;
        assert!(should_cull_face(CubeFace::PosY, position, RADIUS));

        let patches = qt.update(&view_from(position), 0.0).to_vec();
        let culled: Vec<CubeFace> = CubeFace::ALL
            .into_iter()
            .filter(|&face| should_cull_face(face, position, RADIUS))
            .collect();
        assert_eq!(qt.stats().culled_faces, culled.len());
        for face in culled {
            let count = patches.iter().filter(|p| p.patch.face == face).count();
            assert_eq!(count, 0, "{face:?} is back-facing but selected {count} patches");
        }
    }

    #[test]
    fn test_level_cap_is_respected() {
        let mut qt = tree(QuadtreeConfig {
            max_level: 3,
            ..QuadtreeConfig::default()
        });
        let patches = qt.update(&view_from(DVec3::new(0.0, 0.0, RADIUS + 1000.0)), 0.0);
        assert!(patches.iter().all(|p| p.patch.level <= 3));
        assert!(patches.iter().any(|p| p.patch.level == 3));
    }

    #[test]
    fn test_node_budget_is_respected() {
        let mut qt = tree(QuadtreeConfig {
            max_nodes: 40,
            ..QuadtreeConfig::default()
        });
        let patches = qt.update(&view_from(DVec3::new(0.0, 0.0, RADIUS + 1000.0)), 0.0);
        assert!(patches.len() <= 40, "budget exceeded: {}", patches.len());
        assert!(qt.stats().budget_exhausted);
    }

    #[test]
    fn test_selection_covers_each_face_without_gaps() {
        let mut qt = tree(QuadtreeConfig {
            enable_face_culling: false,
            enable_frustum_culling: false,
            ..QuadtreeConfig::default()
        });
        let patches = qt.update(&view_from(DVec3::new(0.0, 0.0, 1.2 * RADIUS)), 0.0);
        for face in CubeFace::ALL {
            let (ua, va) = face.uv_axes();
            let area: f64 = patches
                .iter()
                .filter(|p| p.patch.face == face)
                .map(|p| p.patch.range()[ua] * p.patch.range()[va])
                .sum();
            assert!((area - 4.0).abs() < 1e-9, "{face:?} covered area {area}");
        }
    }

    #[test]
    fn test_neighbor_levels_match_adjacent_patches() {
        let mut qt = tree(QuadtreeConfig {
            enable_face_culling: false,
            enable_frustum_culling: false,
            ..QuadtreeConfig::default()
        });
        let patches = qt.update(&view_from(DVec3::new(0.0, 0.0, 1.1 * RADIUS)), 0.0).to_vec();
        let levels: Vec<u32> = patches.iter().map(|p| p.patch.level).collect();
        assert!(levels.iter().min() != levels.iter().max(), "need mixed levels for this test");

        let mut saw_coarser = false;
        for p in &patches {
            for edge in PatchEdge::ALL {
                let n = p.neighbor_levels[edge as usize];
                assert!(n <= ABSOLUTE_MAX_LEVEL);
                if n < p.patch.level {
                    saw_coarser = true;
                    assert_eq!(p.coarser_neighbor_delta(edge), p.patch.level - n);
                }
            }
        }
        assert!(saw_coarser, "expected at least one patch bordering a coarser one");
    }

    #[test]
    fn test_neighbor_levels_cross_face_edges() {
        // Hand-built selection: the +X root next to four level-1 patches of +Y.
        let roots = root_patches();
        let mut patches: Vec<VisiblePatch> = std::iter::once(roots[0])
            .chain(roots[2].subdivide().unwrap())
            .map(|patch| VisiblePatch {
                patch,
                morph_factor: 0.0,
                screen_space_error: 0.0,
                neighbor_levels: [patch.level; 4],
            })
            .collect();
        assign_neighbor_levels(&mut patches);
        // +X top edge (v = 1) is y = 1, shared with the +Y children at x = 1.
        assert_eq!(patches[0].neighbor_levels[PatchEdge::Top as usize], 1);
        // +Y children touching x = 1 see the level-0 +X root on their right edge.
        let touching: Vec<&VisiblePatch> = patches[1..]
            .iter()
            .filter(|p| p.patch.max_bounds.x == 1.0)
            .collect();
        assert_eq!(touching.len(), 2);
        for p in touching {
            assert_eq!(p.neighbor_levels[PatchEdge::Right as usize], 0);
            assert_eq!(p.coarser_neighbor_delta(PatchEdge::Right), 1);
        }
    }

    #[test]
    fn test_morph_factor_in_unit_range_and_smoothed() {
        let mut qt = tree(QuadtreeConfig::default());
        let view = view_from(DVec3::new(0.0, 0.0, 1.3 * RADIUS));
        let first = qt.update(&view, 0.0).to_vec();
        assert!(first.iter().all(|p| (0.0..=1.0).contains(&p.morph_factor)));
        let again = qt.update(&view, 0.016).to_vec();
        for (a, b) in first.iter().zip(again.iter()) {
            assert!((a.morph_factor - b.morph_factor).abs() < 1e-6, "static view changed morph");
        }
    }

    #[test]
    fn test_morph_target_curve() {
        assert_eq!(morph_target(0.5, 0.3), 0.0);
        assert_eq!(morph_target(1.2, 0.3), 1.0);
        let mid = morph_target(0.85, 0.3);
        assert!((mid - 0.5).abs() < 1e-6, "midpoint morph was {mid}");
    }

    #[test]
    fn test_identity_projection_still_selects() {
        let mut qt = tree(QuadtreeConfig {
            enable_frustum_culling: false,
            ..QuadtreeConfig::default()
        });
        let view = ViewState {
            view_proj: DMat4::IDENTITY,
            ..view_from(DVec3::new(0.0, 0.0, 5.0 * RADIUS))
        };
        assert!(!qt.update(&view, 0.0).is_empty());
    }
}
