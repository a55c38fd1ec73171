//! Per-frame extraction of GPU-ready octree nodes.
//!
//! The tree is walked depth-first. Nodes outside the view frustum are
//! dropped; internal nodes whose screen-space error is below the altitude
//! threshold are emitted whole with averaged octant voxels, everything else
//! descends to its leaves.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use nebula_lod::{ViewState, lod_threshold, screen_space_error};
use nebula_materials::{MATERIAL_COUNT, MaterialId};
use nebula_math::{BoundingSphere, Frustum};
use static_assertions::assert_eq_size;

use crate::error::InstanceError;
use crate::octree::{OctreeNode, octant_offset};
use crate::{MixedVoxel, OctreePlanet};

/// `children_index` of nodes whose children are not uploaded.
pub const INVALID_INDEX: u32 = u32::MAX;

/// `flags` bit marking a leaf node.
pub const FLAG_LEAF: u32 = 1;

const MATERIAL_SHIFT: u32 = 8;

/// Node record consumed by the ray-marching shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuNode {
    pub center: [f32; 3],
    pub half_size: f32,
    pub children_index: u32,
    pub voxel_index: u32,
    pub level: u32,
    /// Bit 0: leaf. Bits 8..16: dominant material id.
    pub flags: u32,
}

assert_eq_size!(GpuNode, [u8; 32]);

impl GpuNode {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.flags & FLAG_LEAF != 0
    }

    #[inline]
    pub fn dominant_material(&self) -> MaterialId {
        MaterialId::from_nibble(((self.flags >> MATERIAL_SHIFT) & 0xFF) as u8)
    }
}

/// One cube for the instanced renderer.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub center: [f32; 3],
    pub half_size: f32,
    /// RGB colour; `.w` holds the material class as a whole number.
    pub colour_and_material: [f32; 4],
}

assert_eq_size!(InstanceData, [u8; 32]);

/// Counters for one extraction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderStats {
    pub visited: usize,
    pub frustum_culled: usize,
    pub leaf_nodes: usize,
    pub coarse_nodes: usize,
    pub empty_skipped: usize,
    pub error_threshold: f64,
}

/// Octree part of a frame's render payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OctreeRenderData {
    pub nodes: Vec<GpuNode>,
    /// Eight voxels per node, starting at each node's `voxel_index`.
    pub voxels: Vec<MixedVoxel>,
    /// Emitted nodes in depth-first order.
    pub visible_node_indices: Vec<u32>,
    pub stats: RenderStats,
}

impl OctreePlanet {
    /// Select and pack the nodes visible from `view`.
    #[must_use]
    pub fn prepare_render_data(&self, view: &ViewState) -> OctreeRenderData {
        let frustum = Frustum::from_view_proj(&view.view_proj);
        let threshold = lod_threshold(view.altitude(self.radius()), self.radius());
        let mut out = OctreeRenderData {
            stats: RenderStats {
                error_threshold: threshold,
                ..RenderStats::default()
            },
            ..OctreeRenderData::default()
        };
        let ctx = Extraction {
            view,
            frustum: &frustum,
            threshold,
            radius: self.radius(),
        };
        ctx.visit(&self.root, &mut out);

        tracing::debug!(
            "octree render data: {} nodes ({} leaves, {} coarse), {} culled",
            out.nodes.len(),
            out.stats.leaf_nodes,
            out.stats.coarse_nodes,
            out.stats.frustum_culled
        );
        out
    }
}

struct Extraction<'a> {
    view: &'a ViewState,
    frustum: &'a Frustum,
    threshold: f64,
    radius: f64,
}

impl Extraction<'_> {
    fn visit(&self, node: &OctreeNode, out: &mut OctreeRenderData) {
        out.stats.visited += 1;
        let bounds = BoundingSphere::from_cube(node.center(), node.half_size());
        if !self.frustum.intersects_sphere(bounds.center, bounds.radius) {
            out.stats.frustum_culled += 1;
            return;
        }

        if let Some(children) = node.children() {
            let size = 2.0 * node.half_size() / self.radius;
            let error = screen_space_error(node.center(), size, self.view, self.radius);
            if error > self.threshold {
                for child in children.iter() {
                    self.visit(child, out);
                }
                return;
            }
        }

        let voxels = node.octant_voxels();
        if !voxels.iter().any(MixedVoxel::is_renderable) {
            out.stats.empty_skipped += 1;
            return;
        }

        let leaf = node.is_leaf();
        if leaf {
            out.stats.leaf_nodes += 1;
        } else {
            out.stats.coarse_nodes += 1;
        }
        let dominant = dominant_solid(&voxels);
        let index = out.nodes.len() as u32;
        out.nodes.push(GpuNode {
            center: node.center().as_vec3().to_array(),
            half_size: node.half_size() as f32,
            children_index: INVALID_INDEX,
            voxel_index: out.voxels.len() as u32,
            level: node.level(),
            flags: (u32::from(dominant.as_u8()) << MATERIAL_SHIFT) | if leaf { FLAG_LEAF } else { 0 },
        });
        out.voxels.extend_from_slice(&voxels);
        out.visible_node_indices.push(index);
    }
}

/// Amount-weighted dominant solid across a block; ties go to the lower id.
fn dominant_solid(voxels: &[MixedVoxel]) -> MaterialId {
    let mut totals = [0u32; MATERIAL_COUNT];
    for voxel in voxels {
        for (m, a) in voxel.slots() {
            if m.is_solid() {
                totals[m as usize] += u32::from(a);
            }
        }
    }
    let mut best: Option<(MaterialId, u32)> = None;
    for m in MaterialId::ALL {
        let t = totals[m as usize];
        if t > 0 && best.is_none_or(|(_, b)| t > b) {
            best = Some((m, t));
        }
    }
    match best {
        Some((m, _)) => m,
        None => voxels.first().map_or(MaterialId::Vacuum, MixedVoxel::dominant),
    }
}

/// Material class written into `InstanceData.colour_and_material.w`.
#[must_use]
pub fn material_class(material: MaterialId) -> u32 {
    match material {
        MaterialId::Rock | MaterialId::Granite | MaterialId::Basalt => 1,
        MaterialId::Water | MaterialId::Ice => 2,
        MaterialId::Lava => 3,
        _ => 0,
    }
}

/// One instance per renderable voxel of every emitted node.
#[must_use]
pub fn build_instances(data: &OctreeRenderData) -> Vec<InstanceData> {
    let mut instances = Vec::new();
    for node in &data.nodes {
        let center = Vec3::from_array(node.center).as_dvec3();
        let half = f64::from(node.half_size) * 0.5;
        let base = node.voxel_index as usize;
        let Some(block) = data.voxels.get(base..base + 8) else {
            tracing::warn!("node voxel index {} out of range", base);
            continue;
        };
        for (i, voxel) in block.iter().enumerate() {
            if !voxel.is_renderable() {
                continue;
            }
            let material = voxel.dominant_solid().map_or(voxel.dominant(), |(m, _)| m);
            let colour = voxel.colour();
            instances.push(InstanceData {
                center: (center + octant_offset(i) * half).as_vec3().to_array(),
                half_size: half as f32,
                colour_and_material: [colour.x, colour.y, colour.z, material_class(material) as f32],
            });
        }
    }
    instances
}

/// Check instances before upload: finite geometry, positive size, colour in
/// `[0, 1]` and a known material class.
pub fn validate_instances(instances: &[InstanceData]) -> Result<(), InstanceError> {
    for (index, instance) in instances.iter().enumerate() {
        let invalid = |reason| Err(InstanceError::Invalid { index, reason });
        if !instance.center.iter().all(|c| c.is_finite()) {
            return invalid("non-finite center");
        }
        if !(instance.half_size.is_finite() && instance.half_size > 0.0) {
            return invalid("non-positive half size");
        }
        let [r, g, b, class] = instance.colour_and_material;
        if ![r, g, b].iter().all(|c| (0.0..=1.0).contains(c)) {
            return invalid("colour outside [0, 1]");
        }
        if !(class.fract() == 0.0 && (0.0..=3.0).contains(&class)) {
            return invalid("unknown material class");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    const RADIUS: f64 = 1000.0;

    fn planet() -> OctreePlanet {
        let mut p = OctreePlanet::new(RADIUS, 5).unwrap();
        p.generate(42);
        p
    }

    fn view_from(position: DVec3) -> ViewState {
        ViewState::looking_at(position, DVec3::ZERO, 1080)
    }

    #[test]
    fn test_gpu_layouts_are_32_bytes() {
        assert_eq!(std::mem::size_of::<GpuNode>(), 32);
        assert_eq!(std::mem::size_of::<InstanceData>(), 32);
    }

    #[test]
    fn test_emitted_nodes_are_consistent() {
        let data = planet().prepare_render_data(&view_from(DVec3::new(0.0, 0.0, 3.0 * RADIUS)));
        assert!(!data.nodes.is_empty());
        assert_eq!(data.voxels.len(), data.nodes.len() * 8);
        assert_eq!(data.visible_node_indices.len(), data.nodes.len());
        for (i, node) in data.nodes.iter().enumerate() {
            assert_eq!(node.voxel_index as usize, i * 8);
            assert_eq!(node.children_index, INVALID_INDEX);
            assert!(node.half_size > 0.0);
            let block = &data.voxels[i * 8..i * 8 + 8];
            assert!(block.iter().any(MixedVoxel::is_renderable), "node {i} has nothing to draw");
            assert!(node.dominant_material().is_solid());
        }
    }

    #[test]
    fn test_distant_view_emits_coarse_nodes() {
        let p = planet();
        let far = p.prepare_render_data(&view_from(DVec3::new(0.0, 0.0, 30.0 * RADIUS)));
        assert!(!far.nodes.is_empty());
        assert!(far.nodes.iter().all(|n| !n.is_leaf()), "far view should not reach leaves");
        let dominant = far.nodes[0].dominant_material();
        assert!(dominant.is_solid(), "coarse root lost its surface: {dominant:?}");

        let near = p.prepare_render_data(&view_from(DVec3::new(0.0, 0.0, 1.5 * RADIUS)));
        let far_level = far.nodes.iter().map(|n| n.level).max().unwrap();
        let near_level = near.nodes.iter().map(|n| n.level).max().unwrap();
        assert!(near_level > far_level, "near view is not finer: {near_level} vs {far_level}");
    }

    #[test]
    fn test_view_facing_away_emits_nothing() {
        let eye = DVec3::new(0.0, 0.0, 3.0 * RADIUS);
        let view = ViewState::looking_at(eye, eye * 2.0, 1080);
        let data = planet().prepare_render_data(&view);
        assert!(data.nodes.is_empty(), "{} nodes behind the camera", data.nodes.len());
        assert!(data.stats.frustum_culled > 0);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let view = view_from(DVec3::new(RADIUS, 2.0 * RADIUS, 1.5 * RADIUS));
        let a = planet().prepare_render_data(&view);
        let b = planet().prepare_render_data(&view);
        assert_eq!(bytemuck::cast_slice::<GpuNode, u8>(&a.nodes), bytemuck::cast_slice::<GpuNode, u8>(&b.nodes));
        assert_eq!(
            bytemuck::cast_slice::<MixedVoxel, u8>(&a.voxels),
            bytemuck::cast_slice::<MixedVoxel, u8>(&b.voxels)
        );
    }

    #[test]
    fn test_instances_validate() {
        let data = planet().prepare_render_data(&view_from(DVec3::new(0.0, 0.0, 3.0 * RADIUS)));
        let instances = build_instances(&data);
        let renderable = data.voxels.iter().filter(|v| v.is_renderable()).count();
        assert_eq!(instances.len(), renderable);
        assert_eq!(validate_instances(&instances), Ok(()));
        assert!(instances.iter().any(|i| i.colour_and_material[3] == 1.0));
    }

    #[test]
    fn test_validate_rejects_bad_instances() {
        let good = InstanceData {
            center: [0.0; 3],
            half_size: 1.0,
            colour_and_material: [0.5, 0.5, 0.5, 2.0],
        };
        assert!(validate_instances(&[good]).is_ok());
        let nan = InstanceData {
            center: [f32::NAN, 0.0, 0.0],
            ..good
        };
        assert!(matches!(
            validate_instances(&[good, nan]),
            Err(InstanceError::Invalid { index: 1, .. })
        ));
        let bright = InstanceData {
            colour_and_material: [1.5, 0.0, 0.0, 0.0],
            ..good
        };
        assert!(validate_instances(&[bright]).is_err());
        let odd_class = InstanceData {
            colour_and_material: [0.0, 0.0, 0.0, 2.5],
            ..good
        };
        assert!(validate_instances(&[odd_class]).is_err());
    }

    #[test]
    fn test_dominant_solid_ignores_air() {
        let mut block = [MixedVoxel::pure(MaterialId::Air); 8];
        block[3] = MixedVoxel::mix(MaterialId::Basalt, 10, MaterialId::Air, 245);
        assert_eq!(dominant_solid(&block), MaterialId::Basalt);
        let empty = [MixedVoxel::pure(MaterialId::Air); 8];
        assert_eq!(dominant_solid(&empty), MaterialId::Air);
    }
}
