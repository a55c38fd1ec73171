//! Sparse voxel octree holding [`MixedVoxel`] blocks.
//!
//! Every node is either internal with exactly eight children or a leaf with
//! a 2×2×2 voxel block. Child and voxel octants use the same index: bit 0 is
//! set when the position lies above the centre on X, bit 1 on Y, bit 2 on Z.

use glam::DVec3;

use crate::MixedVoxel;
use crate::error::OctreeError;

/// Deepest subdivision an [`OctreePlanet`] accepts.
pub const MAX_OCTREE_DEPTH: u32 = 16;

/// Root half-size as a multiple of the planet radius.
pub const ROOT_HALF_SIZE_FACTOR: f64 = 1.5;

/// Octant index of `pos` relative to `center`.
#[inline]
#[must_use]
pub fn octant_index(center: DVec3, pos: DVec3) -> usize {
    usize::from(pos.x > center.x) | usize::from(pos.y > center.y) << 1 | usize::from(pos.z > center.z) << 2
}

/// Unit offset (each component ±1) of octant `index`.
#[inline]
#[must_use]
pub fn octant_offset(index: usize) -> DVec3 {
    let sign = |bit: usize| if index & bit != 0 { 1.0 } else { -1.0 };
    DVec3::new(sign(1), sign(2), sign(4))
}

/// Payload of an [`OctreeNode`].
#[derive(Clone, Debug, PartialEq)]
pub enum NodeContent {
    Leaf([MixedVoxel; 8]),
    Internal(Box<[OctreeNode; 8]>),
}

/// One cube of the octree.
#[derive(Clone, Debug, PartialEq)]
pub struct OctreeNode {
    center: DVec3,
    half_size: f64,
    level: u32,
    content: NodeContent,
}

impl OctreeNode {
    /// A leaf filled with `voxels`.
    #[must_use]
    pub fn leaf(center: DVec3, half_size: f64, level: u32, voxels: [MixedVoxel; 8]) -> Self {
        Self {
            center,
            half_size,
            level,
            content: NodeContent::Leaf(voxels),
        }
    }

    pub(crate) fn internal(
        center: DVec3,
        half_size: f64,
        level: u32,
        children: [OctreeNode; 8],
    ) -> Self {
        Self {
            center,
            half_size,
            level,
            content: NodeContent::Internal(Box::new(children)),
        }
    }

    #[inline]
    pub fn center(&self) -> DVec3 {
        self.center
    }

    #[inline]
    pub fn half_size(&self) -> f64 {
        self.half_size
    }

    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.content, NodeContent::Leaf(_))
    }

    pub fn content(&self) -> &NodeContent {
        &self.content
    }

    /// The eight children of an internal node.
    pub fn children(&self) -> Option<&[OctreeNode; 8]> {
        match &self.content {
            NodeContent::Internal(children) => Some(children),
            NodeContent::Leaf(_) => None,
        }
    }

    /// The voxel block of a leaf.
    pub fn voxels(&self) -> Option<&[MixedVoxel; 8]> {
        match &self.content {
            NodeContent::Leaf(voxels) => Some(voxels),
            NodeContent::Internal(_) => None,
        }
    }

    /// Centre of octant `index` (child node or leaf voxel).
    #[inline]
    #[must_use]
    pub fn octant_center(&self, index: usize) -> DVec3 {
        self.center + octant_offset(index) * (self.half_size * 0.5)
    }

    /// Inclusive containment test.
    #[must_use]
    pub fn contains(&self, pos: DVec3) -> bool {
        (pos - self.center).abs().max_element() <= self.half_size
    }

    /// Turn a leaf into an internal node whose children are uniform leaves
    /// of the parent's voxel for their octant. Returns false if the node
    /// already has children.
    pub fn subdivide(&mut self) -> bool {
        let NodeContent::Leaf(voxels) = &self.content else {
            return false;
        };
        let voxels = *voxels;
        let half = self.half_size * 0.5;
        let children: [OctreeNode; 8] = std::array::from_fn(|i| {
            OctreeNode::leaf(self.octant_center(i), half, self.level + 1, [voxels[i]; 8])
        });
        self.content = NodeContent::Internal(Box::new(children));
        true
    }

    /// One voxel per octant: a leaf's own block, or for an internal node the
    /// average of each child's subtree.
    #[must_use]
    pub fn octant_voxels(&self) -> [MixedVoxel; 8] {
        match &self.content {
            NodeContent::Leaf(voxels) => *voxels,
            NodeContent::Internal(children) => std::array::from_fn(|i| children[i].representative()),
        }
    }

    /// A single voxel standing for the whole subtree.
    #[must_use]
    pub fn representative(&self) -> MixedVoxel {
        MixedVoxel::average(&self.octant_voxels())
    }

    /// True when any voxel in the subtree is renderable.
    #[must_use]
    pub fn has_renderable(&self) -> bool {
        match &self.content {
            NodeContent::Leaf(voxels) => voxels.iter().any(MixedVoxel::is_renderable),
            NodeContent::Internal(children) => children.iter().any(OctreeNode::has_renderable),
        }
    }

    fn visit<F: FnMut(&OctreeNode)>(&self, f: &mut F) {
        f(self);
        if let NodeContent::Internal(children) = &self.content {
            for child in children.iter() {
                child.visit(f);
            }
        }
    }

    fn simplify(&mut self) -> usize {
        let NodeContent::Internal(children) = &mut self.content else {
            return 0;
        };
        let mut collapsed: usize = children.iter_mut().map(OctreeNode::simplify).sum();

        let uniform: Option<[MixedVoxel; 8]> = children
            .iter()
            .map(|child| match &child.content {
                NodeContent::Leaf(v) if v.iter().all(|x| *x == v[0]) => Some(v[0]),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .and_then(|v| v.try_into().ok());

        if let Some(voxels) = uniform {
            self.content = NodeContent::Leaf(voxels);
            collapsed += 1;
        }
        collapsed
    }
}

/// Node counts gathered by [`OctreePlanet::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OctreeStats {
    pub total_nodes: usize,
    pub internal_nodes: usize,
    pub leaf_nodes: usize,
    pub renderable_leaves: usize,
    pub max_level: u32,
}

/// A planet stored as a sparse voxel octree centred at the origin.
#[derive(Clone, Debug)]
pub struct OctreePlanet {
    pub(crate) root: OctreeNode,
    radius: f64,
    max_depth: u32,
    seed: Option<u64>,
}

impl OctreePlanet {
    /// An empty (all-vacuum) planet. The root cube has half-size
    /// `1.5 · radius`.
    pub fn new(radius: f64, max_depth: u32) -> Result<Self, OctreeError> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(OctreeError::InvalidConfig(format!(
                "radius must be positive and finite, got {radius}"
            )));
        }
        if max_depth > MAX_OCTREE_DEPTH {
            return Err(OctreeError::InvalidConfig(format!(
                "max depth {max_depth} exceeds {MAX_OCTREE_DEPTH}"
            )));
        }
        Ok(Self {
            root: OctreeNode::leaf(
                DVec3::ZERO,
                radius * ROOT_HALF_SIZE_FACTOR,
                0,
                [MixedVoxel::EMPTY; 8],
            ),
            radius,
            max_depth,
            seed: None,
        })
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    #[inline]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Seed of the last [`generate`](Self::generate), if any.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub(crate) fn set_seed(&mut self, seed: u64) {
        self.seed = Some(seed);
    }

    pub fn root(&self) -> &OctreeNode {
        &self.root
    }

    /// The voxel covering `pos`; [`MixedVoxel::EMPTY`] outside the root.
    #[must_use]
    pub fn get_voxel(&self, pos: DVec3) -> &MixedVoxel {
        if !self.root.contains(pos) {
            return &MixedVoxel::EMPTY;
        }
        let mut node = &self.root;
        loop {
            let index = octant_index(node.center, pos);
            match &node.content {
                NodeContent::Leaf(voxels) => return &voxels[index],
                NodeContent::Internal(children) => node = &children[index],
            }
        }
    }

    /// Write `voxel` at `pos`, subdividing down to `max_depth`. Returns
    /// false (and changes nothing) outside the root.
    pub fn set_voxel(&mut self, pos: DVec3, voxel: MixedVoxel) -> bool {
        if !self.root.contains(pos) {
            tracing::warn!("set_voxel outside octree bounds: {:?}", pos);
            return false;
        }
        let max_depth = self.max_depth;
        let mut node = &mut self.root;
        loop {
            let index = octant_index(node.center, pos);
            if node.is_leaf() && node.level < max_depth {
                node.subdivide();
            }
            match &mut node.content {
                NodeContent::Leaf(voxels) => {
                    voxels[index] = voxel;
                    return true;
                }
                NodeContent::Internal(children) => node = &mut children[index],
            }
        }
    }

    /// Collapse internal nodes whose children are uniform leaves. Returns
    /// the number of nodes collapsed.
    pub fn simplify(&mut self) -> usize {
        let collapsed = self.root.simplify();
        tracing::debug!("octree simplify collapsed {} nodes", collapsed);
        collapsed
    }

    /// Visit every node in depth-first pre-order.
    pub fn traverse<F: FnMut(&OctreeNode)>(&self, mut f: F) {
        self.root.visit(&mut f);
    }

    #[must_use]
    pub fn stats(&self) -> OctreeStats {
        let mut stats = OctreeStats::default();
        self.traverse(|node| {
            stats.total_nodes += 1;
            stats.max_level = stats.max_level.max(node.level);
            match node.voxels() {
                Some(voxels) => {
                    stats.leaf_nodes += 1;
                    if voxels.iter().any(MixedVoxel::is_renderable) {
                        stats.renderable_leaves += 1;
                    }
                }
                None => stats.internal_nodes += 1,
            }
        });
        stats
    }
}
