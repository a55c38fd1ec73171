//! Altitude-based choice between the patch surface and the voxel surface.
//!
//! High above the ground the planet is drawn from quadtree patches only.
//! Close to it the voxel octree is meshed by the surface extractor. In
//! between both are produced and the GPU layer cross-fades them.

use bytemuck::{Pod, Zeroable};

/// Altitudes (metres above the planet radius) bounding the transition zone.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionConfig {
    /// At or above this altitude only quadtree patches are drawn.
    pub start_altitude: f64,
    /// At or below this altitude only the extracted voxel surface is drawn.
    pub end_altitude: f64,
    /// When false the switch is hard, at `end_altitude`.
    pub enabled: bool,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            start_altitude: 1_000.0,
            end_altitude: 500.0,
            enabled: true,
        }
    }
}

/// How a frame draws the planet surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RenderingMode {
    QuadtreeOnly,
    /// `blend` runs from 0 at the start altitude to 1 at the end altitude.
    TransitionZone { blend: f32 },
    OctreeTransvoxel,
}

impl RenderingMode {
    /// Weight of the extracted voxel surface: 0 for patches only, 1 for
    /// voxels only.
    pub fn voxel_weight(&self) -> f32 {
        match self {
            Self::QuadtreeOnly => 0.0,
            Self::TransitionZone { blend } => *blend,
            Self::OctreeTransvoxel => 1.0,
        }
    }

    pub fn draws_patches(&self) -> bool {
        !matches!(self, Self::OctreeTransvoxel)
    }

    pub fn draws_voxel_surface(&self) -> bool {
        !matches!(self, Self::QuadtreeOnly)
    }
}

impl TransitionConfig {
    /// Select the rendering mode for a viewer at `altitude`.
    pub fn classify(&self, altitude: f64) -> RenderingMode {
        if !self.enabled {
            return if altitude <= self.end_altitude {
                RenderingMode::OctreeTransvoxel
            } else {
                RenderingMode::QuadtreeOnly
            };
        }
        if altitude >= self.start_altitude {
            RenderingMode::QuadtreeOnly
        } else if altitude <= self.end_altitude {
            RenderingMode::OctreeTransvoxel
        } else {
            let t = (self.start_altitude - altitude) / (self.start_altitude - self.end_altitude);
            RenderingMode::TransitionZone {
                blend: t.clamp(0.0, 1.0) as f32,
            }
        }
    }
}

/// GPU uniform carrying the cross-fade between the two surfaces.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TransitionUniform {
    /// 0.0 = patches opaque, voxels hidden; 1.0 = the reverse.
    pub blend_factor: f32,
    /// Padding to 16-byte alignment.
    pub _padding: [f32; 3],
}

impl TransitionUniform {
    pub fn new(mode: RenderingMode) -> Self {
        Self {
            blend_factor: mode.voxel_weight(),
            _padding: [0.0; 3],
        }
    }
}
