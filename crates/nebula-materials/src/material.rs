//! Core material types: [`MaterialId`] and [`MaterialProperties`].

use glam::Vec3;
use thiserror::Error;

/// Number of material slots addressable by a 4-bit nibble.
pub const MATERIAL_COUNT: usize = 16;

// ---------------------------------------------------------------------------
// MaterialId
// ---------------------------------------------------------------------------

/// Identifier of one of the sixteen planet materials.
///
/// The numeric value is stable: it is packed into voxel nibbles and read by
/// GPU shaders from `GpuNode::flags`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MaterialId {
    /// Empty space outside the atmosphere.
    #[default]
    Vacuum = 0,
    Air = 1,
    Rock = 2,
    Water = 3,
    Sand = 4,
    Soil = 5,
    Grass = 6,
    Snow = 7,
    Ice = 8,
    Granite = 9,
    Basalt = 10,
    Clay = 11,
    Lava = 12,
    Metal = 13,
    Crystal = 14,
    /// Debug marker, rendered magenta.
    Reserved = 15,
}

impl MaterialId {
    /// All sixteen materials in numeric order.
    pub const ALL: [MaterialId; MATERIAL_COUNT] = [
        MaterialId::Vacuum,
        MaterialId::Air,
        MaterialId::Rock,
        MaterialId::Water,
        MaterialId::Sand,
        MaterialId::Soil,
        MaterialId::Grass,
        MaterialId::Snow,
        MaterialId::Ice,
        MaterialId::Granite,
        MaterialId::Basalt,
        MaterialId::Clay,
        MaterialId::Lava,
        MaterialId::Metal,
        MaterialId::Crystal,
        MaterialId::Reserved,
    ];

    /// Decode the low nibble of `value`. Every nibble maps to a material, so
    /// this never fails.
    #[inline]
    #[must_use]
    pub const fn from_nibble(value: u8) -> MaterialId {
        Self::ALL[(value & 0x0F) as usize]
    }

    /// Numeric id as stored in voxels and GPU buffers.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// `true` for Vacuum and Air, the materials that never produce a surface.
    #[inline]
    #[must_use]
    pub const fn is_air_like(self) -> bool {
        matches!(self, MaterialId::Vacuum | MaterialId::Air)
    }

    /// `true` for every material that contributes to a visible surface.
    #[inline]
    #[must_use]
    pub const fn is_solid(self) -> bool {
        !self.is_air_like()
    }

    /// Materials with zero hardness.
    #[inline]
    #[must_use]
    pub const fn is_liquid(self) -> bool {
        matches!(self, MaterialId::Water | MaterialId::Lava)
    }

    /// Materials light passes through.
    #[inline]
    #[must_use]
    pub const fn is_transparent(self) -> bool {
        matches!(
            self,
            MaterialId::Vacuum | MaterialId::Air | MaterialId::Water | MaterialId::Ice
        )
    }
}

impl TryFrom<u8> for MaterialId {
    type Error = MaterialError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (value as usize) < MATERIAL_COUNT {
            Ok(Self::from_nibble(value))
        } else {
            Err(MaterialError::UnknownId(value))
        }
    }
}

// ---------------------------------------------------------------------------
// MaterialError
// ---------------------------------------------------------------------------

/// Errors returned when decoding material ids from untrusted bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaterialError {
    /// The byte does not name one of the sixteen materials.
    #[error("unknown material id {0}")]
    UnknownId(u8),
}

// ---------------------------------------------------------------------------
// MaterialProperties
// ---------------------------------------------------------------------------

/// Immutable physical and visual properties of a material.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialProperties {
    /// Linear RGB base colour, each component in `[0, 1]`.
    pub colour: Vec3,
    /// 0 = mirror, 1 = fully rough.
    pub roughness: f32,
    /// 0 = dielectric, 1 = metal.
    pub metallic: f32,
    /// Emission strength; only Lava and Crystal glow.
    pub emissive: f32,
    /// Density in kg/m³.
    pub density: f32,
    /// 0 = liquid, 1 = fully solid.
    pub hardness: f32,
    /// Human-readable name.
    pub name: &'static str,
}

impl MaterialProperties {
    pub(crate) const fn new(
        colour: [f32; 3],
        roughness: f32,
        metallic: f32,
        emissive: f32,
        density: f32,
        hardness: f32,
        name: &'static str,
    ) -> Self {
        Self {
            colour: Vec3::from_array(colour),
            roughness,
            metallic,
            emissive,
            density,
            hardness,
            name,
        }
    }
}
