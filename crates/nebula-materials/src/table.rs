//! The process-wide material table and its GPU snapshot.

use bytemuck::{Pod, Zeroable};

use crate::material::{MATERIAL_COUNT, MaterialId, MaterialProperties};

/// Read-only table of material properties, indexed by [`MaterialId`].
///
/// There is exactly one instance, built at compile time and shared through
/// [`MaterialTable::global`]. It is safe to read from any thread.
#[derive(Debug)]
pub struct MaterialTable {
    entries: [MaterialProperties; MATERIAL_COUNT],
}

static GLOBAL_TABLE: MaterialTable = MaterialTable {
    entries: [
        MaterialProperties::new([0.0, 0.0, 0.0], 1.0, 0.0, 0.0, 0.0, 0.0, "Vacuum"),
        MaterialProperties::new([0.7, 0.85, 1.0], 0.0, 0.0, 0.0, 1.2, 0.0, "Air"),
        MaterialProperties::new([0.5, 0.45, 0.4], 0.9, 0.0, 0.0, 2700.0, 0.9, "Rock"),
        MaterialProperties::new([0.05, 0.3, 0.55], 0.0, 0.0, 0.0, 1000.0, 0.0, "Water"),
        MaterialProperties::new([0.76, 0.7, 0.5], 0.8, 0.0, 0.0, 1600.0, 0.3, "Sand"),
        MaterialProperties::new([0.3, 0.2, 0.1], 0.95, 0.0, 0.0, 1300.0, 0.4, "Soil"),
        MaterialProperties::new([0.2, 0.5, 0.2], 0.85, 0.0, 0.0, 1100.0, 0.2, "Grass"),
        MaterialProperties::new([0.95, 0.95, 1.0], 0.3, 0.0, 0.0, 500.0, 0.5, "Snow"),
        MaterialProperties::new([0.8, 0.9, 1.0], 0.1, 0.0, 0.0, 920.0, 0.8, "Ice"),
        MaterialProperties::new([0.6, 0.6, 0.6], 0.7, 0.0, 0.0, 2750.0, 0.95, "Granite"),
        MaterialProperties::new([0.2, 0.2, 0.2], 0.85, 0.0, 0.0, 2900.0, 0.93, "Basalt"),
        MaterialProperties::new([0.6, 0.4, 0.3], 0.9, 0.0, 0.0, 1800.0, 0.6, "Clay"),
        MaterialProperties::new([1.0, 0.3, 0.0], 0.7, 0.0, 3.0, 2800.0, 0.0, "Lava"),
        MaterialProperties::new([0.5, 0.5, 0.5], 0.3, 1.0, 0.0, 7850.0, 0.98, "Metal"),
        MaterialProperties::new([0.7, 0.8, 1.0], 0.1, 0.0, 0.1, 2650.0, 0.85, "Crystal"),
        MaterialProperties::new([1.0, 0.0, 1.0], 0.5, 0.0, 0.0, 1000.0, 0.5, "Reserved/Debug"),
    ],
};

impl MaterialTable {
    /// The shared table.
    #[inline]
    #[must_use]
    pub fn global() -> &'static MaterialTable {
        &GLOBAL_TABLE
    }

    /// Properties of `id`.
    #[inline]
    #[must_use]
    pub fn lookup(&self, id: MaterialId) -> &MaterialProperties {
        &self.entries[id as usize]
    }

    /// Iterate `(id, properties)` in numeric order.
    pub fn iter(&self) -> impl Iterator<Item = (MaterialId, &MaterialProperties)> {
        MaterialId::ALL.into_iter().zip(self.entries.iter())
    }

    /// Pack the whole table for upload as a 512-byte storage buffer.
    #[must_use]
    pub fn snapshot_for_gpu(&self) -> [GpuMaterial; MATERIAL_COUNT] {
        let mut out = [GpuMaterial::zeroed(); MATERIAL_COUNT];
        for (slot, props) in out.iter_mut().zip(self.entries.iter()) {
            *slot = GpuMaterial::from(props);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// GpuMaterial
// ---------------------------------------------------------------------------

/// GPU layout of one material, 32 bytes, std430-compatible.
///
/// `colour_roughness` = (r, g, b, roughness);
/// `properties` = (metallic, emissive, density / 1000, hardness).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuMaterial {
    pub colour_roughness: [f32; 4],
    pub properties: [f32; 4],
}

static_assertions::assert_eq_size!(GpuMaterial, [u8; 32]);

impl From<&MaterialProperties> for GpuMaterial {
    fn from(p: &MaterialProperties) -> Self {
        Self {
            colour_roughness: [p.colour.x, p.colour.y, p.colour.z, p.roughness],
            properties: [p.metallic, p.emissive, p.density / 1000.0, p.hardness],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_table_has_sixteen_entries_in_id_order() {
        let table = MaterialTable::global();
        assert_eq!(table.iter().count(), 16);
        assert_eq!(table.lookup(MaterialId::Rock).name, "Rock");
        assert_eq!(table.lookup(MaterialId::Water).name, "Water");
        assert_eq!(table.lookup(MaterialId::Reserved).name, "Reserved/Debug");
    }

    #[test]
    fn test_special_material_properties() {
        let table = MaterialTable::global();
        assert!(table.lookup(MaterialId::Lava).emissive > 0.0, "Lava must glow");
        assert_eq!(table.lookup(MaterialId::Metal).metallic, 1.0);
        assert_eq!(table.lookup(MaterialId::Water).hardness, 0.0);
        assert_eq!(table.lookup(MaterialId::Lava).hardness, 0.0);
        let reserved = table.lookup(MaterialId::Reserved).colour;
        assert_eq!(reserved.to_array(), [1.0, 0.0, 1.0], "Reserved must be magenta");
    }

    #[test]
    fn test_colours_in_unit_range() {
        for (id, props) in MaterialTable::global().iter() {
            for c in props.colour.to_array() {
                assert!((0.0..=1.0).contains(&c), "{id:?} has colour component {c}");
            }
            assert!(
                (0.0..=1.0).contains(&props.hardness),
                "{id:?} hardness {} out of range",
                props.hardness
            );
        }
    }

    #[test]
    fn test_gpu_snapshot_packing() {
        let snapshot = MaterialTable::global().snapshot_for_gpu();
        let rock = snapshot[MaterialId::Rock as usize];
        assert_eq!(rock.colour_roughness, [0.5, 0.45, 0.4, 0.9]);
        assert!((rock.properties[2] - 2.7).abs() < EPSILON, "density is stored in tonnes/m³");
        assert_eq!(rock.properties[3], 0.9);

        let metal = snapshot[MaterialId::Metal as usize];
        assert_eq!(metal.properties[0], 1.0);
    }

    #[test]
    fn test_gpu_snapshot_byte_size() {
        let snapshot = MaterialTable::global().snapshot_for_gpu();
        let bytes: &[u8] = bytemuck::cast_slice(&snapshot);
        assert_eq!(bytes.len(), 16 * 32);
    }
}
