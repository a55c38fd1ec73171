//! Eight-byte voxels holding up to four material fractions.
//!
//! A [`MixedVoxel`] stores four `(material, amount)` slots plus temperature
//! and pressure. Materials are packed two per byte (slot 0 in the low nibble
//! of byte 0, slot 1 in its high nibble, slots 2 and 3 likewise in byte 1).
//! An amount of 255 means "full"; a slot with amount 0 carries no
//! information whatever its material nibble says.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use nebula_materials::{MATERIAL_COUNT, MaterialId, MaterialTable};
use static_assertions::assert_eq_size;

/// Number of material slots per voxel.
pub const SLOT_COUNT: usize = 4;

/// Solid-to-total ratio at or below which [`MixedVoxel::average`] treats a
/// block as a thin surface and boosts its solids.
pub const SPARSE_SOLID_RATIO: f64 = 0.3;

/// Amount the dominant solid receives in a boosted sparse-solid average.
const SPARSE_DOMINANT_AMOUNT: u8 = 128;

/// A single voxel: four material fractions, temperature and pressure.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct MixedVoxel {
    amounts: [u8; SLOT_COUNT],
    material_ids: [u8; 2],
    temperature: u8,
    pressure: u8,
}

assert_eq_size!(MixedVoxel, [u8; 8]);

impl Default for MixedVoxel {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl MixedVoxel {
    /// Slot 0 full of Vacuum, everything else zero.
    pub const EMPTY: MixedVoxel = MixedVoxel {
        amounts: [255, 0, 0, 0],
        material_ids: [0, 0],
        temperature: 0,
        pressure: 0,
    };

    /// Same as [`MixedVoxel::EMPTY`].
    #[must_use]
    pub const fn empty() -> Self {
        Self::EMPTY
    }

    /// A voxel entirely made of `material`.
    #[must_use]
    pub fn pure(material: MaterialId) -> Self {
        let mut voxel = Self::zeroed();
        voxel.set_slot(0, material, 255);
        voxel
    }

    /// A two-material voxel.
    #[must_use]
    pub fn mix(m0: MaterialId, a0: u8, m1: MaterialId, a1: u8) -> Self {
        let mut voxel = Self::zeroed();
        voxel.set_slot(0, m0, a0);
        voxel.set_slot(1, m1, a1);
        voxel
    }

    /// Write slot `slot` (`0..4`).
    #[inline]
    pub fn set_slot(&mut self, slot: usize, material: MaterialId, amount: u8) {
        debug_assert!(slot < SLOT_COUNT, "slot {slot} out of range");
        let slot = slot & 3;
        let byte = &mut self.material_ids[slot / 2];
        let shift = (slot % 2) * 4;
        *byte = (*byte & !(0x0F << shift)) | (material.as_u8() << shift);
        self.amounts[slot] = amount;
    }

    #[inline]
    #[must_use]
    pub fn material_at(&self, slot: usize) -> MaterialId {
        let slot = slot & 3;
        MaterialId::from_nibble(self.material_ids[slot / 2] >> ((slot % 2) * 4))
    }

    #[inline]
    #[must_use]
    pub fn amount_at(&self, slot: usize) -> u8 {
        self.amounts[slot & 3]
    }

    #[inline]
    #[must_use]
    pub fn temperature(&self) -> u8 {
        self.temperature
    }

    #[inline]
    #[must_use]
    pub fn pressure(&self) -> u8 {
        self.pressure
    }

    #[inline]
    pub fn set_temperature(&mut self, temperature: u8) {
        self.temperature = temperature;
    }

    #[inline]
    pub fn set_pressure(&mut self, pressure: u8) {
        self.pressure = pressure;
    }

    /// Occupied slots as `(material, amount)` pairs.
    pub fn slots(&self) -> impl Iterator<Item = (MaterialId, u8)> + '_ {
        (0..SLOT_COUNT)
            .filter(|&i| self.amounts[i] > 0)
            .map(|i| (self.material_at(i), self.amounts[i]))
    }

    /// Material of the slot with the largest amount; ties go to the lowest
    /// slot index.
    #[must_use]
    pub fn dominant(&self) -> MaterialId {
        let mut best = 0;
        for slot in 1..SLOT_COUNT {
            if self.amounts[slot] > self.amounts[best] {
                best = slot;
            }
        }
        self.material_at(best)
    }

    /// Largest non air-like material by amount, if any.
    #[must_use]
    pub fn dominant_solid(&self) -> Option<(MaterialId, u8)> {
        self.slots()
            .filter(|(m, _)| m.is_solid())
            .fold(None, |best, (m, a)| match best {
                Some((_, best_amount)) if best_amount >= a => best,
                _ => Some((m, a)),
            })
    }

    /// True when any occupied slot holds something other than Vacuum or Air.
    #[inline]
    #[must_use]
    pub fn is_renderable(&self) -> bool {
        self.slots().any(|(m, _)| m.is_solid())
    }

    /// Fraction of the occupied amount that is solid, in `[0, 1]`.
    #[must_use]
    pub fn solid_fraction(&self) -> f32 {
        let (solid, total) = self.slots().fold((0u32, 0u32), |(s, t), (m, a)| {
            let a = u32::from(a);
            (if m.is_solid() { s + a } else { s }, t + a)
        });
        if total == 0 { 0.0 } else { solid as f32 / total as f32 }
    }

    /// Amount-weighted colour. A voxel whose occupied slots all share one
    /// material returns that material's table colour exactly.
    #[must_use]
    pub fn colour(&self) -> Vec3 {
        let table = MaterialTable::global();
        let mut slots = self.slots();
        let Some((first, _)) = slots.next() else {
            return table.lookup(self.material_at(0)).colour;
        };
        if slots.all(|(m, _)| m == first) {
            return table.lookup(first).colour;
        }

        let mut sum = Vec3::ZERO;
        let mut total = 0.0;
        for (m, a) in self.slots() {
            let weight = f32::from(a);
            sum += table.lookup(m).colour * weight;
            total += weight;
        }
        sum / total
    }

    /// Downsample a block of voxels into one.
    ///
    /// Amounts are accumulated per material. When solids make up at most
    /// [`SPARSE_SOLID_RATIO`] of the total, the dominant solid is boosted to
    /// 128 and the air-like slot capped at 127 so thin surfaces survive
    /// coarse levels. Otherwise the four most abundant materials share 255
    /// in proportion to their totals. Temperature and pressure are plain
    /// means. An empty slice yields [`MixedVoxel::EMPTY`].
    #[must_use]
    pub fn average(children: &[MixedVoxel]) -> MixedVoxel {
        if children.is_empty() {
            return Self::EMPTY;
        }

        let mut totals = [0u64; MATERIAL_COUNT];
        let (mut temperature, mut pressure) = (0u64, 0u64);
        for child in children {
            for (m, a) in child.slots() {
                totals[m as usize] += u64::from(a);
            }
            temperature += u64::from(child.temperature);
            pressure += u64::from(child.pressure);
        }

        let n = children.len() as u64;
        let mut out = Self::zeroed();
        out.temperature = ((temperature + n / 2) / n) as u8;
        out.pressure = ((pressure + n / 2) / n) as u8;

        let total: u64 = totals.iter().sum();
        if total == 0 {
            out.set_slot(0, MaterialId::Vacuum, 255);
            return out;
        }

        // Most abundant first; equal totals keep the lower id first.
        let mut ranked: Vec<(MaterialId, u64)> = MaterialId::ALL
            .iter()
            .map(|&m| (m, totals[m as usize]))
            .filter(|&(_, t)| t > 0)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let solid_total: u64 = ranked.iter().filter(|(m, _)| m.is_solid()).map(|(_, t)| t).sum();
        let sparse = solid_total > 0 && (solid_total as f64 / total as f64) <= SPARSE_SOLID_RATIO;

        let entries = if sparse {
            sparse_solid_slots(&ranked)
        } else {
            let top = &ranked[..ranked.len().min(SLOT_COUNT)];
            let weights: Vec<u64> = top.iter().map(|(_, t)| *t).collect();
            top.iter()
                .map(|(m, _)| *m)
                .zip(apportion(255, &weights))
                .collect()
        };

        let mut slot = 0;
        for (m, a) in entries {
            if a > 0 && slot < SLOT_COUNT {
                out.set_slot(slot, m, a);
                slot += 1;
            }
        }
        out
    }
}

/// Slots for a surface block: dominant solid at 128, the remaining 127
/// shared by up to two further solids and the merged air-like total.
fn sparse_solid_slots(ranked: &[(MaterialId, u64)]) -> Vec<(MaterialId, u8)> {
    let mut solids = ranked.iter().filter(|(m, _)| m.is_solid());
    let Some(&(dominant, _)) = solids.next() else {
        return Vec::new();
    };
    let others: Vec<(MaterialId, u64)> = solids.take(SLOT_COUNT - 2).copied().collect();

    let air_total: u64 = ranked.iter().filter(|(m, _)| m.is_air_like()).map(|(_, t)| t).sum();
    let air = ranked.iter().find(|(m, _)| m.is_air_like()).map(|(m, _)| *m);

    let mut weights: Vec<u64> = others.iter().map(|(_, t)| *t).collect();
    let mut materials: Vec<MaterialId> = others.iter().map(|(m, _)| *m).collect();
    if let Some(air) = air {
        weights.push(air_total);
        materials.push(air);
    }

    let rest = 255 - SPARSE_DOMINANT_AMOUNT;
    let mut slots = vec![(dominant, SPARSE_DOMINANT_AMOUNT)];
    slots.extend(materials.into_iter().zip(apportion(rest, &weights)));
    slots
}

/// Split `budget` across `weights` by largest remainder; earlier entries win
/// ties. Returns all zeros when the weights sum to zero.
fn apportion(budget: u8, weights: &[u64]) -> Vec<u8> {
    let sum: u64 = weights.iter().sum();
    if sum == 0 {
        return vec![0; weights.len()];
    }
    let budget_u = u64::from(budget);
    let mut shares: Vec<u64> = weights.iter().map(|w| w * budget_u / sum).collect();
    let mut remainders: Vec<(usize, u64)> = weights
        .iter()
        .enumerate()
        .map(|(i, w)| (i, w * budget_u % sum))
        .collect();
    remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let assigned: u64 = shares.iter().sum();
    for &(i, _) in remainders.iter().take((budget_u - assigned) as usize) {
        shares[i] += 1;
    }
    shares.into_iter().map(|s| s as u8).collect()
}
