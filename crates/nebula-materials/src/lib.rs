//! Planet material system: the fixed sixteen-entry [`MaterialId`] set, its
//! immutable property table, and the GPU-packed [`GpuMaterial`] snapshot.

mod material;
mod table;

pub use material::{MATERIAL_COUNT, MaterialError, MaterialId, MaterialProperties};
pub use table::{GpuMaterial, MaterialTable};
