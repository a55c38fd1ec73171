//! Double-precision math shared by the planet pipeline: view frusta,
//! bounding spheres and interpolation helpers.

mod bounds;
mod frustum;
mod interp;

pub use bounds::BoundingSphere;
pub use frustum::{Frustum, Intersection};
pub use interp::{inverse_lerp, smoothstep};
