//! Signed density fields for iso-surface extraction.
//!
//! Negative density is inside the surface, positive is outside; the surface
//! is the zero level set.

use glam::{DVec3, Vec3};
use nebula_materials::{MaterialId, MaterialTable};

use crate::HeightSource;

/// Altitude above which exposed terrain is snow-covered.
const SNOW_LINE: f64 = 2000.0;

/// A scalar field sampled by surface extractors.
pub trait DensitySource: Sync {
    /// Signed density at `p`; `< 0` is inside.
    fn density(&self, p: DVec3) -> f64;

    /// Surface colour near `p`.
    fn colour(&self, _p: DVec3) -> Vec3 {
        MaterialTable::global().lookup(MaterialId::Rock).colour
    }

    /// Central-difference gradient with step `h`; points from inside to
    /// outside.
    fn gradient(&self, p: DVec3, h: f64) -> DVec3 {
        let dx = DVec3::new(h, 0.0, 0.0);
        let dy = DVec3::new(0.0, h, 0.0);
        let dz = DVec3::new(0.0, 0.0, h);
        DVec3::new(
            self.density(p + dx) - self.density(p - dx),
            self.density(p + dy) - self.density(p - dy),
            self.density(p + dz) - self.density(p - dz),
        ) / (2.0 * h)
    }
}

impl<F> DensitySource for F
where
    F: Fn(DVec3) -> f64 + Sync,
{
    fn density(&self, p: DVec3) -> f64 {
        self(p)
    }
}

/// A solid ball.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphereDensity {
    pub center: DVec3,
    pub radius: f64,
}

impl DensitySource for SphereDensity {
    fn density(&self, p: DVec3) -> f64 {
        p.distance(self.center) - self.radius
    }
}

/// Signed distance to a planet surface displaced by a [`HeightSource`].
///
/// It is also a height source itself, so patch meshes and extracted
/// surfaces can share one terrain.
pub struct TerrainDensity<H> {
    radius: f64,
    height: H,
}

impl<H: HeightSource> TerrainDensity<H> {
    pub fn new(radius: f64, height: H) -> Self {
        Self { radius, height }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn height_source(&self) -> &H {
        &self.height
    }

    /// Surface material for a point: sea floor sand, water over it, snow
    /// above the snow line, rock elsewhere.
    pub fn material(&self, p: DVec3) -> MaterialId {
        let Some(normal) = p.try_normalize() else {
            return MaterialId::Rock;
        };
        let surface = self.height.height(normal);
        let altitude = p.length() - self.radius;
        if surface < 0.0 {
            if altitude <= surface + 1.0 {
                MaterialId::Sand
            } else {
                MaterialId::Water
            }
        } else if surface > SNOW_LINE {
            MaterialId::Snow
        } else {
            MaterialId::Rock
        }
    }
}

impl<H: HeightSource> DensitySource for TerrainDensity<H> {
    fn density(&self, p: DVec3) -> f64 {
        let length = p.length();
        if length == 0.0 {
            return -self.radius;
        }
        length - (self.radius + self.height.height(p / length))
    }

    fn colour(&self, p: DVec3) -> Vec3 {
        MaterialTable::global().lookup(self.material(p)).colour
    }
}

impl<H: HeightSource> HeightSource for TerrainDensity<H> {
    fn height(&self, normal: DVec3) -> f64 {
        self.height.height(normal)
    }

    fn max_abs_height(&self) -> f64 {
        self.height.max_abs_height()
    }
}
