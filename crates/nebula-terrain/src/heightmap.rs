//! Multi-octave fractal Brownian motion (fBm) over 3D simplex noise.
//!
//! Samples are taken on the unit sphere, never on cube-face coordinates, so
//! every patch touching a point sees the same value regardless of face.

use glam::DVec3;
use noise::{NoiseFn, Simplex};

/// Configuration for one fBm layer.
#[derive(Clone, Debug)]
pub struct HeightmapParams {
    /// Seed of the underlying simplex noise.
    pub seed: u32,
    /// Number of noise octaves to composite.
    pub octaves: u32,
    /// Frequency multiplier between successive octaves. Default: 2.0.
    pub lacunarity: f64,
    /// Amplitude multiplier between successive octaves. Default: 0.5.
    pub persistence: f64,
    /// Frequency of the first octave, in cycles per unit of input.
    pub base_frequency: f64,
    /// Amplitude of the first octave.
    pub amplitude: f64,
}

impl Default for HeightmapParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            base_frequency: 1.0,
            amplitude: 1.0,
        }
    }
}

/// Fractal noise sampler.
///
/// Each successive octave multiplies the frequency by `lacunarity` and the
/// amplitude by `persistence`.
pub struct HeightmapSampler {
    noise: Simplex,
    params: HeightmapParams,
}

impl HeightmapSampler {
    pub fn new(params: HeightmapParams) -> Self {
        let noise = Simplex::new(params.seed);
        Self { noise, params }
    }

    /// Raw fBm value, within `[-max_amplitude, max_amplitude]`.
    pub fn sample_3d(&self, point: DVec3) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.params.base_frequency;
        let mut amplitude = self.params.amplitude;

        for _ in 0..self.params.octaves {
            let p = point * frequency;
            total += self.noise.get([p.x, p.y, p.z]) * amplitude;

            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }

        total
    }

    /// fBm remapped to `[0, 1]`. A zero-amplitude sampler returns 0.5.
    pub fn sample_normalized(&self, point: DVec3) -> f64 {
        let max_amp = self.max_amplitude();
        if max_amp == 0.0 {
            return 0.5;
        }
        ((self.sample_3d(point) / max_amp + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// Sum of all octave amplitudes (geometric series).
    pub fn max_amplitude(&self) -> f64 {
        let mut sum = 0.0;
        let mut amp = self.params.amplitude;
        for _ in 0..self.params.octaves {
            sum += amp.abs();
            amp *= self.params.persistence;
        }
        sum
    }

    pub fn params(&self) -> &HeightmapParams {
        &self.params
    }
}
