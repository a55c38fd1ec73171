//! Scalar interpolation helpers.

/// Hermite smoothstep of `x` between `edge0` and `edge1`, clamped to `[0, 1]`.
#[inline]
#[must_use]
pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = inverse_lerp(edge0, edge1, x).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Position of `x` within `[a, b]`; `0` when the interval is empty.
#[inline]
#[must_use]
pub fn inverse_lerp(a: f64, b: f64, x: f64) -> f64 {
    let span = b - a;
    if span.abs() < f64::EPSILON {
        0.0
    } else {
        (x - a) / span
    }
}
