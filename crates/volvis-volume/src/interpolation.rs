//! Interpolation kernels and lattice boundary handling.
//!
//! Sampling coordinates outside the volume always read as zero. Stencil taps that leave
//! the lattice from an in-range coordinate (the cubic neighbourhood, the upper tap of a
//! linear blend on the last lattice plane, brick halos) are mirrored back with
//! [`reflect_index`].

/// Catmull-Rom tension parameter.
pub const CUBIC_ALPHA: f32 = -0.5;

/// Mirrors an index into `[0, max_idx]`.
///
/// `-1` maps to `1` and `max_idx + 1` maps to `max_idx - 1`. Indices that are still out of
/// range after one reflection (only possible for lattices narrower than the stencil) are
/// clamped.
#[must_use]
pub fn reflect_index(idx: i32, max_idx: i32) -> i32 {
    if max_idx <= 0 {
        return 0;
    }
    let reflected = if idx < 0 {
        -idx
    } else if idx > max_idx {
        2 * max_idx - idx
    } else {
        idx
    };
    reflected.clamp(0, max_idx)
}

/// Linear blend: returns `g0` at `factor == 0` and `g1` at `factor == 1`.
#[must_use]
pub fn linear_interpolate(g0: f32, g1: f32, factor: f32) -> f32 {
    (1.0 - factor) * g0 + factor * g1
}

/// Cubic convolution kernel h(x) with `a = -0.5`.
#[must_use]
pub fn cubic_weight(x: f32) -> f32 {
    let a = CUBIC_ALPHA;
    let x = x.abs();
    let x2 = x * x;
    let x3 = x2 * x;
    if x <= 1.0 {
        (a + 2.0) * x3 - (a + 3.0) * x2 + 1.0
    } else if x < 2.0 {
        a * x3 - 5.0 * a * x2 + 8.0 * a * x - 4.0 * a
    } else {
        0.0
    }
}

/// Cubic interpolation of four equally spaced samples.
///
/// `factor` is the position between `g1` and `g2`.
#[must_use]
pub fn cubic_interpolate(g0: f32, g1: f32, g2: f32, g3: f32, factor: f32) -> f32 {
    g0 * cubic_weight(factor + 1.0)
        + g1 * cubic_weight(factor)
        + g2 * cubic_weight(factor - 1.0)
        + g3 * cubic_weight(factor - 2.0)
}
