//! Packing shape search for the brick cache.

use std::time::{Duration, Instant};

use glam::UVec3;
use volvis_core::{Result, VolvisError};

/// Finds a slot grid `(dx, dy, dz)` with at least `count` slots and no axis above
/// `max_per_axis`.
///
/// The cube `ceil(cbrt(count))^3` is the baseline. Every `dz` is then tried together with the
/// near-square factorizations `dy <= ceil(sqrt(ceil(count / dz)))`, keeping the candidate with
/// the fewest slots and, among those, the smallest largest axis. The sweep stops once
/// `budget` has elapsed. A count of zero yields a single slot.
pub fn find_optimal_dimensions(
    count: usize,
    max_per_axis: u32,
    budget: Duration,
) -> Result<UVec3> {
    let failed = || VolvisError::PackingFailed {
        active_bricks: count,
        max_per_axis,
    };
    if count == 0 {
        return Ok(UVec3::ONE);
    }
    let n = count as u64;
    let max = u64::from(max_per_axis);
    if max == 0 || max.saturating_pow(3) < n {
        return Err(failed());
    }

    let start = Instant::now();
    let side = integer_cbrt_ceil(n);
    // side <= max because max^3 >= n
    let mut best = Candidate::new(side, side, side);

    for dz in 1..=max.min(n) {
        let rem = n.div_ceil(dz);
        let dy_limit = integer_sqrt_ceil(rem).min(max);
        for dy in 1..=dy_limit {
            let dx = rem.div_ceil(dy);
            if dx > max {
                continue;
            }
            let candidate = Candidate::new(dx, dy, dz);
            if candidate.is_better_than(&best) {
                best = candidate;
            }
        }
        if start.elapsed() > budget {
            log::debug!("packing search for {count} bricks stopped at dz = {dz}");
            break;
        }
    }

    best.to_uvec3().ok_or_else(failed)
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    dims: [u64; 3],
    volume: u64,
    extent: u64,
}

impl Candidate {
    fn new(dx: u64, dy: u64, dz: u64) -> Self {
        Self {
            dims: [dx, dy, dz],
            volume: dx * dy * dz,
            extent: dx.max(dy).max(dz),
        }
    }

    fn is_better_than(&self, other: &Self) -> bool {
        (self.volume, self.extent) < (other.volume, other.extent)
    }

    fn to_uvec3(self) -> Option<UVec3> {
        let [x, y, z] = self.dims;
        Some(UVec3::new(
            u32::try_from(x).ok()?,
            u32::try_from(y).ok()?,
            u32::try_from(z).ok()?,
        ))
    }
}

/// Smallest `c` with `c^3 >= n`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn integer_cbrt_ceil(n: u64) -> u64 {
    let mut c = (n as f64).cbrt().ceil() as u64;
    while c.saturating_pow(3) < n {
        c += 1;
    }
    while c > 1 && (c - 1).saturating_pow(3) >= n {
        c -= 1;
    }
    c
}

/// Smallest `s` with `s^2 >= n`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn integer_sqrt_ceil(n: u64) -> u64 {
    let mut s = (n as f64).sqrt().ceil() as u64;
    while s.saturating_mul(s) < n {
        s += 1;
    }
    while s > 1 && (s - 1) * (s - 1) >= n {
        s -= 1;
    }
    s
}
