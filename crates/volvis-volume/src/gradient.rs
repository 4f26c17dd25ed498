//! Gradient field derived from a dense volume by central differences.

use std::time::Instant;

use glam::{IVec3, UVec3, Vec3};
use rayon::prelude::*;
use volvis_core::InterpolationMode;

use crate::interpolation::reflect_index;
use crate::volume::DenseVolume;

/// Gradient direction and magnitude at a single voxel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientVoxel {
    pub direction: Vec3,
    pub magnitude: f32,
}

impl GradientVoxel {
    /// The zero gradient, used on the volume border and outside the volume.
    pub const ZERO: Self = Self {
        direction: Vec3::ZERO,
        magnitude: 0.0,
    };

    /// Creates a voxel whose magnitude is the length of `direction`.
    #[must_use]
    pub fn new(direction: Vec3) -> Self {
        Self {
            direction,
            magnitude: direction.length(),
        }
    }
}

impl Default for GradientVoxel {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Blends two gradient voxels. Direction and magnitude are interpolated independently, so the
/// blended magnitude is generally not the length of the blended direction.
#[must_use]
pub fn linear_interpolate(g0: &GradientVoxel, g1: &GradientVoxel, factor: f32) -> GradientVoxel {
    GradientVoxel {
        direction: g0.direction * (1.0 - factor) + g1.direction * factor,
        magnitude: g0.magnitude * (1.0 - factor) + g1.magnitude * factor,
    }
}

/// Per-voxel gradients with the same dimensions and indexing as the source volume.
#[derive(Debug, Clone)]
pub struct GradientVolume {
    dims: UVec3,
    data: Vec<GradientVoxel>,
    min_magnitude: f32,
    max_magnitude: f32,
}

impl GradientVolume {
    /// Computes central-difference gradients for every interior voxel.
    ///
    /// The one-voxel border shell is left at [`GradientVoxel::ZERO`] and takes part in the
    /// magnitude range.
    #[must_use]
    pub fn build(volume: &DenseVolume) -> Self {
        let start = Instant::now();
        let dims = volume.dims();
        let slice_len = dims.x as usize * dims.y as usize;
        let mut data = vec![GradientVoxel::ZERO; volume.num_voxels()];

        data.par_chunks_mut(slice_len)
            .enumerate()
            .for_each(|(z, slice)| {
                #[allow(clippy::cast_possible_truncation)]
                let z = z as u32;
                if z == 0 || z + 1 >= dims.z {
                    return;
                }
                for y in 1..dims.y.saturating_sub(1) {
                    for x in 1..dims.x.saturating_sub(1) {
                        let direction = central_difference(volume, x, y, z);
                        slice[x as usize + dims.x as usize * y as usize] =
                            GradientVoxel::new(direction);
                    }
                }
            });

        let (min_magnitude, max_magnitude) = data
            .par_iter()
            .map(|g| (g.magnitude, g.magnitude))
            .reduce(
                || (f32::MAX, f32::MIN),
                |(lo_a, hi_a), (lo_b, hi_b)| (lo_a.min(lo_b), hi_a.max(hi_b)),
            );

        log::debug!(
            "gradient volume {}x{}x{} built in {:.2?}",
            dims.x,
            dims.y,
            dims.z,
            start.elapsed()
        );

        Self {
            dims,
            data,
            min_magnitude,
            max_magnitude,
        }
    }

    /// Number of voxels along each axis.
    #[must_use]
    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    /// Gradient voxels in x-fastest order.
    #[must_use]
    pub fn data(&self) -> &[GradientVoxel] {
        &self.data
    }

    #[must_use]
    pub fn min_magnitude(&self) -> f32 {
        self.min_magnitude
    }

    #[must_use]
    pub fn max_magnitude(&self) -> f32 {
        self.max_magnitude
    }

    /// Gradient at an in-range lattice point.
    #[must_use]
    pub fn gradient(&self, x: u32, y: u32, z: u32) -> GradientVoxel {
        let (nx, ny) = (self.dims.x as usize, self.dims.y as usize);
        self.data[x as usize + nx * (y as usize + ny * z as usize)]
    }

    /// Samples the gradient field at a continuous voxel-space coordinate.
    ///
    /// Cubic is served by the linear path. Coordinates outside the volume return
    /// [`GradientVoxel::ZERO`].
    #[must_use]
    pub fn sample(&self, coord: Vec3, mode: InterpolationMode) -> GradientVoxel {
        match mode {
            InterpolationMode::NearestNeighbour => self.sample_nearest(coord),
            InterpolationMode::Linear | InterpolationMode::Cubic => self.sample_linear(coord),
        }
    }

    /// Nearest-neighbour sample.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample_nearest(&self, coord: Vec3) -> GradientVoxel {
        let rounded = (coord + Vec3::splat(0.5)).floor();
        if !self.contains(rounded) {
            return GradientVoxel::ZERO;
        }
        let p = rounded.as_uvec3();
        self.gradient(p.x, p.y, p.z)
    }

    /// Trilinear sample over the eight surrounding lattice voxels.
    #[must_use]
    pub fn sample_linear(&self, coord: Vec3) -> GradientVoxel {
        if !self.contains(coord) {
            return GradientVoxel::ZERO;
        }
        let base = coord.floor();
        let t = coord - base;
        let p0 = base.as_ivec3();
        let p1 = p0 + IVec3::ONE;

        let g = |x: i32, y: i32, z: i32| self.reflected(x, y, z);

        let g00 = linear_interpolate(&g(p0.x, p0.y, p0.z), &g(p1.x, p0.y, p0.z), t.x);
        let g10 = linear_interpolate(&g(p0.x, p1.y, p0.z), &g(p1.x, p1.y, p0.z), t.x);
        let g01 = linear_interpolate(&g(p0.x, p0.y, p1.z), &g(p1.x, p0.y, p1.z), t.x);
        let g11 = linear_interpolate(&g(p0.x, p1.y, p1.z), &g(p1.x, p1.y, p1.z), t.x);

        let g0 = linear_interpolate(&g00, &g10, t.y);
        let g1 = linear_interpolate(&g01, &g11, t.y);

        linear_interpolate(&g0, &g1, t.z)
    }

    fn contains(&self, coord: Vec3) -> bool {
        coord.cmpge(Vec3::ZERO).all() && coord.cmplt(self.dims.as_vec3()).all()
    }

    #[allow(clippy::cast_sign_loss)]
    fn reflected(&self, x: i32, y: i32, z: i32) -> GradientVoxel {
        let max = self.dims.as_ivec3() - IVec3::ONE;
        self.gradient(
            reflect_index(x, max.x) as u32,
            reflect_index(y, max.y) as u32,
            reflect_index(z, max.z) as u32,
        )
    }
}

#[allow(clippy::cast_possible_wrap)]
fn central_difference(volume: &DenseVolume, x: u32, y: u32, z: u32) -> Vec3 {
    let (x, y, z) = (x as i32, y as i32, z as i32);
    Vec3::new(
        (volume.voxel(x + 1, y, z) - volume.voxel(x - 1, y, z)) / 2.0,
        (volume.voxel(x, y + 1, z) - volume.voxel(x, y - 1, z)) / 2.0,
        (volume.voxel(x, y, z + 1) - volume.voxel(x, y, z - 1)) / 2.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn quadratic_volume(dims: UVec3) -> DenseVolume {
        DenseVolume::from_fn(dims, |p| {
            let (x, y, z) = (p.x as f32, p.y as f32, p.z as f32);
            x * x + 2.0 * y - z
        })
        .unwrap()
    }

    #[test]
    fn test_interior_is_central_difference() {
        let volume = quadratic_volume(UVec3::new(5, 5, 5));
        let gradients = GradientVolume::build(&volume);
        let g = gradients.gradient(2, 2, 2);
        // d/dx x^2 at x=2 via ((3^2) - (1^2)) / 2
        assert_eq!(g.direction, Vec3::new(4.0, 2.0, -1.0));
        assert!((g.magnitude - 21.0_f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_border_shell_is_zero() {
        let dims = UVec3::new(4, 5, 6);
        let gradients = GradientVolume::build(&quadratic_volume(dims));
        for z in 0..dims.z {
            for y in 0..dims.y {
                for x in 0..dims.x {
                    let on_border = x == 0
                        || y == 0
                        || z == 0
                        || x == dims.x - 1
                        || y == dims.y - 1
                        || z == dims.z - 1;
                    if on_border {
                        assert_eq!(gradients.gradient(x, y, z), GradientVoxel::ZERO);
                    }
                }
            }
        }
        assert_eq!(gradients.min_magnitude(), 0.0);
    }

    #[test]
    fn test_thin_volume_is_all_zero() {
        let volume = DenseVolume::from_fn(UVec3::new(2, 8, 8), |p| p.y as f32).unwrap();
        let gradients = GradientVolume::build(&volume);
        assert!(gradients.data().iter().all(|g| *g == GradientVoxel::ZERO));
        assert_eq!(gradients.max_magnitude(), 0.0);
    }

    #[test]
    fn test_linear_interpolate_endpoints() {
        let a = GradientVoxel::new(Vec3::new(1.0, 0.0, 0.0));
        let b = GradientVoxel::new(Vec3::new(0.0, 3.0, 4.0));
        assert_eq!(linear_interpolate(&a, &b, 0.0), a);
        assert_eq!(linear_interpolate(&a, &b, 1.0), b);
        let mid = linear_interpolate(&a, &b, 0.5);
        assert_eq!(mid.magnitude, 3.0);
        assert_eq!(mid.direction, Vec3::new(0.5, 1.5, 2.0));
    }

    #[test]
    fn test_sample_nearest() {
        let gradients = GradientVolume::build(&quadratic_volume(UVec3::splat(5)));
        let expected = gradients.gradient(2, 2, 2);
        assert_eq!(
            gradients.sample(Vec3::new(2.4, 1.6, 2.0), InterpolationMode::NearestNeighbour),
            expected
        );
        assert_eq!(
            gradients.sample(Vec3::new(4.6, 2.0, 2.0), InterpolationMode::NearestNeighbour),
            GradientVoxel::ZERO
        );
    }

    #[test]
    fn test_sample_linear() {
        let gradients = GradientVolume::build(&quadratic_volume(UVec3::splat(5)));
        let a = gradients.gradient(2, 2, 2);
        let b = gradients.gradient(3, 2, 2);
        let sampled = gradients.sample(Vec3::new(2.25, 2.0, 2.0), InterpolationMode::Linear);
        let expected = linear_interpolate(&a, &b, 0.25);
        assert!((sampled.direction - expected.direction).length() < 1e-5);
        assert!((sampled.magnitude - expected.magnitude).abs() < 1e-5);

        let cubic = gradients.sample(Vec3::new(2.25, 2.0, 2.0), InterpolationMode::Cubic);
        assert_eq!(cubic, sampled);
    }

    #[test]
    fn test_sample_out_of_range() {
        let gradients = GradientVolume::build(&quadratic_volume(UVec3::splat(5)));
        for coord in [Vec3::new(-0.1, 2.0, 2.0), Vec3::new(2.0, 5.0, 2.0)] {
            assert_eq!(
                gradients.sample(coord, InterpolationMode::Linear),
                GradientVoxel::ZERO
            );
        }
    }

    proptest! {
        #[test]
        fn prop_magnitudes_within_range(
            dims in (1u32..7, 1u32..7, 1u32..7),
            seed in any::<u32>(),
        ) {
            let dims = UVec3::new(dims.0, dims.1, dims.2);
            let volume = DenseVolume::from_fn(dims, |p| {
                let h = (p.x * 73 + p.y * 151 + p.z * 283).wrapping_mul(seed | 1);
                (h % 256) as f32
            })
            .unwrap();
            let gradients = GradientVolume::build(&volume);
            for g in gradients.data() {
                prop_assert!(g.magnitude >= gradients.min_magnitude());
                prop_assert!(g.magnitude <= gradients.max_magnitude());
            }
        }
    }
}
