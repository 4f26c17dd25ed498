//! Dense scalar volumes.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::{IVec3, UVec3, Vec3};
use volvis_core::{InterpolationMode, Result, VolvisError};

use crate::histogram::{Histogram, DEFAULT_BUCKET_COUNT};
use crate::interpolation::{cubic_interpolate, linear_interpolate, reflect_index};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// A regular 3D grid of scalar samples.
///
/// Samples are stored x-fastest: voxel `(x, y, z)` lives at `x + dims.x * (y + dims.y * z)`.
/// The volume is immutable once constructed; value range and histogram are computed up front.
#[derive(Debug, Clone)]
pub struct DenseVolume {
    generation: u64,
    name: String,
    dims: UVec3,
    data: Vec<f32>,
    minimum: f32,
    maximum: f32,
    histogram: Histogram,
}

impl DenseVolume {
    /// Creates a volume from x-fastest samples.
    ///
    /// Fails if any dimension is zero or if `data` does not hold exactly
    /// `dims.x * dims.y * dims.z` samples.
    pub fn new(data: Vec<f32>, dims: UVec3) -> Result<Self> {
        let expected = voxel_count(dims)?;
        if data.len() != expected {
            return Err(VolvisError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        let (minimum, maximum) = data
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let histogram = Histogram::compute(&data, minimum, maximum, DEFAULT_BUCKET_COUNT);

        Ok(Self {
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            name: String::new(),
            dims,
            data,
            minimum,
            maximum,
            histogram,
        })
    }

    /// Creates a volume where every voxel has the same value.
    pub fn filled(dims: UVec3, value: f32) -> Result<Self> {
        Self::new(vec![value; voxel_count(dims)?], dims)
    }

    /// Creates a volume by evaluating `f` at every lattice point.
    pub fn from_fn(dims: UVec3, mut f: impl FnMut(UVec3) -> f32) -> Result<Self> {
        let mut data = Vec::with_capacity(voxel_count(dims)?);
        for z in 0..dims.z {
            for y in 0..dims.y {
                for x in 0..dims.x {
                    data.push(f(UVec3::new(x, y, z)));
                }
            }
        }
        Self::new(data, dims)
    }

    /// Sets a display name (typically the source file name).
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Identifies the samples of this volume. Every constructed volume gets a fresh value;
    /// clones share it.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of voxels along each axis.
    #[must_use]
    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    /// Raw samples in x-fastest order.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Total number of voxels.
    #[must_use]
    pub fn num_voxels(&self) -> usize {
        self.data.len()
    }

    /// Smallest sample value.
    #[must_use]
    pub fn minimum(&self) -> f32 {
        self.minimum
    }

    /// Largest sample value.
    #[must_use]
    pub fn maximum(&self) -> f32 {
        self.maximum
    }

    /// Value histogram over `[minimum, maximum]`.
    #[must_use]
    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// Flattens an in-range voxel coordinate to a linear index.
    #[must_use]
    pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
        x as usize + self.dims.x as usize * (y as usize + self.dims.y as usize * z as usize)
    }

    /// Unflattens a linear index to a voxel coordinate.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn coord_of(&self, index: usize) -> UVec3 {
        let nx = self.dims.x as usize;
        let ny = self.dims.y as usize;
        UVec3::new(
            (index % nx) as u32,
            ((index / nx) % ny) as u32,
            (index / (nx * ny)) as u32,
        )
    }

    /// Returns the voxel at an integer coordinate, mirroring out-of-range indices back into
    /// the lattice.
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub fn voxel(&self, x: i32, y: i32, z: i32) -> f32 {
        let max = self.dims.as_ivec3() - IVec3::ONE;
        let x = reflect_index(x, max.x) as u32;
        let y = reflect_index(y, max.y) as u32;
        let z = reflect_index(z, max.z) as u32;
        self.data[self.index(x, y, z)]
    }

    /// Whether a continuous coordinate lies inside `[0, dims)` on every axis.
    #[must_use]
    pub fn contains(&self, coord: Vec3) -> bool {
        coord.cmpge(Vec3::ZERO).all() && coord.cmplt(self.dims.as_vec3()).all()
    }

    /// Samples the volume at a continuous voxel-space coordinate.
    ///
    /// Coordinates outside the volume read as zero.
    #[must_use]
    pub fn sample(&self, coord: Vec3, mode: InterpolationMode) -> f32 {
        match mode {
            InterpolationMode::NearestNeighbour => self.sample_nearest(coord),
            InterpolationMode::Linear => self.sample_linear(coord),
            InterpolationMode::Cubic => self.sample_cubic(coord),
        }
    }

    /// Nearest-neighbour sample.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn sample_nearest(&self, coord: Vec3) -> f32 {
        let rounded = (coord + Vec3::splat(0.5)).floor();
        if !self.contains(rounded) {
            return 0.0;
        }
        let p = rounded.as_ivec3();
        self.voxel(p.x, p.y, p.z)
    }

    /// Trilinear sample.
    #[must_use]
    pub fn sample_linear(&self, coord: Vec3) -> f32 {
        if !self.contains(coord) {
            return 0.0;
        }
        let base = coord.floor();
        let t = coord - base;
        let p0 = base.as_ivec3();
        let p1 = p0 + IVec3::ONE;

        let v = |x: i32, y: i32, z: i32| self.voxel(x, y, z);

        // x, then y, then z
        let c00 = linear_interpolate(v(p0.x, p0.y, p0.z), v(p1.x, p0.y, p0.z), t.x);
        let c10 = linear_interpolate(v(p0.x, p1.y, p0.z), v(p1.x, p1.y, p0.z), t.x);
        let c01 = linear_interpolate(v(p0.x, p0.y, p1.z), v(p1.x, p0.y, p1.z), t.x);
        let c11 = linear_interpolate(v(p0.x, p1.y, p1.z), v(p1.x, p1.y, p1.z), t.x);

        let c0 = linear_interpolate(c00, c10, t.y);
        let c1 = linear_interpolate(c01, c11, t.y);

        linear_interpolate(c0, c1, t.z)
    }

    /// Separable Catmull-Rom sample over the 4x4x4 neighbourhood.
    #[must_use]
    pub fn sample_cubic(&self, coord: Vec3) -> f32 {
        if !self.contains(coord) {
            return 0.0;
        }
        let base = coord.floor();
        let t = coord - base;
        let p = base.as_ivec3();

        let mut slab = [0.0_f32; 4];
        for (k, slab_value) in (-1..=2).zip(slab.iter_mut()) {
            let mut column = [0.0_f32; 4];
            for (j, column_value) in (-1..=2).zip(column.iter_mut()) {
                let row = [
                    self.voxel(p.x - 1, p.y + j, p.z + k),
                    self.voxel(p.x, p.y + j, p.z + k),
                    self.voxel(p.x + 1, p.y + j, p.z + k),
                    self.voxel(p.x + 2, p.y + j, p.z + k),
                ];
                *column_value = cubic_interpolate(row[0], row[1], row[2], row[3], t.x);
            }
            *slab_value = cubic_interpolate(column[0], column[1], column[2], column[3], t.y);
        }
        cubic_interpolate(slab[0], slab[1], slab[2], slab[3], t.z)
    }
}

/// Number of voxels in a grid, rejecting empty and overflowing dimensions.
pub(crate) fn voxel_count(dims: UVec3) -> Result<usize> {
    let invalid = || VolvisError::InvalidDimensions {
        x: dims.x,
        y: dims.y,
        z: dims.z,
    };
    if dims.cmpeq(UVec3::ZERO).any() || dims.max_element() > i32::MAX as u32 {
        return Err(invalid());
    }
    (dims.x as usize)
        .checked_mul(dims.y as usize)
        .and_then(|n| n.checked_mul(dims.z as usize))
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_volume(dims: UVec3) -> DenseVolume {
        // f(x, y, z) = x + 2y + 3z is reproduced exactly by linear and cubic interpolation
        DenseVolume::from_fn(dims, |p| p.x as f32 + 2.0 * p.y as f32 + 3.0 * p.z as f32).unwrap()
    }

    #[test]
    fn test_new_rejects_wrong_size() {
        let result = DenseVolume::new(vec![0.0; 7], UVec3::new(2, 2, 2));
        assert!(matches!(
            result,
            Err(VolvisError::SizeMismatch {
                expected: 8,
                actual: 7
            })
        ));
    }

    #[test]
    fn test_new_rejects_zero_dims() {
        let result = DenseVolume::new(vec![], UVec3::new(0, 2, 2));
        assert!(matches!(result, Err(VolvisError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_generation_distinguishes_volumes() {
        let a = DenseVolume::filled(UVec3::splat(2), 1.0).unwrap();
        let b = DenseVolume::filled(UVec3::splat(2), 1.0).unwrap();
        assert_ne!(a.generation(), b.generation());
        assert_eq!(a.clone().with_name("copy").generation(), a.generation());
    }

    #[test]
    fn test_index_is_x_fastest() {
        let volume = ramp_volume(UVec3::new(3, 4, 5));
        assert_eq!(volume.index(1, 0, 0), 1);
        assert_eq!(volume.index(0, 1, 0), 3);
        assert_eq!(volume.index(0, 0, 1), 12);
        assert_eq!(volume.coord_of(volume.index(2, 3, 4)), UVec3::new(2, 3, 4));
        assert_eq!(volume.data()[volume.index(2, 3, 4)], 2.0 + 6.0 + 12.0);
    }

    #[test]
    fn test_value_range() {
        let volume = ramp_volume(UVec3::new(3, 3, 3));
        assert_eq!(volume.minimum(), 0.0);
        assert_eq!(volume.maximum(), 2.0 + 4.0 + 6.0);
        assert_eq!(volume.histogram().total(), 27);
    }

    #[test]
    fn test_voxel_reflects() {
        let volume = ramp_volume(UVec3::new(4, 4, 4));
        assert_eq!(volume.voxel(-1, 0, 0), volume.voxel(1, 0, 0));
        assert_eq!(volume.voxel(4, 0, 0), volume.voxel(2, 0, 0));
    }

    #[test]
    fn test_nearest() {
        let volume = ramp_volume(UVec3::new(4, 4, 4));
        assert_eq!(volume.sample_nearest(Vec3::new(1.4, 0.0, 0.0)), 1.0);
        assert_eq!(volume.sample_nearest(Vec3::new(1.6, 0.0, 0.0)), 2.0);
        assert_eq!(volume.sample_nearest(Vec3::new(3.7, 0.0, 0.0)), 0.0);
        assert_eq!(volume.sample_nearest(Vec3::new(-0.7, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_linear_reproduces_linear_field() {
        let volume = ramp_volume(UVec3::new(5, 5, 5));
        let p = Vec3::new(1.25, 2.5, 0.75);
        let expected = p.x + 2.0 * p.y + 3.0 * p.z;
        assert!((volume.sample_linear(p) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_linear_at_lattice_points() {
        let volume = ramp_volume(UVec3::new(4, 4, 4));
        for z in 0..4 {
            for y in 0..4 {
                for x in 0..4 {
                    let p = UVec3::new(x, y, z);
                    let expected = volume.data()[volume.index(x, y, z)];
                    assert_eq!(volume.sample_linear(p.as_vec3()), expected);
                }
            }
        }
    }

    #[test]
    fn test_cubic_interior_matches_linear_field() {
        let volume = ramp_volume(UVec3::new(6, 6, 6));
        let p = Vec3::new(2.3, 2.6, 2.1);
        let expected = p.x + 2.0 * p.y + 3.0 * p.z;
        assert!((volume.sample_cubic(p) - expected).abs() < 1e-3);
    }

    #[test]
    fn test_out_of_range_is_zero() {
        let volume = DenseVolume::filled(UVec3::splat(4), 7.0).unwrap();
        for mode in [
            InterpolationMode::NearestNeighbour,
            InterpolationMode::Linear,
            InterpolationMode::Cubic,
        ] {
            assert_eq!(volume.sample(Vec3::new(-0.5, 1.0, 1.0), mode), 0.0);
            assert_eq!(volume.sample(Vec3::new(1.0, 4.0, 1.0), mode), 0.0);
            assert_eq!(volume.sample(Vec3::new(1.5, 1.5, 1.5), mode), 7.0);
        }
    }
}
