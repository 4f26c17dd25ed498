//! Sample sources the ray caster reads from.
//!
//! [`ReferenceSource`] samples the dense volume and the precomputed gradient field directly.
//! [`BrickedSource`] resolves every sample through the brick redirection index into the packed
//! cache, the way a texture-based renderer would.

use std::sync::Arc;

use glam::{IVec3, UVec3, Vec3};
use volvis_core::InterpolationMode;
use volvis_volume::{
    cubic_interpolate, linear_interpolate, reflect_index, DenseVolume, GradientVolume,
    GradientVoxel,
};

use crate::brick_cache::{BrickIndexCache, BrickSnapshot};

/// Scalar field plus gradients in voxel space.
pub trait VolumeSource: Sync {
    /// Volume dimensions; valid sample coordinates lie in `[0, dims)`.
    fn dims(&self) -> UVec3;

    /// Largest scalar value, used to normalize MIP and slicer output.
    fn max_value(&self) -> f32;

    /// Largest gradient magnitude, used by opacity modulation.
    fn max_gradient_magnitude(&self) -> f32;

    /// Scalar sample; zero outside the volume.
    fn sample(&self, coord: Vec3, mode: InterpolationMode) -> f32;

    /// Gradient sample; zero outside the volume.
    fn gradient(&self, coord: Vec3, mode: InterpolationMode) -> GradientVoxel;
}

/// Samples the dense volume and its gradient field.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceSource<'a> {
    volume: &'a DenseVolume,
    gradients: &'a GradientVolume,
}

impl<'a> ReferenceSource<'a> {
    #[must_use]
    pub fn new(volume: &'a DenseVolume, gradients: &'a GradientVolume) -> Self {
        Self { volume, gradients }
    }
}

impl VolumeSource for ReferenceSource<'_> {
    fn dims(&self) -> UVec3 {
        self.volume.dims()
    }

    fn max_value(&self) -> f32 {
        self.volume.maximum()
    }

    fn max_gradient_magnitude(&self) -> f32 {
        self.gradients.max_magnitude()
    }

    fn sample(&self, coord: Vec3, mode: InterpolationMode) -> f32 {
        self.volume.sample(coord, mode)
    }

    fn gradient(&self, coord: Vec3, mode: InterpolationMode) -> GradientVoxel {
        self.gradients.sample(coord, mode)
    }
}

/// Cache-space region a sample may read from.
#[derive(Debug, Clone, Copy)]
struct Slot {
    origin: IVec3,
    max: IVec3,
}

/// Samples through the brick redirection index.
///
/// Samples that fall in a dropped brick read as zero. Interpolation taps stay inside the slot
/// of the brick holding the sample's base voxel and are mirrored back when they would leave it.
#[derive(Debug, Clone)]
pub struct BrickedSource {
    snapshot: Arc<BrickSnapshot>,
    dims: UVec3,
    brick_size: i32,
    padding: i32,
    max_value: f32,
    max_gradient_magnitude: f32,
}

impl BrickedSource {
    /// Captures the currently published snapshot of `cache`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn new(cache: &BrickIndexCache, volume: &DenseVolume, max_gradient_magnitude: f32) -> Self {
        let snapshot = cache.snapshot();
        Self {
            dims: volume.dims(),
            brick_size: snapshot.brick_size as i32,
            padding: snapshot.brick_padding as i32,
            snapshot,
            max_value: volume.maximum(),
            max_gradient_magnitude,
        }
    }

    fn contains(&self, coord: Vec3) -> bool {
        coord.cmpge(Vec3::ZERO).all() && coord.cmplt(self.dims.as_vec3()).all()
    }

    /// Slot holding `voxel` and the cache coordinate of that voxel.
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn locate(&self, voxel: IVec3) -> Option<(Slot, IVec3)> {
        let snapshot = &self.snapshot;
        if !snapshot.bricked {
            let slot = Slot {
                origin: IVec3::ZERO,
                max: snapshot.brick_volume_size.as_ivec3() - IVec3::ONE,
            };
            return Some((slot, voxel));
        }
        let brick = voxel / self.brick_size;
        let offset = snapshot.entry(brick.as_uvec3())?.offset()?;
        let origin = snapshot.slot_origin(offset).as_ivec3();
        let slot = Slot {
            origin,
            max: origin + IVec3::splat(snapshot.slot_size as i32 - 1),
        };
        let local = voxel - brick * self.brick_size + IVec3::splat(self.padding);
        Some((slot, origin + local))
    }

    #[allow(clippy::cast_sign_loss)]
    fn tap(&self, slot: &Slot, p: IVec3) -> f32 {
        let local = p - slot.origin;
        let extent = slot.max - slot.origin;
        let reflected = IVec3::new(
            reflect_index(local.x, extent.x),
            reflect_index(local.y, extent.y),
            reflect_index(local.z, extent.z),
        );
        self.snapshot.cache_voxel((slot.origin + reflected).as_uvec3())
    }

    /// Trilinear sample at a continuous cache-space position inside `slot`.
    fn cache_linear(&self, slot: &Slot, position: Vec3) -> f32 {
        let base = position.floor();
        let t = position - base;
        let p0 = base.as_ivec3();
        let p1 = p0 + IVec3::ONE;
        let v = |x: i32, y: i32, z: i32| self.tap(slot, IVec3::new(x, y, z));

        let c00 = linear_interpolate(v(p0.x, p0.y, p0.z), v(p1.x, p0.y, p0.z), t.x);
        let c10 = linear_interpolate(v(p0.x, p1.y, p0.z), v(p1.x, p1.y, p0.z), t.x);
        let c01 = linear_interpolate(v(p0.x, p0.y, p1.z), v(p1.x, p0.y, p1.z), t.x);
        let c11 = linear_interpolate(v(p0.x, p1.y, p1.z), v(p1.x, p1.y, p1.z), t.x);
        linear_interpolate(
            linear_interpolate(c00, c10, t.y),
            linear_interpolate(c01, c11, t.y),
            t.z,
        )
    }

    fn cache_cubic(&self, slot: &Slot, position: Vec3) -> f32 {
        let base = position.floor();
        let t = position - base;
        let p = base.as_ivec3();
        let v = |dx: i32, dy: i32, dz: i32| self.tap(slot, p + IVec3::new(dx, dy, dz));

        let mut slab = [0.0_f32; 4];
        for (dz, slab_value) in (-1..=2).zip(slab.iter_mut()) {
            let mut column = [0.0_f32; 4];
            for (dy, column_value) in (-1..=2).zip(column.iter_mut()) {
                *column_value = cubic_interpolate(
                    v(-1, dy, dz),
                    v(0, dy, dz),
                    v(1, dy, dz),
                    v(2, dy, dz),
                    t.x,
                );
            }
            *slab_value = cubic_interpolate(column[0], column[1], column[2], column[3], t.y);
        }
        cubic_interpolate(slab[0], slab[1], slab[2], slab[3], t.z)
    }

    /// Slot and continuous cache position for an in-range volume coordinate.
    fn resolve(&self, coord: Vec3) -> Option<(Slot, Vec3)> {
        let base = coord.floor();
        let (slot, cache_base) = self.locate(base.as_ivec3())?;
        Some((slot, cache_base.as_vec3() + (coord - base)))
    }
}

impl VolumeSource for BrickedSource {
    fn dims(&self) -> UVec3 {
        self.dims
    }

    fn max_value(&self) -> f32 {
        self.max_value
    }

    fn max_gradient_magnitude(&self) -> f32 {
        self.max_gradient_magnitude
    }

    fn sample(&self, coord: Vec3, mode: InterpolationMode) -> f32 {
        match mode {
            InterpolationMode::NearestNeighbour => {
                let rounded = (coord + Vec3::splat(0.5)).floor();
                if !self.contains(rounded) {
                    return 0.0;
                }
                self.locate(rounded.as_ivec3())
                    .map_or(0.0, |(slot, p)| self.tap(&slot, p))
            }
            InterpolationMode::Linear => {
                if !self.contains(coord) {
                    return 0.0;
                }
                self.resolve(coord)
                    .map_or(0.0, |(slot, p)| self.cache_linear(&slot, p))
            }
            InterpolationMode::Cubic => {
                if !self.contains(coord) {
                    return 0.0;
                }
                self.resolve(coord)
                    .map_or(0.0, |(slot, p)| self.cache_cubic(&slot, p))
            }
        }
    }

    /// Central differences of trilinear cache samples one voxel apart, for every mode.
    fn gradient(&self, coord: Vec3, _mode: InterpolationMode) -> GradientVoxel {
        if !self.contains(coord) {
            return GradientVoxel::ZERO;
        }
        let Some((slot, p)) = self.resolve(coord) else {
            return GradientVoxel::ZERO;
        };
        let diff = |axis: Vec3| {
            (self.cache_linear(&slot, p + axis) - self.cache_linear(&slot, p - axis)) / 2.0
        };
        GradientVoxel::new(Vec3::new(diff(Vec3::X), diff(Vec3::Y), diff(Vec3::Z)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volvis_core::{RenderConfig, TransferFunction, Vec4};
    use volvis_volume::Phantom;

    fn opaque_config(brick_size: u32, padding: u32) -> RenderConfig {
        let opaque = TransferFunction::new(vec![Vec4::ONE; 256], Default::default()).unwrap();
        RenderConfig::default()
            .with_bricking(true, brick_size)
            .with_brick_padding(padding)
            .with_transfer_function(opaque)
    }

    fn bricked(volume: &DenseVolume, config: &RenderConfig) -> BrickedSource {
        let mut cache = BrickIndexCache::new();
        cache
            .rebuild_cache(volume, config, &config.transfer_function.opacity_sum_table())
            .unwrap();
        BrickedSource::new(&cache, volume, 1.0)
    }

    fn sample_points(dims: UVec3) -> Vec<Vec3> {
        let mut points = Vec::new();
        let d = dims.as_vec3();
        for i in 0..40 {
            let f = i as f32;
            points.push(Vec3::new(
                (f * 0.37).rem_euclid(d.x),
                (f * 0.53 + 0.2).rem_euclid(d.y),
                (f * 0.71 + 0.4).rem_euclid(d.z),
            ));
        }
        points.push(d - Vec3::splat(0.01));
        points.push(Vec3::ZERO);
        points
    }

    #[test]
    fn test_bricked_matches_reference_when_all_resident() {
        let volume = Phantom::Sinusoid.generate(UVec3::new(11, 9, 7), 200.0).unwrap();
        let source = bricked(&volume, &opaque_config(4, 2));
        for p in sample_points(volume.dims()) {
            for mode in [InterpolationMode::NearestNeighbour, InterpolationMode::Linear] {
                let expected = volume.sample(p, mode);
                let actual = source.sample(p, mode);
                assert!(
                    (expected - actual).abs() < 1e-3,
                    "{mode:?} at {p}: {expected} vs {actual}"
                );
            }
        }
    }

    #[test]
    fn test_cubic_matches_reference_with_wide_halo() {
        let volume = Phantom::Sinusoid.generate(UVec3::new(10, 10, 10), 200.0).unwrap();
        let source = bricked(&volume, &opaque_config(5, 2));
        for p in sample_points(volume.dims()) {
            let expected = volume.sample(p, InterpolationMode::Cubic);
            let actual = source.sample(p, InterpolationMode::Cubic);
            assert!((expected - actual).abs() < 1e-2, "at {p}: {expected} vs {actual}");
        }
    }

    #[test]
    fn test_unbricked_cache_matches_reference() {
        let volume = Phantom::Sphere.generate(UVec3::new(8, 6, 5), 100.0).unwrap();
        let source = bricked(&volume, &RenderConfig::default());
        for p in sample_points(volume.dims()) {
            for mode in [
                InterpolationMode::NearestNeighbour,
                InterpolationMode::Linear,
                InterpolationMode::Cubic,
            ] {
                assert!((volume.sample(p, mode) - source.sample(p, mode)).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_dropped_bricks_read_as_zero() {
        let volume = DenseVolume::from_fn(UVec3::new(8, 4, 4), |p| if p.x < 4 { 0.0 } else { 200.0 })
            .unwrap();
        let config = opaque_config(4, 1)
            .with_transfer_function(TransferFunction::isolated(200, Vec4::ONE));
        let source = bricked(&volume, &config);
        assert_eq!(source.sample(Vec3::new(5.0, 1.0, 1.0), InterpolationMode::Linear), 200.0);
        assert_eq!(source.sample(Vec3::new(1.0, 1.0, 1.0), InterpolationMode::Linear), 0.0);
        assert_eq!(
            source.gradient(Vec3::new(1.0, 1.0, 1.0), InterpolationMode::Linear),
            GradientVoxel::ZERO
        );
    }

    #[test]
    fn test_out_of_range_is_zero() {
        let volume = DenseVolume::filled(UVec3::splat(4), 3.0).unwrap();
        let source = bricked(&volume, &opaque_config(2, 1));
        assert_eq!(source.sample(Vec3::new(4.0, 1.0, 1.0), InterpolationMode::Linear), 0.0);
        assert_eq!(source.sample(Vec3::new(3.6, 1.0, 1.0), InterpolationMode::NearestNeighbour), 0.0);
        assert_eq!(source.sample(Vec3::new(3.4, 1.0, 1.0), InterpolationMode::NearestNeighbour), 3.0);
    }

    #[test]
    fn test_bricked_gradient_follows_linear_ramp() {
        let volume = DenseVolume::from_fn(UVec3::splat(8), |p| 3.0 * p.x as f32).unwrap();
        let source = bricked(&volume, &opaque_config(4, 2));
        let g = source.gradient(Vec3::new(3.5, 3.0, 4.2), InterpolationMode::Linear);
        assert!((g.direction - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-4);
        assert!((g.magnitude - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_reference_source_delegates() {
        let volume = Phantom::Sphere.generate(UVec3::splat(6), 50.0).unwrap();
        let gradients = GradientVolume::build(&volume);
        let source = ReferenceSource::new(&volume, &gradients);
        let p = Vec3::new(2.5, 2.5, 2.5);
        assert_eq!(source.sample(p, InterpolationMode::Linear), volume.sample_linear(p));
        assert_eq!(source.gradient(p, InterpolationMode::Linear), gradients.sample_linear(p));
        assert_eq!(source.max_value(), 50.0);
    }
}
