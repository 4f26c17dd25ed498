//! Value range summaries over volume regions and the activity test applied to them.

use bytemuck::{Pod, Zeroable};
use glam::UVec3;
use rayon::prelude::*;
use volvis_core::{OpacitySumTable, RenderConfig, RenderMode};
use volvis_volume::DenseVolume;

/// Closed value interval `[min, max]` of a region.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl ValueRange {
    /// The empty range; merging anything into it yields that thing.
    pub const EMPTY: Self = Self {
        min: f32::MAX,
        max: f32::MIN,
    };

    #[must_use]
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    #[must_use]
    pub fn contains(&self, value: f32) -> bool {
        self.min <= value && value <= self.max
    }

    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[must_use]
    pub fn include(self, value: f32) -> Self {
        Self {
            min: self.min.min(value),
            max: self.max.max(value),
        }
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Number of `region_size`-wide regions needed to cover `dims` on each axis.
#[must_use]
pub fn grid_dims(dims: UVec3, region_size: u32) -> UVec3 {
    let size = UVec3::splat(region_size.max(1));
    (dims + size - UVec3::ONE) / size
}

/// Value range of the voxels in `[lo, hi)`, with `hi` clamped to the volume.
#[must_use]
pub fn scan_region(volume: &DenseVolume, lo: UVec3, hi: UVec3) -> ValueRange {
    let hi = hi.min(volume.dims());
    if lo.cmpge(hi).any() {
        return ValueRange::EMPTY;
    }
    let data = volume.data();
    let row_len = (hi.x - lo.x) as usize;
    let mut range = ValueRange::EMPTY;
    for z in lo.z..hi.z {
        for y in lo.y..hi.y {
            let start = volume.index(lo.x, y, z);
            range = data[start..start + row_len]
                .iter()
                .fold(range, |r, &v| r.include(v));
        }
    }
    range
}

/// Value ranges of every region of a `region_size` grid, in x-fastest region order.
///
/// Each region covers `[origin - apron_below, origin + region_size + apron_above)` clamped to
/// the volume, so a zero apron yields exact per-region ranges. Far-edge regions that only
/// partially overlap the volume use their in-bounds voxels.
#[must_use]
pub fn summarize_regions(
    volume: &DenseVolume,
    region_size: u32,
    apron_below: u32,
    apron_above: u32,
) -> Vec<ValueRange> {
    let grid = grid_dims(volume.dims(), region_size);
    let count = grid.x as usize * grid.y as usize * grid.z as usize;
    (0..count)
        .into_par_iter()
        .map(|i| {
            let region = region_coord(i, grid);
            let origin = region * region_size;
            let lo = origin.saturating_sub(UVec3::splat(apron_below));
            let hi = origin + UVec3::splat(region_size + apron_above);
            scan_region(volume, lo, hi)
        })
        .collect()
}

/// Unflattens an x-fastest region index.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn region_coord(index: usize, grid: UVec3) -> UVec3 {
    let nx = grid.x as usize;
    let ny = grid.y as usize;
    UVec3::new(
        (index % nx) as u32,
        ((index / nx) % ny) as u32,
        (index / (nx * ny)) as u32,
    )
}

/// Flattens a region coordinate to its x-fastest index.
#[must_use]
pub fn region_index(coord: UVec3, grid: UVec3) -> usize {
    coord.x as usize + grid.x as usize * (coord.y as usize + grid.y as usize * coord.z as usize)
}

/// Decides whether a region can contribute to the image.
#[derive(Debug, Clone, Copy)]
pub enum ActivityCriterion<'a> {
    /// Some value in the range maps to a nonzero transfer function opacity.
    Opacity(&'a OpacitySumTable),
    /// The range brackets the iso value.
    IsoValue(f32),
}

impl<'a> ActivityCriterion<'a> {
    /// Picks the criterion for the configured render mode.
    #[must_use]
    pub fn from_config(config: &RenderConfig, table: &'a OpacitySumTable) -> Self {
        match config.render_mode {
            RenderMode::Isosurface => Self::IsoValue(config.iso_value),
            RenderMode::Slicer | RenderMode::Mip | RenderMode::Composite => Self::Opacity(table),
        }
    }

    #[must_use]
    pub fn is_active(&self, range: ValueRange) -> bool {
        if range.is_empty() {
            return false;
        }
        match self {
            Self::Opacity(table) => table.is_value_range_visible(range.min, range.max),
            Self::IsoValue(iso) => range.contains(*iso),
        }
    }
}
