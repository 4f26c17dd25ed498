//! Brick index cache: packs the active bricks of a volume into a compact cache array and keeps a
//! redirection index from logical brick coordinates to cache slots.
//!
//! The cache and the index are published together as an immutable [`BrickSnapshot`] behind an
//! [`Arc`]. A rebuild assembles a new snapshot off to the side and swaps it in only when it
//! succeeds, so a failed rebuild leaves the previous snapshot visible to consumers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytemuck::{Pod, Zeroable};
use glam::{IVec3, UVec3, Vec3};
use rayon::prelude::*;
use volvis_core::{OpacitySumTable, RenderConfig, Result, VolvisError};
use volvis_volume::DenseVolume;

use crate::packing::find_optimal_dimensions;
use crate::value_range::{
    grid_dims, region_coord, region_index, summarize_regions, ActivityCriterion, ValueRange,
};

/// One cell of the redirection index.
///
/// `offset` is the normalized `[0, 1)` position of the brick's slot origin inside the cache;
/// `flag` is `1.0` for resident bricks and `0.0` for dropped ones. Laid out as one RGBA32F texel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BrickIndexEntry {
    pub offset: [f32; 3],
    pub flag: f32,
}

impl BrickIndexEntry {
    pub const INACTIVE: Self = Self {
        offset: [0.0; 3],
        flag: 0.0,
    };

    #[must_use]
    pub fn active(offset: Vec3) -> Self {
        Self {
            offset: offset.to_array(),
            flag: 1.0,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.flag > 0.0
    }

    /// Normalized cache offset of a resident brick.
    #[must_use]
    pub fn offset(&self) -> Option<Vec3> {
        self.is_active().then(|| Vec3::from_array(self.offset))
    }
}

/// The packed cache and its redirection index, published together.
#[derive(Debug, Clone)]
pub struct BrickSnapshot {
    /// Whether the volume was bricked; when not, `cache` is the whole volume.
    pub bricked: bool,
    /// Logical brick edge length in voxels.
    pub brick_size: u32,
    /// Halo copied around each brick in voxels.
    pub brick_padding: u32,
    /// Logical bricks per axis; `index` holds one entry per logical brick.
    pub index_volume_size: UVec3,
    /// Slots per cache axis.
    pub packing_shape: UVec3,
    /// Edge length of one slot in voxels (brick size plus the halo on both sides).
    pub slot_size: u32,
    /// Cache dimensions in voxels.
    pub brick_volume_size: UVec3,
    /// Cache voxels in x-fastest order.
    pub cache: Vec<f32>,
    /// Redirection index in x-fastest logical brick order.
    pub index: Vec<BrickIndexEntry>,
    /// Number of resident bricks.
    pub active_bricks: usize,
}

impl BrickSnapshot {
    fn empty() -> Self {
        Self {
            bricked: false,
            brick_size: 0,
            brick_padding: 0,
            index_volume_size: UVec3::ZERO,
            packing_shape: UVec3::ZERO,
            slot_size: 0,
            brick_volume_size: UVec3::ZERO,
            cache: Vec::new(),
            index: Vec::new(),
            active_bricks: 0,
        }
    }

    /// Cache voxel at an integer cache coordinate.
    #[must_use]
    pub fn cache_voxel(&self, p: UVec3) -> f32 {
        let size = self.brick_volume_size;
        self.cache[p.x as usize + size.x as usize * (p.y as usize + size.y as usize * p.z as usize)]
    }

    /// Redirection entry of a logical brick, `None` outside the index volume.
    #[must_use]
    pub fn entry(&self, brick: UVec3) -> Option<&BrickIndexEntry> {
        if brick.cmpge(self.index_volume_size).any() {
            return None;
        }
        self.index.get(region_index(brick, self.index_volume_size))
    }

    /// Cache voxel origin of the slot a normalized index offset points at.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn slot_origin(&self, offset: Vec3) -> UVec3 {
        (offset * self.brick_volume_size.as_vec3()).round().as_uvec3()
    }

    /// Index entries as raw bytes for upload.
    #[must_use]
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.index.as_slice())
    }

    /// Cache voxels as raw bytes for upload.
    #[must_use]
    pub fn cache_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.cache.as_slice())
    }
}

/// Bricked representation of a dense volume.
#[derive(Debug, Clone)]
pub struct BrickIndexCache {
    brick_size: u32,
    volume_generation: u64,
    index_volume_size: UVec3,
    min_max: Vec<ValueRange>,
    snapshot: Arc<BrickSnapshot>,
}

impl Default for BrickIndexCache {
    fn default() -> Self {
        Self::new()
    }
}

impl BrickIndexCache {
    /// Creates an empty cache; nothing is resident until [`Self::rebuild_cache`] runs.
    #[must_use]
    pub fn new() -> Self {
        Self {
            brick_size: 0,
            volume_generation: 0,
            index_volume_size: UVec3::ZERO,
            min_max: Vec::new(),
            snapshot: Arc::new(BrickSnapshot::empty()),
        }
    }

    /// Computes the per-brick value ranges and the index volume size for `brick_size`.
    ///
    /// Far-edge bricks that only partially overlap the volume summarize their in-bounds voxels.
    pub fn compute_min_max(&mut self, volume: &DenseVolume, brick_size: u32) -> Result<()> {
        let (grid, ranges) = summarize_bricks(volume, brick_size)?;
        self.commit_summary(volume, brick_size, grid, ranges);
        Ok(())
    }

    fn commit_summary(
        &mut self,
        volume: &DenseVolume,
        brick_size: u32,
        grid: UVec3,
        ranges: Vec<ValueRange>,
    ) {
        self.brick_size = brick_size;
        self.volume_generation = volume.generation();
        self.index_volume_size = grid;
        self.min_max = ranges;
    }

    /// Re-evaluates brick activity and repacks the cache.
    ///
    /// With bricking disabled the cache is the whole volume and the index a single inactive
    /// entry and the per-brick summary is cleared. Otherwise every active brick is copied with
    /// its halo into its own slot; the value ranges are recomputed first when the brick size or
    /// the volume changed. On error nothing changes: the previous ranges and snapshot stay in
    /// place.
    pub fn rebuild_cache(
        &mut self,
        volume: &DenseVolume,
        config: &RenderConfig,
        table: &OpacitySumTable,
    ) -> Result<()> {
        let start = Instant::now();
        let bricking = &config.bricking;

        if !bricking.use_bricking {
            self.brick_size = 0;
            self.volume_generation = 0;
            self.index_volume_size = UVec3::ZERO;
            self.min_max = Vec::new();
            self.snapshot = Arc::new(BrickSnapshot {
                bricked: false,
                brick_size: volume.dims().max_element(),
                brick_padding: 0,
                index_volume_size: UVec3::ONE,
                packing_shape: UVec3::ONE,
                slot_size: volume.dims().max_element(),
                brick_volume_size: volume.dims(),
                cache: volume.data().to_vec(),
                index: vec![BrickIndexEntry::INACTIVE],
                active_bricks: 0,
            });
            log::debug!("bricking disabled, cache holds the whole volume");
            return Ok(());
        }

        let brick_size = bricking.brick_size;
        let fresh = if self.brick_size != brick_size
            || self.volume_generation != volume.generation()
        {
            Some(summarize_bricks(volume, brick_size)?)
        } else {
            None
        };
        let (grid, ranges) = match &fresh {
            Some((grid, ranges)) => (*grid, ranges.as_slice()),
            None => (self.index_volume_size, self.min_max.as_slice()),
        };

        let criterion = ActivityCriterion::from_config(config, table);
        let active: Vec<usize> = ranges
            .iter()
            .enumerate()
            .filter(|(_, range)| criterion.is_active(**range))
            .map(|(i, _)| i)
            .collect();
        let total_bricks = ranges.len();

        let budget = Duration::from_millis(bricking.packing_budget_ms);
        let packing_shape =
            match find_optimal_dimensions(active.len(), bricking.max_bricks_per_axis(), budget) {
                Ok(shape) => shape,
                Err(err) => {
                    log::warn!("brick cache rebuild failed, keeping the previous cache: {err}");
                    return Err(err);
                }
            };

        let layout = SlotLayout {
            grid,
            brick_size,
            padding: bricking.brick_padding,
            packing_shape,
        };
        let slot_size = layout.slot_size();
        let brick_volume_size = packing_shape * slot_size;
        let cache = layout.pack(volume, &active);

        let mut index = vec![BrickIndexEntry::INACTIVE; total_bricks];
        let cache_extent = brick_volume_size.as_vec3();
        for (slot, &brick) in active.iter().enumerate() {
            let origin = region_coord(slot, packing_shape) * slot_size;
            index[brick] = BrickIndexEntry::active(origin.as_vec3() / cache_extent);
        }

        if let Some((grid, ranges)) = fresh {
            self.commit_summary(volume, brick_size, grid, ranges);
        }
        let active_bricks = active.len();
        self.snapshot = Arc::new(BrickSnapshot {
            bricked: true,
            brick_size,
            brick_padding: bricking.brick_padding,
            index_volume_size: grid,
            packing_shape,
            slot_size,
            brick_volume_size,
            cache,
            index,
            active_bricks,
        });

        log::info!(
            "brick cache: {}/{} bricks active, packed {}x{}x{} slots ({}x{}x{} voxels) in {:.2?}",
            active_bricks,
            total_bricks,
            packing_shape.x,
            packing_shape.y,
            packing_shape.z,
            brick_volume_size.x,
            brick_volume_size.y,
            brick_volume_size.z,
            start.elapsed()
        );
        Ok(())
    }

    /// Normalized cache offset of a logical brick, or `None` when the brick is not resident or
    /// lies outside the index volume.
    #[must_use]
    pub fn lookup_brick(&self, brick: UVec3) -> Option<Vec3> {
        self.snapshot.entry(brick).and_then(BrickIndexEntry::offset)
    }

    /// The currently published cache.
    #[must_use]
    pub fn snapshot(&self) -> Arc<BrickSnapshot> {
        Arc::clone(&self.snapshot)
    }

    #[must_use]
    pub fn brick_size(&self) -> u32 {
        self.brick_size
    }

    /// Logical bricks per axis, `ceil(volume_dims / brick_size)`; zero while bricking is off.
    #[must_use]
    pub fn index_volume_size(&self) -> UVec3 {
        self.index_volume_size
    }

    /// Per-brick value ranges in x-fastest brick order; empty while bricking is off.
    #[must_use]
    pub fn min_max(&self) -> &[ValueRange] {
        &self.min_max
    }

    /// Per-brick value ranges as raw bytes for upload.
    #[must_use]
    pub fn min_max_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.min_max.as_slice())
    }
}

/// Per-brick value ranges and the brick grid for `brick_size`.
fn summarize_bricks(volume: &DenseVolume, brick_size: u32) -> Result<(UVec3, Vec<ValueRange>)> {
    if brick_size == 0 {
        return Err(VolvisError::InvalidBrickSize(brick_size));
    }
    let start = Instant::now();
    let grid = grid_dims(volume.dims(), brick_size);
    let ranges = summarize_regions(volume, brick_size, 0, 0);
    log::debug!(
        "brick min/max for {} bricks of size {} computed in {:.2?}",
        ranges.len(),
        brick_size,
        start.elapsed()
    );
    Ok((grid, ranges))
}

/// Where bricks come from in the volume and where their slots sit in the cache.
struct SlotLayout {
    grid: UVec3,
    brick_size: u32,
    padding: u32,
    packing_shape: UVec3,
}

impl SlotLayout {
    fn slot_size(&self) -> u32 {
        self.brick_size + 2 * self.padding
    }

    /// Copies every active brick plus its halo into consecutive slots.
    ///
    /// Halo voxels outside the volume are mirrored back into it.
    #[allow(clippy::cast_possible_wrap)]
    fn pack(&self, volume: &DenseVolume, active: &[usize]) -> Vec<f32> {
        let slot_size = self.slot_size();
        let packing_shape = self.packing_shape;
        let size = packing_shape * slot_size;
        let slice_len = size.x as usize * size.y as usize;
        let mut cache = vec![0.0_f32; slice_len * size.z as usize];
        let brick_size = self.brick_size as i32;
        let padding = self.padding as i32;

        cache
            .par_chunks_mut(slice_len)
            .enumerate()
            .for_each(|(z, slice)| {
                #[allow(clippy::cast_possible_truncation)]
                let z = z as u32;
                let slot_z = z / slot_size;
                let local_z = (z % slot_size) as i32;
                for slot_y in 0..packing_shape.y {
                    for slot_x in 0..packing_shape.x {
                        let slot = region_index(UVec3::new(slot_x, slot_y, slot_z), packing_shape);
                        let Some(&brick) = active.get(slot) else {
                            continue;
                        };
                        let origin = region_coord(brick, self.grid).as_ivec3() * brick_size
                            - IVec3::splat(padding);
                        for local_y in 0..slot_size {
                            let row = (slot_y * slot_size + local_y) as usize * size.x as usize;
                            for local_x in 0..slot_size {
                                let v = volume.voxel(
                                    origin.x + local_x as i32,
                                    origin.y + local_y as i32,
                                    origin.z + local_z,
                                );
                                slice[row + (slot_x * slot_size + local_x) as usize] = v;
                            }
                        }
                    }
                }
            });
        cache
    }
}
