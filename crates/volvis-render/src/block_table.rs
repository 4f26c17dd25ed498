//! Block activity table for empty-space skipping.

use std::time::Instant;

use glam::{UVec3, Vec3};
use rayon::prelude::*;
use volvis_core::{OpacitySumTable, RenderConfig, Result, VolvisError};
use volvis_volume::DenseVolume;

use crate::value_range::{
    grid_dims, region_coord, region_index, summarize_regions, ActivityCriterion, ValueRange,
};

/// Voxels below a block's origin that interpolation inside the block can read.
const FOOTPRINT_BELOW: u32 = 1;
/// Voxels past a block's far face that interpolation inside the block can read.
const FOOTPRINT_ABOVE: u32 = 2;

/// An axis-aligned block of the volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block {
    /// Voxel-space origin.
    pub position: Vec3,
    /// Value range over the block's sampling footprint.
    pub range: ValueRange,
    pub active: bool,
}

/// Per-block value ranges and activity flags covering the whole volume.
#[derive(Debug, Clone)]
pub struct BlockTable {
    block_size: u32,
    num_blocks: UVec3,
    blocks: Vec<Block>,
    always_active: bool,
}

impl BlockTable {
    /// Splits the volume into `block_size`-wide blocks and summarizes each one.
    ///
    /// A block's range also covers the one voxel below and the two voxels past its far face,
    /// which is every voxel a nearest, linear or cubic sample taken inside the block can touch.
    /// All blocks start out active.
    pub fn compute_blocks(volume: &DenseVolume, block_size: u32) -> Result<Self> {
        if block_size == 0 {
            return Err(VolvisError::InvalidBlockSize(block_size));
        }
        let start = Instant::now();
        let num_blocks = grid_dims(volume.dims(), block_size);
        let ranges = summarize_regions(volume, block_size, FOOTPRINT_BELOW, FOOTPRINT_ABOVE);
        let blocks = ranges
            .into_iter()
            .enumerate()
            .map(|(i, range)| Block {
                position: (region_coord(i, num_blocks) * block_size).as_vec3(),
                range,
                active: true,
            })
            .collect::<Vec<_>>();
        log::debug!(
            "{} blocks of size {} computed in {:.2?}",
            blocks.len(),
            block_size,
            start.elapsed()
        );
        Ok(Self {
            block_size,
            num_blocks,
            blocks,
            always_active: false,
        })
    }

    /// A single always-active block spanning the volume, used when skipping is off.
    #[must_use]
    pub fn single(volume: &DenseVolume) -> Self {
        let dims = volume.dims();
        Self {
            block_size: dims.max_element(),
            num_blocks: UVec3::ONE,
            blocks: vec![Block {
                position: Vec3::ZERO,
                range: ValueRange::new(volume.minimum().min(0.0), volume.maximum()),
                active: true,
            }],
            always_active: true,
        }
    }

    /// Evaluates `criterion` for every block.
    #[must_use]
    pub fn compute_activity(blocks: &[Block], criterion: &ActivityCriterion) -> Vec<bool> {
        blocks
            .par_iter()
            .map(|block| criterion.is_active(block.range))
            .collect()
    }

    /// Re-evaluates activity for the current render mode, transfer function and iso value.
    pub fn update_activity(&mut self, config: &RenderConfig, table: &OpacitySumTable) {
        if self.always_active {
            return;
        }
        let criterion = ActivityCriterion::from_config(config, table);
        let activity = Self::compute_activity(&self.blocks, &criterion);
        for (block, active) in self.blocks.iter_mut().zip(activity) {
            block.active = active;
        }
        log::debug!("{}/{} blocks active", self.active_count(), self.blocks.len());
    }

    /// Whether block `index` may contribute to the image. Out-of-range indices are inactive.
    #[must_use]
    pub fn is_block_active(&self, index: usize) -> bool {
        self.blocks.get(index).is_some_and(|b| b.active)
    }

    /// Index of the block containing a voxel-space position, if it is inside the grid.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn block_at(&self, position: Vec3) -> Option<usize> {
        if position.cmplt(Vec3::ZERO).any() {
            return None;
        }
        let coord = (position / self.block_size as f32).floor().as_uvec3();
        if coord.cmpge(self.num_blocks).any() {
            return None;
        }
        Some(region_index(coord, self.num_blocks))
    }

    #[must_use]
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Blocks per axis, `ceil(volume_dims / block_size)`.
    #[must_use]
    pub fn num_blocks(&self) -> UVec3 {
        self.num_blocks
    }

    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.active).count()
    }
}
