//! Seam between the caching layer and a graphics API.
//!
//! A backend only ever sees flat arrays: the packed brick cache, the redirection index, the
//! per-brick value ranges, the block list and the opacity prefix sums. Texture creation, shader
//! bindings and draw calls live entirely on the other side of [`RenderBackend`].

use glam::UVec3;
use volvis_core::{OpacitySumTable, Result};

use crate::block_table::Block;
use crate::brick_cache::{BrickIndexEntry, BrickIndexCache, BrickSnapshot};
use crate::value_range::ValueRange;

/// Borrowed view of the current brick cache in upload-ready form.
#[derive(Debug, Clone, Copy)]
pub struct BackendVolume<'a> {
    /// Whether `index` redirects into `cache`; false means `cache` is the whole volume.
    pub bricked: bool,
    /// Extent of `cache`, x fastest.
    pub cache_size: UVec3,
    /// Packed voxel values.
    pub cache: &'a [f32],
    /// Extent of `index`, one entry per logical brick.
    pub index_size: UVec3,
    /// Redirection entries with offsets normalized to `[0, 1)`.
    pub index: &'a [BrickIndexEntry],
    /// Per-brick value ranges in the same layout as `index`; empty when not bricked.
    pub min_max: &'a [ValueRange],
}

impl<'a> BackendVolume<'a> {
    /// Views `snapshot` together with the value ranges held by `cache`.
    #[must_use]
    pub fn new(cache: &'a BrickIndexCache, snapshot: &'a BrickSnapshot) -> Self {
        Self {
            bricked: snapshot.bricked,
            cache_size: snapshot.brick_volume_size,
            cache: &snapshot.cache,
            index_size: snapshot.index_volume_size,
            index: &snapshot.index,
            min_max: cache.min_max(),
        }
    }

    #[must_use]
    pub fn cache_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.cache)
    }

    #[must_use]
    pub fn index_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.index)
    }

    #[must_use]
    pub fn min_max_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.min_max)
    }
}

/// Receives the arrays a GPU ray caster needs.
pub trait RenderBackend {
    /// Replaces the volume textures.
    fn upload_volume(&mut self, volume: &BackendVolume<'_>) -> Result<()>;

    /// Replaces the block list used for empty-space skipping.
    fn upload_blocks(&mut self, blocks: &[Block]) -> Result<()>;

    /// Replaces the opacity prefix sums.
    fn upload_opacity_table(&mut self, table: &OpacitySumTable) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_table::BlockTable;
    use volvis_core::{RenderConfig, TransferFunction, Vec4};
    use volvis_volume::DenseVolume;

    #[derive(Default)]
    struct Recorder {
        volume_bytes: usize,
        index_entries: usize,
        blocks: usize,
        table_last: f32,
    }

    impl RenderBackend for Recorder {
        fn upload_volume(&mut self, volume: &BackendVolume<'_>) -> Result<()> {
            self.volume_bytes = volume.cache_bytes().len();
            self.index_entries = volume.index.len();
            Ok(())
        }

        fn upload_blocks(&mut self, blocks: &[Block]) -> Result<()> {
            self.blocks = blocks.len();
            Ok(())
        }

        fn upload_opacity_table(&mut self, table: &OpacitySumTable) -> Result<()> {
            self.table_last = table.as_slice()[255];
            Ok(())
        }
    }

    #[test]
    fn test_backend_receives_bricked_arrays() {
        let volume = DenseVolume::filled(UVec3::splat(4), 10.0).unwrap();
        let config = RenderConfig::default()
            .with_bricking(true, 2)
            .with_brick_padding(0)
            .with_transfer_function(TransferFunction::isolated(10, Vec4::ONE));
        let table = config.transfer_function.opacity_sum_table();
        let mut cache = BrickIndexCache::new();
        cache.rebuild_cache(&volume, &config, &table).unwrap();
        let snapshot = cache.snapshot();
        let view = BackendVolume::new(&cache, &snapshot);

        assert!(view.bricked);
        assert_eq!(view.index_size, UVec3::splat(2));
        assert_eq!(view.index_bytes().len(), 8 * 16);
        assert_eq!(view.min_max_bytes().len(), 8 * 8);

        let blocks = BlockTable::compute_blocks(&volume, 2).unwrap();
        let mut backend = Recorder::default();
        backend.upload_volume(&view).unwrap();
        backend.upload_blocks(blocks.blocks()).unwrap();
        backend.upload_opacity_table(&table).unwrap();
        assert_eq!(backend.volume_bytes, 64 * 4);
        assert_eq!(backend.index_entries, 8);
        assert_eq!(backend.blocks, 8);
        assert_eq!(backend.table_last, 1.0);
    }

    #[test]
    fn test_unbricked_view_is_whole_volume() {
        let volume = DenseVolume::filled(UVec3::new(3, 2, 5), 1.0).unwrap();
        let config = RenderConfig::default();
        let mut cache = BrickIndexCache::new();
        cache
            .rebuild_cache(&volume, &config, &config.transfer_function.opacity_sum_table())
            .unwrap();
        let snapshot = cache.snapshot();
        let view = BackendVolume::new(&cache, &snapshot);
        assert!(!view.bricked);
        assert_eq!(view.cache_size, UVec3::new(3, 2, 5));
        assert_eq!(view.cache.len(), 30);
        assert_eq!(view.index_size, UVec3::ONE);
        assert_eq!(view.index.len(), 1);
        assert!(!view.index[0].is_active());
        assert!(view.min_max.is_empty());
    }

    #[test]
    fn test_unbricking_clears_previous_summary() {
        let volume = DenseVolume::filled(UVec3::splat(4), 10.0).unwrap();
        let mut config = RenderConfig::default().with_bricking(true, 2);
        let table = config.transfer_function.opacity_sum_table();
        let mut cache = BrickIndexCache::new();
        cache.rebuild_cache(&volume, &config, &table).unwrap();
        assert_eq!(cache.min_max().len(), 8);

        config.bricking.use_bricking = false;
        cache.rebuild_cache(&volume, &config, &table).unwrap();
        let snapshot = cache.snapshot();
        let view = BackendVolume::new(&cache, &snapshot);
        assert_eq!(view.index_size, UVec3::ONE);
        assert!(view.min_max.is_empty());
        assert_eq!(cache.index_volume_size(), UVec3::ZERO);
    }
}
