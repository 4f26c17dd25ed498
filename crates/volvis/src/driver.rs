//! Orchestration: owns the volume, its derived structures and the render configuration.

use std::path::Path;
use std::time::Instant;

use volvis_core::{InterpolationMode, OpacitySumTable, RenderConfig, Result};
use volvis_render::{
    BackendVolume, BlockTable, BrickIndexCache, BrickedSource, Camera, RayCaster,
    ReferenceSource, RenderBackend, RenderedImage, VolumeSource,
};
use volvis_volume::{load_volume, DenseVolume, GradientVolume, GradientVoxel};

use glam::{UVec3, Vec3};

/// How much of a structure a configuration change rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RebuildKind {
    /// Left as is.
    #[default]
    Untouched,
    /// Activity re-evaluated against the new configuration (bricks are also repacked).
    Activity,
    /// Value ranges recomputed from the volume, then activity.
    Full,
}

/// What a call to [`RenderDriver::set_config`] or [`RenderDriver::set_volume`] rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RebuildReport {
    /// The opacity prefix sums were recomputed.
    pub opacity_table: bool,
    pub bricks: RebuildKind,
    pub blocks: RebuildKind,
}

impl RebuildReport {
    fn full() -> Self {
        Self {
            opacity_table: true,
            bricks: RebuildKind::Full,
            blocks: RebuildKind::Full,
        }
    }

    /// Whether nothing was rebuilt.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Owns a loaded volume together with everything derived from it, and renders frames.
///
/// Configuration is replaced as a whole through [`Self::set_config`], which runs exactly the
/// rebuilds the change requires before the next frame.
pub struct RenderDriver {
    volume: DenseVolume,
    gradients: GradientVolume,
    config: RenderConfig,
    opacity_table: OpacitySumTable,
    bricks: BrickIndexCache,
    blocks: BlockTable,
}

impl RenderDriver {
    /// Builds the gradient field, brick cache and block table for `volume`.
    pub fn new(volume: DenseVolume, config: RenderConfig) -> Result<Self> {
        config.validate()?;
        let start = Instant::now();
        let gradients = GradientVolume::build(&volume);
        let opacity_table = config.transfer_function.opacity_sum_table();
        let bricks = build_bricks(&volume, &config, &opacity_table)?;
        let blocks = build_blocks(&volume, &config, &opacity_table)?;
        let dims = volume.dims();
        log::info!(
            "volume '{}' ({}x{}x{}) ready in {:.2?}",
            volume.name(),
            dims.x,
            dims.y,
            dims.z,
            start.elapsed()
        );
        Ok(Self {
            volume,
            gradients,
            config,
            opacity_table,
            bricks,
            blocks,
        })
    }

    /// Loads a `.fld` or `.dat` file and prepares it for rendering.
    pub fn from_file(path: impl AsRef<Path>, config: RenderConfig) -> Result<Self> {
        let volume = load_volume(path)?;
        Self::new(volume, config)
    }

    /// Replaces the volume and rebuilds everything derived from it.
    ///
    /// On error the previous volume stays loaded.
    pub fn set_volume(&mut self, volume: DenseVolume) -> Result<RebuildReport> {
        let start = Instant::now();
        let bricks = build_bricks(&volume, &self.config, &self.opacity_table)?;
        let blocks = build_blocks(&volume, &self.config, &self.opacity_table)?;
        self.gradients = GradientVolume::build(&volume);
        self.volume = volume;
        self.bricks = bricks;
        self.blocks = blocks;
        log::info!(
            "switched to volume '{}' in {:.2?}",
            self.volume.name(),
            start.elapsed()
        );
        Ok(RebuildReport::full())
    }

    /// Applies a new configuration.
    ///
    /// - brick size or the bricking toggle: brick ranges recomputed and the cache repacked
    /// - other bricking parameters, transfer function, iso value or render mode: bricks
    ///   re-evaluated and repacked (only while bricking is on)
    /// - block size or the skipping toggle: block ranges recomputed
    /// - transfer function, iso value or render mode: block activity re-evaluated (only while
    ///   skipping is on)
    ///
    /// On error, including a brick packing failure, the previous configuration and caches
    /// stay in place.
    pub fn set_config(&mut self, config: RenderConfig) -> Result<RebuildReport> {
        config.validate()?;
        let start = Instant::now();
        let old = &self.config;
        let mut report = RebuildReport::default();

        let tf_changed = old.transfer_function != config.transfer_function;
        let activity_changed = tf_changed
            || old.iso_value != config.iso_value
            || old.render_mode != config.render_mode;
        let bricks_structural = old.bricking.use_bricking != config.bricking.use_bricking
            || old.bricking.brick_size != config.bricking.brick_size;
        let packing_changed = old.bricking != config.bricking;
        let blocks_structural = old.skipping != config.skipping;

        let opacity_table = if tf_changed {
            report.opacity_table = true;
            config.transfer_function.opacity_sum_table()
        } else {
            self.opacity_table.clone()
        };

        let bricks = if bricks_structural {
            report.bricks = RebuildKind::Full;
            Some(build_bricks(&self.volume, &config, &opacity_table)?)
        } else if config.bricking.use_bricking && (activity_changed || packing_changed) {
            report.bricks = RebuildKind::Activity;
            let mut bricks = self.bricks.clone();
            bricks.rebuild_cache(&self.volume, &config, &opacity_table)?;
            Some(bricks)
        } else {
            None
        };

        let blocks = if blocks_structural {
            report.blocks = RebuildKind::Full;
            Some(build_blocks(&self.volume, &config, &opacity_table)?)
        } else if config.skipping.use_empty_space_skipping && activity_changed {
            report.blocks = RebuildKind::Activity;
            let mut blocks = self.blocks.clone();
            blocks.update_activity(&config, &opacity_table);
            Some(blocks)
        } else {
            None
        };

        if let Some(bricks) = bricks {
            self.bricks = bricks;
        }
        if let Some(blocks) = blocks {
            self.blocks = blocks;
        }
        self.opacity_table = opacity_table;
        self.config = config;

        if !report.is_empty() {
            log::info!("configuration applied ({report:?}) in {:.2?}", start.elapsed());
        }
        Ok(report)
    }

    /// Renders one frame with the current configuration.
    ///
    /// Samples come from the packed brick cache when bricking is on and from the dense volume
    /// otherwise.
    pub fn render(&self, camera: &Camera, width: u32, height: u32) -> RenderedImage {
        if self.config.bricking.use_bricking {
            let source =
                BrickedSource::new(&self.bricks, &self.volume, self.gradients.max_magnitude());
            self.cast(&source, camera, width, height)
        } else {
            let source = ReferenceSource::new(&self.volume, &self.gradients);
            self.cast(&source, camera, width, height)
        }
    }

    fn cast<S: VolumeSource>(
        &self,
        source: &S,
        camera: &Camera,
        width: u32,
        height: u32,
    ) -> RenderedImage {
        RayCaster::new(source, &self.config)
            .with_blocks(&self.blocks)
            .render(camera, width, height)
    }

    /// Pushes the current cache, blocks and opacity table to a GPU backend.
    pub fn sync_backend(&self, backend: &mut dyn RenderBackend) -> Result<()> {
        let snapshot = self.bricks.snapshot();
        backend.upload_volume(&BackendVolume::new(&self.bricks, &snapshot))?;
        backend.upload_blocks(self.blocks.blocks())?;
        backend.upload_opacity_table(&self.opacity_table)?;
        log::debug!(
            "backend synced: {} cache voxels, {} blocks",
            snapshot.cache.len(),
            self.blocks.blocks().len()
        );
        Ok(())
    }

    pub fn sample_gradient(&self, coord: Vec3, mode: InterpolationMode) -> GradientVoxel {
        self.gradients.sample(coord, mode)
    }

    pub fn sample_volume(&self, coord: Vec3, mode: InterpolationMode) -> f32 {
        self.volume.sample(coord, mode)
    }

    /// Normalized cache offset of a resident brick.
    pub fn lookup_brick(&self, brick: UVec3) -> Option<Vec3> {
        self.bricks.lookup_brick(brick)
    }

    pub fn is_block_active(&self, index: usize) -> bool {
        self.blocks.is_block_active(index)
    }

    pub fn volume(&self) -> &DenseVolume {
        &self.volume
    }

    pub fn gradients(&self) -> &GradientVolume {
        &self.gradients
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn opacity_table(&self) -> &OpacitySumTable {
        &self.opacity_table
    }

    pub fn bricks(&self) -> &BrickIndexCache {
        &self.bricks
    }

    pub fn blocks(&self) -> &BlockTable {
        &self.blocks
    }
}

fn build_bricks(
    volume: &DenseVolume,
    config: &RenderConfig,
    table: &OpacitySumTable,
) -> Result<BrickIndexCache> {
    let mut bricks = BrickIndexCache::new();
    bricks.rebuild_cache(volume, config, table)?;
    Ok(bricks)
}

fn build_blocks(
    volume: &DenseVolume,
    config: &RenderConfig,
    table: &OpacitySumTable,
) -> Result<BlockTable> {
    let mut blocks = if config.skipping.use_empty_space_skipping {
        BlockTable::compute_blocks(volume, config.skipping.block_size)?
    } else {
        BlockTable::single(volume)
    };
    blocks.update_activity(config, table);
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use volvis_core::{RenderMode, TransferFunction, Vec4};
    use volvis_volume::Phantom;

    fn sphere_driver(config: RenderConfig) -> RenderDriver {
        let volume = Phantom::Sphere.generate(UVec3::splat(16), 255.0).unwrap();
        RenderDriver::new(volume, config).unwrap()
    }

    #[test]
    fn test_unchanged_config_rebuilds_nothing() {
        let mut driver = sphere_driver(RenderConfig::default());
        let report = driver.set_config(driver.config().clone()).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_step_size_change_rebuilds_nothing() {
        let mut driver = sphere_driver(RenderConfig::default().with_bricking(true, 4));
        let report = driver
            .set_config(driver.config().clone().with_step_size(0.5))
            .unwrap();
        assert!(report.is_empty());
        assert_eq!(driver.config().step_size, 0.5);
    }

    #[test]
    fn test_invalid_config_is_rejected_without_changes() {
        let mut driver = sphere_driver(RenderConfig::default());
        let before = driver.config().clone();
        assert!(driver.set_config(before.clone().with_step_size(-1.0)).is_err());
        assert_eq!(driver.config(), &before);
    }

    #[test]
    fn test_rebuild_report_default_is_empty() {
        assert!(RebuildReport::default().is_empty());
        assert!(!RebuildReport::full().is_empty());
    }

    #[test]
    fn test_iso_change_with_skipping_only_touches_activity() {
        let config = RenderConfig::default()
            .with_render_mode(RenderMode::Isosurface)
            .with_skipping(true, 4);
        let mut driver = sphere_driver(config);
        let report = driver
            .set_config(driver.config().clone().with_iso_value(250.0))
            .unwrap();
        assert_eq!(report.blocks, RebuildKind::Activity);
        assert_eq!(report.bricks, RebuildKind::Untouched);
        assert!(!report.opacity_table);
    }

    #[test]
    fn test_tf_change_updates_opacity_table() {
        let mut driver = sphere_driver(RenderConfig::default());
        let tf = TransferFunction::isolated(42, Vec4::ONE);
        let report = driver
            .set_config(driver.config().clone().with_transfer_function(tf))
            .unwrap();
        assert!(report.opacity_table);
        assert_eq!(driver.opacity_table().range_opacity(42, 42), 1.0);
        assert_eq!(driver.opacity_table().range_opacity(0, 41), 0.0);
    }
}
