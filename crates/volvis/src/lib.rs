//! volvis-rs: a Rust-native volumetric data visualizer.
//!
//! Loads scalar scan data, derives its gradient field and renders it with a slicer, maximum
//! intensity projection, isosurface or compositing ray caster. Large volumes are split into
//! bricks; only bricks that can contribute to the image are packed into a compact cache, and
//! coarser blocks let the ray caster skip empty space.
//!
//! # Quick Start
//!
//! ```no_run
//! use volvis::*;
//!
//! fn main() -> Result<()> {
//!     init_logging();
//!
//!     let volume = Phantom::Sphere.generate(UVec3::splat(64), 255.0)?;
//!     let config = RenderConfig::new()
//!         .with_render_mode(RenderMode::Composite)
//!         .with_bricking(true, 16)
//!         .with_skipping(true, 8);
//!     let driver = RenderDriver::new(volume, config)?;
//!
//!     let camera = Camera::framing(driver.volume().dims().as_vec3(), 1.0);
//!     let image = driver.render(&camera, 256, 256);
//!     image.save_image("sphere.png").ok();
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`DenseVolume`] owns the scalar field; [`GradientVolume`] is derived from it once.
//! - [`BrickIndexCache`] packs active bricks and keeps the redirection index.
//! - [`BlockTable`] tracks which blocks empty-space skipping may jump over.
//! - [`RenderDriver`] owns the configuration, runs the rebuilds a configuration change needs
//!   and dispatches frames to the [`RayCaster`].

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

mod driver;

pub use driver::{RebuildKind, RebuildReport, RenderDriver};

pub use volvis_core::{
    BoundaryParams, BrickingConfig, ColorMap, IndexMapping, InterpolationMode, OpacitySumTable,
    PhongParams, RenderConfig, RenderMode, Result, SkippingConfig, TransferFunction, VolvisError,
    TF_SIZE,
};
pub use volvis_core::{IVec3, UVec3, Vec2, Vec3, Vec4};

pub use volvis_volume::{
    load_volume, read_volume, DenseVolume, GradientVolume, GradientVoxel, Histogram, Phantom,
    VolumeFormat, VolumeHeader,
};

pub use volvis_render::{
    find_optimal_dimensions, ActivityCriterion, BackendVolume, Block, BlockTable,
    BrickIndexCache, BrickIndexEntry, BrickSnapshot, BrickedSource, Camera, ImageError,
    ProjectionMode, Ray, RayCaster, ReferenceSource, RenderBackend, RenderedImage, ValueRange,
    VolumeSource,
};

/// Installs `env_logger` as the `log` backend. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::try_init();
}
