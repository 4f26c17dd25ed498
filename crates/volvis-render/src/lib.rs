//! Spatial acceleration and ray casting for volvis-rs.
//!
//! This crate provides:
//! - Per-region value ranges and the activity test shared by bricks and blocks
//! - The brick index cache with its packed cache array and redirection index
//! - The block activity table used for empty-space skipping
//! - A CPU ray caster over reference and bricked volume sources
//! - The backend trait a GPU renderer implements, and image output

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::similar_names)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod block_table;
pub mod brick_cache;
pub mod camera;
pub mod error;
pub mod image_output;
pub mod packing;
pub mod ray_caster;
pub mod source;
pub mod value_range;

pub use backend::{BackendVolume, RenderBackend};
pub use block_table::{Block, BlockTable};
pub use brick_cache::{BrickIndexCache, BrickIndexEntry, BrickSnapshot};
pub use camera::{Camera, ProjectionMode, Ray};
pub use error::ImageError;
pub use image_output::RenderedImage;
pub use packing::find_optimal_dimensions;
pub use ray_caster::{RayCaster, BISECTION_ITERATIONS, EARLY_TERMINATION_ALPHA};
pub use source::{BrickedSource, ReferenceSource, VolumeSource};
pub use value_range::{ActivityCriterion, ValueRange};
