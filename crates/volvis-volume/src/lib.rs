//! Scalar volumes and the data derived from them.
//!
//! - [`DenseVolume`]: the immutable scalar field with interpolated sampling
//! - [`GradientVolume`]: per-voxel central-difference gradients
//! - [`load_volume`]: `.fld` / `.dat` import
//! - [`Phantom`]: synthetic volumes

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::similar_names)]

pub mod gradient;
pub mod histogram;
pub mod interpolation;
pub mod loader;
pub mod phantom;
pub mod volume;

pub use gradient::{GradientVolume, GradientVoxel};
pub use histogram::{Histogram, DEFAULT_BUCKET_COUNT};
pub use interpolation::{cubic_interpolate, linear_interpolate, reflect_index};
pub use loader::{load_volume, read_volume, VolumeFormat, VolumeHeader};
pub use phantom::Phantom;
pub use volume::DenseVolume;
