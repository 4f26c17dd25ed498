//! Core types for volvis-rs.
//!
//! This crate provides the value types shared by every other volvis crate:
//! - [`VolvisError`] and the crate-wide [`Result`] alias
//! - [`RenderConfig`] and its nested bricking / skipping configuration
//! - [`TransferFunction`] and the [`OpacitySumTable`] used for activity queries

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Config structs legitimately have many boolean flags
#![allow(clippy::struct_excessive_bools)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod error;
pub mod options;
pub mod transfer_function;

pub use error::{Result, VolvisError};
pub use options::{
    BoundaryParams, BrickingConfig, InterpolationMode, PhongParams, RenderConfig, RenderMode,
    SkippingConfig,
};
pub use transfer_function::{ColorMap, IndexMapping, OpacitySumTable, TransferFunction, TF_SIZE};

// Re-export glam types for convenience
pub use glam::{IVec3, UVec3, Vec2, Vec3, Vec4};
