//! Error types for volvis-rs.

use thiserror::Error;

/// The main error type for volvis-rs operations.
#[derive(Error, Debug)]
pub enum VolvisError {
    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Volume dimensions are zero or overflow the addressable size.
    #[error("invalid volume dimensions {x}x{y}x{z}")]
    InvalidDimensions { x: u32, y: u32, z: u32 },

    /// The file extension is not a known volume format.
    #[error("unsupported volume format '{0}'")]
    UnsupportedFormat(String),

    /// The volume header could not be parsed.
    #[error("malformed volume header: {0}")]
    MalformedHeader(String),

    /// Brick size must be at least one voxel.
    #[error("invalid brick size {0}")]
    InvalidBrickSize(u32),

    /// Block size must be at least one voxel.
    #[error("invalid block size {0}")]
    InvalidBlockSize(u32),

    /// A raw interpolation mode index that does not name a known mode.
    #[error("invalid interpolation mode index {0}")]
    InvalidInterpolationMode(u32),

    /// Transfer function table does not have the expected shape.
    #[error("invalid transfer function: {0}")]
    InvalidTransferFunction(String),

    /// A render configuration value is out of range.
    #[error("invalid render configuration: {0}")]
    InvalidConfig(String),

    /// The active bricks do not fit into the maximum cache texture.
    #[error(
        "cannot pack {active_bricks} bricks into a cache of at most {max_per_axis} bricks per axis; \
         reduce brick size or use fewer active bricks"
    )]
    PackingFailed {
        active_bricks: usize,
        max_per_axis: u32,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for volvis-rs operations.
pub type Result<T> = std::result::Result<T, VolvisError>;
