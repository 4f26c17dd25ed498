//! Error types for image output.

/// Error type for writing rendered images.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Failed to save image: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    EncodingError(#[from] image::ImageError),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid image data: expected {expected} pixels, got {actual}")]
    InvalidImageData { expected: usize, actual: usize },
}
