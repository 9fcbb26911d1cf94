//! Error types for image access and digest verification

use thiserror::Error;

/// Result type alias for image reader operations
pub type ImageResult<T> = Result<T, ImageError>;

/// Result type alias for verification runs
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Errors raised by [`crate::reader::ImageReader`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    /// The path given to `open` does not exist
    #[error("File not found: {0}")]
    FileNotFound(String),
    /// Bad, missing or zero segments, or the container refused to open
    #[error("Failed to open image: {0}")]
    OpenFailure(String),
    /// Operation requires an open image
    #[error("No image is open")]
    NotOpen,
    /// The container failed to deliver media bytes
    #[error("Read failed: {0}")]
    ReadFailure(String),
}

/// Errors raised by [`crate::engine::DigestEngine`] and its worker
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("No image is open")]
    NotOpen,
    /// A digest context could not be created
    #[error("Failed to initialise {algorithm} context: {message}")]
    HashInitFailure { algorithm: String, message: String },
    #[error("Read failed after {bytes_processed} bytes: {message}")]
    ReadFailure { bytes_processed: u64, message: String },
    #[error("A verification run is already in progress")]
    AlreadyRunning,
    #[error("Failed to start verification worker: {0}")]
    Spawn(String),
    #[error("Verification worker panicked")]
    WorkerPanicked,
    #[error(transparent)]
    Image(#[from] ImageError),
}
