use thiserror::Error;

/// Errors that can occur while storing or serving images.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The upload contained no bytes.
    #[error("file is empty")]
    Empty,
    /// The upload is not an image.
    #[error("only image files are allowed (got {0})")]
    UnsupportedType(String),
    /// The upload exceeds the configured size limit.
    #[error("file exceeds size limit ({actual} > {limit} bytes)")]
    SizeLimitExceeded { actual: u64, limit: u64 },
    /// The stored filename is malformed or tries to escape the upload directory.
    #[error("invalid filename: {0}")]
    InvalidName(String),
    /// No file with this name exists.
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),
}
