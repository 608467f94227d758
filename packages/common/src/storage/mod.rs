mod error;
mod traits;

pub mod filesystem;

pub use error::StorageError;
pub use traits::{BoxReader, ImageStore, StoredImage};

/// Upper bound on a single profile image (10 MB).
pub const MAX_IMAGE_SIZE: u64 = 10 * 1024 * 1024;
