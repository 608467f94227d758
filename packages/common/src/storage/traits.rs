use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::error::StorageError;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Metadata of an image that has been written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Generated, collision-free name (`{uuid}.{ext}`).
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

/// Storage for user-uploaded profile images.
///
/// Names handed out by [`ImageStore::put`] are flat (no directory part) and
/// are the only names accepted back by the other methods.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Validate and persist an upload.
    ///
    /// `original_name` only contributes its extension. `content_type` falls back
    /// to a guess from the original name when the client did not send one.
    async fn put(
        &self,
        original_name: Option<&str>,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Result<StoredImage, StorageError>;

    /// Open a stored image for streaming.
    async fn get_stream(&self, filename: &str) -> Result<BoxReader, StorageError>;

    /// Delete a stored image.
    ///
    /// Returns `true` if the file was deleted, `false` if it did not exist.
    async fn delete(&self, filename: &str) -> Result<bool, StorageError>;

    /// Size of a stored image in bytes.
    async fn size(&self, filename: &str) -> Result<u64, StorageError>;
}
