use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::BufReader;
use uuid::Uuid;

use super::error::StorageError;
use super::traits::{BoxReader, ImageStore, StoredImage};

/// Filesystem-backed image store.
///
/// Every image lives directly under `base_path` as `{uuid}.{ext}`. Writes go
/// through `{base_path}/.tmp` and are renamed into place, so a reader never
/// observes a partially written file.
pub struct FilesystemImageStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemImageStore {
    /// Create a new store, creating the directory if it does not exist yet.
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            max_size,
        })
    }

    fn image_path(&self, filename: &str) -> Result<PathBuf, StorageError> {
        validate_stored_name(filename)?;
        Ok(self.base_path.join(filename))
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path.join(".tmp").join(Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl ImageStore for FilesystemImageStore {
    async fn put(
        &self,
        original_name: Option<&str>,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Result<StoredImage, StorageError> {
        if data.is_empty() {
            return Err(StorageError::Empty);
        }

        let content_type = resolve_content_type(original_name, content_type);
        if !is_raster_image(&content_type) {
            return Err(StorageError::UnsupportedType(content_type));
        }

        let size = data.len() as u64;
        if size > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: size,
                limit: self.max_size,
            });
        }

        let filename = match image_extension(original_name, &content_type) {
            Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        };

        // The directory may have been removed since startup.
        fs::create_dir_all(self.base_path.join(".tmp")).await?;

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        let image_path = self.base_path.join(&filename);
        if let Err(e) = fs::rename(&temp_path, &image_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!(%filename, size, "Stored profile image");

        Ok(StoredImage {
            filename,
            content_type,
            size,
        })
    }

    async fn get_stream(&self, filename: &str) -> Result<BoxReader, StorageError> {
        let path = self.image_path(filename)?;
        match fs::File::open(&path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, filename: &str) -> Result<bool, StorageError> {
        let path = self.image_path(filename)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn size(&self, filename: &str) -> Result<u64, StorageError> {
        let path = self.image_path(filename)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Content type essence as sent by the client, or guessed from the original
/// filename.
fn resolve_content_type(original_name: Option<&str>, content_type: Option<&str>) -> String {
    let essence = content_type.and_then(|ct| ct.split(';').next()).map(str::trim);
    match essence {
        Some(ct) if !ct.is_empty() => ct.to_ascii_lowercase(),
        _ => original_name
            .and_then(|name| mime_guess::from_path(name).first())
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    }
}

/// SVG is scriptable when opened directly, so only raster types are stored.
fn is_raster_image(content_type: &str) -> bool {
    content_type.starts_with("image/") && content_type != "image/svg+xml"
}

/// Extension for the stored file. The original one survives only if it maps
/// back to the validated content type; otherwise the canonical extension of
/// that type is used, so the name never implies a different type.
fn image_extension(original_name: Option<&str>, content_type: &str) -> Option<String> {
    let from_name = original_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| {
            mime_guess::from_ext(ext)
                .iter()
                .any(|m| m.essence_str() == content_type)
        });

    from_name.or_else(|| {
        mime_guess::get_mime_extensions_str(content_type)
            .and_then(|exts| exts.first())
            .map(|ext| ext.to_string())
    })
}

/// Stored names are flat: no separators, no traversal, no hidden files.
fn validate_stored_name(filename: &str) -> Result<(), StorageError> {
    let invalid = filename.is_empty()
        || filename.starts_with('.')
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains('\0')
        || filename.chars().any(|c| c.is_ascii_control());
    if invalid {
        return Err(StorageError::InvalidName(filename.to_string()));
    }
    Ok(())
}
