use common::storage::StoredImage;
use serde::Serialize;

/// Public path prefix uploaded profile images are served from.
pub const PROFILE_IMAGE_PREFIX: &str = "/api/v1/upload/profiles/";

/// Result of a successful profile image upload.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    /// Stable URL to store as `profile_image_url`.
    #[schema(example = "/api/v1/upload/profiles/0b9c3f5e-2a61-4c8e-9d0f-4f5e8a7b6c1d.png")]
    pub url: String,
    #[schema(example = "0b9c3f5e-2a61-4c8e-9d0f-4f5e8a7b6c1d.png")]
    pub filename: String,
    #[schema(example = "image/png")]
    pub content_type: String,
    #[schema(example = 52_311)]
    pub size: u64,
}

impl From<StoredImage> for UploadResponse {
    fn from(img: StoredImage) -> Self {
        Self {
            url: profile_image_url(&img.filename),
            filename: img.filename,
            content_type: img.content_type,
            size: img.size,
        }
    }
}

pub fn profile_image_url(filename: &str) -> String {
    format!("{PROFILE_IMAGE_PREFIX}{filename}")
}

/// Map a profile image URL back to the stored filename, if it points at a
/// locally uploaded image. External avatars (e.g. from OAuth2 providers)
/// yield `None`.
pub fn stored_filename(url: &str) -> Option<&str> {
    let path = url
        .split_once("://")
        .map(|(_, rest)| rest.find('/').map_or("", |i| &rest[i..]))
        .unwrap_or(url);
    path.strip_prefix(PROFILE_IMAGE_PREFIX)
        .filter(|name| !name.is_empty() && !name.contains('/'))
}
