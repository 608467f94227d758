use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use sea_orm::*;
use tokio_util::io::ReaderStream;
use tracing::instrument;

use crate::entity::profile_image;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::upload::UploadResponse;
use crate::state::AppState;

/// Room for multipart framing on top of the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn upload_body_limit(max_image_size: u64) -> DefaultBodyLimit {
    DefaultBodyLimit::max(max_image_size as usize + MULTIPART_OVERHEAD)
}

#[utoipa::path(
    post,
    path = "/profiles",
    tag = "Upload",
    operation_id = "uploadProfileImage",
    summary = "Upload a profile image",
    description = "Accepts a single `file` multipart field with an `image/*` content type (SVG excluded), up to 10 MB. \
        Returns the URL to store as `profile_image_url`. Only the uploader may use that URL for their profile.",
    request_body(content_type = "multipart/form-data", description = "Image file in the `file` field"),
    responses(
        (status = 201, description = "Image stored", body = UploadResponse),
        (status = 400, description = "Empty, non-image or oversized file (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user_id = auth_user.user_id()))]
pub async fn upload_profile_image(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let max_size = state.config.upload.max_size;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue; // Ignore unknown fields.
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?
        {
            data.extend_from_slice(&chunk);
            if data.len() as u64 > max_size {
                break;
            }
        }

        let stored = state
            .images
            .put(file_name.as_deref(), content_type.as_deref(), &data)
            .await?;

        let owner = profile_image::ActiveModel {
            filename: Set(stored.filename.clone()),
            user_id: Set(auth_user.user_id()),
            content_type: Set(stored.content_type.clone()),
            size: Set(stored.size as i64),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Err(e) = profile_image::Entity::insert(owner)
            .exec_without_returning(&state.db)
            .await
        {
            let _ = state.images.delete(&stored.filename).await;
            return Err(e.into());
        }

        tracing::info!(filename = %stored.filename, size = stored.size, "Profile image uploaded");

        return Ok((StatusCode::CREATED, Json(UploadResponse::from(stored))));
    }

    Err(AppError::Validation("Missing 'file' field".into()))
}

#[utoipa::path(
    get,
    path = "/profiles/{filename}",
    tag = "Upload",
    operation_id = "getProfileImage",
    summary = "Serve an uploaded profile image",
    params(("filename" = String, Path, description = "Stored filename")),
    responses(
        (status = 200, description = "Image content"),
        (status = 404, description = "Image not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_profile_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let size = state.images.size(&filename).await?;
    let reader = state.images.get_stream(&filename).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    // The type validated at upload time wins over the name.
    let content_type = match profile_image::Entity::find_by_id(filename.clone())
        .one(&state.db)
        .await?
    {
        Some(img) => img.content_type,
        None => mime_guess::from_path(&filename)
            .first()
            .map(|m| m.essence_str().to_string())
            .filter(|ct| ct.starts_with("image/") && ct != "image/svg+xml")
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, size.to_string())
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}
