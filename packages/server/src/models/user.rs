use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::user::{self, AuthProvider};
use crate::error::AppError;
use crate::models::shared::{Pagination, double_option};

/// Public view of an account.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "jane_doe")]
    pub username: String,
    #[schema(example = "jane@example.com")]
    pub email: String,
    #[schema(example = "Jane Doe")]
    pub full_name: Option<String>,
    #[schema(example = "/api/v1/upload/profiles/0b9c3f5e-2a61-4c8e-9d0f-4f5e8a7b6c1d.png")]
    pub profile_image_url: Option<String>,
    pub bio: Option<String>,
    pub provider: AuthProvider,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            profile_image_url: u.profile_image_url,
            bio: u.bio,
            provider: u.provider,
            created_at: u.created_at,
        }
    }
}

/// Account view enriched with social-graph aggregates relative to the caller.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    /// Number of accounts following this user.
    #[schema(example = 12)]
    pub followers_count: u64,
    /// Number of accounts this user follows.
    #[schema(example = 8)]
    pub following_count: u64,
    /// Whether the caller follows this user.
    pub is_following: bool,
}

/// Paginated list of profiles (followers/following).
#[derive(Serialize, utoipa::ToSchema)]
pub struct ProfileListResponse {
    pub data: Vec<ProfileResponse>,
    pub pagination: Pagination,
}

/// Request body for profile updates (PATCH semantics: absent fields are kept,
/// `null` clears them).
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateProfileRequest {
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, example = "Jane Q. Doe")]
    pub full_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, example = "Coffee, code, cats.")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub profile_image_url: Option<Option<String>>,
}

pub fn validate_update_profile(payload: &UpdateProfileRequest) -> Result<(), AppError> {
    if let Some(Some(name)) = &payload.full_name
        && name.chars().count() > 100
    {
        return Err(AppError::Validation(
            "Full name must not exceed 100 characters".into(),
        ));
    }
    if let Some(Some(bio)) = &payload.bio
        && bio.chars().count() > 500
    {
        return Err(AppError::Validation(
            "Bio must not exceed 500 characters".into(),
        ));
    }
    if let Some(Some(url)) = &payload.profile_image_url
        && (url.trim().is_empty() || url.len() > 2048)
    {
        return Err(AppError::Validation(
            "Profile image URL must be 1-2048 characters".into(),
        ));
    }
    Ok(())
}

/// Number of posts authored by a user.
#[derive(Serialize, utoipa::ToSchema)]
pub struct PostCountResponse {
    #[schema(example = 42)]
    pub user_id: i32,
    #[schema(example = 17)]
    pub count: u64,
}
