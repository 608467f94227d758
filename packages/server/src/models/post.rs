use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::post;
use crate::error::AppError;
use crate::models::shared::{Pagination, validate_content};
use crate::models::user::UserResponse;

/// Maximum post length in Unicode characters.
pub const MAX_POST_CONTENT: usize = 2200;

/// Request body for creating or updating a post.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct PostRequest {
    /// Post body (non-blank, up to 2200 characters).
    #[schema(example = "First light over the harbour this morning.")]
    pub content: String,
}

pub fn validate_post_request(payload: &PostRequest) -> Result<(), AppError> {
    validate_content(&payload.content, MAX_POST_CONTENT)
}

/// A post with its author and engagement aggregates.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PostResponse {
    #[schema(example = 7)]
    pub id: i32,
    pub content: String,
    pub user: UserResponse,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[schema(example = 3)]
    pub like_count: u64,
    /// Whether the caller likes this post.
    pub is_liked: bool,
    #[schema(example = 2)]
    pub comment_count: u64,
}

impl PostResponse {
    pub fn new(
        post: post::Model,
        author: UserResponse,
        like_count: u64,
        is_liked: bool,
        comment_count: u64,
    ) -> Self {
        Self {
            id: post.id,
            content: post.content,
            user: author,
            created_at: post.created_at,
            updated_at: post.updated_at,
            like_count,
            is_liked,
            comment_count,
        }
    }
}

/// Paginated list of posts, newest first.
#[derive(Serialize, utoipa::ToSchema)]
pub struct PostListResponse {
    pub data: Vec<PostResponse>,
    pub pagination: Pagination,
}

/// State of the caller's like on a post after a toggle.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LikeResponse {
    /// Whether the caller likes the post after the toggle.
    pub is_liked: bool,
    #[schema(example = 4)]
    pub like_count: u64,
}
