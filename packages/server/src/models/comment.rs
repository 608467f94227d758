use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::comment;
use crate::error::AppError;
use crate::models::shared::{Pagination, validate_content};
use crate::models::user::UserResponse;

/// Maximum comment length in Unicode characters.
pub const MAX_COMMENT_CONTENT: usize = 1000;

/// Request body for creating or updating a comment.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CommentRequest {
    /// Comment body (non-blank, up to 1000 characters).
    #[schema(example = "Lovely shot!")]
    pub content: String,
}

pub fn validate_comment_request(payload: &CommentRequest) -> Result<(), AppError> {
    validate_content(&payload.content, MAX_COMMENT_CONTENT)
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CommentResponse {
    #[schema(example = 11)]
    pub id: i32,
    pub content: String,
    #[schema(example = 7)]
    pub post_id: i32,
    pub user: UserResponse,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommentResponse {
    pub fn new(comment: comment::Model, author: UserResponse) -> Self {
        Self {
            id: comment.id,
            content: comment.content,
            post_id: comment.post_id,
            user: author,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

/// Paginated list of comments, oldest first.
#[derive(Serialize, utoipa::ToSchema)]
pub struct CommentListResponse {
    pub data: Vec<CommentResponse>,
    pub pagination: Pagination,
}
