use std::collections::{HashMap, HashSet};

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{comment, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::{AppJson, AppQuery};
use crate::handlers::post::find_post;
use crate::models::comment::{
    CommentListResponse, CommentRequest, CommentResponse, validate_comment_request,
};
use crate::models::shared::{PageQuery, Pagination};
use crate::models::user::UserResponse;
use crate::state::AppState;

async fn find_comment<C: ConnectionTrait>(
    db: &C,
    post_id: i32,
    comment_id: i32,
) -> Result<comment::Model, AppError> {
    comment::Entity::find_by_id(comment_id)
        .filter(comment::Column::PostId.eq(post_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".into()))
}

#[utoipa::path(
    get,
    path = "/{id}/comments",
    tag = "Comments",
    operation_id = "listComments",
    summary = "List comments on a post",
    description = "Oldest first.",
    params(("id" = i32, Path, description = "Post ID"), PageQuery),
    responses(
        (status = 200, description = "Comments", body = CommentListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user, query), fields(id))]
pub async fn list_comments(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<CommentListResponse>, AppError> {
    find_post(&state.db, id).await?;
    let page = query.params();

    let select = comment::Entity::find().filter(comment::Column::PostId.eq(id));
    let total = select.clone().count(&state.db).await?;

    let comments = select
        .order_by_asc(comment::Column::CreatedAt)
        .order_by_asc(comment::Column::Id)
        .offset(Some(page.offset()))
        .limit(Some(page.per_page))
        .all(&state.db)
        .await?;

    let author_ids: Vec<i32> = comments
        .iter()
        .map(|c| c.user_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let authors: HashMap<i32, user::Model> = user::Entity::find()
        .filter(user::Column::Id.is_in(author_ids))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let data = comments
        .into_iter()
        .map(|c| {
            let author = authors
                .get(&c.user_id)
                .cloned()
                .map(UserResponse::from)
                .ok_or_else(|| AppError::Internal(format!("Author of comment {} missing", c.id)))?;
            Ok(CommentResponse::new(c, author))
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(Json(CommentListResponse {
        data,
        pagination: Pagination::new(page, total),
    }))
}

#[utoipa::path(
    post,
    path = "/{id}/comments",
    tag = "Comments",
    operation_id = "createComment",
    summary = "Comment on a post",
    params(("id" = i32, Path, description = "Post ID")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn create_comment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<CommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_comment_request(&payload)?;
    find_post(&state.db, id).await?;

    let now = Utc::now();
    let new_comment = comment::ActiveModel {
        content: Set(payload.content),
        post_id: Set(id),
        user_id: Set(auth_user.user_id()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let model = new_comment.insert(&state.db).await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse::new(model, UserResponse::from(auth_user.user))),
    ))
}

#[utoipa::path(
    put,
    path = "/{id}/comments/{comment_id}",
    tag = "Comments",
    operation_id = "updateComment",
    summary = "Edit a comment",
    description = "Only the comment's author may edit it.",
    params(
        ("id" = i32, Path, description = "Post ID"),
        ("comment_id" = i32, Path, description = "Comment ID"),
    ),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = CommentResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the author (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Comment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id, comment_id))]
pub async fn update_comment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((id, comment_id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<CommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    validate_comment_request(&payload)?;

    let existing = find_comment(&state.db, id, comment_id).await?;
    auth_user.require_owner(existing.user_id)?;

    let mut active: comment::ActiveModel = existing.into();
    active.content = Set(payload.content);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&state.db).await?;

    Ok(Json(CommentResponse::new(
        updated,
        UserResponse::from(auth_user.user),
    )))
}

#[utoipa::path(
    delete,
    path = "/{id}/comments/{comment_id}",
    tag = "Comments",
    operation_id = "deleteComment",
    summary = "Delete a comment",
    description = "Only the comment's author may delete it.",
    params(
        ("id" = i32, Path, description = "Post ID"),
        ("comment_id" = i32, Path, description = "Comment ID"),
    ),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the author (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Comment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id, comment_id))]
pub async fn delete_comment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((id, comment_id)): Path<(i32, i32)>,
) -> Result<StatusCode, AppError> {
    let existing = find_comment(&state.db, id, comment_id).await?;
    auth_user.require_owner(existing.user_id)?;

    comment::Entity::delete_by_id(comment_id)
        .exec(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
