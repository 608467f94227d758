use std::collections::{HashMap, HashSet};

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::Func;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{comment, post, post_like, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::{AppJson, AppQuery};
use crate::handlers::user::find_user;
use crate::models::post::{
    LikeResponse, PostListResponse, PostRequest, PostResponse, validate_post_request,
};
use crate::models::shared::{PageQuery, Pagination};
use crate::models::user::{PostCountResponse, UserResponse};
use crate::state::AppState;

pub(crate) async fn find_post<C: ConnectionTrait>(db: &C, id: i32) -> Result<post::Model, AppError> {
    post::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".into()))
}

async fn like_count<C: ConnectionTrait>(db: &C, post_id: i32) -> Result<u64, DbErr> {
    post_like::Entity::find()
        .filter(post_like::Column::PostId.eq(post_id))
        .count(db)
        .await
}

/// Attach authors and engagement aggregates to a page of posts.
///
/// Runs a fixed number of batched queries regardless of page size.
pub(crate) async fn enrich_posts<C: ConnectionTrait>(
    db: &C,
    caller_id: i32,
    posts: Vec<post::Model>,
) -> Result<Vec<PostResponse>, AppError> {
    if posts.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = posts.iter().map(|p| p.id).collect();
    let author_ids: Vec<i32> = posts
        .iter()
        .map(|p| p.user_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let authors: HashMap<i32, user::Model> = user::Entity::find()
        .filter(user::Column::Id.is_in(author_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let likes: HashMap<i32, i64> = post_like::Entity::find()
        .select_only()
        .column(post_like::Column::PostId)
        .column_as(Expr::expr(Func::count(Expr::col(post_like::Column::UserId))), "count")
        .filter(post_like::Column::PostId.is_in(ids.clone()))
        .group_by(post_like::Column::PostId)
        .into_tuple::<(i32, i64)>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    let liked: HashSet<i32> = post_like::Entity::find()
        .select_only()
        .column(post_like::Column::PostId)
        .filter(post_like::Column::UserId.eq(caller_id))
        .filter(post_like::Column::PostId.is_in(ids.clone()))
        .into_tuple::<i32>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    let comments: HashMap<i32, i64> = comment::Entity::find()
        .select_only()
        .column(comment::Column::PostId)
        .column_as(Expr::expr(Func::count(Expr::col(comment::Column::Id))), "count")
        .filter(comment::Column::PostId.is_in(ids))
        .group_by(comment::Column::PostId)
        .into_tuple::<(i32, i64)>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    posts
        .into_iter()
        .map(|p| {
            let author = authors
                .get(&p.user_id)
                .cloned()
                .map(UserResponse::from)
                .ok_or_else(|| AppError::Internal(format!("Author of post {} missing", p.id)))?;
            let id = p.id;
            Ok(PostResponse::new(
                p,
                author,
                Ord::max(likes.get(&id).copied().unwrap_or(0), 0) as u64,
                liked.contains(&id),
                Ord::max(comments.get(&id).copied().unwrap_or(0), 0) as u64,
            ))
        })
        .collect()
}

/// One page of posts, newest first, optionally restricted to one author.
async fn list_page(
    state: &AppState,
    caller_id: i32,
    author_id: Option<i32>,
    query: PageQuery,
) -> Result<PostListResponse, AppError> {
    let page = query.params();

    let mut select = post::Entity::find();
    if let Some(author_id) = author_id {
        select = select.filter(post::Column::UserId.eq(author_id));
    }

    let total = select.clone().count(&state.db).await?;

    let posts = select
        .order_by_desc(post::Column::CreatedAt)
        .order_by_desc(post::Column::Id)
        .offset(Some(page.offset()))
        .limit(Some(page.per_page))
        .all(&state.db)
        .await?;

    Ok(PostListResponse {
        data: enrich_posts(&state.db, caller_id, posts).await?,
        pagination: Pagination::new(page, total),
    })
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Posts",
    operation_id = "listPosts",
    summary = "List all posts",
    description = "Newest first. Each post carries its author, like count, comment count and whether the caller likes it.",
    params(PageQuery),
    responses(
        (status = 200, description = "Posts", body = PostListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_posts(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<PostListResponse>, AppError> {
    Ok(Json(list_page(&state, auth_user.user_id(), None, query).await?))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Posts",
    operation_id = "createPost",
    summary = "Create a post",
    request_body = PostRequest,
    responses(
        (status = 201, description = "Post created", body = PostResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id()))]
pub async fn create_post(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<PostRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_post_request(&payload)?;

    let now = Utc::now();
    let new_post = post::ActiveModel {
        content: Set(payload.content),
        user_id: Set(auth_user.user_id()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let model = new_post.insert(&state.db).await?;

    let author = UserResponse::from(auth_user.user);
    Ok((
        StatusCode::CREATED,
        Json(PostResponse::new(model, author, 0, false, 0)),
    ))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Posts",
    operation_id = "getPost",
    summary = "Get a post by ID",
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post", body = PostResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn get_post(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<PostResponse>, AppError> {
    let model = find_post(&state.db, id).await?;
    let mut enriched = enrich_posts(&state.db, auth_user.user_id(), vec![model]).await?;
    enriched
        .pop()
        .map(Json)
        .ok_or_else(|| AppError::Internal("Post missing after enrichment".into()))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Posts",
    operation_id = "updatePost",
    summary = "Update a post",
    description = "Replaces the content of a post. Only the author may update it.",
    params(("id" = i32, Path, description = "Post ID")),
    request_body = PostRequest,
    responses(
        (status = 200, description = "Post updated", body = PostResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the author (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_post(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<PostRequest>,
) -> Result<Json<PostResponse>, AppError> {
    validate_post_request(&payload)?;

    let existing = find_post(&state.db, id).await?;
    auth_user.require_owner(existing.user_id)?;

    let mut active: post::ActiveModel = existing.into();
    active.content = Set(payload.content);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&state.db).await?;

    let mut enriched = enrich_posts(&state.db, auth_user.user_id(), vec![updated]).await?;
    enriched
        .pop()
        .map(Json)
        .ok_or_else(|| AppError::Internal("Post missing after enrichment".into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Posts",
    operation_id = "deletePost",
    summary = "Delete a post",
    description = "Deletes a post together with its comments and likes. Only the author may delete it.",
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the author (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_post(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let txn = state.db.begin().await?;

    let existing = find_post(&txn, id).await?;
    auth_user.require_owner(existing.user_id)?;

    post_like::Entity::delete_many()
        .filter(post_like::Column::PostId.eq(id))
        .exec(&txn)
        .await?;
    comment::Entity::delete_many()
        .filter(comment::Column::PostId.eq(id))
        .exec(&txn)
        .await?;
    post::Entity::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{id}/like",
    tag = "Posts",
    operation_id = "toggleLike",
    summary = "Like or unlike a post",
    description = "Removes the caller's like if present, otherwise adds it. Returns the resulting state and like count.",
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Like state after the toggle", body = LikeResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Concurrent toggle (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id(), id))]
pub async fn toggle_like(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<LikeResponse>, AppError> {
    let user_id = auth_user.user_id();
    let txn = state.db.begin().await?;

    find_post(&txn, id).await?;

    let existing = post_like::Entity::find_by_id((user_id, id)).one(&txn).await?;

    let is_liked = match existing {
        Some(_) => {
            post_like::Entity::delete_by_id((user_id, id))
                .exec(&txn)
                .await?;
            false
        }
        None => {
            let like = post_like::ActiveModel {
                user_id: Set(user_id),
                post_id: Set(id),
                created_at: Set(Utc::now()),
                ..Default::default()
            };
            post_like::Entity::insert(like)
                .exec_without_returning(&txn)
                .await
                .map_err(|e| match e.sql_err() {
                    Some(SqlErr::UniqueConstraintViolation(_)) => {
                        tracing::debug!("Like race condition: unique constraint caught on insert");
                        AppError::Conflict("Like state changed concurrently, retry".into())
                    }
                    _ => AppError::from(e),
                })?;
            true
        }
    };

    let like_count = like_count(&txn, id).await?;

    txn.commit().await?;

    Ok(Json(LikeResponse {
        is_liked,
        like_count,
    }))
}

#[utoipa::path(
    get,
    path = "/{id}/posts",
    tag = "Posts",
    operation_id = "listUserPosts",
    summary = "List a user's posts",
    params(("id" = i32, Path, description = "Author's user ID"), PageQuery),
    responses(
        (status = 200, description = "Posts by the user, newest first", body = PostListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(id))]
pub async fn list_user_posts(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<PostListResponse>, AppError> {
    find_user(&state.db, id).await?;
    Ok(Json(
        list_page(&state, auth_user.user_id(), Some(id), query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/{id}/posts/count",
    tag = "Posts",
    operation_id = "countUserPosts",
    summary = "Count a user's posts",
    params(("id" = i32, Path, description = "Author's user ID")),
    responses(
        (status = 200, description = "Post count", body = PostCountResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user), fields(id))]
pub async fn count_user_posts(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<PostCountResponse>, AppError> {
    find_user(&state.db, id).await?;
    let count = post::Entity::find()
        .filter(post::Column::UserId.eq(id))
        .count(&state.db)
        .await?;
    Ok(Json(PostCountResponse { user_id: id, count }))
}
