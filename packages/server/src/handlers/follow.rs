use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{follow, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppQuery;
use crate::handlers::user::{build_profiles, find_user, follow_counts};
use crate::models::follow::FollowResponse;
use crate::models::shared::{PageQuery, Pagination};
use crate::models::user::ProfileListResponse;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/{id}/follow",
    tag = "Follow",
    operation_id = "toggleFollow",
    summary = "Follow or unfollow a user",
    description = "Removes the caller's follow edge to the user if present, otherwise creates it. Returns the resulting state and the target's counts.",
    params(("id" = i32, Path, description = "User ID to follow or unfollow")),
    responses(
        (status = 200, description = "Follow state after the toggle", body = FollowResponse),
        (status = 400, description = "Cannot follow yourself (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Concurrent toggle (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(follower_id = auth_user.user_id(), id))]
pub async fn toggle_follow(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<FollowResponse>, AppError> {
    let follower_id = auth_user.user_id();
    if follower_id == id {
        return Err(AppError::Validation("You cannot follow yourself".into()));
    }

    let txn = state.db.begin().await?;

    find_user(&txn, id).await?;

    let existing = follow::Entity::find_by_id((follower_id, id))
        .one(&txn)
        .await?;

    let is_following = match existing {
        Some(_) => {
            follow::Entity::delete_by_id((follower_id, id))
                .exec(&txn)
                .await?;
            false
        }
        None => {
            let edge = follow::ActiveModel {
                follower_id: Set(follower_id),
                following_id: Set(id),
                created_at: Set(Utc::now()),
                ..Default::default()
            };
            follow::Entity::insert(edge)
                .exec_without_returning(&txn)
                .await
                .map_err(|e| match e.sql_err() {
                    Some(SqlErr::UniqueConstraintViolation(_)) => {
                        tracing::debug!("Follow race condition: unique constraint caught on insert");
                        AppError::Conflict("Follow state changed concurrently, retry".into())
                    }
                    _ => AppError::from(e),
                })?;
            true
        }
    };

    let (follower_count, following_count) = follow_counts(&txn, id).await?;

    txn.commit().await?;

    Ok(Json(FollowResponse {
        is_following,
        follower_count,
        following_count,
    }))
}

/// Which side of the edge a listing walks.
#[derive(Clone, Copy)]
enum Direction {
    Followers,
    Following,
}

async fn list_edges(
    state: &AppState,
    caller_id: i32,
    user_id: i32,
    direction: Direction,
    query: PageQuery,
) -> Result<ProfileListResponse, AppError> {
    find_user(&state.db, user_id).await?;
    let page = query.params();

    let (anchor, other) = match direction {
        Direction::Followers => (follow::Column::FollowingId, follow::Column::FollowerId),
        Direction::Following => (follow::Column::FollowerId, follow::Column::FollowingId),
    };

    let select = follow::Entity::find().filter(anchor.eq(user_id));
    let total = select.clone().count(&state.db).await?;

    let ids: Vec<i32> = select
        .select_only()
        .column(other)
        .order_by_desc(follow::Column::CreatedAt)
        .order_by_desc(other)
        .offset(Some(page.offset()))
        .limit(Some(page.per_page))
        .into_tuple::<i32>()
        .all(&state.db)
        .await?;

    let mut by_id: HashMap<i32, user::Model> = user::Entity::find()
        .filter(user::Column::Id.is_in(ids.clone()))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    let users: Vec<user::Model> = ids.iter().filter_map(|id| by_id.remove(id)).collect();

    Ok(ProfileListResponse {
        data: build_profiles(&state.db, caller_id, users).await?,
        pagination: Pagination::new(page, total),
    })
}

#[utoipa::path(
    get,
    path = "/{id}/followers",
    tag = "Follow",
    operation_id = "listFollowers",
    summary = "List a user's followers",
    description = "Most recent followers first. Each entry carries its own counts and whether the caller follows it.",
    params(("id" = i32, Path, description = "User ID"), PageQuery),
    responses(
        (status = 200, description = "Followers", body = ProfileListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(id))]
pub async fn list_followers(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<ProfileListResponse>, AppError> {
    let resp = list_edges(&state, auth_user.user_id(), id, Direction::Followers, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/{id}/following",
    tag = "Follow",
    operation_id = "listFollowing",
    summary = "List the users a user follows",
    params(("id" = i32, Path, description = "User ID"), PageQuery),
    responses(
        (status = 200, description = "Followed users", body = ProfileListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(id))]
pub async fn list_following(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<ProfileListResponse>, AppError> {
    let resp = list_edges(&state, auth_user.user_id(), id, Direction::Following, query).await?;
    Ok(Json(resp))
}
