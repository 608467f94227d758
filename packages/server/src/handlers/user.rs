use std::collections::{HashMap, HashSet};

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::Func;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{follow, profile_image, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::upload::stored_filename;
use crate::models::user::{
    ProfileResponse, UpdateProfileRequest, UserResponse, validate_update_profile,
};
use crate::state::AppState;

pub(crate) async fn find_user<C: ConnectionTrait>(db: &C, id: i32) -> Result<user::Model, AppError> {
    user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// `(followers, following)` of a single user.
pub(crate) async fn follow_counts<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<(u64, u64), DbErr> {
    let followers = follow::Entity::find()
        .filter(follow::Column::FollowingId.eq(user_id))
        .count(db)
        .await?;
    let following = follow::Entity::find()
        .filter(follow::Column::FollowerId.eq(user_id))
        .count(db)
        .await?;
    Ok((followers, following))
}

/// Build profile views for a page of users with three batched queries,
/// preserving the input order.
pub(crate) async fn build_profiles<C: ConnectionTrait>(
    db: &C,
    caller_id: i32,
    users: Vec<user::Model>,
) -> Result<Vec<ProfileResponse>, DbErr> {
    if users.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = users.iter().map(|u| u.id).collect();

    let followers: HashMap<i32, i64> = follow::Entity::find()
        .select_only()
        .column(follow::Column::FollowingId)
        .column_as(Expr::expr(Func::count(Expr::col(follow::Column::FollowerId))), "count")
        .filter(follow::Column::FollowingId.is_in(ids.clone()))
        .group_by(follow::Column::FollowingId)
        .into_tuple::<(i32, i64)>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    let following: HashMap<i32, i64> = follow::Entity::find()
        .select_only()
        .column(follow::Column::FollowerId)
        .column_as(Expr::expr(Func::count(Expr::col(follow::Column::FollowingId))), "count")
        .filter(follow::Column::FollowerId.is_in(ids.clone()))
        .group_by(follow::Column::FollowerId)
        .into_tuple::<(i32, i64)>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    let followed_by_caller: HashSet<i32> = follow::Entity::find()
        .select_only()
        .column(follow::Column::FollowingId)
        .filter(follow::Column::FollowerId.eq(caller_id))
        .filter(follow::Column::FollowingId.is_in(ids))
        .into_tuple::<i32>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    Ok(users
        .into_iter()
        .map(|u| {
            let id = u.id;
            ProfileResponse {
                user: UserResponse::from(u),
                followers_count: Ord::max(followers.get(&id).copied().unwrap_or(0), 0) as u64,
                following_count: Ord::max(following.get(&id).copied().unwrap_or(0), 0) as u64,
                is_following: followed_by_caller.contains(&id),
            }
        })
        .collect())
}

async fn single_profile<C: ConnectionTrait>(
    db: &C,
    caller_id: i32,
    user: user::Model,
) -> Result<ProfileResponse, AppError> {
    build_profiles(db, caller_id, vec![user])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal("Profile missing after build".into()))
}

/// The caller's ownership record for a locally stored image, if any.
async fn owned_image<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    filename: &str,
) -> Result<Option<profile_image::Model>, DbErr> {
    Ok(profile_image::Entity::find_by_id(filename.to_string())
        .one(db)
        .await?
        .filter(|img| img.user_id == user_id))
}

/// Apply a profile update and remove the replaced image if the caller uploaded it.
async fn apply_profile_update(
    state: &AppState,
    current: user::Model,
    payload: UpdateProfileRequest,
) -> Result<user::Model, AppError> {
    validate_update_profile(&payload)?;

    let user_id = current.id;
    let old_image = current.profile_image_url.clone();
    let new_image = payload
        .profile_image_url
        .map(|url| url.map(|u| u.trim().to_string()));
    let image_changed = new_image.as_ref().is_some_and(|url| *url != old_image);

    // A local upload URL may only point at the caller's own file.
    if image_changed
        && let Some(Some(url)) = &new_image
        && let Some(filename) = stored_filename(url)
    {
        let owner = profile_image::Entity::find_by_id(filename.to_string())
            .one(&state.db)
            .await?;
        match owner {
            Some(img) if img.user_id == user_id => {}
            Some(_) => return Err(AppError::PermissionDenied),
            None => return Err(AppError::Validation("Profile image not found".into())),
        }
    }

    let mut active: user::ActiveModel = current.into();
    if let Some(full_name) = payload.full_name {
        active.full_name = Set(full_name.map(|n| n.trim().to_string()));
    }
    if let Some(bio) = payload.bio {
        active.bio = Set(bio);
    }
    if let Some(url) = new_image {
        active.profile_image_url = Set(url);
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&state.db).await?;

    if image_changed
        && let Some(filename) = old_image.as_deref().and_then(stored_filename)
        && let Some(img) = owned_image(&state.db, user_id, filename).await?
    {
        match state.images.delete(&img.filename).await {
            Ok(true) => tracing::info!(%filename, "Deleted replaced profile image"),
            Ok(false) => {}
            Err(e) => tracing::warn!(%filename, "Failed to delete replaced profile image: {}", e),
        }
        profile_image::Entity::delete_by_id(img.filename)
            .exec(&state.db)
            .await?;
    }

    Ok(updated)
}

#[utoipa::path(
    get,
    path = "/profile",
    tag = "Users",
    operation_id = "getMyProfile",
    summary = "Get the current user's profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id()))]
pub async fn get_my_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ProfileResponse>, AppError> {
    let caller_id = auth_user.user_id();
    Ok(Json(single_profile(&state.db, caller_id, auth_user.user).await?))
}

#[utoipa::path(
    put,
    path = "/profile",
    tag = "Users",
    operation_id = "updateMyProfile",
    summary = "Update the current user's profile",
    description = "Updates full name, bio and profile image URL. Absent fields are kept; `null` clears a field. A locally uploaded image URL must refer to the caller's own upload. Replacing such an image deletes the old file.",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Validation error or unknown upload (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Upload belongs to another user (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id()))]
pub async fn update_my_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let caller_id = auth_user.user_id();
    let updated = apply_profile_update(&state, auth_user.user, payload).await?;
    Ok(Json(single_profile(&state.db, caller_id, updated).await?))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Users",
    operation_id = "getUser",
    summary = "Get a user's profile by ID",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn get_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = find_user(&state.db, id).await?;
    Ok(Json(single_profile(&state.db, auth_user.user_id(), user).await?))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Users",
    operation_id = "updateUser",
    summary = "Update a user's profile by ID",
    description = "Same as `PUT /users/profile`, addressed by ID. Only the account itself may update it.",
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not your account (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    find_user(&state.db, id).await?;
    auth_user.require_owner(id)?;

    let caller_id = auth_user.user_id();
    let updated = apply_profile_update(&state, auth_user.user, payload).await?;
    Ok(Json(single_profile(&state.db, caller_id, updated).await?))
}
