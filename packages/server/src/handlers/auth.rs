use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use sea_orm::*;
use tracing::instrument;

use crate::entity::user::{self, AuthProvider};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, find_by_identity};
use crate::extractors::json::AppJson;
use crate::models::auth::{
    AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, validate_login_request,
    validate_register_request,
};
use crate::models::user::UserResponse;
use crate::state::AppState;
use crate::utils::hash;
use crate::utils::jwt::TokenKind;

/// Sign a fresh access/refresh pair for `user`.
pub(crate) fn issue_tokens(state: &AppState, user: user::Model) -> Result<AuthResponse, AppError> {
    let access_token = state
        .tokens
        .issue_access_token(&user)
        .map_err(|e| AppError::Internal(format!("JWT sign error: {e}")))?;
    let refresh_token = state
        .tokens
        .issue_refresh_token(&user)
        .map_err(|e| AppError::Internal(format!("JWT sign error: {e}")))?;

    Ok(AuthResponse {
        user: UserResponse::from(user),
        access_token,
        refresh_token,
    })
}

#[utoipa::path(
    post,
    path = "/register",
    tag = "Auth",
    operation_id = "register",
    summary = "Register a new account",
    description = "Creates a local account and returns an access/refresh token pair. Username and email must both be unused.",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Username or email taken (ALREADY_EXISTS)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_register_request(&payload)?;

    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_string();

    let username_taken = user::Entity::find()
        .filter(user::Column::Username.eq(&username))
        .count(&state.db)
        .await?
        > 0;
    if username_taken {
        return Err(AppError::AlreadyExists("Username already exists".into()));
    }

    let email_taken = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .count(&state.db)
        .await?
        > 0;
    if email_taken {
        return Err(AppError::AlreadyExists("Email already exists".into()));
    }

    let hash = hash::hash_password(&payload.password)
        .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))?;

    let now = chrono::Utc::now();
    let new_user = user::ActiveModel {
        username: Set(username),
        email: Set(email),
        password: Set(hash),
        full_name: Set(payload
            .full_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())),
        bio: Set(None),
        profile_image_url: Set(None),
        provider: Set(AuthProvider::Local),
        provider_id: Set(None),
        enabled: Set(true),
        token_version: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let user = new_user.insert(&state.db).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            tracing::debug!("Registration race condition: unique constraint caught on insert");
            AppError::AlreadyExists("Username or email already exists".into())
        }
        _ => AppError::from(e),
    })?;

    tracing::info!(user_id = user.id, "Registered new account");

    Ok((StatusCode::CREATED, Json(issue_tokens(&state, user)?)))
}

#[utoipa::path(
    post,
    path = "/login",
    tag = "Auth",
    operation_id = "login",
    summary = "Log in with email or username",
    description = "Verifies the password of a local account identified by `email` or `username` and returns a token pair. Accounts created through OAuth2 have no local password and cannot log in here.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login succeeded", body = AuthResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Bad credentials (INVALID_CREDENTIALS)", body = ErrorBody),
        (status = 403, description = "Account disabled (ACCOUNT_DISABLED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    validate_login_request(&payload)?;

    let login_id = payload.login_id().unwrap_or_default();

    let user = user::Entity::find()
        .filter(
            Condition::any()
                .add(user::Column::Email.eq(login_id))
                .add(user::Column::Username.eq(login_id)),
        )
        .one(&state.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    // OAuth2-provisioned accounts carry no local password.
    if user.password.is_empty() {
        return Err(AppError::InvalidCredentials);
    }

    let is_valid = hash::verify_password(&payload.password, &user.password)
        .map_err(|e| AppError::Internal(format!("Password verify error: {}", e)))?;

    if !is_valid {
        return Err(AppError::InvalidCredentials);
    }
    if !user.enabled {
        return Err(AppError::AccountDisabled);
    }

    Ok(Json(issue_tokens(&state, user)?))
}

#[utoipa::path(
    post,
    path = "/refresh",
    tag = "Auth",
    operation_id = "refreshToken",
    summary = "Exchange a refresh token",
    description = "Returns a new access/refresh pair for a valid, unrevoked refresh token.",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens refreshed", body = AuthResponse),
        (status = 401, description = "Invalid or revoked token (TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Account disabled (ACCOUNT_DISABLED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let claims = state
        .tokens
        .validate(payload.refresh_token.trim())
        .map_err(|_| AppError::TokenInvalid)?;

    if claims.typ != TokenKind::Refresh {
        return Err(AppError::TokenInvalid);
    }

    let user = find_by_identity(&state.db, &claims.identity())
        .await?
        .ok_or(AppError::TokenInvalid)?;

    if !user.enabled {
        return Err(AppError::AccountDisabled);
    }
    if claims.ver != user.token_version {
        return Err(AppError::TokenInvalid);
    }

    Ok(Json(issue_tokens(&state, user)?))
}

#[utoipa::path(
    post,
    path = "/logout",
    tag = "Auth",
    operation_id = "logout",
    summary = "Revoke all tokens of the current user",
    description = "Invalidates every access and refresh token issued to the caller so far, on all devices.",
    responses(
        (status = 204, description = "Tokens revoked"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id()))]
pub async fn logout(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let next_version = auth_user.user.token_version + 1;
    let mut active: user::ActiveModel = auth_user.user.into();
    active.token_version = Set(next_version);
    active.updated_at = Set(chrono::Utc::now());
    active.update(&state.db).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/me",
    tag = "Auth",
    operation_id = "getCurrentUser",
    summary = "Get the current user",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(auth_user), fields(user_id = auth_user.user_id()))]
pub async fn me(auth_user: AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(auth_user.user))
}
