use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::user::UserResponse;
use crate::utils::oauth::GITHUB_PLACEHOLDER_DOMAIN;

/// Request body for user registration.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    /// Unique username (3-32 chars, alphanumeric and underscores).
    #[schema(example = "jane_doe")]
    pub username: String,
    /// Unique email address.
    #[schema(example = "jane@example.com")]
    pub email: String,
    /// Password (8-128 characters).
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
    /// Display name.
    #[schema(example = "Jane Doe")]
    pub full_name: Option<String>,
}

pub fn validate_register_request(payload: &RegisterRequest) -> Result<(), AppError> {
    let username = payload.username.trim();
    let len = username.chars().count();
    if !(3..=32).contains(&len) {
        return Err(AppError::Validation(
            "Username must be 3-32 characters".into(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AppError::Validation(
            "Username must contain only letters, digits, and underscores".into(),
        ));
    }
    validate_email(&payload.email)?;
    if payload.password.len() < 8 || payload.password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be 8-128 characters".into(),
        ));
    }
    if let Some(name) = &payload.full_name
        && name.chars().count() > 100
    {
        return Err(AppError::Validation(
            "Full name must not exceed 100 characters".into(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let email = email.trim();
    let well_formed = email.len() <= 255
        && !email.chars().any(char::is_whitespace)
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.contains('@'));
    if !well_formed {
        return Err(AppError::Validation("Email address is invalid".into()));
    }
    // Addresses on this domain are synthesized for GitHub accounts.
    if email
        .rsplit_once('@')
        .is_some_and(|(_, domain)| domain.eq_ignore_ascii_case(GITHUB_PLACEHOLDER_DOMAIN))
    {
        return Err(AppError::Validation(format!(
            "Email addresses at {GITHUB_PLACEHOLDER_DOMAIN} are reserved"
        )));
    }
    Ok(())
}

/// Request body for login. Either `email` or `username` identifies the account.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    #[schema(example = "jane@example.com")]
    pub email: Option<String>,
    #[schema(example = "jane_doe")]
    pub username: Option<String>,
    /// Account password.
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
}

impl LoginRequest {
    /// The identifier to look the account up by; email wins when both are sent.
    pub fn login_id(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| {
                self.username
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            })
    }
}

pub fn validate_login_request(payload: &LoginRequest) -> Result<(), AppError> {
    if payload.login_id().is_none() {
        return Err(AppError::Validation(
            "Email or username must not be empty".into(),
        ));
    }
    if payload.password.is_empty() {
        return Err(AppError::Validation("Password must not be empty".into()));
    }
    Ok(())
}

/// Request body for exchanging a refresh token.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct RefreshRequest {
    #[schema(example = "eyJhbGciOiJIUzI1NiJ9...")]
    pub refresh_token: String,
}

/// Tokens plus the account they were issued for.
#[derive(Serialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    /// Short-lived bearer token for API calls.
    #[schema(example = "eyJhbGciOiJIUzI1NiJ9...")]
    pub access_token: String,
    /// Longer-lived token accepted only by `/auth/refresh`.
    #[schema(example = "eyJhbGciOiJIUzI1NiJ9...")]
    pub refresh_token: String,
}
