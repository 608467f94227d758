use axum::{extract::FromRequestParts, http::request::Parts};
use sea_orm::*;

use crate::entity::user;
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt::{Identity, TokenKind};

/// Role granted to every enabled account.
pub const DEFAULT_ROLE: &str = "ROLE_USER";

/// Authentication view of a user: what the resolver checks, kept apart from
/// the stored record.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: i32,
    pub enabled: bool,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl From<&user::Model> for Principal {
    fn from(user: &user::Model) -> Self {
        Self {
            user_id: user.id,
            enabled: user.enabled,
            roles: vec![DEFAULT_ROLE.to_string()],
        }
    }
}

/// Authenticated user resolved from the `Authorization: Bearer <token>` header.
///
/// Add this as a handler parameter to require authentication. The token only
/// names the user; the record handed to the handler is loaded fresh from the
/// database on every request.
pub struct AuthUser {
    pub user: user::Model,
    pub principal: Principal,
}

impl AuthUser {
    pub fn user_id(&self) -> i32 {
        self.principal.user_id
    }

    /// Returns `Err(PermissionDenied)` unless the caller owns the resource.
    pub fn require_owner(&self, owner_id: i32) -> Result<(), AppError> {
        if self.user_id() == owner_id {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::TokenMissing)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::TokenInvalid)?;

        let claims = state.tokens.validate(token).map_err(|e| {
            tracing::debug!("Rejected bearer token: {}", e);
            AppError::TokenInvalid
        })?;

        if claims.typ != TokenKind::Access {
            return Err(AppError::TokenInvalid);
        }

        let user = find_by_identity(&state.db, &claims.identity())
            .await?
            .ok_or(AppError::TokenInvalid)?;

        let principal = Principal::from(&user);
        if !principal.enabled {
            return Err(AppError::AccountDisabled);
        }
        if claims.ver != user.token_version {
            tracing::debug!(user_id = user.id, "Rejected token from a revoked epoch");
            return Err(AppError::TokenInvalid);
        }
        if !principal.has_role(DEFAULT_ROLE) {
            return Err(AppError::PermissionDenied);
        }

        Ok(AuthUser { user, principal })
    }
}

/// Look up the user a token refers to.
pub async fn find_by_identity<C: ConnectionTrait>(
    db: &C,
    identity: &Identity,
) -> Result<Option<user::Model>, DbErr> {
    match identity {
        Identity::Id(id) => user::Entity::find_by_id(*id).one(db).await,
        Identity::Username(username) => {
            user::Entity::find()
                .filter(user::Column::Username.eq(username))
                .one(db)
                .await
        }
    }
}
