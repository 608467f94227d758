use axum::extract::{Path, Query, State};
use axum::response::Redirect;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use sea_orm::TransactionTrait;
use serde::Deserialize;
use tracing::instrument;

use crate::config::OAuthClientConfig;
use crate::error::{AppError, ErrorBody};
use crate::handlers::auth::issue_tokens;
use crate::state::AppState;
use crate::utils::oauth::{OAuthProfile, OAuthProvider, callback_redirect_url, upsert_oauth_user};

/// Cookie tying a callback to the browser that started the login.
pub const OAUTH_NONCE_COOKIE: &str = "oauth2_state_nonce";
const OAUTH_NONCE_COOKIE_PATH: &str = "/login/oauth2";
/// Matches the lifetime of the signed state.
const OAUTH_NONCE_COOKIE_MAX_AGE_SECS: i64 = 600;

/// Query string a provider appends when redirecting back.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user denied access or the request was bad.
    pub error: Option<String>,
}

fn resolve_provider<'a>(
    state: &'a AppState,
    name: &str,
) -> Result<(OAuthProvider, &'a OAuthClientConfig), AppError> {
    let provider = OAuthProvider::from_name(name)
        .ok_or_else(|| AppError::NotFound(format!("Unknown OAuth2 provider '{name}'")))?;
    let client = state
        .config
        .oauth2
        .providers
        .get(provider.as_str())
        .ok_or_else(|| {
            AppError::NotFound(format!("OAuth2 provider '{provider}' is not configured"))
        })?;
    Ok((provider, client))
}

#[utoipa::path(
    get,
    path = "/oauth2/authorization/{provider}",
    tag = "OAuth2",
    operation_id = "startOAuth2Login",
    summary = "Start an OAuth2 login",
    description = "Redirects the user-agent to the provider's consent page with a signed, short-lived `state`, \
        and sets an HttpOnly cookie holding the state's nonce for the callback to match.",
    params(("provider" = String, Path, description = "`google` or `github`")),
    responses(
        (status = 303, description = "Redirect to the provider"),
        (status = 404, description = "Unknown or unconfigured provider (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, jar))]
pub async fn authorize(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(provider): Path<String>,
) -> Result<(CookieJar, Redirect), AppError> {
    let (provider, client) = resolve_provider(&state, &provider)?;

    let (oauth_state, nonce) = state
        .tokens
        .issue_oauth_state(provider.as_str())
        .map_err(|e| AppError::Internal(format!("JWT sign error: {e}")))?;

    let cookie = Cookie::build((OAUTH_NONCE_COOKIE, nonce))
        .path(OAUTH_NONCE_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(OAUTH_NONCE_COOKIE_MAX_AGE_SECS));

    Ok((
        jar.add(cookie),
        Redirect::to(&provider.authorization_url(client, &oauth_state)),
    ))
}

#[utoipa::path(
    get,
    path = "/login/oauth2/code/{provider}",
    tag = "OAuth2",
    operation_id = "completeOAuth2Login",
    summary = "OAuth2 redirect target",
    description = "Checks `state` against the nonce cookie set by the authorization redirect, exchanges the \
        authorization code, provisions or updates the local account and redirects to \
        `{frontend_url}/oauth2/callback?token=…&refreshToken=…`.",
    params(("provider" = String, Path, description = "`google` or `github`"), CallbackQuery),
    responses(
        (status = 303, description = "Redirect to the front-end with tokens"),
        (status = 400, description = "Provider reported an error or parameters are missing (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Invalid `state` or missing nonce cookie (TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Account is disabled (ACCOUNT_DISABLED)", body = ErrorBody),
        (status = 404, description = "Unknown or unconfigured provider (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, jar, query))]
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<(CookieJar, Redirect), AppError> {
    let (provider, client) = resolve_provider(&state, &provider)?;

    if let Some(error) = query.error {
        return Err(AppError::Validation(format!("OAuth2 login failed: {error}")));
    }
    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return Err(AppError::Validation(
            "Missing 'code' or 'state' parameter".into(),
        ));
    };

    let nonce = state
        .tokens
        .verify_oauth_state(&oauth_state, provider.as_str())
        .map_err(|e| {
            tracing::debug!("Rejected OAuth2 state: {}", e);
            AppError::TokenInvalid
        })?;
    if jar.get(OAUTH_NONCE_COOKIE).map(|c| c.value()) != Some(nonce.as_str()) {
        tracing::debug!("OAuth2 state nonce does not match the browser cookie");
        return Err(AppError::TokenInvalid);
    }

    let access_token = provider
        .exchange_code(client, &code, &state.http)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let attributes = provider
        .fetch_attributes(client, &access_token, &state.http)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let profile = OAuthProfile::from_attributes(&attributes)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let txn = state.db.begin().await?;
    let user = upsert_oauth_user(&txn, provider, &profile).await?;
    txn.commit().await?;

    if !user.enabled {
        tracing::info!(user_id = user.id, provider = %provider, "OAuth2 login for disabled account");
        return Err(AppError::AccountDisabled);
    }

    tracing::info!(user_id = user.id, provider = %provider, "OAuth2 login succeeded");

    let tokens = issue_tokens(&state, user)?;
    let jar = jar.remove(Cookie::build(OAUTH_NONCE_COOKIE).path(OAUTH_NONCE_COOKIE_PATH));
    Ok((
        jar,
        Redirect::to(&callback_redirect_url(
            &state.config.oauth2.frontend_url,
            &tokens.access_token,
            &tokens.refresh_token,
        )),
    ))
}
