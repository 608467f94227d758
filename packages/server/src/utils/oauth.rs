//! OAuth2 bridge: provider endpoints, profile extraction and local account
//! provisioning.

use std::fmt;

use anyhow::{Result, anyhow, bail};
use chrono::Utc;
use reqwest::Client;
use sea_orm::*;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::OAuthClientConfig;
use crate::entity::user::{self, AuthProvider};
use crate::error::AppError;

/// Domain used to synthesize an email for GitHub accounts without a public one.
pub const GITHUB_PLACEHOLDER_DOMAIN: &str = "github.local";

const GOOGLE_SCOPES: &[&str] = &["openid", "email", "profile"];
const GITHUB_SCOPES: &[&str] = &["read:user", "user:email"];

/// Supported external identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Github,
}

/// Provider-specific OAuth2 endpoints, after per-client overrides.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: &'static [&'static str],
}

impl OAuthProvider {
    /// Resolve the provider from its path segment (`google`, `github`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "google" => Some(Self::Google),
            "github" => Some(Self::Github),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
        }
    }

    pub fn auth_provider(&self) -> AuthProvider {
        match self {
            Self::Google => AuthProvider::Google,
            Self::Github => AuthProvider::Github,
        }
    }

    /// Endpoints for this provider; any URL set on `client` wins over the
    /// public default.
    pub fn endpoints(&self, client: &OAuthClientConfig) -> ProviderEndpoints {
        let (auth_url, token_url, userinfo_url, scopes) = match self {
            Self::Google => (
                "https://accounts.google.com/o/oauth2/v2/auth",
                "https://oauth2.googleapis.com/token",
                "https://www.googleapis.com/oauth2/v3/userinfo",
                GOOGLE_SCOPES,
            ),
            Self::Github => (
                "https://github.com/login/oauth/authorize",
                "https://github.com/login/oauth/access_token",
                "https://api.github.com/user",
                GITHUB_SCOPES,
            ),
        };

        let pick = |custom: &Option<String>, default: &str| {
            custom.clone().unwrap_or_else(|| default.to_string())
        };
        ProviderEndpoints {
            auth_url: pick(&client.auth_url, auth_url),
            token_url: pick(&client.token_url, token_url),
            userinfo_url: pick(&client.userinfo_url, userinfo_url),
            scopes,
        }
    }

    /// Build the URL the user-agent is sent to in order to log in.
    pub fn authorization_url(&self, client: &OAuthClientConfig, state: &str) -> String {
        let endpoints = self.endpoints(client);
        let scopes = endpoints.scopes.join(" ");

        let params = [
            ("client_id", client.client_id.as_str()),
            ("redirect_uri", client.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", scopes.as_str()),
            ("state", state),
        ];

        format!("{}?{}", endpoints.auth_url, encode_query(&params))
    }

    /// Exchange an authorization code for a provider access token.
    pub async fn exchange_code(
        &self,
        client: &OAuthClientConfig,
        code: &str,
        http: &Client,
    ) -> Result<String> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", client.redirect_uri.as_str()),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
        ];

        let response = http
            .post(self.endpoints(client).token_url)
            // GitHub answers form-encoded unless asked for JSON.
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to exchange code with {self}: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Token exchange with {self} failed ({status}): {body}");
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse token response from {self}: {e}"))?;
        Ok(token.access_token)
    }

    /// Fetch the raw profile attributes of the authenticated account.
    pub async fn fetch_attributes(
        &self,
        client: &OAuthClientConfig,
        access_token: &str,
        http: &Client,
    ) -> Result<Map<String, Value>> {
        let response = http
            .get(self.endpoints(client).userinfo_url)
            .bearer_auth(access_token)
            // GitHub rejects requests without a User-Agent.
            .header(reqwest::header::USER_AGENT, "feed-server")
            .send()
            .await
            .map_err(|e| anyhow!("Failed to fetch profile from {self}: {e}"))?;

        if !response.status().is_success() {
            bail!("Profile request to {self} failed ({})", response.status());
        }

        match response.json::<Value>().await? {
            Value::Object(map) => Ok(map),
            other => Err(anyhow!("Unexpected profile payload from {self}: {other}")),
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parts of a provider profile the local account is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub provider_id: Option<String>,
}

impl OAuthProfile {
    /// Extract email, name and avatar from provider attributes.
    ///
    /// Accounts without an `email` attribute but with a `login` handle get the
    /// deterministic address `{login}@github.local`, and their avatar is read
    /// from `avatar_url` instead of `picture`.
    pub fn from_attributes(attributes: &Map<String, Value>) -> Result<Self> {
        let mut email = string_attr(attributes, "email");
        let mut avatar_url = string_attr(attributes, "picture");

        if email.is_none()
            && let Some(login) = string_attr(attributes, "login")
        {
            email = Some(format!("{login}@{GITHUB_PLACEHOLDER_DOMAIN}"));
            avatar_url = string_attr(attributes, "avatar_url");
        }

        let email = email.ok_or_else(|| anyhow!("Provider profile has neither email nor login"))?;

        let provider_id = match attributes.get("id").or_else(|| attributes.get("sub")) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Ok(Self {
            email,
            name: string_attr(attributes, "name"),
            avatar_url,
            provider_id,
        })
    }
}

fn string_attr(attributes: &Map<String, Value>, key: &str) -> Option<String> {
    attributes
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Username stem from the local part of an email: lowercased, `[a-z0-9]` only.
pub fn base_username(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let base: String = local
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();
    if base.is_empty() {
        "user".to_string()
    } else {
        base
    }
}

/// First of `base`, `base1`, `base2`, … that is not taken.
pub async fn generate_unique_username<C: ConnectionTrait>(
    db: &C,
    base: &str,
) -> Result<String, AppError> {
    let mut candidate = base.to_string();
    let mut counter = 1u32;

    while user::Entity::find()
        .filter(user::Column::Username.eq(&candidate))
        .count(db)
        .await?
        > 0
    {
        candidate = format!("{base}{counter}");
        counter += 1;
    }

    Ok(candidate)
}

/// Find the local account for a provider profile, provisioning it on first
/// login and refreshing the avatar on later ones.
pub async fn upsert_oauth_user<C: ConnectionTrait>(
    db: &C,
    provider: OAuthProvider,
    profile: &OAuthProfile,
) -> Result<user::Model, AppError> {
    let now = Utc::now();

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(&profile.email))
        .one(db)
        .await?;

    let Some(existing) = existing else {
        let username = generate_unique_username(db, &base_username(&profile.email)).await?;
        tracing::info!(%username, provider = %provider, "Provisioning OAuth2 account");

        let new_user = user::ActiveModel {
            username: Set(username),
            email: Set(profile.email.clone()),
            password: Set(String::new()),
            full_name: Set(Some(
                profile.name.clone().unwrap_or_else(|| "User".to_string()),
            )),
            bio: Set(None),
            profile_image_url: Set(profile.avatar_url.clone()),
            provider: Set(provider.auth_provider()),
            provider_id: Set(profile.provider_id.clone()),
            enabled: Set(true),
            token_version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        return new_user.insert(db).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                tracing::debug!("OAuth2 provisioning race: unique constraint caught on insert");
                AppError::Conflict("Account is being created by another request".into())
            }
            _ => AppError::from(e),
        });
    };

    let avatar_changed = profile
        .avatar_url
        .as_ref()
        .is_some_and(|url| existing.profile_image_url.as_ref() != Some(url));

    let mut active: user::ActiveModel = existing.into();
    if avatar_changed {
        active.profile_image_url = Set(profile.avatar_url.clone());
    }
    active.updated_at = Set(now);

    Ok(active.update(db).await?)
}

/// Front-end landing URL carrying both tokens.
pub fn callback_redirect_url(frontend_url: &str, access_token: &str, refresh_token: &str) -> String {
    format!(
        "{}/oauth2/callback?{}",
        frontend_url.trim_end_matches('/'),
        encode_query(&[("token", access_token), ("refreshToken", refresh_token)])
    )
}

fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
