use anyhow::{Result, bail};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::entity::user;

/// Lifetime of the signed `state` parameter in the OAuth2 redirect flow.
const OAUTH_STATE_TTL_SECS: i64 = 600;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    OauthState,
}

/// JWT Claims structure.
///
/// Access tokens carry the full profile snapshot; refresh tokens only carry
/// `sub` plus the registered claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(rename = "fullName", default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(
        rename = "profileImageUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub profile_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub typ: TokenKind,
    /// Token version of the user at issue time.
    #[serde(default)]
    pub ver: i32,
}

/// Who a token says it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Id(i32),
    Username(String),
}

impl Claims {
    /// Prefer the numeric id claim; fall back to the subject (username).
    pub fn identity(&self) -> Identity {
        match self.id {
            Some(id) => Identity::Id(id),
            None => Identity::Username(self.sub.clone()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OAuthStateClaims {
    sub: String, // Provider name
    nonce: String,
    exp: i64,
    typ: TokenKind,
}

/// Issues and validates HS256 bearer tokens with one process-wide secret.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // A token is accepted strictly while unexpired.
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.jwt_secret.as_bytes(),
            Duration::seconds(config.access_token_ttl_secs),
            Duration::seconds(config.refresh_token_ttl_secs),
        )
    }

    /// Sign an access token embedding the user's profile.
    pub fn issue_access_token(&self, user: &user::Model) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.username.clone(),
            id: Some(user.id),
            email: Some(user.email.clone()),
            username: Some(user.username.clone()),
            full_name: user.full_name.clone(),
            profile_image_url: user.profile_image_url.clone(),
            bio: user.bio.clone(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
            typ: TokenKind::Access,
            ver: user.token_version,
        };
        self.encode(&claims)
    }

    /// Sign a longer-lived refresh token with minimal claims.
    pub fn issue_refresh_token(&self, user: &user::Model) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.username.clone(),
            id: None,
            email: None,
            username: None,
            full_name: None,
            profile_image_url: None,
            bio: None,
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
            typ: TokenKind::Refresh,
            ver: user.token_version,
        };
        self.encode(&claims)
    }

    pub fn encode(&self, claims: &Claims) -> Result<String> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)?)
    }

    /// Verify signature and expiry, then decode.
    pub fn validate(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Sign the `state` parameter sent to an OAuth2 provider.
    ///
    /// Returns the state together with its nonce; the caller hands the nonce
    /// to the user-agent so the callback can be tied to the same browser.
    pub fn issue_oauth_state(&self, provider: &str) -> Result<(String, String)> {
        let nonce = format!("{:016x}", rand::rng().random::<u64>());
        let claims = OAuthStateClaims {
            sub: provider.to_owned(),
            nonce: nonce.clone(),
            exp: (Utc::now() + Duration::seconds(OAUTH_STATE_TTL_SECS)).timestamp(),
            typ: TokenKind::OauthState,
        };
        let state = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok((state, nonce))
    }

    /// Check a `state` parameter returned by a provider callback and return
    /// its nonce.
    pub fn verify_oauth_state(&self, state: &str, provider: &str) -> Result<String> {
        let data = decode::<OAuthStateClaims>(state, &self.decoding_key, &self.validation)?;
        if data.claims.typ != TokenKind::OauthState || data.claims.sub != provider {
            bail!("state was not issued for provider {provider}");
        }
        Ok(data.claims.nonce)
    }
}
