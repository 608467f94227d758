use std::collections::HashMap;
use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    /// Allowed front-end origins. Empty means same-origin only.
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Access token lifetime in seconds.
    pub access_token_ttl_secs: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_token_ttl_secs: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    /// Directory profile images are written to.
    pub dir: PathBuf,
    /// Maximum accepted image size in bytes.
    pub max_size: u64,
}

/// Client registration with a single OAuth2 provider.
#[derive(Debug, Deserialize, Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Must match the redirect URI registered with the provider, i.e.
    /// `{public_base}/login/oauth2/code/{provider}`.
    pub redirect_uri: String,
    /// Override the provider's authorization endpoint.
    #[serde(default)]
    pub auth_url: Option<String>,
    /// Override the provider's token endpoint.
    #[serde(default)]
    pub token_url: Option<String>,
    /// Override the provider's profile endpoint.
    #[serde(default)]
    pub userinfo_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OAuth2Config {
    /// Front-end base URL; successful logins land on `{frontend_url}/oauth2/callback`.
    pub frontend_url: String,
    /// Provider registrations keyed by provider name (`google`, `github`).
    #[serde(default)]
    pub providers: HashMap<String, OAuthClientConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub upload: UploadConfig,
    pub oauth2: OAuth2Config,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.cors.allow_origins", vec!["http://localhost:3000"])?
            .set_default("server.cors.max_age", 3600)?
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 2)?
            .set_default("auth.access_token_ttl_secs", 86_400)?
            .set_default("auth.refresh_token_ttl_secs", 604_800)?
            .set_default("upload.dir", "./uploads/profiles")?
            .set_default("upload.max_size", common::storage::MAX_IMAGE_SIZE)?
            .set_default("oauth2.frontend_url", "http://localhost:3000")?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., FEED__AUTH__JWT_SECRET)
            .add_source(Environment::with_prefix("FEED").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
