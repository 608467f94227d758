use std::sync::Arc;

use common::storage::ImageStore;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::utils::jwt::TokenService;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub tokens: Arc<TokenService>,
    pub images: Arc<dyn ImageStore>,
    /// Outbound client for OAuth2 code exchange and profile lookups.
    pub http: reqwest::Client,
}
