mod v1;

use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn api_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest("/v1", v1::routes(config))
}

/// OAuth2 entry and redirect endpoints, mounted at the server root so the
/// redirect URI registered with providers stays short.
pub fn oauth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::oauth::authorize))
        .routes(routes!(handlers::oauth::callback))
}
