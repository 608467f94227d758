use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers::{auth, comment, follow, post, upload, user};
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/auth", auth_routes())
        .nest("/users", user_routes())
        .nest("/posts", post_routes())
        .nest("/upload", upload_routes(config))
}

fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(auth::register))
        .routes(routes!(auth::login))
        .routes(routes!(auth::refresh))
        .routes(routes!(auth::logout))
        .routes(routes!(auth::me))
}

fn user_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(user::get_my_profile, user::update_my_profile))
        .routes(routes!(user::get_user, user::update_user))
        .routes(routes!(follow::toggle_follow))
        .routes(routes!(follow::list_followers))
        .routes(routes!(follow::list_following))
        .routes(routes!(post::list_user_posts))
        .routes(routes!(post::count_user_posts))
}

fn post_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(post::list_posts, post::create_post))
        .routes(routes!(post::get_post, post::update_post, post::delete_post))
        .routes(routes!(post::toggle_like))
        .routes(routes!(comment::list_comments, comment::create_comment))
        .routes(routes!(comment::update_comment, comment::delete_comment))
}

fn upload_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let upload = OpenApiRouter::new()
        .routes(routes!(upload::upload_profile_image))
        .layer(upload::upload_body_limit(config.upload.max_size));

    OpenApiRouter::new()
        .routes(routes!(upload::get_profile_image))
        .merge(upload)
}
