use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Uploads get the configured body limit; everything else keeps axum's
    // small default.
    let upload_limit = state.config.max_upload_size as usize;
    let uploads = Router::new()
        .route("/admin/upload", post(handlers::upload_files))
        .route("/admin/homepage", post(handlers::change_homepage))
        .layer(DefaultBodyLimit::max(upload_limit));

    Router::new()
        .route("/", get(handlers::index_page))
        .route("/downloads", get(handlers::downloads_page))
        .route("/downloads/archive", get(handlers::downloads_archive_page))
        .route("/downloads/files/*path", get(handlers::serve_package))
        .route(
            "/projects/:project/files/:name",
            get(handlers::serve_project_file),
        )
        .route("/news.xml", get(handlers::news_feed))
        .route("/releases.xml", get(handlers::releases_feed))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/register", post(handlers::register))
        .route("/auth/password", post(handlers::change_password))
        .route("/admin/api", post(handlers::admin_api))
        .merge(uploads)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
