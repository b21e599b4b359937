// Server module - builds the HTTP application from configuration

use axum::Router;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api;
use crate::api_docs::ApiDoc;
use crate::config::Config;
use crate::state::AppState;

/// Build the full application router.
pub fn build_router(db: DatabaseConnection, config: Config) -> Router {
    let media_url = config.media_url.trim_matches('/').to_string();
    let media_root = config.media_root.clone();
    let debug = config.debug;

    let mut cors_allowed_origins = Vec::new();
    for origin in &config.cors_allowed_origins {
        match origin.parse::<axum::http::HeaderValue>() {
            Ok(v) => cors_allowed_origins.push(v),
            Err(e) => tracing::error!("Failed to parse CORS origin '{}': {}", origin, e),
        }
    }

    let state = AppState::new(db, config);

    let mut app = Router::new()
        .merge(SwaggerUi::new("/api/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api::api_router(state));

    // Uploaded media is only served by this process in debug mode; in
    // production a front server owns the media URL
    if debug {
        app = app.nest_service(&format!("/{}", media_url), ServeDir::new(media_root));
    }

    app.layer(
        CorsLayer::new()
            .allow_origin(cors_allowed_origins)
            .allow_methods(Any)
            .allow_headers(Any),
    )
    .layer(TraceLayer::new_for_http())
}
