pub mod admin;
pub mod auth;
pub mod author;
pub mod books;
pub mod health;
pub mod pages;
pub mod profile;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, patch, post},
    Router,
};
use serde_json::{json, Map, Value};

use crate::services::ServiceError;
use crate::state::AppState;

/// Shared context fields every view starts from. `genre_selected` marks
/// the active genre filter in navigation (0 on the home listing, null
/// elsewhere unless a genre view overrides it).
pub fn base_context(title: &str) -> Map<String, Value> {
    let mut context = Map::new();
    context.insert("title".to_string(), json!(title));
    context.insert("genre_selected".to_string(), Value::Null);
    context
}

/// Minimal plain page for anything that cannot be found.
pub fn page_not_found() -> Response {
    (StatusCode::NOT_FOUND, Html("<h1>Page not found</h1>")).into_response()
}

/// Map a service failure onto a response: misses become the plain 404
/// page, the rest become JSON errors.
pub fn service_error(err: ServiceError) -> Response {
    match err {
        ServiceError::NotFound => page_not_found(),
        ServiceError::Validation(msg) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
        }
        ServiceError::Database(msg) => {
            tracing::error!("Database error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Public catalog
        .route("/", get(books::home))
        .route("/tags/:tag/", get(books::by_tag))
        .route("/genre/:genre_slug/", get(books::by_genre))
        .route("/author/:author_slug/", get(author::author_detail))
        .route(
            "/book/:book_slug/",
            get(books::book_detail).post(books::post_review),
        )
        .route(
            "/addbook/",
            get(books::add_book_page).post(books::add_book),
        )
        .route("/about/", get(pages::about))
        .route("/contact/", get(pages::contact_page).post(pages::contact))
        // Accounts
        .route("/auth/login/", get(auth::login_page).post(auth::login))
        .route("/auth/logout/", post(auth::logout))
        .route("/auth/signup/", get(auth::signup_page).post(auth::signup))
        .route("/auth/profile/:id/", get(profile::profile_view))
        .route(
            "/auth/profile/edit/",
            get(profile::edit_page).post(profile::edit),
        )
        .route(
            "/auth/password-change/",
            get(profile::password_change_page).post(profile::password_change),
        )
        .route(
            "/auth/password-change/done/",
            get(profile::password_change_done),
        )
        // Administrative backend
        .route("/admin/books", get(admin::list_books))
        .route("/admin/books/:id", axum::routing::put(admin::update_book))
        .route("/admin/books/:id/status", patch(admin::update_book_status))
        .route("/admin/books/bulk", post(admin::bulk_action))
        .route("/admin/authors", get(admin::list_authors))
        .route("/admin/genres", get(admin::list_genres))
        .route("/admin/reviews", get(admin::list_reviews))
        // Health check
        .route("/api/health", get(health::health_check))
        .fallback(pages::fallback)
        .with_state(state)
}
