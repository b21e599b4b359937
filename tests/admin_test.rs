//! Staff-only management backend: drafts visible, bulk actions, inline
//! status edits.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use tower::util::ServiceExt; // for `oneshot`

use bookworm::config::Config;
use bookworm::models::{author, book, user};
use bookworm::state::AppState;
use bookworm::utils::slugify;
use bookworm::{api, auth, db};

fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        port: 0,
        media_root: std::env::temp_dir().join("bookworm-test-media"),
        media_url: "/media/".to_string(),
        default_avatar: "/static/images/default_avatar.png".to_string(),
        debug: false,
        cors_allowed_origins: vec![],
    }
}

async fn setup_app() -> (Router, DatabaseConnection) {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    let app = api::api_router(AppState::new(db.clone(), test_config()));
    (app, db)
}

async fn create_user(db: &DatabaseConnection, username: &str, is_staff: bool) -> user::Model {
    let now = chrono::Utc::now().to_rfc3339();
    user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{}@example.com", username)),
        password_hash: Set("hash".to_string()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        is_staff: Set(is_staff),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create user")
}

async fn create_book(
    db: &DatabaseConnection,
    title: &str,
    author_id: i32,
    status: &str,
) -> book::Model {
    let now = chrono::Utc::now().to_rfc3339();
    book::ActiveModel {
        title: Set(title.to_string()),
        author_id: Set(author_id),
        description: Set(String::new()),
        quote: Set(String::new()),
        slug: Set(slugify(title)),
        time_create: Set(now.clone()),
        time_update: Set(now),
        status: Set(status.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create book")
}

async fn create_test_author(db: &DatabaseConnection) -> author::Model {
    author::ActiveModel {
        name: Set("Frank Herbert".to_string()),
        description: Set(String::new()),
        slug: Set("frank-herbert".to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

fn staff_token(user: &user::Model) -> String {
    auth::create_jwt(&user.username, user.id, user.is_staff).expect("Failed to create token")
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: &str,
    payload: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .uri(uri)
        .method(method)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

#[tokio::test]
async fn admin_list_requires_staff() {
    let (app, db) = setup_app().await;
    let regular = create_user(&db, "reader", false).await;

    let req = Request::builder()
        .uri("/admin/books")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/admin/books")
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", staff_token(&regular)),
        )
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_list_includes_drafts() {
    let (app, db) = setup_app().await;
    let staff = create_user(&db, "admin", true).await;
    let author = create_test_author(&db).await;
    create_book(&db, "Dune", author.id, "published").await;
    create_book(&db, "Dune Messiah", author.id, "draft").await;

    let req = Request::builder()
        .uri("/admin/books")
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", staff_token(&staff)),
        )
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let books = body["books"].as_array().unwrap();
    assert_eq!(books.len(), 2);
    assert_eq!(books[0]["author"], "Frank Herbert");
    assert_eq!(books[0]["thumbnail"], "No image");
}

#[tokio::test]
async fn admin_search_matches_title_and_author_name() {
    let (app, db) = setup_app().await;
    let staff = create_user(&db, "admin", true).await;
    let herbert = create_test_author(&db).await;
    let asimov = author::ActiveModel {
        name: Set("Isaac Asimov".to_string()),
        description: Set(String::new()),
        slug: Set("isaac-asimov".to_string()),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();
    create_book(&db, "Dune", herbert.id, "published").await;
    create_book(&db, "Foundation", asimov.id, "draft").await;

    let req = Request::builder()
        .uri("/admin/books?search=Asimov")
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", staff_token(&staff)),
        )
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let books = body["books"].as_array().unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0]["title"], "Foundation");
}

#[tokio::test]
async fn inline_status_edit_validates_value() {
    let (app, db) = setup_app().await;
    let staff = create_user(&db, "admin", true).await;
    let author = create_test_author(&db).await;
    let book = create_book(&db, "Dune", author.id, "draft").await;
    let token = staff_token(&staff);

    let (status, _) = send_json(
        &app,
        "PATCH",
        &format!("/admin/books/{}/status", book.id),
        &token,
        serde_json::json!({ "status": "archived" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send_json(
        &app,
        "PATCH",
        &format!("/admin/books/{}/status", book.id),
        &token,
        serde_json::json!({ "status": "published" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book"]["status"], "published");
}

#[tokio::test]
async fn bulk_publish_pluralizes_confirmation() {
    let (app, db) = setup_app().await;
    let staff = create_user(&db, "admin", true).await;
    let author = create_test_author(&db).await;
    let one = create_book(&db, "Dune", author.id, "draft").await;
    let two = create_book(&db, "Dune Messiah", author.id, "draft").await;
    let token = staff_token(&staff);

    let (status, body) = send_json(
        &app,
        "POST",
        "/admin/books/bulk",
        &token,
        serde_json::json!({ "action": "publish", "ids": [one.id] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "1 book was published");

    let (status, body) = send_json(
        &app,
        "POST",
        "/admin/books/bulk",
        &token,
        serde_json::json!({ "action": "unpublish", "ids": [one.id, two.id] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "2 books were withdrawn from publication!");

    let reloaded = book::Entity::find_by_id(one.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.status, "draft");
}

#[tokio::test]
async fn bulk_action_rejects_unknown_action() {
    let (app, db) = setup_app().await;
    let staff = create_user(&db, "admin", true).await;
    let token = staff_token(&staff);

    let (status, _) = send_json(
        &app,
        "POST",
        "/admin/books/bulk",
        &token,
        serde_json::json!({ "action": "delete", "ids": [1] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_edit_recomputes_slug() {
    let (app, db) = setup_app().await;
    let staff = create_user(&db, "admin", true).await;
    let author = create_test_author(&db).await;
    let book = create_book(&db, "Dune", author.id, "published").await;
    let token = staff_token(&staff);

    let (status, body) = send_json(
        &app,
        "PUT",
        &format!("/admin/books/{}", book.id),
        &token,
        serde_json::json!({ "title": "Dune (Deluxe Edition)" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book"]["slug"], "dune-deluxe-edition");
}
