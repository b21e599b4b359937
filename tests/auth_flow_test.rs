//! Account flows: signup validation, login, and the login-required guard.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tower::util::ServiceExt; // for `oneshot`

use bookworm::config::Config;
use bookworm::models::user;
use bookworm::state::AppState;
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

async fn create_user(db: &DatabaseConnection, username: &str, email: &str) -> user::Model {
    let now = chrono::Utc::now().to_rfc3339();
    user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        password_hash: Set(auth::hash_password("correct horse").unwrap()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        is_staff: Set(false),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create user")
}

async fn post_form(app: &Router, uri: &str, body: &str) -> axum::response::Response {
    let req = Request::builder()
        .uri(uri)
        .method("POST")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(req).await.unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
}

#[tokio::test]
async fn signup_rejects_registered_email_with_field_error() {
    let (app, db) = setup_app().await;
    create_user(&db, "existing", "taken@example.com").await;

    let response = post_form(
        &app,
        "/auth/signup/",
        "username=newcomer&email=taken%40example.com&password1=longenough&password2=longenough",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let email_errors = body["errors"]["email"].as_array().expect("email errors");
    assert_eq!(email_errors[0], "This email already exists");

    // No duplicate account was created
    let count = user::Entity::find()
        .filter(user::Column::Email.eq("taken@example.com"))
        .all(&db)
        .await
        .unwrap()
        .len();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn signup_success_redirects_to_login() {
    let (app, db) = setup_app().await;

    let response = post_form(
        &app,
        "/auth/signup/",
        "username=newcomer&email=new%40example.com&password1=longenough&password2=longenough",
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/auth/login/"
    );

    let created = user::Entity::find()
        .filter(user::Column::Username.eq("newcomer"))
        .one(&db)
        .await
        .unwrap();
    assert!(created.is_some());
}

#[tokio::test]
async fn login_sets_session_cookie_and_redirects_home() {
    let (app, db) = setup_app().await;
    create_user(&db, "reader", "reader@example.com").await;

    let response = post_form(&app, "/auth/login/", "username=reader&password=correct+horse").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("session="));
}

#[tokio::test]
async fn failed_login_rerenders_with_generic_error() {
    let (app, db) = setup_app().await;
    create_user(&db, "reader", "reader@example.com").await;

    let response = post_form(&app, "/auth/login/", "username=reader&password=wrong").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["errors"]["__all__"][0], "Invalid username or password");

    // Unknown usernames get the same message
    let response = post_form(&app, "/auth/login/", "username=ghost&password=whatever").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["errors"]["__all__"][0], "Invalid username or password");
}

#[tokio::test]
async fn addbook_requires_login() {
    let (app, _db) = setup_app().await;

    let req = Request::builder()
        .uri("/addbook/")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/auth/login/"
    );
}

#[tokio::test]
async fn addbook_accepts_session_cookie() {
    let (app, db) = setup_app().await;
    let user = create_user(&db, "reader", "reader@example.com").await;
    let token = auth::create_jwt(&user.username, user.id, user.is_staff).unwrap();

    let req = Request::builder()
        .uri("/addbook/")
        .header(header::COOKIE, format!("session={}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["title"], "Add a Book");
    assert!(body.get("authors").is_some());
    assert!(body.get("genres").is_some());
}

#[tokio::test]
async fn profile_edit_requires_login_and_targets_requesting_user() {
    let (app, db) = setup_app().await;
    let user = create_user(&db, "reader", "reader@example.com").await;
    let token = auth::create_jwt(&user.username, user.id, user.is_staff).unwrap();

    let req = Request::builder()
        .uri("/auth/profile/edit/")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let req = Request::builder()
        .uri("/auth/profile/edit/")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["form"]["username"], "reader");
    assert_eq!(body["form"]["readonly"][0], "username");
}

#[tokio::test]
async fn profile_view_shows_viewer_authentication_flag() {
    let (app, db) = setup_app().await;
    let user = create_user(&db, "reader", "reader@example.com").await;
    let token = auth::create_jwt(&user.username, user.id, user.is_staff).unwrap();

    let req = Request::builder()
        .uri(format!("/auth/profile/{}/", user.id))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["title"], "reader profile");
    assert_eq!(body["is_authenticated"], false);

    let req = Request::builder()
        .uri(format!("/auth/profile/{}/", user.id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["is_authenticated"], true);

    // Profiles never expose password hashes
    assert!(body["user"].get("password_hash").is_none());

    let req = Request::builder()
        .uri("/auth/profile/9999/")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_numeric_profile_id_is_404_not_400() {
    let (app, _db) = setup_app().await;

    let req = Request::builder()
        .uri("/auth/profile/abc/")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn password_change_verifies_old_password() {
    let (app, db) = setup_app().await;
    let user = create_user(&db, "reader", "reader@example.com").await;
    let token = auth::create_jwt(&user.username, user.id, user.is_staff).unwrap();

    let req = Request::builder()
        .uri("/auth/password-change/")
        .method("POST")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(
            "old_password=wrong&new_password1=newsecret1&new_password2=newsecret1",
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["errors"].get("old_password").is_some());

    let req = Request::builder()
        .uri("/auth/password-change/")
        .method("POST")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(
            "old_password=correct+horse&new_password1=newsecret1&new_password2=newsecret1",
        ))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let updated = user::Entity::find_by_id(user.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(auth::verify_password("newsecret1", &updated.password_hash).unwrap());
}

#[tokio::test]
async fn contact_form_redirects_on_success_and_rerenders_on_errors() {
    let (app, _db) = setup_app().await;

    let response = post_form(
        &app,
        "/contact/",
        "name=Reader&email=reader%40example.com&content=Hello",
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");

    let response = post_form(&app, "/contact/", "name=&email=bad&content=").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["errors"].get("name").is_some());
    assert!(body["errors"].get("email").is_some());
    assert!(body["errors"].get("content").is_some());
}
