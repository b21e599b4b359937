//! Login, logout and sign-up flows.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::json;

use crate::api::base_context;
use crate::auth::{create_jwt, clear_session_cookie, hash_password, session_cookie, verify_password};
use crate::forms::{LoginForm, SignupForm};
use crate::models::user::{self, Entity as User};
use crate::state::AppState;

pub async fn login_page() -> Response {
    let context = base_context("Log in");
    Json(context).into_response()
}

fn invalid_credentials() -> Response {
    // Failed logins re-render the form with a generic error, never a hint
    // about which part was wrong
    let mut context = base_context("Log in");
    context.insert(
        "errors".to_string(),
        json!({ "__all__": ["Invalid username or password"] }),
    );
    Json(context).into_response()
}

pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    tracing::info!("Login attempt for user: {}", form.username);

    let user = match User::find()
        .filter(user::Column::Username.eq(&form.username))
        .one(&state.db)
        .await
    {
        Ok(Some(u)) => u,
        Ok(None) => {
            tracing::warn!("User not found: {}", form.username);
            return invalid_credentials();
        }
        Err(e) => {
            tracing::error!("Database error during login: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response();
        }
    };

    match verify_password(&form.password, &user.password_hash) {
        Ok(true) => {
            let token = match create_jwt(&user.username, user.id, user.is_staff) {
                Ok(token) => token,
                Err(e) => {
                    tracing::error!("Failed to create session token: {}", e);
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "error": "Internal server error" })),
                    )
                        .into_response();
                }
            };
            (
                [(header::SET_COOKIE, session_cookie(&token))],
                Redirect::to("/"),
            )
                .into_response()
        }
        _ => {
            tracing::warn!("Password verification failed for user: {}", user.username);
            invalid_credentials()
        }
    }
}

pub async fn logout() -> Response {
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Redirect::to(crate::auth::LOGIN_URL),
    )
        .into_response()
}

pub async fn signup_page() -> Response {
    let mut context = base_context("Sign in");
    context.insert("form".to_string(), json!(SignupForm::default()));
    Json(context).into_response()
}

fn signup_error_context(form: &SignupForm, errors: &crate::forms::FormErrors) -> Response {
    let mut context = base_context("Sign in");
    // Passwords never travel back into the rendering context
    let echoed = SignupForm {
        username: form.username.clone(),
        email: form.email.clone(),
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        ..Default::default()
    };
    context.insert("form".to_string(), json!(echoed));
    context.insert("errors".to_string(), json!(errors));
    Json(context).into_response()
}

pub async fn signup(State(state): State<AppState>, Form(form): Form<SignupForm>) -> Response {
    let mut errors = form.validate();

    // Username collisions are also caught by the unique column, but the
    // form reports them next to the field like everything else
    if !errors.has("username") {
        match User::find()
            .filter(user::Column::Username.eq(&form.username))
            .one(&state.db)
            .await
        {
            Ok(Some(_)) => errors.add("username", "A user with that username already exists"),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Database error during signup: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response();
            }
        }
    }

    if !errors.has("email") {
        match User::find()
            .filter(user::Column::Email.eq(&form.email))
            .one(&state.db)
            .await
        {
            Ok(Some(_)) => errors.add("email", "This email already exists"),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Database error during signup: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response();
            }
        }
    }

    if !errors.is_empty() {
        return signup_error_context(&form, &errors);
    }

    let password_hash = match hash_password(&form.password1) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("Failed to hash password: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response();
        }
    };

    let now = chrono::Utc::now().to_rfc3339();
    let new_user = user::ActiveModel {
        username: Set(form.username.clone()),
        email: Set(form.email.clone()),
        password_hash: Set(password_hash),
        first_name: Set(form.first_name.clone()),
        last_name: Set(form.last_name.clone()),
        is_staff: Set(false),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    match new_user.insert(&state.db).await {
        Ok(created) => {
            tracing::info!("New account created: {}", created.username);
            Redirect::to(crate::auth::LOGIN_URL).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to create account: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}
