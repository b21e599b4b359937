//! User profiles: public view, self-edit, password change.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::json;

use crate::api::{base_context, page_not_found, service_error};
use crate::auth::{hash_password, verify_password, MaybeUser, RequireUser};
use crate::forms::{FormErrors, PasswordChangeForm, ProfileForm};
use crate::models::user::{self, Entity as User, UserView};
use crate::services::{book_service, media, review_service};
use crate::state::AppState;

/// Any user's profile by id: their published books and reviews, plus a
/// viewer-authenticated flag for the presentation layer. A non-numeric id
/// is a miss, not a malformed request.
pub async fn profile_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
    MaybeUser(viewer): MaybeUser,
) -> Response {
    let Ok(id) = id.parse::<i32>() else {
        return page_not_found();
    };
    let user = match User::find_by_id(id).one(&state.db).await {
        Ok(Some(user)) => user,
        Ok(None) => return page_not_found(),
        Err(e) => return service_error(e.into()),
    };

    let books = match book_service::published_by_user(&state.db, user.id).await {
        Ok(books) => books,
        Err(e) => return service_error(e),
    };
    let books = match book_service::book_views(&state.db, books).await {
        Ok(views) => views,
        Err(e) => return service_error(e),
    };
    let reviews = match review_service::for_user(&state.db, user.id).await {
        Ok(reviews) => reviews,
        Err(e) => return service_error(e),
    };

    let mut context = base_context(&format!("{} profile", user.username));
    context.insert("user".to_string(), json!(UserView::from(user)));
    context.insert("user_books".to_string(), json!(books));
    context.insert("user_reviews".to_string(), json!(reviews));
    context.insert(
        "default_avatar".to_string(),
        json!(state.config.default_avatar),
    );
    context.insert("is_authenticated".to_string(), json!(viewer.is_some()));
    Json(context).into_response()
}

/// The edit form always targets the requesting user, never an id from
/// the path. Username and email are included read-only.
pub async fn edit_page(
    State(state): State<AppState>,
    RequireUser(claims): RequireUser,
) -> Response {
    let user = match User::find_by_id(claims.uid).one(&state.db).await {
        Ok(Some(user)) => user,
        Ok(None) => return page_not_found(),
        Err(e) => return service_error(e.into()),
    };

    let mut context = base_context("Change Profile");
    context.insert(
        "form".to_string(),
        json!({
            "username": user.username,
            "email": user.email,
            "first_name": user.first_name,
            "last_name": user.last_name,
            "date_birth": user.date_birth,
            "avatar": user.avatar,
            "readonly": ["username", "email"],
        }),
    );
    context.insert(
        "default_avatar".to_string(),
        json!(state.config.default_avatar),
    );
    Json(context).into_response()
}

async fn parse_profile_form(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<(ProfileForm, FormErrors), Response> {
    let mut form = ProfileForm::default();
    let mut errors = FormErrors::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("Malformed form data: {}", e) })),
        )
            .into_response()
    })? {
        let Some(name) = field.name().map(|n| n.to_string()) else {
            continue;
        };

        if name == "avatar" {
            let filename = field.file_name().map(|f| f.to_string());
            let bytes = field.bytes().await.unwrap_or_default();
            if let Some(filename) = filename {
                if !bytes.is_empty() {
                    match media::save_upload(&state.config.media_root, "users", &filename, &bytes)
                    {
                        Ok(path) => form.avatar = Some(path),
                        Err(e) => {
                            tracing::error!("Failed to store avatar: {}", e);
                            errors.add("avatar", "Could not store the uploaded image");
                        }
                    }
                }
            }
            continue;
        }

        let value = field.text().await.unwrap_or_default();
        match name.as_str() {
            "first_name" => form.first_name = value,
            "last_name" => form.last_name = value,
            "date_birth" => {
                if !value.trim().is_empty() {
                    form.date_birth = Some(value.trim().to_string());
                }
            }
            // Submitted username/email are ignored: those fields are
            // display-only on this form
            _ => {}
        }
    }

    Ok((form, errors))
}

pub async fn edit(
    State(state): State<AppState>,
    RequireUser(claims): RequireUser,
    mut multipart: Multipart,
) -> Response {
    let user = match User::find_by_id(claims.uid).one(&state.db).await {
        Ok(Some(user)) => user,
        Ok(None) => return page_not_found(),
        Err(e) => return service_error(e.into()),
    };

    let (form, mut errors) = match parse_profile_form(&state, &mut multipart).await {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };
    let field_errors = form.validate();
    for (field, messages) in field_errors.0 {
        for message in messages {
            errors.add(&field, &message);
        }
    }
    if !errors.is_empty() {
        let mut context = base_context("Change Profile");
        context.insert("form".to_string(), json!(form));
        context.insert("errors".to_string(), json!(errors));
        return Json(context).into_response();
    }

    let user_id = user.id;
    let mut active: user::ActiveModel = user.into();
    active.first_name = Set(form.first_name);
    active.last_name = Set(form.last_name);
    if form.date_birth.is_some() {
        active.date_birth = Set(form.date_birth);
    }
    if form.avatar.is_some() {
        active.avatar = Set(form.avatar);
    }
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    match active.update(&state.db).await {
        Ok(_) => Redirect::to(&format!("/auth/profile/{}/", user_id)).into_response(),
        Err(e) => service_error(e.into()),
    }
}

pub async fn password_change_page(RequireUser(_claims): RequireUser) -> Response {
    let context = base_context("Change Password");
    Json(context).into_response()
}

pub async fn password_change(
    State(state): State<AppState>,
    RequireUser(claims): RequireUser,
    Form(form): Form<PasswordChangeForm>,
) -> Response {
    let user = match User::find_by_id(claims.uid).one(&state.db).await {
        Ok(Some(user)) => user,
        Ok(None) => return page_not_found(),
        Err(e) => return service_error(e.into()),
    };

    let mut errors = form.validate();
    if !errors.has("old_password") {
        match verify_password(&form.old_password, &user.password_hash) {
            Ok(true) => {}
            _ => errors.add("old_password", "Your old password was entered incorrectly"),
        }
    }
    if !errors.is_empty() {
        let mut context = base_context("Change Password");
        context.insert("errors".to_string(), json!(errors));
        return Json(context).into_response();
    }

    let password_hash = match hash_password(&form.new_password1) {
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

    let mut active: user::ActiveModel = user.into();
    active.password_hash = Set(password_hash);
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    match active.update(&state.db).await {
        Ok(_) => Redirect::to("/auth/password-change/done/").into_response(),
        Err(e) => service_error(e.into()),
    }
}

pub async fn password_change_done() -> Response {
    let context = base_context("Password changed");
    Json(context).into_response()
}
