//! Static pages, the contact form and the 404 fallback.

use axum::{
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde_json::json;

use crate::api::{base_context, page_not_found};
use crate::forms::ContactForm;

pub async fn about() -> Response {
    let context = base_context("About");
    Json(context).into_response()
}

pub async fn contact_page() -> Response {
    let mut context = base_context("Contact Us");
    context.insert("form".to_string(), json!(ContactForm::default()));
    Json(context).into_response()
}

/// Validate and redirect home on success; re-render with field errors
/// otherwise.
pub async fn contact(Form(form): Form<ContactForm>) -> Response {
    let errors = form.validate();
    if errors.is_empty() {
        tracing::info!("Contact form submitted by {}", form.email);
        return Redirect::to("/").into_response();
    }

    let mut context = base_context("Contact Us");
    context.insert("form".to_string(), json!(form));
    context.insert("errors".to_string(), json!(errors));
    Json(context).into_response()
}

pub async fn fallback() -> Response {
    page_not_found()
}
