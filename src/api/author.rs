use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;

use crate::api::{base_context, page_not_found, service_error};
use crate::models::author::{Column as AuthorColumn, Entity as Author};
use crate::services::book_service;
use crate::state::AppState;

/// Author detail: the author plus their published books.
pub async fn author_detail(
    State(state): State<AppState>,
    Path(author_slug): Path<String>,
) -> Response {
    let author = match Author::find()
        .filter(AuthorColumn::Slug.eq(author_slug))
        .one(&state.db)
        .await
    {
        Ok(Some(author)) => author,
        Ok(None) => return page_not_found(),
        Err(e) => return service_error(e.into()),
    };

    let books = match book_service::published_by_author(&state.db, author.id).await {
        Ok(books) => books,
        Err(e) => return service_error(e),
    };
    let books = match book_service::book_views(&state.db, books).await {
        Ok(views) => views,
        Err(e) => return service_error(e),
    };

    let mut context = base_context(&author.name);
    context.insert("author".to_string(), json!(author));
    context.insert("books".to_string(), json!(books));
    Json(context).into_response()
}
