//! Administrative backend: staff-only management endpoints over the
//! catalog. Drafts are visible here, unlike the public site.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::service_error;
use crate::auth::RequireStaff;
use crate::models::book::{BookStatus, Column as BookColumn, Entity as BookEntity};
use crate::models::{author, book, genre, review, user};
use crate::services::book_service::{self, BookChanges};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BookListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub author: Option<i32>,
    pub user: Option<i32>,
    /// Ordering field, `-` prefix for descending.
    pub o: Option<String>,
}

/// One row of the book management list.
#[derive(Debug, Serialize)]
pub struct BookRow {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub first_published: Option<i32>,
    pub thumbnail: String,
    pub time_create: String,
    pub time_update: String,
    pub average_rating: i32,
    pub status: String,
    pub tag_list: String,
    pub user: Option<String>,
}

fn thumbnail(media_url: &str, image: &Option<String>, missing: &str) -> String {
    match image {
        Some(path) => format!("{}{}", media_url, path),
        None => missing.to_string(),
    }
}

pub async fn list_books(
    State(state): State<AppState>,
    RequireStaff(_claims): RequireStaff,
    Query(params): Query<BookListQuery>,
) -> Response {
    let mut query = BookEntity::find();

    if let Some(status) = &params.status {
        query = query.filter(BookColumn::Status.eq(status.as_str()));
    }
    if let Some(author_id) = params.author {
        query = query.filter(BookColumn::AuthorId.eq(author_id));
    }
    if let Some(user_id) = params.user {
        query = query.filter(BookColumn::UserId.eq(user_id));
    }
    if let Some(search) = &params.search {
        if !search.trim().is_empty() {
            let matching_authors: Vec<i32> = match author::Entity::find()
                .filter(author::Column::Name.contains(search.trim()))
                .all(&state.db)
                .await
            {
                Ok(authors) => authors.into_iter().map(|a| a.id).collect(),
                Err(e) => return service_error(e.into()),
            };
            query = query.filter(
                Condition::any()
                    .add(BookColumn::Title.contains(search.trim()))
                    .add(BookColumn::AuthorId.is_in(matching_authors)),
            );
        }
    }

    let (column, descending) = match params.o.as_deref() {
        Some(field) => {
            let (field, descending) = match field.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (field, false),
            };
            let column = match field {
                "title" => BookColumn::Title,
                "time_create" => BookColumn::TimeCreate,
                "time_update" => BookColumn::TimeUpdate,
                "status" => BookColumn::Status,
                _ => BookColumn::Id,
            };
            (column, descending)
        }
        None => (BookColumn::Id, false),
    };
    query = if descending {
        query.order_by_desc(column)
    } else {
        query.order_by_asc(column)
    };

    let books = match query.all(&state.db).await {
        Ok(books) => books,
        Err(e) => return service_error(e.into()),
    };

    let mut rows = Vec::with_capacity(books.len());
    for b in books {
        let author_name = match author::Entity::find_by_id(b.author_id).one(&state.db).await {
            Ok(Some(a)) => a.name,
            Ok(None) => String::new(),
            Err(e) => return service_error(e.into()),
        };
        let owner = match b.user_id {
            Some(uid) => match user::Entity::find_by_id(uid).one(&state.db).await {
                Ok(found) => found.map(|u| u.username),
                Err(e) => return service_error(e.into()),
            },
            None => None,
        };
        let average = match book_service::average_rating(&state.db, b.id).await {
            Ok(avg) => avg,
            Err(e) => return service_error(e),
        };
        let tags = match book_service::tags_for_book(&state.db, b.id).await {
            Ok(tags) => tags,
            Err(e) => return service_error(e),
        };

        rows.push(BookRow {
            id: b.id,
            title: b.title,
            author: author_name,
            first_published: b.first_published,
            thumbnail: thumbnail(&state.config.media_url, &b.image, "No image"),
            time_create: b.time_create,
            time_update: b.time_update,
            average_rating: average,
            status: b.status,
            tag_list: tags.join(", "),
            user: owner,
        });
    }

    Json(json!({ "books": rows, "total": rows.len() })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Inline status edit from the book list.
pub async fn update_book_status(
    State(state): State<AppState>,
    RequireStaff(_claims): RequireStaff,
    Path(id): Path<i32>,
    Json(req): Json<UpdateStatusRequest>,
) -> Response {
    if BookStatus::parse(&req.status).is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Status must be 'draft' or 'published'" })),
        )
            .into_response();
    }

    let book = match BookEntity::find_by_id(id).one(&state.db).await {
        Ok(Some(book)) => book,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Book not found" })),
            )
                .into_response()
        }
        Err(e) => return service_error(e.into()),
    };

    let mut active: book::ActiveModel = book.into();
    active.status = Set(req.status.clone());
    active.time_update = Set(chrono::Utc::now().to_rfc3339());

    match sea_orm::ActiveModelTrait::update(active, &state.db).await {
        Ok(updated) => Json(json!({ "book": updated })).into_response(),
        Err(e) => service_error(e.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub author_id: Option<i32>,
    pub first_published: Option<i32>,
    pub description: Option<String>,
    pub quote: Option<String>,
    pub status: Option<String>,
}

/// Change-form edit. Goes through the same save path as everything else,
/// so the slug is recomputed from the title.
pub async fn update_book(
    State(state): State<AppState>,
    RequireStaff(_claims): RequireStaff,
    Path(id): Path<i32>,
    Json(req): Json<UpdateBookRequest>,
) -> Response {
    let changes = BookChanges {
        title: req.title,
        author_id: req.author_id,
        first_published: req.first_published.map(Some),
        description: req.description,
        quote: req.quote,
        status: req.status,
    };

    match book_service::update_book(&state.db, id, changes).await {
        Ok(updated) => Json(json!({ "book": updated })).into_response(),
        Err(e) => service_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkActionRequest {
    pub action: String,
    pub ids: Vec<i32>,
}

/// Bulk publish/unpublish with a pluralized confirmation message.
pub async fn bulk_action(
    State(state): State<AppState>,
    RequireStaff(_claims): RequireStaff,
    Json(req): Json<BulkActionRequest>,
) -> Response {
    let status = match req.action.as_str() {
        "publish" => BookStatus::Published,
        "unpublish" => BookStatus::Draft,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Action must be 'publish' or 'unpublish'" })),
            )
                .into_response()
        }
    };

    let result = BookEntity::update_many()
        .col_expr(
            BookColumn::Status,
            sea_orm::sea_query::Expr::value(status.as_str()),
        )
        .col_expr(
            BookColumn::TimeUpdate,
            sea_orm::sea_query::Expr::value(chrono::Utc::now().to_rfc3339()),
        )
        .filter(BookColumn::Id.is_in(req.ids))
        .exec(&state.db)
        .await;

    let count = match result {
        Ok(res) => res.rows_affected,
        Err(e) => return service_error(e.into()),
    };

    let message = match (status, count) {
        (BookStatus::Published, 1) => "1 book was published".to_string(),
        (BookStatus::Published, n) => format!("{} books were published", n),
        (BookStatus::Draft, 1) => "1 book was withdrawn from publication!".to_string(),
        (BookStatus::Draft, n) => format!("{} books were withdrawn from publication!", n),
    };

    Json(json!({ "message": message, "count": count })).into_response()
}

#[derive(Debug, Serialize)]
pub struct AuthorRow {
    pub id: i32,
    pub name: String,
    pub thumbnail: String,
}

pub async fn list_authors(
    State(state): State<AppState>,
    RequireStaff(_claims): RequireStaff,
) -> Response {
    let authors = match author::Entity::find()
        .order_by_asc(author::Column::Name)
        .all(&state.db)
        .await
    {
        Ok(authors) => authors,
        Err(e) => return service_error(e.into()),
    };

    let rows: Vec<AuthorRow> = authors
        .into_iter()
        .map(|a| AuthorRow {
            id: a.id,
            name: a.name,
            thumbnail: thumbnail(&state.config.media_url, &a.photo, "No photo"),
        })
        .collect();

    Json(json!({ "authors": rows, "total": rows.len() })).into_response()
}

pub async fn list_genres(
    State(state): State<AppState>,
    RequireStaff(_claims): RequireStaff,
) -> Response {
    match genre::Entity::find()
        .order_by_asc(genre::Column::Title)
        .all(&state.db)
        .await
    {
        Ok(genres) => {
            Json(json!({ "genres": genres, "total": genres.len() })).into_response()
        }
        Err(e) => service_error(e.into()),
    }
}

pub async fn list_reviews(
    State(state): State<AppState>,
    RequireStaff(_claims): RequireStaff,
) -> Response {
    let reviews = match review::Entity::find()
        .order_by_asc(review::Column::Id)
        .all(&state.db)
        .await
    {
        Ok(reviews) => reviews,
        Err(e) => return service_error(e.into()),
    };

    Json(json!({ "reviews": reviews, "total": reviews.len() })).into_response()
}
