//! Catalog views: listings, book detail with reviews, add-book.

use axum::{
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::{base_context, page_not_found, service_error};
use crate::auth::RequireUser;
use crate::forms::{AddBookForm, FormErrors, ReviewForm};
use crate::services::book_service::{self, NewBook};
use crate::services::{media, review_service, ServiceError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub page: Option<String>,
}

impl Pagination {
    /// A missing page means the first one; a non-numeric page is a miss,
    /// matching how the listings treat any bad page argument.
    fn number(&self) -> Option<u64> {
        match &self.page {
            None => Some(1),
            Some(raw) => raw.parse().ok(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/",
    params(
        ("page" = Option<String>, Query, description = "1-based page number")
    ),
    responses(
        (status = 200, description = "Published books, seven per page"),
        (status = 404, description = "Page out of range")
    )
)]
pub async fn home(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Response {
    let Some(page_number) = pagination.number() else {
        return page_not_found();
    };
    let page = match book_service::list_published(&state.db, page_number).await {
        Ok(page) => page,
        Err(e) => return service_error(e),
    };
    let books = match book_service::book_views(&state.db, page.items).await {
        Ok(views) => views,
        Err(e) => return service_error(e),
    };

    let mut context = base_context("All genres");
    context.insert("genre_selected".to_string(), json!(0));
    context.insert("books".to_string(), json!(books));
    context.insert("page".to_string(), json!(page.page));
    context.insert("num_pages".to_string(), json!(page.num_pages));
    context.insert("total".to_string(), json!(page.total));
    Json(context).into_response()
}

pub async fn by_tag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Query(pagination): Query<Pagination>,
) -> Response {
    let Some(page_number) = pagination.number() else {
        return page_not_found();
    };
    let (tag, page) = match book_service::list_by_tag(&state.db, &tag, page_number).await {
        Ok(found) => found,
        Err(e) => return service_error(e),
    };
    let books = match book_service::book_views(&state.db, page.items).await {
        Ok(views) => views,
        Err(e) => return service_error(e),
    };

    let mut context = base_context(&format!("Books by tag: #{}", tag.name));
    context.insert("books".to_string(), json!(books));
    context.insert("page".to_string(), json!(page.page));
    context.insert("num_pages".to_string(), json!(page.num_pages));
    context.insert("total".to_string(), json!(page.total));
    Json(context).into_response()
}

pub async fn by_genre(
    State(state): State<AppState>,
    Path(genre_slug): Path<String>,
    Query(pagination): Query<Pagination>,
) -> Response {
    let Some(page_number) = pagination.number() else {
        return page_not_found();
    };
    // An empty genre listing is a miss, unlike the tag listing
    let (genre, page) =
        match book_service::list_by_genre(&state.db, &genre_slug, page_number).await {
            Ok(found) => found,
            Err(e) => return service_error(e),
        };
    let books = match book_service::book_views(&state.db, page.items).await {
        Ok(views) => views,
        Err(e) => return service_error(e),
    };

    let mut context = base_context(&format!("Genre: {}", genre.title));
    context.insert("genre_selected".to_string(), json!(genre.id));
    context.insert("books".to_string(), json!(books));
    context.insert("page".to_string(), json!(page.page));
    context.insert("num_pages".to_string(), json!(page.num_pages));
    context.insert("total".to_string(), json!(page.total));
    Json(context).into_response()
}

async fn render_book_detail(state: &AppState, book_slug: &str) -> Response {
    let book = match book_service::published_by_slug(&state.db, book_slug).await {
        Ok(book) => book,
        Err(e) => return service_error(e),
    };
    let book_id = book.id;
    let view = match book_service::book_view(&state.db, book).await {
        Ok(view) => view,
        Err(e) => return service_error(e),
    };
    let reviews = match review_service::for_book(&state.db, book_id).await {
        Ok(reviews) => reviews,
        Err(e) => return service_error(e),
    };

    let mut context = base_context(&view.title);
    context.insert("book".to_string(), json!(view));
    context.insert("reviews".to_string(), json!(reviews));
    context.insert("form".to_string(), json!(ReviewForm::default()));
    Json(context).into_response()
}

#[utoipa::path(
    get,
    path = "/book/{book_slug}/",
    params(
        ("book_slug" = String, Path, description = "Slug of a published book")
    ),
    responses(
        (status = 200, description = "Book with its reviews and rating"),
        (status = 404, description = "Unknown slug or draft book")
    )
)]
pub async fn book_detail(
    State(state): State<AppState>,
    Path(book_slug): Path<String>,
) -> Response {
    render_book_detail(&state, &book_slug).await
}

/// Raw review submission. The fields go straight into a Review without
/// form validation, so an out-of-range rating is stored as-is; a missing
/// rating falls back to the model default of 0.
#[derive(Debug, Deserialize)]
pub struct ReviewPost {
    #[serde(default)]
    pub rating: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

pub async fn post_review(
    State(state): State<AppState>,
    Path(book_slug): Path<String>,
    RequireUser(claims): RequireUser,
    Form(post): Form<ReviewPost>,
) -> Response {
    let book = match book_service::published_by_slug(&state.db, &book_slug).await {
        Ok(book) => book,
        Err(e) => return service_error(e),
    };

    let rating = post
        .rating
        .as_deref()
        .and_then(|r| r.parse().ok())
        .unwrap_or(0);
    let text = post.text.unwrap_or_default();

    // Silently skipped when this user already reviewed the book
    if let Err(e) = review_service::add_review(&state.db, book.id, claims.uid, rating, text).await
    {
        return service_error(e);
    }

    render_book_detail(&state, &book_slug).await
}

pub async fn add_book_page(
    State(state): State<AppState>,
    RequireUser(_claims): RequireUser,
) -> Response {
    let authors = match book_service::all_authors(&state.db).await {
        Ok(authors) => authors,
        Err(e) => return service_error(e),
    };
    let genres = match book_service::all_genres(&state.db).await {
        Ok(genres) => genres,
        Err(e) => return service_error(e),
    };

    let mut context = base_context("Add a Book");
    context.insert("form".to_string(), json!(AddBookForm::default()));
    context.insert("authors".to_string(), json!(authors));
    context.insert("genres".to_string(), json!(genres));
    Json(context).into_response()
}

async fn parse_add_book_form(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<(AddBookForm, FormErrors), Response> {
    let mut form = AddBookForm::default();
    let mut errors = FormErrors::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            axum::http::StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("Malformed form data: {}", e) })),
        )
            .into_response()
    })? {
        let Some(name) = field.name().map(|n| n.to_string()) else {
            continue;
        };

        if name == "image" {
            let filename = field.file_name().map(|f| f.to_string());
            let bytes = field.bytes().await.unwrap_or_default();
            if let Some(filename) = filename {
                if !bytes.is_empty() {
                    match media::save_upload(&state.config.media_root, "images", &filename, &bytes)
                    {
                        Ok(path) => form.image = Some(path),
                        Err(e) => {
                            tracing::error!("Failed to store cover image: {}", e);
                            errors.add("image", "Could not store the uploaded image");
                        }
                    }
                }
            }
            continue;
        }

        let value = field.text().await.unwrap_or_default();
        match name.as_str() {
            "title" => form.title = value,
            "author" => match value.parse() {
                Ok(id) => form.author = Some(id),
                Err(_) => errors.add("author", "Select a valid author"),
            },
            "genre" => match value.parse() {
                Ok(id) => form.genres.push(id),
                Err(_) => errors.add("genre", "Select a valid genre"),
            },
            "first_published" => {
                if !value.trim().is_empty() {
                    match value.trim().parse() {
                        Ok(year) => form.first_published = Some(year),
                        Err(_) => errors.add("first_published", "Enter a whole number"),
                    }
                }
            }
            "description" => form.description = value,
            "quote" => form.quote = value,
            "tags" => {
                form.tags = value
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
            }
            "slug" => form.slug = value,
            _ => {}
        }
    }

    Ok((form, errors))
}

fn add_book_error_context(form: &AddBookForm, errors: &FormErrors) -> Response {
    let mut context = base_context("Add a Book");
    context.insert("form".to_string(), json!(form));
    context.insert("errors".to_string(), json!(errors));
    Json(context).into_response()
}

pub async fn add_book(
    State(state): State<AppState>,
    RequireUser(claims): RequireUser,
    mut multipart: Multipart,
) -> Response {
    let (form, mut errors) = match parse_add_book_form(&state, &mut multipart).await {
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
        return add_book_error_context(&form, &errors);
    }

    let new_book = NewBook {
        title: form.title.clone(),
        author_id: form.author.unwrap_or_default(),
        genre_ids: form.genres.clone(),
        first_published: form.first_published,
        description: form.description.clone(),
        quote: form.quote.clone(),
        image: form.image.clone(),
        tags: form.tags.clone(),
    };

    match book_service::create_book(&state.db, new_book, claims.uid).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(ServiceError::Validation(msg)) => {
            errors.add("author", &msg);
            add_book_error_context(&form, &errors)
        }
        Err(ServiceError::Database(msg)) if msg.contains("UNIQUE") => {
            errors.add("slug", "Book with this slug already exists");
            add_book_error_context(&form, &errors)
        }
        Err(e) => service_error(e),
    }
}
