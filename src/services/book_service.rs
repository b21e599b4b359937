//! Book catalog operations: published listings, slug lifecycle, ratings.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Select, Set,
};
use serde::Serialize;

use crate::models::book::{
    ActiveModel as BookActiveModel, BookStatus, BookView, Column as BookColumn,
    Entity as BookEntity,
};
use crate::models::{author, book, book_genres, book_tags, genre, review, tag};
use crate::services::ServiceError;
use crate::utils::slugify;

/// Public listings show seven books per page.
pub const PAGE_SIZE: u64 = 7;

/// One page of a listing, 1-based.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub num_pages: u64,
    pub total: u64,
}

/// Base query for everything the public site is allowed to see.
pub fn published() -> Select<BookEntity> {
    BookEntity::find()
        .filter(BookColumn::Status.eq(BookStatus::Published.as_str()))
        .order_by_asc(BookColumn::Id)
}

async fn paginate(
    db: &DatabaseConnection,
    query: Select<BookEntity>,
    page: u64,
) -> Result<Page<book::Model>, ServiceError> {
    if page == 0 {
        return Err(ServiceError::NotFound);
    }

    let paginator = query.paginate(db, PAGE_SIZE);
    let total = paginator.num_items().await?;
    let num_pages = paginator.num_pages().await?.max(1);

    // A page past the end is a miss, not an empty page
    if page > num_pages {
        return Err(ServiceError::NotFound);
    }

    let items = paginator.fetch_page(page - 1).await?;
    Ok(Page {
        items,
        page,
        num_pages,
        total,
    })
}

/// Home listing: every published book, ordered by id.
pub async fn list_published(
    db: &DatabaseConnection,
    page: u64,
) -> Result<Page<book::Model>, ServiceError> {
    paginate(db, published(), page).await
}

/// Published books carrying a tag, looked up by slug. Missing tag is a
/// miss; a tag with no books is an empty page.
pub async fn list_by_tag(
    db: &DatabaseConnection,
    tag_slug: &str,
    page: u64,
) -> Result<(tag::Model, Page<book::Model>), ServiceError> {
    let tag = tag::Entity::find()
        .filter(tag::Column::Slug.eq(tag_slug))
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let book_ids: Vec<i32> = book_tags::Entity::find()
        .filter(book_tags::Column::TagId.eq(tag.id))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.book_id)
        .collect();

    let books = paginate(db, published().filter(BookColumn::Id.is_in(book_ids)), page).await?;
    Ok((tag, books))
}

/// Published books in a genre. Unlike the tag listing, an empty result is
/// treated as a miss.
pub async fn list_by_genre(
    db: &DatabaseConnection,
    genre_slug: &str,
    page: u64,
) -> Result<(genre::Model, Page<book::Model>), ServiceError> {
    let genre = genre::Entity::find()
        .filter(genre::Column::Slug.eq(genre_slug))
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let book_ids: Vec<i32> = book_genres::Entity::find()
        .filter(book_genres::Column::GenreId.eq(genre.id))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.book_id)
        .collect();

    let books = paginate(db, published().filter(BookColumn::Id.is_in(book_ids)), page).await?;
    if books.items.is_empty() {
        return Err(ServiceError::NotFound);
    }
    Ok((genre, books))
}

/// Published book by slug; drafts are invisible here.
pub async fn published_by_slug(
    db: &DatabaseConnection,
    slug: &str,
) -> Result<book::Model, ServiceError> {
    published()
        .filter(BookColumn::Slug.eq(slug))
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)
}

/// An author's published books.
pub async fn published_by_author(
    db: &DatabaseConnection,
    author_id: i32,
) -> Result<Vec<book::Model>, ServiceError> {
    Ok(published()
        .filter(BookColumn::AuthorId.eq(author_id))
        .all(db)
        .await?)
}

/// Published books contributed by a user.
pub async fn published_by_user(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Vec<book::Model>, ServiceError> {
    Ok(published()
        .filter(BookColumn::UserId.eq(user_id))
        .all(db)
        .await?)
}

/// Fields accepted when a user submits a new book.
#[derive(Debug, Default)]
pub struct NewBook {
    pub title: String,
    pub author_id: i32,
    pub genre_ids: Vec<i32>,
    pub first_published: Option<i32>,
    pub description: String,
    pub quote: String,
    pub image: Option<String>,
    pub tags: Vec<String>,
}

/// Create a book owned by `user_id`. New books start as drafts; the slug
/// is derived from the title, and a slug collision surfaces as a database
/// error rather than being silently resolved.
pub async fn create_book(
    db: &DatabaseConnection,
    new_book: NewBook,
    user_id: i32,
) -> Result<book::Model, ServiceError> {
    let author = author::Entity::find_by_id(new_book.author_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::Validation("Unknown author".to_string()))?;

    let now = chrono::Utc::now().to_rfc3339();
    let model = BookActiveModel {
        title: Set(new_book.title.clone()),
        author_id: Set(author.id),
        first_published: Set(new_book.first_published),
        description: Set(new_book.description),
        quote: Set(new_book.quote),
        image: Set(new_book.image),
        slug: Set(slugify(&new_book.title)),
        time_create: Set(now.clone()),
        time_update: Set(now),
        user_id: Set(Some(user_id)),
        status: Set(BookStatus::Draft.as_str().to_string()),
        ..Default::default()
    };

    let saved = model.insert(db).await?;

    set_genres(db, saved.id, &new_book.genre_ids).await?;
    set_tags(db, saved.id, &new_book.tags).await?;

    tracing::info!("Book '{}' added by user {}", saved.title, user_id);
    Ok(saved)
}

/// Editable book fields (admin change form).
#[derive(Debug)]
pub struct BookChanges {
    pub title: Option<String>,
    pub author_id: Option<i32>,
    pub first_published: Option<Option<i32>>,
    pub description: Option<String>,
    pub quote: Option<String>,
    pub status: Option<String>,
}

/// Apply edits to a book. The slug is recomputed from the title on every
/// save, so a rename silently changes the canonical URL (and can collide
/// with an existing slug, which fails the update).
pub async fn update_book(
    db: &DatabaseConnection,
    id: i32,
    changes: BookChanges,
) -> Result<book::Model, ServiceError> {
    let existing = BookEntity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if let Some(status) = &changes.status {
        if BookStatus::parse(status).is_none() {
            return Err(ServiceError::Validation(format!(
                "Invalid status '{}'",
                status
            )));
        }
    }

    if let Some(author_id) = changes.author_id {
        author::Entity::find_by_id(author_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::Validation("Unknown author".to_string()))?;
    }

    let title = changes.title.unwrap_or_else(|| existing.title.clone());
    let mut active: BookActiveModel = existing.into();
    active.slug = Set(slugify(&title));
    active.title = Set(title);
    if let Some(author_id) = changes.author_id {
        active.author_id = Set(author_id);
    }
    if let Some(first_published) = changes.first_published {
        active.first_published = Set(first_published);
    }
    if let Some(description) = changes.description {
        active.description = Set(description);
    }
    if let Some(quote) = changes.quote {
        active.quote = Set(quote);
    }
    if let Some(status) = changes.status {
        active.status = Set(status);
    }
    active.time_update = Set(chrono::Utc::now().to_rfc3339());

    Ok(active.update(db).await?)
}

async fn set_genres(
    db: &DatabaseConnection,
    book_id: i32,
    genre_ids: &[i32],
) -> Result<(), ServiceError> {
    for genre_id in genre_ids {
        genre::Entity::find_by_id(*genre_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::Validation("Unknown genre".to_string()))?;

        let link = book_genres::ActiveModel {
            book_id: Set(book_id),
            genre_id: Set(*genre_id),
        };
        let res = book_genres::Entity::insert(link)
            .on_conflict(
                sea_orm::sea_query::OnConflict::columns([
                    book_genres::Column::BookId,
                    book_genres::Column::GenreId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec(db)
            .await;
        match res {
            Ok(_) | Err(sea_orm::DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Attach free-form tags, creating any that do not exist yet.
async fn set_tags(
    db: &DatabaseConnection,
    book_id: i32,
    tag_names: &[String],
) -> Result<(), ServiceError> {
    for name in tag_names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }

        let existing = tag::Entity::find()
            .filter(tag::Column::Name.eq(name))
            .one(db)
            .await?;

        let tag_id = match existing {
            Some(t) => t.id,
            None => {
                let created = tag::ActiveModel {
                    name: Set(name.to_string()),
                    slug: Set(slugify(name)),
                    ..Default::default()
                };
                created.insert(db).await?.id
            }
        };

        let link = book_tags::ActiveModel {
            book_id: Set(book_id),
            tag_id: Set(tag_id),
        };
        let res = book_tags::Entity::insert(link)
            .on_conflict(
                sea_orm::sea_query::OnConflict::columns([
                    book_tags::Column::BookId,
                    book_tags::Column::TagId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec(db)
            .await;
        match res {
            Ok(_) | Err(sea_orm::DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Mean review rating rounded to the nearest whole star (ties to even);
/// 0 with no reviews. Ratings are unbounded on the way in, so the sum is
/// accumulated as f64 rather than i32.
pub async fn average_rating(db: &DatabaseConnection, book_id: i32) -> Result<i32, ServiceError> {
    let ratings: Vec<i32> = review::Entity::find()
        .filter(review::Column::BookId.eq(book_id))
        .all(db)
        .await?
        .into_iter()
        .map(|r| r.rating)
        .collect();

    if ratings.is_empty() {
        return Ok(0);
    }
    let total: f64 = ratings.iter().map(|&r| r as f64).sum();
    Ok((total / ratings.len() as f64).round_ties_even() as i32)
}

/// Tag names on a book, alphabetical.
pub async fn tags_for_book(
    db: &DatabaseConnection,
    book_id: i32,
) -> Result<Vec<String>, ServiceError> {
    let tag_ids: Vec<i32> = book_tags::Entity::find()
        .filter(book_tags::Column::BookId.eq(book_id))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.tag_id)
        .collect();

    Ok(tag::Entity::find()
        .filter(tag::Column::Id.is_in(tag_ids))
        .order_by_asc(tag::Column::Name)
        .all(db)
        .await?
        .into_iter()
        .map(|t| t.name)
        .collect())
}

/// Genres on a book, ordered by title.
pub async fn genres_for_book(
    db: &DatabaseConnection,
    book_id: i32,
) -> Result<Vec<genre::Model>, ServiceError> {
    let genre_ids: Vec<i32> = book_genres::Entity::find()
        .filter(book_genres::Column::BookId.eq(book_id))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.genre_id)
        .collect();

    Ok(genre::Entity::find()
        .filter(genre::Column::Id.is_in(genre_ids))
        .order_by_asc(genre::Column::Title)
        .all(db)
        .await?)
}

/// Resolve a book's relations into the shape handed to templates.
pub async fn book_view(
    db: &DatabaseConnection,
    model: book::Model,
) -> Result<BookView, ServiceError> {
    let author = author::Entity::find_by_id(model.author_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;
    let genres = genres_for_book(db, model.id).await?;
    let tags = tags_for_book(db, model.id).await?;
    let average = average_rating(db, model.id).await?;

    Ok(BookView {
        id: model.id,
        title: model.title,
        author: author.name,
        author_slug: author.slug,
        first_published: model.first_published,
        description: model.description,
        quote: model.quote,
        image: model.image,
        slug: model.slug,
        genres,
        tags,
        average_rating: average,
        time_create: model.time_create,
        time_update: model.time_update,
    })
}

/// Resolve a whole page of books into views.
pub async fn book_views(
    db: &DatabaseConnection,
    models: Vec<book::Model>,
) -> Result<Vec<BookView>, ServiceError> {
    let mut views = Vec::with_capacity(models.len());
    for model in models {
        views.push(book_view(db, model).await?);
    }
    Ok(views)
}

/// All genres, for navigation and form option lists.
pub async fn all_genres(db: &DatabaseConnection) -> Result<Vec<genre::Model>, ServiceError> {
    Ok(genre::Entity::find()
        .order_by_asc(genre::Column::Title)
        .all(db)
        .await?)
}

/// All authors ordered by name, for form option lists.
pub async fn all_authors(db: &DatabaseConnection) -> Result<Vec<author::Model>, ServiceError> {
    Ok(author::Entity::find()
        .order_by_asc(author::Column::Name)
        .all(db)
        .await?)
}
