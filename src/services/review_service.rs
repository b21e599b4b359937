//! Review operations, including the one-review-per-user-per-book check.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::models::review::{self, ReviewView};
use crate::models::user;
use crate::services::ServiceError;

/// Save a review unless the user already reviewed this book, in which
/// case nothing happens and the caller cannot tell the difference. The
/// check is a plain read-then-write without a transaction, so concurrent
/// submissions can still slip through it.
pub async fn add_review(
    db: &DatabaseConnection,
    book_id: i32,
    user_id: i32,
    rating: i32,
    text: String,
) -> Result<(), ServiceError> {
    let existing = review::Entity::find()
        .filter(review::Column::BookId.eq(book_id))
        .filter(review::Column::UserId.eq(user_id))
        .count(db)
        .await?;

    if existing > 0 {
        tracing::debug!(
            "Skipping duplicate review for book {} by user {}",
            book_id,
            user_id
        );
        return Ok(());
    }

    let model = review::ActiveModel {
        book_id: Set(book_id),
        user_id: Set(user_id),
        text: Set(text),
        rating: Set(rating),
        time_create: Set(chrono::Utc::now().to_rfc3339()),
        ..Default::default()
    };
    model.insert(db).await?;
    Ok(())
}

/// All reviews for a book, newest first, annotated with usernames.
pub async fn for_book(
    db: &DatabaseConnection,
    book_id: i32,
) -> Result<Vec<ReviewView>, ServiceError> {
    let reviews = review::Entity::find()
        .filter(review::Column::BookId.eq(book_id))
        .order_by_desc(review::Column::TimeCreate)
        .all(db)
        .await?;

    annotate(db, reviews).await
}

/// A user's reviews, newest first.
pub async fn for_user(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Vec<ReviewView>, ServiceError> {
    let reviews = review::Entity::find()
        .filter(review::Column::UserId.eq(user_id))
        .order_by_desc(review::Column::TimeCreate)
        .all(db)
        .await?;

    annotate(db, reviews).await
}

async fn annotate(
    db: &DatabaseConnection,
    reviews: Vec<review::Model>,
) -> Result<Vec<ReviewView>, ServiceError> {
    let user_ids: Vec<i32> = reviews.iter().map(|r| r.user_id).collect();
    let users = user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(db)
        .await?;

    Ok(reviews
        .into_iter()
        .map(|r| {
            let username = users
                .iter()
                .find(|u| u.id == r.user_id)
                .map(|u| u.username.clone())
                .unwrap_or_default();
            ReviewView {
                id: r.id,
                book_id: r.book_id,
                user_id: r.user_id,
                username,
                text: r.text,
                rating: r.rating,
                time_create: r.time_create,
            }
        })
        .collect())
}
