//! Slug lifecycle: derived from the title on every save, collisions fail.

use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

use bookworm::models::author;
use bookworm::services::book_service::{self, BookChanges, NewBook};
use bookworm::services::ServiceError;
use bookworm::{db, models::user};

async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

async fn create_author(db: &DatabaseConnection) -> author::Model {
    author::ActiveModel {
        name: Set("Paul Brickhill".to_string()),
        description: Set(String::new()),
        slug: Set("paul-brickhill".to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

async fn create_user(db: &DatabaseConnection) -> user::Model {
    let now = chrono::Utc::now().to_rfc3339();
    user::ActiveModel {
        username: Set("reader".to_string()),
        email: Set("reader@example.com".to_string()),
        password_hash: Set("hash".to_string()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        is_staff: Set(false),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

fn new_book(title: &str, author_id: i32) -> NewBook {
    NewBook {
        title: title.to_string(),
        author_id,
        ..Default::default()
    }
}

fn rename(title: &str) -> BookChanges {
    BookChanges {
        title: Some(title.to_string()),
        author_id: None,
        first_published: None,
        description: None,
        quote: None,
        status: None,
    }
}

#[tokio::test]
async fn slug_is_derived_from_title_on_create() {
    let db = setup_test_db().await;
    let author = create_author(&db).await;
    let user = create_user(&db).await;

    let book = book_service::create_book(&db, new_book("The Great Escape", author.id), user.id)
        .await
        .unwrap();
    assert_eq!(book.slug, "the-great-escape");
    assert_eq!(book.status, "draft");
}

#[tokio::test]
async fn slug_is_recomputed_on_every_save() {
    let db = setup_test_db().await;
    let author = create_author(&db).await;
    let user = create_user(&db).await;

    let book = book_service::create_book(&db, new_book("The Great Escape", author.id), user.id)
        .await
        .unwrap();

    // Punctuation-only rename keeps the same slug
    let updated = book_service::update_book(&db, book.id, rename("The Great Escape!"))
        .await
        .unwrap();
    assert_eq!(updated.title, "The Great Escape!");
    assert_eq!(updated.slug, "the-great-escape");

    // A real rename silently changes the canonical URL
    let updated = book_service::update_book(&db, book.id, rename("The Greatest Escape"))
        .await
        .unwrap();
    assert_eq!(updated.slug, "the-greatest-escape");
}

#[tokio::test]
async fn slug_collision_is_a_failure_not_a_merge() {
    let db = setup_test_db().await;
    let author = create_author(&db).await;
    let user = create_user(&db).await;

    book_service::create_book(&db, new_book("The Great Escape", author.id), user.id)
        .await
        .unwrap();

    // Same title slugifies to the same value and trips the unique column
    let result =
        book_service::create_book(&db, new_book("The Great escape", author.id), user.id).await;
    assert!(matches!(result, Err(ServiceError::Database(_))));

    // Renaming another book onto a taken slug fails the same way
    let other = book_service::create_book(&db, new_book("Unrelated", author.id), user.id)
        .await
        .unwrap();
    let result = book_service::update_book(&db, other.id, rename("The Great Escape?")).await;
    assert!(matches!(result, Err(ServiceError::Database(_))));
}

#[tokio::test]
async fn created_books_attach_genres_and_tags() {
    let db = setup_test_db().await;
    let author = create_author(&db).await;
    let user = create_user(&db).await;

    let genre = bookworm::models::genre::ActiveModel {
        title: Set("War".to_string()),
        slug: Set("war".to_string()),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();

    let mut book = new_book("The Great Escape", author.id);
    book.genre_ids = vec![genre.id];
    book.tags = vec!["escape".to_string(), "POW".to_string()];

    let created = book_service::create_book(&db, book, user.id).await.unwrap();

    let genres = book_service::genres_for_book(&db, created.id).await.unwrap();
    assert_eq!(genres.len(), 1);
    assert_eq!(genres[0].title, "War");

    let tags = book_service::tags_for_book(&db, created.id).await.unwrap();
    assert_eq!(tags, vec!["POW".to_string(), "escape".to_string()]);
}
