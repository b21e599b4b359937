use crate::auth::hash_password;
use crate::models::{author, book, genre, user};
use crate::services::book_service::{self, NewBook};
use crate::utils::slugify;
use sea_orm::*;

fn ignore_conflict(err: DbErr) -> Result<(), DbErr> {
    match err {
        DbErr::RecordNotInserted => Ok(()),
        other => Err(other),
    }
}

/// Populate a fresh database with demo accounts and a small catalog.
pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    let now = chrono::Utc::now().to_rfc3339();

    let admin_password = hash_password("admin").map_err(DbErr::Custom)?;
    let reader_password = hash_password("reader").map_err(DbErr::Custom)?;

    let admin = user::ActiveModel {
        username: Set("admin".to_owned()),
        email: Set("admin@example.com".to_owned()),
        password_hash: Set(admin_password),
        is_staff: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };

    let reader = user::ActiveModel {
        username: Set("reader".to_owned()),
        email: Set("reader@example.com".to_owned()),
        password_hash: Set(reader_password),
        is_staff: Set(false),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };

    user::Entity::insert(admin)
        .on_conflict(
            sea_orm::sea_query::OnConflict::column(user::Column::Username)
                .do_nothing()
                .to_owned(),
        )
        .exec(db)
        .await
        .map(|_| ())
        .or_else(ignore_conflict)?;

    user::Entity::insert(reader)
        .on_conflict(
            sea_orm::sea_query::OnConflict::column(user::Column::Username)
                .do_nothing()
                .to_owned(),
        )
        .exec(db)
        .await
        .map(|_| ())
        .or_else(ignore_conflict)?;

    let genres = vec!["Fantasy", "Science Fiction", "Classic"];
    for title in genres {
        let genre = genre::ActiveModel {
            title: Set(title.to_owned()),
            slug: Set(slugify(title)),
            ..Default::default()
        };
        genre::Entity::insert(genre)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(genre::Column::Slug)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(db)
            .await
            .map(|_| ())
            .or_else(ignore_conflict)?;
    }

    let authors = vec![
        ("J.R.R. Tolkien", "Author of The Lord of the Rings."),
        ("Frank Herbert", "Author of the Dune saga."),
        ("Charlotte Brontë", "English novelist and poet."),
    ];
    for (name, description) in authors {
        let author = author::ActiveModel {
            name: Set(name.to_owned()),
            description: Set(description.to_owned()),
            slug: Set(slugify(name)),
            ..Default::default()
        };
        author::Entity::insert(author)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(author::Column::Slug)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(db)
            .await
            .map(|_| ())
            .or_else(ignore_conflict)?;
    }

    let herbert = author::Entity::find()
        .filter(author::Column::Slug.eq("frank-herbert"))
        .one(db)
        .await?;
    let sci_fi = genre::Entity::find()
        .filter(genre::Column::Slug.eq("science-fiction"))
        .one(db)
        .await?;

    if let (Some(herbert), Some(sci_fi)) = (herbert, sci_fi) {
        let new_book = NewBook {
            title: "Dune".to_owned(),
            author_id: herbert.id,
            genre_ids: vec![sci_fi.id],
            first_published: Some(1965),
            description: "A spice planet story.".to_owned(),
            quote: "Fear is the mind-killer.".to_owned(),
            image: None,
            tags: vec!["desert".to_owned(), "epic".to_owned()],
        };
        if let Ok(created) = book_service::create_book(db, new_book, 1).await {
            // Demo catalog should be browsable right away
            let mut active: book::ActiveModel = created.into();
            active.status = Set("published".to_owned());
            let _ = active.update(db).await;
        }
    }

    Ok(())
}
