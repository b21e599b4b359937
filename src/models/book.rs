use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Visibility gate: draft books stay out of every public listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookStatus {
    Draft,
    Published,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Draft => "draft",
            BookStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(BookStatus::Draft),
            "published" => Some(BookStatus::Published),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "books")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub author_id: i32,
    pub first_published: Option<i32>,
    pub description: String,
    pub quote: String,
    pub image: Option<String>,
    #[sea_orm(unique)]
    pub slug: String,
    pub time_create: String,
    pub time_update: String,
    pub user_id: Option<i32>,
    #[sea_orm(default_value = "draft")]
    pub status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::author::Entity",
        from = "Column::AuthorId",
        to = "super::author::Column::Id",
        on_delete = "Cascade"
    )]
    Author,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    User,
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
}

impl Related<super::author::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl Related<super::genre::Entity> for Entity {
    fn to() -> RelationDef {
        super::book_genres::Relation::Genre.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::book_genres::Relation::Book.def().rev())
    }
}

impl Related<super::tag::Entity> for Entity {
    fn to() -> RelationDef {
        super::book_tags::Relation::Tag.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::book_tags::Relation::Book.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

// Rendering-context shape for a book, with relations resolved
#[derive(Debug, Serialize)]
pub struct BookView {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub author_slug: String,
    pub first_published: Option<i32>,
    pub description: String,
    pub quote: String,
    pub image: Option<String>,
    pub slug: String,
    pub genres: Vec<super::genre::Model>,
    pub tags: Vec<String>,
    pub average_rating: i32,
    pub time_create: String,
    pub time_update: String,
}
