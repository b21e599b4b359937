pub mod author;
pub mod book;
pub mod book_genres;
pub mod book_tags;
pub mod genre;
pub mod review;
pub mod tag;
pub mod user;

pub use book::{BookStatus, BookView};
