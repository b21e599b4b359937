pub mod api;
pub mod api_docs;
pub mod auth;
pub mod config;
pub mod db;
pub mod forms;
pub mod models;
pub mod seed;
pub mod server;
pub mod services;
pub mod state;
pub mod utils;
