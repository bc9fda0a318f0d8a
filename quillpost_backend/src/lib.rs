pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod feed;
pub mod follows;
pub mod pagination;
pub mod posts;
pub mod telemetry;
pub mod utils;
