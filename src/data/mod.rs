//! Data layer module
//!
//! Handles durable persistence:
//! - SQLite database operations (posts, images, settings)
//! - Derived statistics

mod database;
mod models;

pub use database::Database;
pub use models::*;

#[cfg(test)]
mod database_test;
