//! PostgreSQL queries, grouped by table family.

pub mod addresses;
pub mod catalog;
pub mod email_logs;
pub mod media;
pub mod notifications;
pub mod orders;
pub mod reviews;
pub mod stock;
pub mod users;
pub mod wishlist;

use uuid::Uuid;

/// Public routes accept either the row id or its slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Id(Uuid),
    Slug(String),
}

impl Lookup {
    pub fn parse(key: &str) -> Self {
        match Uuid::parse_str(key) {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Slug(key.to_lowercase()),
        }
    }
}

/// Escapes the LIKE metacharacters of user input.
pub fn escape_like(term: &str) -> String {
    term.trim().replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// `%term%` for ILIKE.
pub fn like_pattern(term: &str) -> String {
    format!("%{}%", escape_like(term))
}
