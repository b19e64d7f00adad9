use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::Notification;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind { NewOrder, LowStock, Review, System }

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self { Self::NewOrder => "new_order", Self::LowStock => "low_stock", Self::Review => "review", Self::System => "system" }
    }
}

pub async fn create<'e>(db: impl PgExecutor<'e>, kind: NotificationKind, title: &str, message: &str, link: Option<&str>) -> sqlx::Result<Notification> {
    sqlx::query_as::<_, Notification>("INSERT INTO notifications (id, kind, title, message, link) VALUES ($1, $2, $3, $4, $5) RETURNING *")
        .bind(Uuid::now_v7()).bind(kind.as_str()).bind(title).bind(message).bind(link)
        .fetch_one(db).await
}

/// Unread first, then newest.
pub async fn list(db: &PgPool, unread_only: bool, limit: u32, offset: i64) -> sqlx::Result<(Vec<Notification>, i64)> {
    let items = sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE NOT ($1 AND is_read) ORDER BY is_read, created_at DESC LIMIT $2 OFFSET $3")
        .bind(unread_only).bind(i64::from(limit)).bind(offset).fetch_all(db).await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE NOT ($1 AND is_read)").bind(unread_only).fetch_one(db).await?;
    Ok((items, total.0))
}

pub async fn unread_count(db: &PgPool) -> sqlx::Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE NOT is_read").fetch_one(db).await?;
    Ok(row.0)
}

pub async fn mark_read(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Notification>> {
    sqlx::query_as::<_, Notification>("UPDATE notifications SET is_read = TRUE WHERE id = $1 RETURNING *").bind(id).fetch_optional(db).await
}

pub async fn mark_all_read(db: &PgPool) -> sqlx::Result<u64> {
    Ok(sqlx::query("UPDATE notifications SET is_read = TRUE WHERE NOT is_read").execute(db).await?.rows_affected())
}

pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    Ok(sqlx::query("DELETE FROM notifications WHERE id = $1").bind(id).execute(db).await?.rows_affected() > 0)
}
