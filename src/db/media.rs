use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Media;

pub struct NewMedia<'a> {
    pub id: Uuid,
    pub file_name: &'a str,
    pub storage_path: &'a str,
    pub url: &'a str,
    pub mime_type: &'a str,
    pub size_bytes: i64,
    pub alt_text: Option<&'a str>,
}

pub async fn list(db: &PgPool, mime_prefix: Option<&str>, limit: u32, offset: i64) -> sqlx::Result<(Vec<Media>, i64)> {
    let prefix = mime_prefix.map(|p| format!("{}%", super::escape_like(p)));
    let items = sqlx::query_as::<_, Media>("SELECT * FROM media WHERE ($1::text IS NULL OR mime_type LIKE $1) ORDER BY created_at DESC LIMIT $2 OFFSET $3")
        .bind(&prefix).bind(i64::from(limit)).bind(offset).fetch_all(db).await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM media WHERE ($1::text IS NULL OR mime_type LIKE $1)").bind(&prefix).fetch_one(db).await?;
    Ok((items, total.0))
}

pub async fn insert(db: &PgPool, m: &NewMedia<'_>) -> sqlx::Result<Media> {
    sqlx::query_as::<_, Media>("INSERT INTO media (id, file_name, storage_path, url, mime_type, size_bytes, alt_text) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *")
        .bind(m.id).bind(m.file_name).bind(m.storage_path).bind(m.url).bind(m.mime_type).bind(m.size_bytes).bind(m.alt_text)
        .fetch_one(db).await
}

pub async fn find(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Media>> {
    sqlx::query_as::<_, Media>("SELECT * FROM media WHERE id = $1").bind(id).fetch_optional(db).await
}

pub async fn update_alt_text(db: &PgPool, id: Uuid, alt_text: Option<&str>) -> sqlx::Result<Option<Media>> {
    sqlx::query_as::<_, Media>("UPDATE media SET alt_text = $2 WHERE id = $1 RETURNING *").bind(id).bind(alt_text).fetch_optional(db).await
}

pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    Ok(sqlx::query("DELETE FROM media WHERE id = $1").bind(id).execute(db).await?.rows_affected() > 0)
}
