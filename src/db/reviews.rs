use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Review;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub average: Option<f64>,
    pub count: i64,
}

pub async fn insert(db: &PgPool, product_id: Uuid, user_id: Uuid, rating: i16, title: Option<&str>, body: Option<&str>) -> sqlx::Result<Review> {
    sqlx::query_as::<_, Review>("INSERT INTO reviews (id, product_id, user_id, rating, title, body) VALUES ($1, $2, $3, $4, $5, $6) RETURNING *")
        .bind(Uuid::now_v7()).bind(product_id).bind(user_id).bind(rating).bind(title).bind(body)
        .fetch_one(db).await
}

pub async fn list_approved(db: &PgPool, product_id: Uuid) -> sqlx::Result<Vec<Review>> {
    sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE product_id = $1 AND is_approved ORDER BY created_at DESC").bind(product_id).fetch_all(db).await
}

pub async fn summary(db: &PgPool, product_id: Uuid) -> sqlx::Result<RatingSummary> {
    let (average, count): (Option<f64>, i64) = sqlx::query_as("SELECT AVG(rating)::float8, COUNT(*) FROM reviews WHERE product_id = $1 AND is_approved")
        .bind(product_id).fetch_one(db).await?;
    Ok(RatingSummary { average: average.map(|a| (a * 10.0).round() / 10.0), count })
}

pub async fn list_all(db: &PgPool, approved: Option<bool>, limit: u32, offset: i64) -> sqlx::Result<(Vec<Review>, i64)> {
    let reviews = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE ($1::boolean IS NULL OR is_approved = $1) ORDER BY created_at DESC LIMIT $2 OFFSET $3")
        .bind(approved).bind(i64::from(limit)).bind(offset).fetch_all(db).await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reviews WHERE ($1::boolean IS NULL OR is_approved = $1)").bind(approved).fetch_one(db).await?;
    Ok((reviews, total.0))
}

pub async fn approve(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Review>> {
    sqlx::query_as::<_, Review>("UPDATE reviews SET is_approved = TRUE WHERE id = $1 RETURNING *").bind(id).fetch_optional(db).await
}

pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    Ok(sqlx::query("DELETE FROM reviews WHERE id = $1").bind(id).execute(db).await?.rows_affected() > 0)
}
