use sqlx::PgPool;
use uuid::Uuid;

use crate::models::WishlistEntry;

pub async fn list(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<WishlistEntry>> {
    sqlx::query_as::<_, WishlistEntry>(
        "SELECT p.id AS product_id, p.name, p.slug, p.price_cents, p.images, p.stock_quantity, w.created_at AS added_at \
         FROM wishlist_items w JOIN products p ON p.id = w.product_id \
         WHERE w.user_id = $1 AND p.is_active ORDER BY w.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

/// Adding twice is a no-op.
pub async fn add(db: &PgPool, user_id: Uuid, product_id: Uuid) -> sqlx::Result<bool> {
    let r = sqlx::query("INSERT INTO wishlist_items (user_id, product_id) VALUES ($1, $2) ON CONFLICT DO NOTHING").bind(user_id).bind(product_id).execute(db).await?;
    Ok(r.rows_affected() > 0)
}

pub async fn remove(db: &PgPool, user_id: Uuid, product_id: Uuid) -> sqlx::Result<bool> {
    let r = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2").bind(user_id).bind(product_id).execute(db).await?;
    Ok(r.rows_affected() > 0)
}
