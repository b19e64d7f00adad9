//! Stock movements. Every change to `products.stock_quantity` goes through
//! [`apply_movement`] so the ledger and the product row never disagree.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::notifications::{self, NotificationKind};
use crate::domain::aggregates::{ProductStock, StockReason};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::error::{ApiError, ApiResult};
use crate::models::StockMovement;

#[derive(Debug)]
pub struct AppliedMovement {
    pub movement: StockMovement,
    pub quantity: i32,
    pub events: Vec<DomainEvent>,
}

/// Locks the product row, applies `delta` and writes the movement. Crossing
/// the low-stock threshold also files an admin notification.
pub async fn apply_movement(
    conn: &mut PgConnection,
    product_id: Uuid,
    delta: i32,
    reason: StockReason,
    order_id: Option<Uuid>,
    note: Option<&str>,
    low_threshold: i32,
) -> ApiResult<AppliedMovement> {
    let row: Option<(String, i32)> = sqlx::query_as("SELECT name, stock_quantity FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id).fetch_optional(&mut *conn).await?;
    let (name, quantity) = row.ok_or(ApiError::NotFound("product"))?;

    let mut stock = ProductStock::load(product_id, name, quantity, low_threshold);
    let quantity = stock.apply(delta, reason)?;
    sqlx::query("UPDATE products SET stock_quantity = $2, updated_at = NOW() WHERE id = $1").bind(product_id).bind(quantity).execute(&mut *conn).await?;
    let movement = sqlx::query_as::<_, StockMovement>("INSERT INTO stock_movements (id, product_id, delta, reason, order_id, note) VALUES ($1, $2, $3, $4, $5, $6) RETURNING *")
        .bind(Uuid::now_v7()).bind(product_id).bind(delta).bind(reason.as_str()).bind(order_id).bind(note)
        .fetch_one(&mut *conn).await?;

    let events = stock.take_events();
    for event in &events {
        if let DomainEvent::Product(ProductEvent::StockLow { name, quantity, .. }) = event {
            let message = format!("Il ne reste que {quantity} exemplaire(s) de « {name} ».");
            let link = format!("/admin/produits/{product_id}");
            notifications::create(&mut *conn, NotificationKind::LowStock, "Stock faible", &message, Some(&link)).await?;
        }
    }
    Ok(AppliedMovement { movement, quantity, events })
}

pub async fn list_movements(db: &PgPool, product_id: Uuid, limit: u32, offset: i64) -> sqlx::Result<(Vec<StockMovement>, i64)> {
    let movements = sqlx::query_as::<_, StockMovement>("SELECT * FROM stock_movements WHERE product_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3")
        .bind(product_id).bind(i64::from(limit)).bind(offset).fetch_all(db).await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stock_movements WHERE product_id = $1").bind(product_id).fetch_one(db).await?;
    Ok((movements, total.0))
}
