use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::like_pattern;
use crate::domain::aggregates::{OrderStatus, PaymentStatus, PricedCart, Shipment};
use crate::models::{Order, OrderItem, OrderWithItems};

pub struct NewOrder<'a> {
    pub id: Uuid,
    pub order_number: &'a str,
    pub user_id: Uuid,
    pub customer_email: &'a str,
    pub cart: &'a PricedCart,
    pub shipping_address: &'a serde_json::Value,
}

/// Writes the order and its lines in one transaction.
pub async fn insert(db: &PgPool, o: &NewOrder<'_>) -> sqlx::Result<Order> {
    let mut tx = db.begin().await?;
    let order = sqlx::query_as::<_, Order>("INSERT INTO orders (id, order_number, user_id, customer_email, status, payment_status, subtotal_cents, shipping_cents, discount_cents, total_cents, currency, shipping_address) VALUES ($1, $2, $3, $4, 'pending', 'unpaid', $5, $6, 0, $7, $8, $9) RETURNING *")
        .bind(o.id).bind(o.order_number).bind(o.user_id).bind(o.customer_email)
        .bind(o.cart.subtotal.amount_cents()).bind(o.cart.shipping.amount_cents()).bind(o.cart.total.amount_cents())
        .bind(o.cart.total.currency()).bind(o.shipping_address)
        .fetch_one(&mut *tx).await?;
    for line in &o.cart.lines {
        sqlx::query("INSERT INTO order_items (id, order_id, product_id, product_name, sku, image_url, quantity, unit_price_cents, total_cents) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)")
            .bind(Uuid::now_v7()).bind(o.id).bind(line.product_id).bind(&line.name).bind(&line.sku).bind(&line.image)
            .bind(line.quantity as i32).bind(line.unit_price.amount_cents()).bind(line.total.amount_cents())
            .execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(order)
}

pub async fn set_session(db: &PgPool, id: Uuid, session_id: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE orders SET stripe_session_id = $2, updated_at = NOW() WHERE id = $1").bind(id).bind(session_id).execute(db).await?;
    Ok(())
}

pub async fn find(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Order>> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(db).await
}

pub async fn find_for_user(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<Order>> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 AND user_id = $2").bind(id).bind(user_id).fetch_optional(db).await
}

pub async fn find_by_session(db: &PgPool, session_id: &str) -> sqlx::Result<Option<Order>> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE stripe_session_id = $1").bind(session_id).fetch_optional(db).await
}

pub async fn find_by_payment_intent(db: &PgPool, payment_intent_id: &str) -> sqlx::Result<Option<Order>> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE stripe_payment_intent_id = $1 ORDER BY created_at DESC LIMIT 1").bind(payment_intent_id).fetch_optional(db).await
}

/// Row lock for status changes.
pub async fn lock(conn: &mut PgConnection, id: Uuid) -> sqlx::Result<Option<Order>> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE").bind(id).fetch_optional(conn).await
}

pub async fn items(db: &PgPool, order_id: Uuid) -> sqlx::Result<Vec<OrderItem>> {
    sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY product_name, id").bind(order_id).fetch_all(db).await
}

pub async fn items_locked(conn: &mut PgConnection, order_id: Uuid) -> sqlx::Result<Vec<OrderItem>> {
    sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY product_name, id").bind(order_id).fetch_all(conn).await
}

pub async fn with_items(db: &PgPool, order: Order) -> sqlx::Result<OrderWithItems> {
    let items = items(db, order.id).await?;
    Ok(OrderWithItems { order, items })
}

pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<Order>> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC").bind(user_id).fetch_all(db).await
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub search: Option<String>,
}

fn push_order_filters(qb: &mut QueryBuilder<'_, Postgres>, f: &OrderFilter) {
    if let Some(status) = f.status { qb.push(" AND status = ").push_bind(status.as_str()); }
    if let Some(term) = f.search.as_deref().filter(|t| !t.trim().is_empty()) {
        let pattern = like_pattern(term);
        qb.push(" AND (order_number ILIKE ").push_bind(pattern.clone()).push(" OR customer_email ILIKE ").push_bind(pattern).push(")");
    }
}

pub async fn list(db: &PgPool, f: &OrderFilter, limit: u32, offset: i64) -> sqlx::Result<(Vec<Order>, i64)> {
    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders WHERE TRUE");
    push_order_filters(&mut count, f);
    let total: (i64,) = count.build_query_as().fetch_one(db).await?;

    let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM orders WHERE TRUE");
    push_order_filters(&mut select, f);
    select.push(" ORDER BY created_at DESC LIMIT ").push_bind(i64::from(limit)).push(" OFFSET ").push_bind(offset);
    let orders = select.build_query_as::<Order>().fetch_all(db).await?;
    Ok((orders, total.0))
}

/// Writes a new status; shipping details and milestone timestamps follow it.
pub async fn save_status(conn: &mut PgConnection, id: Uuid, status: OrderStatus, shipment: Option<&Shipment>) -> sqlx::Result<Order> {
    let (tracking, carrier) = shipment.map(|s| (s.tracking_number.clone(), s.carrier.clone())).unwrap_or_default();
    sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = $2, \
         tracking_number = COALESCE($3, tracking_number), carrier = COALESCE($4, carrier), \
         shipped_at = CASE WHEN $2 = 'shipped' THEN NOW() ELSE shipped_at END, \
         delivered_at = CASE WHEN $2 = 'delivered' THEN NOW() ELSE delivered_at END, \
         updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id).bind(status.as_str()).bind(tracking).bind(carrier)
    .fetch_one(conn).await
}

/// Whatever the processor charged below the order total was a discount.
pub async fn record_payment(conn: &mut PgConnection, id: Uuid, payment_intent_id: Option<&str>, amount_paid_cents: i64) -> sqlx::Result<Order> {
    sqlx::query_as::<_, Order>("UPDATE orders SET status = 'paid', payment_status = 'paid', stripe_payment_intent_id = COALESCE($2, stripe_payment_intent_id), amount_paid_cents = $3, discount_cents = GREATEST(total_cents - $3, 0), paid_at = NOW(), updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(payment_intent_id).bind(amount_paid_cents).fetch_one(conn).await
}

pub async fn set_payment_status(db: &PgPool, id: Uuid, status: PaymentStatus) -> sqlx::Result<Order> {
    sqlx::query_as::<_, Order>("UPDATE orders SET payment_status = $2, updated_at = NOW() WHERE id = $1 RETURNING *").bind(id).bind(status.as_str()).fetch_one(db).await
}

pub async fn set_notes(db: &PgPool, id: Uuid, notes: Option<&str>) -> sqlx::Result<Option<Order>> {
    sqlx::query_as::<_, Order>("UPDATE orders SET notes = $2, updated_at = NOW() WHERE id = $1 RETURNING *").bind(id).bind(notes).fetch_optional(db).await
}

/// Appends a line to the internal notes.
pub async fn append_note(db: &PgPool, id: Uuid, line: &str) -> sqlx::Result<Order> {
    sqlx::query_as::<_, Order>("UPDATE orders SET notes = CASE WHEN COALESCE(notes, '') = '' THEN $2 ELSE notes || E'\\n' || $2 END, updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(id).bind(line).fetch_one(db).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_filters() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM orders WHERE TRUE");
        push_order_filters(&mut qb, &OrderFilter { status: Some(OrderStatus::Shipped), search: Some("CB-2501".into()) });
        assert_eq!(qb.sql(), "SELECT * FROM orders WHERE TRUE AND status = $1 AND (order_number ILIKE $2 OR customer_email ILIKE $3)");
    }
}
