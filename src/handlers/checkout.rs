//! Checkout: prices the cart server-side, records a pending order and hands
//! the customer over to a hosted payment page.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::db;
use crate::db::orders::NewOrder;
use crate::domain::aggregates::{generate_order_number, Cart, CartItem, OrderStatus, PricedCart};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::error::{ApiError, ApiResult};
use crate::models::{Address, Order};
use crate::payments::{CheckoutLine, CheckoutSessionRequest};
use crate::state::AppState;

const ORDER_NUMBER_ATTEMPTS: usize = 3;

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 50))]
    pub items: Vec<CheckoutItem>,
    pub shipping_address_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub promotion_code: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub order_number: String,
    pub session_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub order: Order,
    pub payment_status: String,
    pub session_status: Option<String>,
}

/// Snapshot stored on the order so later address edits do not rewrite history.
pub fn address_snapshot(a: &Address) -> serde_json::Value {
    serde_json::json!({
        "full_name": a.full_name,
        "line1": a.line1,
        "line2": a.line2,
        "postal_code": a.postal_code,
        "city": a.city,
        "country": a.country,
        "phone": a.phone,
    })
}

pub fn session_request(site: &str, order: &Order, cart: &PricedCart, promotion_code_id: Option<String>) -> CheckoutSessionRequest {
    CheckoutSessionRequest {
        order_id: order.id,
        order_number: order.order_number.clone(),
        customer_email: order.customer_email.clone(),
        currency: cart.total.currency().to_string(),
        lines: cart
            .lines
            .iter()
            .map(|l| CheckoutLine { name: l.name.clone(), unit_amount_cents: l.unit_price.amount_cents(), quantity: l.quantity, image: l.image.clone() })
            .collect(),
        shipping_cents: cart.shipping.amount_cents(),
        promotion_code_id,
        success_url: format!("{site}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}"),
        cancel_url: format!("{site}/checkout/cancel?order={}", order.id),
    }
}

async fn customer_email(s: &AppState, user: &CurrentUser) -> ApiResult<String> {
    if let Some(email) = user.email.as_deref().filter(|e| !e.is_empty()) {
        return Ok(email.to_string());
    }
    let profile = db::users::find(&s.db, user.id).await?.ok_or(ApiError::NotFound("profile"))?;
    Ok(profile.email)
}

#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_checkout(State(s): State<AppState>, user: CurrentUser, Json(r): Json<CheckoutRequest>) -> ApiResult<(StatusCode, Json<CheckoutResponse>)> {
    r.validate()?;
    let cart = Cart::from_lines(&s.config.currency, r.items.iter().map(|i| CartItem { product_id: i.product_id, quantity: i.quantity }))?;

    let catalog = db::catalog::catalog_entries(&s.db, &cart.product_ids()).await?;
    let priced = cart.price(&catalog, &s.config.shipping)?;

    let address = db::addresses::find(&s.db, user.id, r.shipping_address_id).await?.ok_or(ApiError::NotFound("address"))?;
    let email = customer_email(&s, &user).await?;

    let promotion_code_id = match r.promotion_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => {
            let promo = s.payments.find_promotion_code(code).await?;
            Some(promo.ok_or_else(|| ApiError::Validation(format!("unknown promotion code '{code}'")))?.id)
        }
        None => None,
    };

    let snapshot = address_snapshot(&address);
    let mut attempt = 0;
    let order = loop {
        attempt += 1;
        let order_number = generate_order_number(Utc::now());
        let new_order = NewOrder { id: Uuid::now_v7(), order_number: &order_number, user_id: user.id, customer_email: &email, cart: &priced, shipping_address: &snapshot };
        match db::orders::insert(&s.db, &new_order).await {
            Ok(order) => break order,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() && attempt < ORDER_NUMBER_ATTEMPTS => {
                tracing::debug!(%order_number, "order number taken, drawing another");
            }
            Err(e) => return Err(e.into()),
        }
    };
    tracing::info!(order_id = %order.id, order_number = %order.order_number, total_cents = order.total_cents, "order created");

    let session = match s.payments.create_checkout_session(&session_request(&s.config.site_url, &order, &priced, promotion_code_id)).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(order_id = %order.id, error = %e, "checkout session failed, cancelling order");
            let mut conn = s.db.acquire().await?;
            db::orders::save_status(&mut conn, order.id, OrderStatus::Cancelled, None).await?;
            return Err(e.into());
        }
    };
    db::orders::set_session(&s.db, order.id, &session.id).await?;

    s.events
        .publish(&DomainEvent::Order(OrderEvent::Created { order_id: order.id, order_number: order.order_number.clone(), total_cents: order.total_cents }))
        .await;
    Ok((StatusCode::CREATED, Json(CheckoutResponse { order_id: order.id, order_number: order.order_number, session_id: session.id, url: session.url })))
}

pub async fn checkout_session_status(State(s): State<AppState>, user: CurrentUser, Path(session_id): Path<String>) -> ApiResult<Json<SessionStatusResponse>> {
    let session = s.payments.retrieve_checkout_session(&session_id).await?;
    let order = match session.order_id() {
        Some(id) => db::orders::find_for_user(&s.db, user.id, id).await?,
        None => db::orders::find_by_session(&s.db, &session.id).await?.filter(|o| o.user_id == Some(user.id)),
    };
    let order = order.ok_or(ApiError::NotFound("order"))?;
    Ok(Json(SessionStatusResponse { order, payment_status: session.payment_status, session_status: session.status }))
}
