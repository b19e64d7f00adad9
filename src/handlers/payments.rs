//! Admin views onto the payment processor: payments, refunds and the
//! configuration screen.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::orders::change_status;
use crate::auth::AdminUser;
use crate::config::Config;
use crate::db;
use crate::domain::aggregates::{OrderStatus, PaymentStatus};
use crate::domain::value_objects::Money;
use crate::error::{ApiError, ApiResult};
use crate::models::Order;
use crate::payments::stripe::{key_mode, mask_key};
use crate::payments::{PaymentPage, Refund};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentQuery {
    pub limit: Option<u32>,
    pub starting_after: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RefundRequest {
    #[validate(range(min = 1))]
    pub amount_cents: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub refund: Refund,
    pub order: Option<Order>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StripeConfigView {
    pub mode: &'static str,
    pub publishable_key: Option<String>,
    pub secret_key: String,
    pub webhook_configured: bool,
    pub webhook_url: String,
    pub currency: String,
}

impl StripeConfigView {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: key_mode(&config.stripe.secret_key),
            publishable_key: config.stripe.publishable_key.clone(),
            secret_key: mask_key(&config.stripe.secret_key),
            webhook_configured: !config.stripe.webhook_secret.is_empty(),
            webhook_url: config.webhook_url(),
            currency: config.currency.clone(),
        }
    }
}

pub async fn list_payments(State(s): State<AppState>, AdminUser(_): AdminUser, Query(q): Query<PaymentQuery>) -> ApiResult<Json<PaymentPage>> {
    let limit = q.limit.unwrap_or(20).clamp(1, 100);
    let cursor = q.starting_after.as_deref().filter(|c| !c.is_empty());
    Ok(Json(s.payments.list_payments(limit, cursor).await?))
}

/// A refund that covers what was paid closes the order as `refunded`;
/// anything less is noted on the order.
#[tracing::instrument(skip_all, fields(admin_id = %admin.id, %payment_intent_id))]
pub async fn refund_payment(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(payment_intent_id): Path<String>, body: Option<Json<RefundRequest>>) -> ApiResult<Json<RefundResponse>> {
    let r = body.map(|Json(r)| r).unwrap_or_default();
    r.validate()?;
    let refund = s.payments.refund(&payment_intent_id, r.amount_cents).await?;
    tracing::info!(refund_id = %refund.id, amount_cents = refund.amount_cents, "refund issued");

    let Some(order) = db::orders::find_by_payment_intent(&s.db, &payment_intent_id).await? else {
        tracing::warn!("refunded payment has no matching order");
        return Ok(Json(RefundResponse { refund, order: None }));
    };
    let paid = order.amount_paid_cents.unwrap_or(order.total_cents);
    let full = r.amount_cents.map_or(true, |amount| amount >= paid);
    let order = if full {
        let order = match change_status(&s, order.id, OrderStatus::Refunded, None, false).await {
            Ok(order) => order,
            Err(ApiError::Conflict(message)) => {
                tracing::warn!(order_id = %order.id, %message, "order left in its current status after refund");
                order
            }
            Err(e) => return Err(e),
        };
        db::orders::set_payment_status(&s.db, order.id, PaymentStatus::Refunded).await?
    } else {
        db::orders::set_payment_status(&s.db, order.id, PaymentStatus::PartiallyRefunded).await?;
        let amount = Money::new(refund.amount_cents, &order.currency).display_fr();
        db::orders::append_note(&s.db, order.id, &format!("Remboursement partiel de {amount} ({})", refund.id)).await?
    };
    Ok(Json(RefundResponse { refund, order: Some(order) }))
}

pub async fn stripe_config(State(s): State<AppState>, AdminUser(_): AdminUser) -> Json<StripeConfigView> {
    Json(StripeConfigView::from_config(&s.config))
}

/// Never a 5xx: processor failures are reported in the body.
pub async fn stripe_test(State(s): State<AppState>, AdminUser(_): AdminUser) -> Json<serde_json::Value> {
    match s.payments.account().await {
        Ok(account) => Json(serde_json::json!({
            "ok": true,
            "account_id": account.id,
            "charges_enabled": account.charges_enabled,
            "country": account.country,
        })),
        Err(e) => {
            tracing::warn!(error = %e, "payment processor connection test failed");
            Json(serde_json::json!({ "ok": false, "error": e.to_string() }))
        }
    }
}
