//! Payment processor webhooks. The signature is checked against the raw body
//! before anything is decoded.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;

use super::orders::{change_status, send_order_email};
use crate::db;
use crate::db::notifications::NotificationKind;
use crate::domain::aggregates::{OrderLifecycle, OrderStatus, PaymentStatus, StockReason};
use crate::domain::value_objects::Money;
use crate::email::Template;
use crate::error::{ApiError, ApiResult};
use crate::models::Order;
use crate::payments::webhook::{verify_signature, Charge, Event, ShopEvent, WebhookError};
use crate::payments::CheckoutSession;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Checks the signature header and decodes the event.
pub fn authenticate(headers: &HeaderMap, body: &[u8], secret: &str, now: i64) -> Result<ShopEvent, WebhookError> {
    let header = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()).ok_or(WebhookError::MissingSignature)?;
    verify_signature(body, header, secret, now)?;
    Event::parse(body)?.into_shop_event()
}

#[tracing::instrument(skip_all)]
pub async fn stripe_webhook(State(s): State<AppState>, headers: HeaderMap, body: Bytes) -> ApiResult<Json<serde_json::Value>> {
    let event = authenticate(&headers, &body, &s.config.stripe.webhook_secret, Utc::now().timestamp()).map_err(|e| {
        tracing::warn!(error = %e, "webhook rejected");
        ApiError::from(e)
    })?;

    match event {
        ShopEvent::CheckoutCompleted(session) if session.payment_status == "paid" => checkout_paid(&s, &session).await?,
        ShopEvent::CheckoutCompleted(session) => {
            tracing::info!(session_id = %session.id, payment_status = %session.payment_status, "checkout completed without payment yet");
        }
        ShopEvent::CheckoutExpired(session) => checkout_expired(&s, &session).await?,
        ShopEvent::ChargeRefunded(charge) => charge_refunded(&s, &charge).await?,
        ShopEvent::Ignored(kind) => tracing::debug!(%kind, "webhook event ignored"),
    }
    Ok(Json(serde_json::json!({ "received": true })))
}

async fn order_for_session(s: &AppState, session: &CheckoutSession) -> ApiResult<Option<Order>> {
    let order = match session.order_id() {
        Some(id) => db::orders::find(&s.db, id).await?,
        None => None,
    };
    match order {
        Some(order) => Ok(Some(order)),
        None => Ok(db::orders::find_by_session(&s.db, &session.id).await?),
    }
}

/// Marks the order paid, takes the sold quantities out of stock and alerts the
/// shop. Replays of the same event leave a paid order untouched.
async fn checkout_paid(s: &AppState, session: &CheckoutSession) -> ApiResult<()> {
    let Some(order) = order_for_session(s, session).await? else {
        tracing::warn!(session_id = %session.id, "paid checkout session has no matching order");
        return Ok(());
    };

    let mut tx = s.db.begin().await?;
    let current = db::orders::lock(&mut tx, order.id).await?.ok_or(ApiError::NotFound("order"))?;
    let mut lifecycle = OrderLifecycle::load(current.id, current.order_number.clone(), current.status.parse()?);
    let amount = session.amount_total.unwrap_or(current.total_cents);
    if !lifecycle.mark_paid(amount)? {
        tracing::info!(order_id = %order.id, status = %current.status, "order already past pending, nothing to do");
        return Ok(());
    }
    let order = db::orders::record_payment(&mut tx, order.id, session.payment_intent.as_deref(), amount).await?;

    let mut events = lifecycle.take_events();
    for item in db::orders::items_locked(&mut tx, order.id).await? {
        let Some(product_id) = item.product_id else { continue };
        let applied = db::stock::apply_movement(&mut tx, product_id, -item.quantity, StockReason::Sale, Some(order.id), None, s.config.low_stock_threshold).await;
        match applied {
            Ok(applied) => events.extend(applied.events),
            // The customer has paid; a shortfall is for the shop to resolve.
            Err(ApiError::Conflict(message) | ApiError::Validation(message)) => {
                tracing::warn!(order_id = %order.id, %product_id, %message, "could not take sold quantity out of stock");
                let text = format!("Stock insuffisant pour « {} » (commande {}) : {message}", item.product_name, order.order_number);
                db::notifications::create(&mut *tx, NotificationKind::System, "Stock à vérifier", &text, Some(&format!("/admin/produits/{product_id}"))).await?;
            }
            Err(ApiError::NotFound(_)) => tracing::warn!(order_id = %order.id, %product_id, "sold product no longer exists"),
            Err(e) => return Err(e),
        }
    }

    let total = Money::new(order.amount_paid_cents.unwrap_or(order.total_cents), &order.currency).display_fr();
    db::notifications::create(
        &mut *tx,
        NotificationKind::NewOrder,
        "Nouvelle commande",
        &format!("Commande {} de {} : {total}", order.order_number, order.customer_email),
        Some(&format!("/admin/commandes/{}", order.id)),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(order_id = %order.id, order_number = %order.order_number, amount_cents = amount, "order paid");
    s.events.publish_all(events).await;
    send_order_email(s, &order, Template::OrderConfirmation, false).await;
    send_order_email(s, &order, Template::AdminNewOrder, false).await;
    Ok(())
}

/// An abandoned checkout releases its pending order. No email goes out: the
/// customer walked away from the payment page themselves.
async fn checkout_expired(s: &AppState, session: &CheckoutSession) -> ApiResult<()> {
    let Some(order) = order_for_session(s, session).await? else { return Ok(()) };
    if order.status != OrderStatus::Pending.as_str() {
        return Ok(());
    }
    match change_status(s, order.id, OrderStatus::Cancelled, None, false).await {
        Ok(_) => Ok(()),
        // Paid in the meantime.
        Err(ApiError::Conflict(message)) => {
            tracing::info!(order_id = %order.id, %message, "expired session left order untouched");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn charge_refunded(s: &AppState, charge: &Charge) -> ApiResult<()> {
    let Some(payment_intent) = charge.payment_intent.as_deref() else { return Ok(()) };
    let Some(order) = db::orders::find_by_payment_intent(&s.db, payment_intent).await? else {
        tracing::warn!(charge_id = %charge.id, %payment_intent, "refunded charge has no matching order");
        return Ok(());
    };

    if !charge.refunded {
        db::orders::set_payment_status(&s.db, order.id, PaymentStatus::PartiallyRefunded).await?;
        tracing::info!(order_id = %order.id, amount_refunded = charge.amount_refunded, "charge partially refunded");
        return Ok(());
    }
    if order.status != OrderStatus::Refunded.as_str() {
        match change_status(s, order.id, OrderStatus::Refunded, None, false).await {
            Ok(_) => {}
            Err(ApiError::Conflict(message)) => tracing::warn!(order_id = %order.id, %message, "refunded order left in its current status"),
            Err(e) => return Err(e),
        }
    }
    db::orders::set_payment_status(&s.db, order.id, PaymentStatus::Refunded).await?;
    tracing::info!(order_id = %order.id, "charge fully refunded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    const SECRET: &str = "whsec_cactaia";

    fn signed(payload: &[u8], timestamp: i64) -> HeaderMap {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        let mut headers = HeaderMap::new();
        let value = format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()));
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&value).unwrap());
        headers
    }

    #[test]
    fn test_missing_header_is_bad_request() {
        let err = authenticate(&HeaderMap::new(), b"{}", SECRET, 0).unwrap_err();
        assert_eq!(err, WebhookError::MissingSignature);
        assert_eq!(ApiError::from(err).status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_tampered_or_stale_events_are_unauthorized() {
        let payload = br#"{"id":"evt_1","type":"payment_intent.created","data":{"object":{}}}"#;
        let headers = signed(payload, 1_700_000_000);
        let err = authenticate(&headers, br#"{"id":"evt_2"}"#, SECRET, 1_700_000_000).unwrap_err();
        assert_eq!(ApiError::from(err).status_code(), StatusCode::UNAUTHORIZED);
        let err = authenticate(&headers, payload, SECRET, 1_700_000_900).unwrap_err();
        assert_eq!(err, WebhookError::StaleTimestamp);
        assert_eq!(ApiError::from(err).status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_signed_event_is_decoded() {
        let payload = br#"{"id":"evt_1","type":"charge.refunded","data":{"object":{"id":"ch_1","payment_intent":"pi_1","amount":4200,"amount_refunded":4200,"refunded":true}}}"#;
        let event = authenticate(&signed(payload, 1_700_000_000), payload, SECRET, 1_700_000_030).unwrap();
        match event {
            ShopEvent::ChargeRefunded(charge) => {
                assert_eq!(charge.payment_intent.as_deref(), Some("pi_1"));
                assert!(charge.refunded);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_signed_garbage_is_bad_request() {
        let payload = b"not json";
        let err = authenticate(&signed(payload, 10), payload, SECRET, 10).unwrap_err();
        assert!(matches!(err, WebhookError::InvalidPayload(_)));
        assert_eq!(ApiError::from(err).status_code(), StatusCode::BAD_REQUEST);
    }
}
