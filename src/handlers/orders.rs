//! Customer order history, the admin order desk, and the status changes
//! shared with the payment webhooks.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, CurrentUser};
use crate::db::orders::{self, OrderFilter};
use crate::domain::aggregates::{OrderLifecycle, OrderStatus, Shipment};
use crate::email::{render_order, Delivery, OrderEmail, OutgoingEmail, Template};
use crate::error::{ApiError, ApiResult};
use crate::models::{page_window, Order, OrderWithItems, PaginatedResponse};
use crate::state::AppState;

/// Customer email that follows a status change, if any.
pub fn template_for(status: OrderStatus) -> Option<Template> {
    match status {
        OrderStatus::Shipped => Some(Template::OrderShipped),
        OrderStatus::Delivered => Some(Template::OrderDelivered),
        OrderStatus::Cancelled => Some(Template::OrderCancelled),
        _ => None,
    }
}

/// Renders and sends an order email. Admin alerts go to `ADMIN_EMAIL` and are
/// skipped when it is unset. Failures are logged, never returned.
pub async fn send_order_email(s: &AppState, order: &Order, template: Template, bypass_dedup: bool) -> Delivery {
    let to = if template == Template::AdminNewOrder {
        match s.mailer.admin_email() {
            Some(admin) => admin.to_string(),
            None => return Delivery::Skipped,
        }
    } else {
        order.customer_email.clone()
    };
    let items = match orders::items(&s.db, order.id).await {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(order_id = %order.id, error = %e, "could not load order items for email");
            return Delivery::Failed(e.to_string());
        }
    };
    let rendered = match render_order(template, &OrderEmail::from_order(order, &items, &s.config.site_url)) {
        Ok(Some(rendered)) => rendered,
        Ok(None) => return Delivery::Skipped,
        Err(e) => {
            tracing::error!(order_id = %order.id, %template, error = %e, "could not render order email");
            return Delivery::Failed(e.to_string());
        }
    };
    let email = OutgoingEmail { rendered, to, order_id: Some(order.id), user_id: order.user_id };
    if bypass_dedup { s.mailer.send_again(email).await } else { s.mailer.send_once(email).await }
}

/// Moves an order through its status machine under a row lock, then
/// publishes the events and, when `notify` is set, sends the matching
/// customer email.
pub async fn change_status(s: &AppState, order_id: Uuid, next: OrderStatus, shipment: Option<Shipment>, notify: bool) -> ApiResult<Order> {
    let mut tx = s.db.begin().await?;
    let current = orders::lock(&mut tx, order_id).await?.ok_or(ApiError::NotFound("order"))?;
    let status: OrderStatus = current.status.parse()?;
    let mut lifecycle = OrderLifecycle::load(current.id, current.order_number.clone(), status);
    match (next, shipment) {
        (OrderStatus::Shipped, Some(shipment)) => lifecycle.ship(shipment)?,
        _ => lifecycle.transition(next)?,
    }
    let shipment = (next == OrderStatus::Shipped).then(|| lifecycle.shipment().clone());
    let order = orders::save_status(&mut tx, order_id, lifecycle.status(), shipment.as_ref()).await?;
    tx.commit().await?;

    tracing::info!(order_id = %order_id, order_number = %order.order_number, from = %status, to = %next, "order status changed");
    s.events.publish_all(lifecycle.take_events()).await;
    if let Some(template) = template_for(next).filter(|_| notify) {
        send_order_email(s, &order, template, false).await;
    }
    Ok(order)
}

// =============================================================================
// Customer
// =============================================================================

pub async fn list_my_orders(State(s): State<AppState>, user: CurrentUser) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(orders::list_for_user(&s.db, user.id).await?))
}

pub async fn get_my_order(State(s): State<AppState>, user: CurrentUser, Path(id): Path<Uuid>) -> ApiResult<Json<OrderWithItems>> {
    let order = orders::find_for_user(&s.db, user.id, id).await?.ok_or(ApiError::NotFound("order"))?;
    Ok(Json(orders::with_items(&s.db, order).await?))
}

// =============================================================================
// Admin
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    pub status: String,
    #[validate(length(min = 1, max = 100))]
    pub tracking_number: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub carrier: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NotesRequest {
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

pub async fn admin_list_orders(State(s): State<AppState>, AdminUser(_): AdminUser, Query(q): Query<OrderQuery>) -> ApiResult<Json<PaginatedResponse<Order>>> {
    let status = q.status.as_deref().filter(|v| !v.is_empty()).map(str::parse::<OrderStatus>).transpose()?;
    let (page, per_page, offset) = page_window(q.page, q.per_page);
    let (data, total) = orders::list(&s.db, &OrderFilter { status, search: q.search }, per_page, offset).await?;
    Ok(Json(PaginatedResponse { data, total, page, per_page }))
}

pub async fn admin_get_order(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> ApiResult<Json<OrderWithItems>> {
    let order = orders::find(&s.db, id).await?.ok_or(ApiError::NotFound("order"))?;
    Ok(Json(orders::with_items(&s.db, order).await?))
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id, order_id = %id))]
pub async fn update_order_status(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<StatusRequest>) -> ApiResult<Json<Order>> {
    r.validate()?;
    let next: OrderStatus = r.status.parse()?;
    let shipment = (next == OrderStatus::Shipped).then(|| Shipment {
        tracking_number: r.tracking_number.map(|t| t.trim().to_string()),
        carrier: r.carrier.map(|c| c.trim().to_string()),
    });
    Ok(Json(change_status(&s, id, next, shipment, true).await?))
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id, order_id = %id))]
pub async fn update_order_notes(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>, Json(r): Json<NotesRequest>) -> ApiResult<Json<Order>> {
    r.validate()?;
    let notes = r.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let order = orders::set_notes(&s.db, id, notes).await?.ok_or(ApiError::NotFound("order"))?;
    tracing::info!("order notes updated");
    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_emails_follow_status() {
        assert_eq!(template_for(OrderStatus::Shipped), Some(Template::OrderShipped));
        assert_eq!(template_for(OrderStatus::Delivered), Some(Template::OrderDelivered));
        assert_eq!(template_for(OrderStatus::Cancelled), Some(Template::OrderCancelled));
        assert_eq!(template_for(OrderStatus::Processing), None);
        assert_eq!(template_for(OrderStatus::Refunded), None);
    }

    #[test]
    fn test_status_request_parse() {
        let r: StatusRequest = serde_json::from_str(r#"{"status":"shipped","tracking_number":"6A1234","carrier":"Colissimo"}"#).unwrap();
        assert!(r.validate().is_ok());
        assert_eq!(r.status.parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert!("lost".parse::<OrderStatus>().is_err());
    }
}
