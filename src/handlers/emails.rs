//! Admin access to the transactional email log and manual re-sends.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::orders::send_order_email;
use crate::auth::AdminUser;
use crate::db;
use crate::email::{Delivery, Template};
use crate::error::{ApiError, ApiResult};
use crate::models::{page_window, EmailLog, PaginatedResponse};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Delivery> for DeliveryResponse {
    fn from(d: Delivery) -> Self {
        match d {
            Delivery::Sent(id) => Self { status: "sent", provider_id: Some(id), error: None },
            Delivery::Skipped => Self { status: "skipped", provider_id: None, error: None },
            Delivery::Failed(e) => Self { status: "failed", provider_id: None, error: Some(e) },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResendRequest {
    pub order_id: Uuid,
    pub template: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailLogQuery {
    pub order_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Only order templates can be re-sent against an order.
pub fn order_template(name: &str) -> ApiResult<Template> {
    let template: Template = name.parse().map_err(ApiError::Validation)?;
    if !template.is_order_template() {
        return Err(ApiError::Validation(format!("'{template}' is not an order email")));
    }
    Ok(template)
}

#[tracing::instrument(skip_all, fields(admin_id = %admin.id, order_id = %r.order_id))]
pub async fn resend_email(State(s): State<AppState>, AdminUser(admin): AdminUser, Json(r): Json<ResendRequest>) -> ApiResult<Json<DeliveryResponse>> {
    let template = order_template(&r.template)?;
    let order = db::orders::find(&s.db, r.order_id).await?.ok_or(ApiError::NotFound("order"))?;
    let delivery = send_order_email(&s, &order, template, true).await;
    tracing::info!(%template, ?delivery, "email re-sent");
    Ok(Json(delivery.into()))
}

pub async fn list_email_logs(State(s): State<AppState>, AdminUser(_): AdminUser, Query(q): Query<EmailLogQuery>) -> ApiResult<Json<PaginatedResponse<EmailLog>>> {
    let (page, per_page, offset) = page_window(q.page, q.per_page);
    let (data, total) = db::email_logs::list(&s.db, q.order_id, per_page, offset).await?;
    Ok(Json(PaginatedResponse { data, total, page, per_page }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_template() {
        assert_eq!(order_template("order_shipped").unwrap(), Template::OrderShipped);
        assert!(matches!(order_template("welcome"), Err(ApiError::Validation(_))));
        assert!(matches!(order_template("newsletter"), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_delivery_response() {
        let sent = DeliveryResponse::from(Delivery::Sent("re_1".into()));
        assert_eq!(serde_json::to_value(&sent).unwrap(), serde_json::json!({ "status": "sent", "provider_id": "re_1" }));
        assert_eq!(DeliveryResponse::from(Delivery::Skipped).status, "skipped");
        assert_eq!(DeliveryResponse::from(Delivery::Failed("boom".into())).error.as_deref(), Some("boom"));
    }
}
