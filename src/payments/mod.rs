//! Payment processor integration: hosted checkout sessions, payments, refunds.

pub mod stripe;
pub mod webhook;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

pub use stripe::StripeClient;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment provider request failed: {0}")]
    Network(String),
    #[error("payment provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected payment provider response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub name: String,
    pub unit_amount_cents: i64,
    pub quantity: u32,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_email: String,
    pub currency: String,
    pub lines: Vec<CheckoutLine>,
    pub shipping_cents: i64,
    /// Processor id of a promotion code resolved from the customer's input.
    pub promotion_code_id: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    /// Order id carried by the session, from the reference id or the metadata.
    pub fn order_id(&self) -> Option<Uuid> {
        self.client_reference_id
            .as_deref()
            .or_else(|| self.metadata.get("order_id").map(String::as_str))
            .and_then(|id| Uuid::parse_str(id).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentSummary {
    pub id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub created: i64,
    pub customer_email: Option<String>,
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentPage {
    pub data: Vec<PaymentSummary>,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    #[serde(rename = "amount")]
    pub amount_cents: i64,
    pub status: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionCode {
    pub id: String,
    pub code: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatus {
    pub id: String,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub country: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession, PaymentError>;

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, PaymentError>;

    async fn list_payments(&self, limit: u32, starting_after: Option<&str>) -> Result<PaymentPage, PaymentError>;

    /// Refunds a payment intent, fully when `amount_cents` is `None`.
    async fn refund(&self, payment_intent_id: &str, amount_cents: Option<i64>) -> Result<Refund, PaymentError>;

    /// Resolves a customer-facing code; `None` when unknown or inactive.
    async fn find_promotion_code(&self, code: &str) -> Result<Option<PromotionCode>, PaymentError>;

    async fn account(&self) -> Result<AccountStatus, PaymentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_order_id_prefers_reference() {
        let id = Uuid::now_v7();
        let mut session = CheckoutSession { id: "cs_1".into(), client_reference_id: Some(id.to_string()), ..Default::default() };
        assert_eq!(session.order_id(), Some(id));
        session.client_reference_id = None;
        assert_eq!(session.order_id(), None);
        session.metadata.insert("order_id".into(), id.to_string());
        assert_eq!(session.order_id(), Some(id));
    }
}
