//! REST client for the Stripe API.
//!
//! Requests are form-encoded with bracketed keys (`line_items[0][quantity]`)
//! and authenticated with the secret key as a bearer token.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{
    AccountStatus, CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentGateway, PaymentPage, PaymentSummary,
    PromotionCode, Refund,
};
use crate::config::StripeSettings;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    api_base: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct List<T> {
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
struct PaymentIntent {
    id: String,
    amount: i64,
    currency: String,
    status: String,
    created: i64,
    #[serde(default)]
    receipt_email: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl From<PaymentIntent> for PaymentSummary {
    fn from(pi: PaymentIntent) -> Self {
        Self {
            order_id: pi.metadata.get("order_id").cloned(),
            id: pi.id,
            amount_cents: pi.amount,
            currency: pi.currency,
            status: pi.status,
            created: pi.created,
            customer_email: pi.receipt_email,
        }
    }
}

impl StripeClient {
    pub fn new(settings: &StripeSettings) -> Self {
        Self { http: Client::new(), api_base: settings.api_base.clone(), secret_key: settings.secret_key.clone() }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(format!("{}{}", self.api_base, path)).bearer_auth(&self.secret_key).timeout(REQUEST_TIMEOUT)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(format!("{}{}", self.api_base, path)).bearer_auth(&self.secret_key).timeout(REQUEST_TIMEOUT)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, PaymentError> {
        let response = request.send().await.map_err(|e| PaymentError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            tracing::warn!(status = status.as_u16(), %message, "stripe request failed");
            return Err(PaymentError::Api { status: status.as_u16(), message });
        }
        response.json().await.map_err(|e| PaymentError::Decode(e.to_string()))
    }
}

/// Form parameters for `POST /v1/checkout/sessions`.
pub fn checkout_session_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let order_id = request.order_id.to_string();
    let mut form: Vec<(String, String)> = vec![
        ("mode".into(), "payment".into()),
        ("success_url".into(), request.success_url.clone()),
        ("cancel_url".into(), request.cancel_url.clone()),
        ("customer_email".into(), request.customer_email.clone()),
        ("client_reference_id".into(), order_id.clone()),
        ("metadata[order_id]".into(), order_id.clone()),
        ("metadata[order_number]".into(), request.order_number.clone()),
        ("payment_intent_data[metadata][order_id]".into(), order_id),
        ("payment_intent_data[metadata][order_number]".into(), request.order_number.clone()),
    ];

    for (i, line) in request.lines.iter().enumerate() {
        let key = |suffix: &str| format!("line_items[{i}]{suffix}");
        form.push((key("[price_data][currency]"), request.currency.clone()));
        form.push((key("[price_data][unit_amount]"), line.unit_amount_cents.to_string()));
        form.push((key("[price_data][product_data][name]"), line.name.clone()));
        if let Some(image) = &line.image {
            form.push((key("[price_data][product_data][images][0]"), image.clone()));
        }
        form.push((key("[quantity]"), line.quantity.to_string()));
    }

    if request.shipping_cents > 0 {
        let rate = "shipping_options[0][shipping_rate_data]";
        form.push((format!("{rate}[type]"), "fixed_amount".into()));
        form.push((format!("{rate}[fixed_amount][amount]"), request.shipping_cents.to_string()));
        form.push((format!("{rate}[fixed_amount][currency]"), request.currency.clone()));
        form.push((format!("{rate}[display_name]"), "Livraison standard".into()));
    }

    // The processor rejects `discounts` together with `allow_promotion_codes`.
    match &request.promotion_code_id {
        Some(id) => form.push(("discounts[0][promotion_code]".into(), id.clone())),
        None => form.push(("allow_promotion_codes".into(), "true".into())),
    }
    form
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSession, PaymentError> {
        let form = checkout_session_form(request);
        self.send(self.post("/v1/checkout/sessions").form(&form)).await
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, PaymentError> {
        self.send(self.get(&format!("/v1/checkout/sessions/{session_id}"))).await
    }

    async fn list_payments(&self, limit: u32, starting_after: Option<&str>) -> Result<PaymentPage, PaymentError> {
        let mut query = vec![("limit".to_string(), limit.clamp(1, 100).to_string())];
        if let Some(cursor) = starting_after {
            query.push(("starting_after".to_string(), cursor.to_string()));
        }
        let list: List<PaymentIntent> = self.send(self.get("/v1/payment_intents").query(&query)).await?;
        Ok(PaymentPage { data: list.data.into_iter().map(PaymentSummary::from).collect(), has_more: list.has_more })
    }

    async fn refund(&self, payment_intent_id: &str, amount_cents: Option<i64>) -> Result<Refund, PaymentError> {
        let mut form = vec![("payment_intent".to_string(), payment_intent_id.to_string())];
        if let Some(amount) = amount_cents {
            form.push(("amount".to_string(), amount.to_string()));
        }
        self.send(self.post("/v1/refunds").form(&form)).await
    }

    async fn find_promotion_code(&self, code: &str) -> Result<Option<PromotionCode>, PaymentError> {
        let query = [("code", code), ("active", "true"), ("limit", "1")];
        let list: List<PromotionCode> = self.send(self.get("/v1/promotion_codes").query(&query)).await?;
        Ok(list.data.into_iter().find(|promo| promo.active))
    }

    async fn account(&self) -> Result<AccountStatus, PaymentError> {
        self.send(self.get("/v1/account")).await
    }
}

/// `test` or `live`, from the secret key prefix.
pub fn key_mode(secret_key: &str) -> &'static str {
    if secret_key.starts_with("sk_live_") || secret_key.starts_with("rk_live_") { "live" } else { "test" }
}

/// Keeps the key prefix and the last four characters.
pub fn mask_key(key: &str) -> String {
    let prefix_len = key.match_indices('_').nth(1).map(|(i, _)| i + 1).unwrap_or(0);
    if !key.is_ascii() || key.len() <= prefix_len + 8 {
        return "•".repeat(key.chars().count());
    }
    format!("{}••••{}", &key[..prefix_len], &key[key.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::CheckoutLine;
    use uuid::Uuid;

    fn request(promo: Option<&str>, shipping_cents: i64) -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            order_id: Uuid::nil(),
            order_number: "CB-250101-ABCDE".into(),
            customer_email: "lea@example.com".into(),
            currency: "eur".into(),
            lines: vec![
                CheckoutLine { name: "Bague Saguaro".into(), unit_amount_cents: 2900, quantity: 1, image: Some("https://cdn/bague.jpg".into()) },
                CheckoutLine { name: "Créoles Opuntia".into(), unit_amount_cents: 3500, quantity: 2, image: None },
            ],
            shipping_cents,
            promotion_code_id: promo.map(str::to_string),
            success_url: "https://shop/success".into(),
            cancel_url: "https://shop/cancel".into(),
        }
    }

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_checkout_form_line_items() {
        let form = checkout_session_form(&request(None, 490));
        assert_eq!(value(&form, "mode"), Some("payment"));
        assert_eq!(value(&form, "client_reference_id"), Some(Uuid::nil().to_string().as_str()));
        assert_eq!(value(&form, "line_items[0][price_data][unit_amount]"), Some("2900"));
        assert_eq!(value(&form, "line_items[0][price_data][product_data][images][0]"), Some("https://cdn/bague.jpg"));
        assert_eq!(value(&form, "line_items[1][quantity]"), Some("2"));
        assert_eq!(value(&form, "line_items[1][price_data][product_data][images][0]"), None);
        assert_eq!(value(&form, "shipping_options[0][shipping_rate_data][fixed_amount][amount]"), Some("490"));
        assert_eq!(value(&form, "shipping_options[0][shipping_rate_data][display_name]"), Some("Livraison standard"));
        assert_eq!(value(&form, "allow_promotion_codes"), Some("true"));
    }

    #[test]
    fn test_checkout_form_with_promotion_code() {
        let form = checkout_session_form(&request(Some("promo_123"), 0));
        assert_eq!(value(&form, "discounts[0][promotion_code]"), Some("promo_123"));
        assert_eq!(value(&form, "allow_promotion_codes"), None);
        assert!(form.iter().all(|(k, _)| !k.starts_with("shipping_options")));
    }

    #[test]
    fn test_key_mode_and_mask() {
        assert_eq!(key_mode("sk_live_abcdef123456"), "live");
        assert_eq!(key_mode("sk_test_abcdef123456"), "test");
        assert_eq!(mask_key("sk_test_abcdef123456"), "sk_test_••••3456");
        assert_eq!(mask_key("short"), "•••••");
    }

    #[test]
    fn test_payment_intent_mapping() {
        let json = serde_json::json!({
            "id": "pi_1", "amount": 4200, "currency": "eur", "status": "succeeded", "created": 1700000000,
            "receipt_email": "lea@example.com", "metadata": { "order_id": "abc" }
        });
        let summary = PaymentSummary::from(serde_json::from_value::<PaymentIntent>(json).unwrap());
        assert_eq!(summary.amount_cents, 4200);
        assert_eq!(summary.order_id.as_deref(), Some("abc"));
        assert_eq!(summary.customer_email.as_deref(), Some("lea@example.com"));
    }
}
