//! Payment webhook signature verification and event decoding.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use super::CheckoutSession;

type HmacSha256 = Hmac<Sha256>;

/// Seconds a signed timestamp stays acceptable.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,
    #[error("invalid signature format")]
    InvalidSignatureFormat,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("signature timestamp outside tolerance")]
    StaleTimestamp,
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Verifies a `t=<unix>,v1=<hex>[,v1=<hex>...]` header against the raw body.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<(), WebhookError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            Some(_) => {}
            None => return Err(WebhookError::InvalidSignatureFormat),
        }
    }
    let timestamp = timestamp.ok_or(WebhookError::InvalidSignatureFormat)?;
    let issued_at: i64 = timestamp.parse().map_err(|_| WebhookError::InvalidSignatureFormat)?;
    if signatures.is_empty() {
        return Err(WebhookError::InvalidSignatureFormat);
    }
    if now.abs_diff(issued_at) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(WebhookError::StaleTimestamp);
    }

    let matches = signatures.iter().filter_map(|sig| hex::decode(sig).ok()).any(|expected| {
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else { return false };
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    });
    if matches { Ok(()) } else { Err(WebhookError::InvalidSignature) }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    pub amount: i64,
    #[serde(default)]
    pub amount_refunded: i64,
    #[serde(default)]
    pub refunded: bool,
}

/// The events the shop reacts to; everything else is acknowledged and ignored.
#[derive(Debug, Clone)]
pub enum ShopEvent {
    CheckoutCompleted(CheckoutSession),
    CheckoutExpired(CheckoutSession),
    ChargeRefunded(Charge),
    Ignored(String),
}

impl Event {
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    pub fn into_shop_event(self) -> Result<ShopEvent, WebhookError> {
        let decode_err = |e: serde_json::Error| WebhookError::InvalidPayload(e.to_string());
        Ok(match self.kind.as_str() {
            "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
                ShopEvent::CheckoutCompleted(serde_json::from_value(self.data.object).map_err(decode_err)?)
            }
            "checkout.session.expired" => ShopEvent::CheckoutExpired(serde_json::from_value(self.data.object).map_err(decode_err)?),
            "charge.refunded" => ShopEvent::ChargeRefunded(serde_json::from_value(self.data.object).map_err(decode_err)?),
            _ => ShopEvent::Ignored(self.kind),
        })
    }
}
