//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::events::{DomainEvent, OrderEvent};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Paid, Processing, Shipped, Delivered, Cancelled, Refunded }

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [Self::Pending, Self::Paid, Self::Processing, Self::Shipped, Self::Delivered, Self::Cancelled, Self::Refunded];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Paid) | (Pending, Cancelled)
                | (Paid, Processing) | (Paid, Shipped) | (Paid, Cancelled) | (Paid, Refunded)
                | (Processing, Shipped) | (Processing, Cancelled) | (Processing, Refunded)
                | (Shipped, Delivered) | (Shipped, Refunded)
                | (Delivered, Refunded)
        )
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Cancelled | Self::Refunded) }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|status| status.as_str() == s).ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Unpaid, Paid, PartiallyRefunded, Refunded }

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
            Self::PartiallyRefunded => "partially_refunded",
            Self::Refunded => "refunded",
        }
    }
}

/// Shipment details recorded when an order leaves the workshop.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment { pub tracking_number: Option<String>, pub carrier: Option<String> }

/// Status machine of a persisted order. Rows are loaded from the database,
/// moved through [`OrderLifecycle::transition`] and written back.
#[derive(Clone, Debug)]
pub struct OrderLifecycle {
    id: Uuid,
    order_number: String,
    status: OrderStatus,
    shipment: Shipment,
    events: Vec<DomainEvent>,
}

impl OrderLifecycle {
    pub fn load(id: Uuid, order_number: impl Into<String>, status: OrderStatus) -> Self {
        Self { id, order_number: order_number.into(), status, shipment: Shipment::default(), events: vec![] }
    }

    pub fn status(&self) -> OrderStatus { self.status }
    pub fn shipment(&self) -> &Shipment { &self.shipment }

    pub fn transition(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status, to: next });
        }
        let from = self.status;
        self.status = next;
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged {
            order_id: self.id,
            order_number: self.order_number.clone(),
            from,
            to: next,
        }));
        Ok(())
    }

    pub fn ship(&mut self, shipment: Shipment) -> Result<(), OrderError> {
        self.transition(OrderStatus::Shipped)?;
        self.shipment = shipment;
        Ok(())
    }

    /// Payment confirmation is idempotent: anything past `pending` is left as is.
    pub fn mark_paid(&mut self, amount_cents: i64) -> Result<bool, OrderError> {
        if self.status != OrderStatus::Pending { return Ok(false); }
        self.transition(OrderStatus::Paid)?;
        self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_id: self.id, order_number: self.order_number.clone(), amount_cents }));
        Ok(true)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

/// `CB-YYMMDD-XXXXX`, the suffix drawn from an unambiguous alphabet.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    use rand::Rng;
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..5).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect();
    format!("CB-{}-{}", now.format("%y%m%d"), suffix)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("unknown order status '{0}'")]
    UnknownStatus(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_order_workflow() {
        let mut order = OrderLifecycle::load(Uuid::now_v7(), "CB-250101-AAAAA", OrderStatus::Pending);
        assert!(order.mark_paid(4200).unwrap());
        order.transition(OrderStatus::Processing).unwrap();
        order.ship(Shipment { tracking_number: Some("6A123".into()), carrier: Some("Colissimo".into()) }).unwrap();
        assert_eq!(order.status(), OrderStatus::Shipped);
        assert_eq!(order.shipment().tracking_number.as_deref(), Some("6A123"));
        order.transition(OrderStatus::Delivered).unwrap();
        assert_eq!(order.take_events().len(), 5);
    }

    #[test]
    fn test_mark_paid_is_idempotent() {
        let mut order = OrderLifecycle::load(Uuid::now_v7(), "CB-1", OrderStatus::Shipped);
        assert!(!order.mark_paid(100).unwrap());
        assert_eq!(order.status(), OrderStatus::Shipped);
        assert!(order.take_events().is_empty());
    }

    #[test]
    fn test_rejected_transitions() {
        let mut order = OrderLifecycle::load(Uuid::now_v7(), "CB-1", OrderStatus::Pending);
        assert_eq!(
            order.transition(OrderStatus::Shipped),
            Err(OrderError::InvalidTransition { from: OrderStatus::Pending, to: OrderStatus::Shipped })
        );
        for terminal in [OrderStatus::Cancelled, OrderStatus::Refunded] {
            assert!(terminal.is_terminal());
            assert!(OrderStatus::ALL.iter().all(|next| !terminal.can_transition_to(*next)));
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_number_format() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();
        let number = generate_order_number(now);
        assert!(number.starts_with("CB-250309-"));
        assert_eq!(number.len(), "CB-250309-".len() + 5);
    }
}
