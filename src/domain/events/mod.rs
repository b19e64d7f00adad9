//! Domain events
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::{OrderStatus, StockReason};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    StockMoved { product_id: Uuid, delta: i32, reason: StockReason, quantity: i32 },
    StockLow { product_id: Uuid, name: String, quantity: i32 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, order_number: String, total_cents: i64 },
    Paid { order_id: Uuid, order_number: String, amount_cents: i64 },
    StatusChanged { order_id: Uuid, order_number: String, from: OrderStatus, to: OrderStatus },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::StockMoved { .. }) => "cactaia.stock.moved",
            Self::Product(ProductEvent::StockLow { .. }) => "cactaia.stock.low",
            Self::Order(OrderEvent::Created { .. }) => "cactaia.order.created",
            Self::Order(OrderEvent::Paid { .. }) => "cactaia.order.paid",
            Self::Order(OrderEvent::StatusChanged { .. }) => "cactaia.order.status_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_payload_shape() {
        let event = DomainEvent::Order(OrderEvent::Paid { order_id: Uuid::nil(), order_number: "CB-1".into(), amount_cents: 990 });
        assert_eq!(event.subject(), "cactaia.order.paid");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "paid");
        assert_eq!(json["amount_cents"], 990);
    }
}
