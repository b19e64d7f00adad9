//! Product stock aggregate

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::events::{DomainEvent, ProductEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockReason { Sale, Restock, Adjustment, Return }

impl StockReason {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Sale => "sale", Self::Restock => "restock", Self::Adjustment => "adjustment", Self::Return => "return" }
    }
}

impl fmt::Display for StockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for StockReason {
    type Err = ProductError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(Self::Sale),
            "restock" => Ok(Self::Restock),
            "adjustment" => Ok(Self::Adjustment),
            "return" => Ok(Self::Return),
            other => Err(ProductError::UnknownReason(other.to_string())),
        }
    }
}

/// Stock level of one product, with the movements applied to it.
#[derive(Clone, Debug)]
pub struct ProductStock {
    product_id: Uuid,
    name: String,
    quantity: i32,
    low_threshold: i32,
    events: Vec<DomainEvent>,
}

impl ProductStock {
    pub fn load(product_id: Uuid, name: impl Into<String>, quantity: i32, low_threshold: i32) -> Self {
        Self { product_id, name: name.into(), quantity, low_threshold, events: vec![] }
    }

    pub fn quantity(&self) -> i32 { self.quantity }
    pub fn is_low(&self) -> bool { self.quantity <= self.low_threshold }

    /// Applies a signed movement; stock never goes negative. Every decrease
    /// that leaves the product at or below the threshold raises `StockLow`.
    pub fn apply(&mut self, delta: i32, reason: StockReason) -> Result<i32, ProductError> {
        if delta == 0 { return Err(ProductError::ZeroDelta); }
        if reason == StockReason::Sale && delta > 0 { return Err(ProductError::SaleMustDecrease); }
        let next = self.quantity.checked_add(delta).ok_or(ProductError::InsufficientStock { available: self.quantity })?;
        if next < 0 { return Err(ProductError::InsufficientStock { available: self.quantity }); }
        self.quantity = next;
        self.raise_event(DomainEvent::Product(ProductEvent::StockMoved { product_id: self.product_id, delta, reason, quantity: next }));
        if delta < 0 && self.is_low() {
            self.raise_event(DomainEvent::Product(ProductEvent::StockLow { product_id: self.product_id, name: self.name.clone(), quantity: next }));
        }
        Ok(next)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

/// Both prices are in cents; a compare-at price must be a real markdown.
pub fn validate_pricing(price_cents: i64, compare_at_price_cents: Option<i64>) -> Result<(), ProductError> {
    if price_cents < 0 { return Err(ProductError::NegativePrice); }
    match compare_at_price_cents {
        Some(compare) if compare <= price_cents => Err(ProductError::CompareAtNotHigher),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("stock movement must not be zero")]
    ZeroDelta,
    #[error("a sale can only decrease stock")]
    SaleMustDecrease,
    #[error("insufficient stock ({available} available)")]
    InsufficientStock { available: i32 },
    #[error("unknown stock movement reason '{0}'")]
    UnknownReason(String),
    #[error("price must not be negative")]
    NegativePrice,
    #[error("compare-at price must be higher than the price")]
    CompareAtNotHigher,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory() {
        let mut p = ProductStock::load(Uuid::now_v7(), "Collier Opuntia", 0, 3);
        assert!(p.is_low());
        p.apply(10, StockReason::Restock).unwrap();
        assert!(!p.is_low());
        assert_eq!(p.apply(-5, StockReason::Sale).unwrap(), 5);
        assert_eq!(p.quantity(), 5);
    }

    #[test]
    fn test_stock_never_negative() {
        let mut p = ProductStock::load(Uuid::now_v7(), "Bague", 2, 3);
        assert_eq!(p.apply(-3, StockReason::Sale), Err(ProductError::InsufficientStock { available: 2 }));
        assert_eq!(p.quantity(), 2);
        assert_eq!(p.apply(0, StockReason::Adjustment), Err(ProductError::ZeroDelta));
        assert_eq!(p.apply(1, StockReason::Sale), Err(ProductError::SaleMustDecrease));
    }

    fn low_alerts(p: &mut ProductStock) -> Vec<i32> {
        p.take_events()
            .into_iter()
            .filter_map(|e| match e {
                DomainEvent::Product(ProductEvent::StockLow { quantity, .. }) => Some(quantity),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_low_stock_alert_when_crossing_threshold() {
        let mut p = ProductStock::load(Uuid::now_v7(), "Bague", 5, 3);
        p.apply(-1, StockReason::Sale).unwrap();
        assert!(low_alerts(&mut p).is_empty());
        p.apply(-1, StockReason::Sale).unwrap();
        assert_eq!(low_alerts(&mut p), vec![3]);
    }

    #[test]
    fn test_low_stock_alert_when_already_low() {
        let mut p = ProductStock::load(Uuid::now_v7(), "Bague", 2, 3);
        p.apply(-1, StockReason::Sale).unwrap();
        p.apply(-1, StockReason::Sale).unwrap();
        assert_eq!(low_alerts(&mut p), vec![1, 0]);

        // Restocking to a level still under the threshold is not an alert.
        p.apply(2, StockReason::Restock).unwrap();
        assert!(low_alerts(&mut p).is_empty());
    }

    #[test]
    fn test_validate_pricing() {
        assert!(validate_pricing(1000, None).is_ok());
        assert!(validate_pricing(1000, Some(1500)).is_ok());
        assert_eq!(validate_pricing(1000, Some(1000)), Err(ProductError::CompareAtNotHigher));
        assert_eq!(validate_pricing(-1, None), Err(ProductError::NegativePrice));
    }
}
