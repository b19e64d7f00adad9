//! Checkout cart: merges requested lines and prices them against the catalog.

use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::{Money, MoneyError};

pub const MAX_LINE_QUANTITY: u32 = 20;

/// A product as seen by the pricing step.
#[derive(Clone, Debug)]
pub struct CatalogEntry {
    pub product_id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub image: Option<String>,
    pub unit_price_cents: i64,
    pub stock_quantity: i32,
    pub is_active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartItem { pub product_id: Uuid, pub quantity: u32 }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub total: Money,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub subtotal: Money,
    pub shipping: Money,
    pub total: Money,
}

/// Shipping rule: flat fee below the threshold, free from it.
#[derive(Clone, Debug)]
pub struct ShippingPolicy { pub flat_cents: i64, pub free_threshold_cents: i64 }

impl ShippingPolicy {
    pub fn cost_for(&self, subtotal: &Money) -> Money {
        if subtotal.amount_cents() >= self.free_threshold_cents { Money::zero(subtotal.currency()) }
        else { Money::new(self.flat_cents, subtotal.currency()) }
    }
}

#[derive(Clone, Debug)]
pub struct Cart {
    currency: String,
    items: Vec<CartItem>,
}

impl Cart {
    /// Builds a cart from raw request lines, merging repeated products.
    pub fn from_lines(currency: &str, lines: impl IntoIterator<Item = CartItem>) -> Result<Self, CartError> {
        let mut merged: BTreeMap<Uuid, u32> = BTreeMap::new();
        let mut order: Vec<Uuid> = Vec::new();
        for line in lines {
            if line.quantity == 0 { return Err(CartError::InvalidQuantity(line.product_id)); }
            let entry = merged.entry(line.product_id).or_insert_with(|| { order.push(line.product_id); 0 });
            *entry = entry.saturating_add(line.quantity);
            if *entry > MAX_LINE_QUANTITY { return Err(CartError::InvalidQuantity(line.product_id)); }
        }
        if order.is_empty() { return Err(CartError::Empty); }
        let items = order.into_iter().map(|product_id| CartItem { product_id, quantity: merged[&product_id] }).collect();
        Ok(Self { currency: currency.to_string(), items })
    }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn product_ids(&self) -> Vec<Uuid> { self.items.iter().map(|i| i.product_id).collect() }

    pub fn price(&self, catalog: &[CatalogEntry], shipping: &ShippingPolicy) -> Result<PricedCart, CartError> {
        let mut lines = Vec::with_capacity(self.items.len());
        let mut subtotal = Money::zero(&self.currency);
        for item in &self.items {
            let entry = catalog
                .iter()
                .find(|e| e.product_id == item.product_id && e.is_active)
                .ok_or(CartError::ProductUnavailable(item.product_id))?;
            if i64::from(entry.stock_quantity) < i64::from(item.quantity) {
                return Err(CartError::InsufficientStock { product_id: entry.product_id, name: entry.name.clone(), available: entry.stock_quantity.max(0) });
            }
            let unit_price = Money::new(entry.unit_price_cents, &self.currency);
            let total = unit_price.multiply(item.quantity)?;
            subtotal = subtotal.add(&total)?;
            lines.push(PricedLine {
                product_id: entry.product_id,
                name: entry.name.clone(),
                sku: entry.sku.clone(),
                image: entry.image.clone(),
                quantity: item.quantity,
                unit_price,
                total,
            });
        }
        let shipping = shipping.cost_for(&subtotal);
        let total = subtotal.add(&shipping)?;
        Ok(PricedCart { lines, subtotal, shipping, total })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("cart is empty")]
    Empty,
    #[error("quantity for product {0} must be between 1 and 20")]
    InvalidQuantity(Uuid),
    #[error("product {0} is not available")]
    ProductUnavailable(Uuid),
    #[error("not enough stock for {name} ({available} left)")]
    InsufficientStock { product_id: Uuid, name: String, available: i32 },
    #[error(transparent)]
    Money(#[from] MoneyError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: Uuid, price: i64, stock: i32) -> CatalogEntry {
        CatalogEntry { product_id: id, name: "Bague Saguaro".into(), sku: Some("BAG-01".into()), image: None, unit_price_cents: price, stock_quantity: stock, is_active: true }
    }

    fn policy() -> ShippingPolicy { ShippingPolicy { flat_cents: 490, free_threshold_cents: 5000 } }

    #[test]
    fn test_cart_merges_lines() {
        let p = Uuid::now_v7();
        let cart = Cart::from_lines("eur", [CartItem { product_id: p, quantity: 2 }, CartItem { product_id: p, quantity: 1 }]).unwrap();
        assert_eq!(cart.items(), &[CartItem { product_id: p, quantity: 3 }]);
    }

    #[test]
    fn test_cart_rejects_bad_quantities() {
        let p = Uuid::now_v7();
        assert_eq!(Cart::from_lines("eur", Vec::<CartItem>::new()).unwrap_err(), CartError::Empty);
        assert_eq!(Cart::from_lines("eur", [CartItem { product_id: p, quantity: 0 }]).unwrap_err(), CartError::InvalidQuantity(p));
        assert_eq!(
            Cart::from_lines("eur", [CartItem { product_id: p, quantity: 15 }, CartItem { product_id: p, quantity: 6 }]).unwrap_err(),
            CartError::InvalidQuantity(p)
        );
    }

    #[test]
    fn test_pricing_adds_shipping_below_threshold() {
        let p = Uuid::now_v7();
        let cart = Cart::from_lines("eur", [CartItem { product_id: p, quantity: 2 }]).unwrap();
        let priced = cart.price(&[entry(p, 1500, 5)], &policy()).unwrap();
        assert_eq!(priced.subtotal.amount_cents(), 3000);
        assert_eq!(priced.shipping.amount_cents(), 490);
        assert_eq!(priced.total.amount_cents(), 3490);
        assert_eq!(priced.lines[0].total.amount_cents(), 3000);
    }

    #[test]
    fn test_pricing_free_shipping_at_threshold() {
        let p = Uuid::now_v7();
        let cart = Cart::from_lines("eur", [CartItem { product_id: p, quantity: 2 }]).unwrap();
        let priced = cart.price(&[entry(p, 2500, 5)], &policy()).unwrap();
        assert!(priced.shipping.is_zero());
        assert_eq!(priced.total.amount_cents(), 5000);
    }

    #[test]
    fn test_pricing_checks_stock_and_availability() {
        let p = Uuid::now_v7();
        let cart = Cart::from_lines("eur", [CartItem { product_id: p, quantity: 3 }]).unwrap();
        assert!(matches!(cart.price(&[entry(p, 1000, 2)], &policy()), Err(CartError::InsufficientStock { available: 2, .. })));
        let mut inactive = entry(p, 1000, 10);
        inactive.is_active = false;
        assert_eq!(cart.price(&[inactive], &policy()).unwrap_err(), CartError::ProductUnavailable(p));
        assert_eq!(cart.price(&[], &policy()).unwrap_err(), CartError::ProductUnavailable(p));
    }
}
