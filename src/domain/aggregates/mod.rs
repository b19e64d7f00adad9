//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{validate_pricing, ProductError, ProductStock, StockReason};
pub use order::{generate_order_number, OrderError, OrderLifecycle, OrderStatus, PaymentStatus, Shipment};
pub use cart::{Cart, CartError, CartItem, CatalogEntry, PricedCart, PricedLine, ShippingPolicy};
