//! Cactaia.Bijoux storefront and back office API
//!
//! Handmade jewellery shop: public catalog, customer accounts, hosted
//! checkout and the admin back office behind it.
//!
//! ## Features
//! - Product catalog with categories, collections, reviews and wishlists
//! - Server-side cart pricing and hosted checkout sessions
//! - Payment webhooks, refunds and the payment configuration screen
//! - Order management with stock movements
//! - Media library, admin notifications and transactional email

pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod email;
pub mod error;
pub mod events;
pub mod handlers;
pub mod models;
pub mod payments;
pub mod router;
pub mod state;
pub mod storage;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use router::build_router;
pub use state::AppState;
