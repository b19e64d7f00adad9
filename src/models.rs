//! Database rows as served by the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid, pub email: String, pub full_name: Option<String>, pub phone: Option<String>, pub role: String,
    pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid, pub name: String, pub slug: String, pub description: Option<String>, pub image_url: Option<String>,
    pub parent_id: Option<Uuid>, pub position: i32, pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Collection {
    pub id: Uuid, pub name: String, pub slug: String, pub description: Option<String>, pub image_url: Option<String>,
    pub is_featured: bool, pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid, pub name: String, pub slug: String, pub description: Option<String>,
    pub price_cents: i64, pub compare_at_price_cents: Option<i64>, pub sku: Option<String>, pub stock_quantity: i32,
    pub category_id: Option<Uuid>, pub images: Vec<String>, pub material: Option<String>,
    pub is_active: bool, pub is_featured: bool, pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StockMovement {
    pub id: Uuid, pub product_id: Uuid, pub delta: i32, pub reason: String, pub order_id: Option<Uuid>,
    pub note: Option<String>, pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: Uuid, pub product_id: Uuid, pub user_id: Uuid, pub rating: i16, pub title: Option<String>,
    pub body: Option<String>, pub is_approved: bool, pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WishlistEntry {
    pub product_id: Uuid, pub name: String, pub slug: String, pub price_cents: i64, pub images: Vec<String>,
    pub stock_quantity: i32, pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Address {
    pub id: Uuid, pub user_id: Uuid, pub label: Option<String>, pub full_name: String, pub line1: String,
    pub line2: Option<String>, pub postal_code: String, pub city: String, pub country: String, pub phone: Option<String>,
    pub is_default: bool, pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid, pub order_number: String, pub user_id: Option<Uuid>, pub customer_email: String,
    pub status: String, pub payment_status: String,
    pub subtotal_cents: i64, pub shipping_cents: i64, pub discount_cents: i64, pub total_cents: i64, pub currency: String,
    pub shipping_address: serde_json::Value,
    pub stripe_session_id: Option<String>, pub stripe_payment_intent_id: Option<String>, pub amount_paid_cents: Option<i64>,
    pub tracking_number: Option<String>, pub carrier: Option<String>, pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>, pub shipped_at: Option<DateTime<Utc>>, pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid, pub order_id: Uuid, pub product_id: Option<Uuid>, pub product_name: String, pub sku: Option<String>,
    pub image_url: Option<String>, pub quantity: i32, pub unit_price_cents: i64, pub total_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid, pub kind: String, pub title: String, pub message: String, pub link: Option<String>,
    pub is_read: bool, pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Media {
    pub id: Uuid, pub file_name: String, pub storage_path: String, pub url: String, pub mime_type: String,
    pub size_bytes: i64, pub alt_text: Option<String>, pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EmailLog {
    pub id: Uuid, pub template: String, pub recipient: String, pub subject: String, pub order_id: Option<Uuid>,
    pub user_id: Option<Uuid>, pub status: String, pub provider_id: Option<String>, pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32> }

impl ListParams {
    pub fn window(&self) -> (u32, u32, i64) { page_window(self.page, self.per_page) }
}

/// `(page, per_page, offset)`: page is at least 1, per_page 1..=100 (default 20).
pub fn page_window(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    (page, per_page, i64::from(page - 1) * i64::from(per_page))
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: i64, pub page: u32, pub per_page: u32 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_window() {
        assert_eq!(ListParams { page: None, per_page: None }.window(), (1, 20, 0));
        assert_eq!(ListParams { page: Some(0), per_page: Some(500) }.window(), (1, 100, 0));
        assert_eq!(ListParams { page: Some(3), per_page: Some(0) }.window(), (3, 1, 2));
        assert_eq!(ListParams { page: Some(4), per_page: Some(25) }.window(), (4, 25, 75));
    }
}
