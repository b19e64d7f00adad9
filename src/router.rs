//! HTTP routes. Public storefront and customer routes first, then the admin
//! back office under `/api/v1/admin`.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{addresses, catalog, checkout, emails, health, media, notifications, orders, payments, reviews, users, webhooks, wishlist};
use crate::state::AppState;
use crate::storage::MAX_UPLOAD_BYTES;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes().nest("/admin", admin_routes()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Catalog
        .route("/categories", get(catalog::list_categories))
        .route("/categories/:id", get(catalog::get_category))
        .route("/collections", get(catalog::list_collections))
        .route("/collections/:id", get(catalog::get_collection))
        .route("/products", get(catalog::list_products))
        .route("/products/:id", get(catalog::get_product))
        .route("/products/:id/reviews", get(reviews::list_product_reviews).post(reviews::create_review))
        // Customer account
        .route("/profile", get(users::get_profile).put(users::update_profile))
        .route("/profile/welcome", post(users::send_welcome))
        .route("/addresses", get(addresses::list_addresses).post(addresses::create_address))
        .route("/addresses/:id", put(addresses::update_address).delete(addresses::delete_address))
        .route("/addresses/:id/default", post(addresses::set_default_address))
        .route("/wishlist", get(wishlist::list_wishlist))
        .route("/wishlist/:id", post(wishlist::add_to_wishlist).delete(wishlist::remove_from_wishlist))
        .route("/orders", get(orders::list_my_orders))
        .route("/orders/:id", get(orders::get_my_order))
        // Checkout
        .route("/checkout", post(checkout::create_checkout))
        .route("/checkout/session/:id", get(checkout::checkout_session_status))
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", post(catalog::create_category))
        .route("/categories/:id", put(catalog::update_category).delete(catalog::delete_category))
        .route("/collections", post(catalog::create_collection))
        .route("/collections/:id", put(catalog::update_collection).delete(catalog::delete_collection))
        .route("/collections/:id/products", put(catalog::set_collection_products))
        .route("/products", get(catalog::admin_list_products).post(catalog::create_product))
        .route("/products/:id", get(catalog::admin_get_product).put(catalog::update_product).delete(catalog::delete_product))
        .route("/products/:id/stock", get(catalog::list_stock_movements).post(catalog::adjust_stock))
        .route("/reviews", get(reviews::admin_list_reviews))
        .route("/reviews/:id", delete(reviews::delete_review))
        .route("/reviews/:id/approve", post(reviews::approve_review))
        .route("/orders", get(orders::admin_list_orders))
        .route("/orders/:id", get(orders::admin_get_order))
        .route("/orders/:id/status", put(orders::update_order_status))
        .route("/orders/:id/notes", put(orders::update_order_notes))
        .route("/payments", get(payments::list_payments))
        .route("/payments/:id/refund", post(payments::refund_payment))
        .route("/stripe/config", get(payments::stripe_config))
        .route("/stripe/test", post(payments::stripe_test))
        .route("/media", get(media::list_media).post(media::upload_media).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1)))
        .route("/media/:id", put(media::update_media).delete(media::delete_media))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/:id", delete(notifications::delete_notification))
        .route("/notifications/:id/read", post(notifications::mark_read))
        .route("/users", get(users::list_users))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/role", put(users::set_user_role))
        .route("/emails", get(emails::list_email_logs))
        .route("/emails/resend", post(emails::resend_email))
}
