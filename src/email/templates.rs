//! Transactional email bodies. The HTML lives in `templates/emails/` and is
//! rendered by askama, which escapes every interpolated value.

use std::fmt;
use std::str::FromStr;

use askama::Template as _;
use serde::{Deserialize, Serialize};

use super::EmailError;

use crate::domain::value_objects::Money;
use crate::models::{Order, OrderItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    OrderConfirmation,
    AdminNewOrder,
    OrderShipped,
    OrderDelivered,
    OrderCancelled,
    Welcome,
}

impl Template {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderConfirmation => "order_confirmation",
            Self::AdminNewOrder => "admin_new_order",
            Self::OrderShipped => "order_shipped",
            Self::OrderDelivered => "order_delivered",
            Self::OrderCancelled => "order_cancelled",
            Self::Welcome => "welcome",
        }
    }

    pub fn is_order_template(&self) -> bool { !matches!(self, Self::Welcome) }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Template {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::OrderConfirmation, Self::AdminNewOrder, Self::OrderShipped, Self::OrderDelivered, Self::OrderCancelled, Self::Welcome]
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown email template '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub template: Template,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Clone)]
pub struct EmailLine {
    pub name: String,
    pub quantity: i32,
    pub total: Money,
}

/// Everything an order email can show, detached from the database rows.
#[derive(Debug, Clone)]
pub struct OrderEmail {
    pub order_number: String,
    pub customer_name: Option<String>,
    pub customer_email: String,
    pub lines: Vec<EmailLine>,
    pub subtotal: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
    pub address_lines: Vec<String>,
    pub order_url: String,
    pub admin_url: String,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
}

impl OrderEmail {
    pub fn from_order(order: &Order, items: &[OrderItem], site_url: &str) -> Self {
        let currency = order.currency.as_str();
        let address = &order.shipping_address;
        let field = |key: &str| address.get(key).and_then(|v| v.as_str()).map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
        let mut address_lines: Vec<String> = ["full_name", "line1", "line2"].into_iter().filter_map(&field).collect();
        let city_line = [field("postal_code"), field("city")].into_iter().flatten().collect::<Vec<_>>().join(" ");
        if !city_line.is_empty() { address_lines.push(city_line); }
        address_lines.extend(field("country"));

        Self {
            order_number: order.order_number.clone(),
            customer_name: field("full_name"),
            customer_email: order.customer_email.clone(),
            lines: items
                .iter()
                .map(|item| EmailLine { name: item.product_name.clone(), quantity: item.quantity, total: Money::new(item.total_cents, currency) })
                .collect(),
            subtotal: Money::new(order.subtotal_cents, currency),
            shipping: Money::new(order.shipping_cents, currency),
            discount: Money::new(order.discount_cents, currency),
            total: Money::new(order.amount_paid_cents.unwrap_or(order.total_cents), currency),
            address_lines,
            order_url: format!("{site_url}/compte/commandes/{}", order.id),
            admin_url: format!("{site_url}/admin/commandes/{}", order.id),
            tracking_number: order.tracking_number.clone(),
            carrier: order.carrier.clone(),
        }
    }
}

#[derive(askama::Template)]
#[template(path = "emails/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    email: &'a OrderEmail,
}

#[derive(askama::Template)]
#[template(path = "emails/admin_new_order.html")]
struct AdminNewOrderHtml<'a> {
    email: &'a OrderEmail,
}

#[derive(askama::Template)]
#[template(path = "emails/order_shipped.html")]
struct OrderShippedHtml<'a> {
    email: &'a OrderEmail,
}

#[derive(askama::Template)]
#[template(path = "emails/order_delivered.html")]
struct OrderDeliveredHtml<'a> {
    email: &'a OrderEmail,
}

#[derive(askama::Template)]
#[template(path = "emails/order_cancelled.html")]
struct OrderCancelledHtml<'a> {
    email: &'a OrderEmail,
}

#[derive(askama::Template)]
#[template(path = "emails/welcome.html")]
struct WelcomeHtml<'a> {
    name: Option<&'a str>,
    shop_url: String,
}

/// Renders an order email. `Ok(None)` for templates that are not about an order.
pub fn render_order(template: Template, email: &OrderEmail) -> Result<Option<RenderedEmail>, EmailError> {
    let (subject, html) = match template {
        Template::OrderConfirmation => (format!("Confirmation de votre commande {}", email.order_number), OrderConfirmationHtml { email }.render()),
        Template::AdminNewOrder => {
            (format!("Nouvelle commande {} ({})", email.order_number, email.total.display_fr()), AdminNewOrderHtml { email }.render())
        }
        Template::OrderShipped => (format!("Votre commande {} est en route", email.order_number), OrderShippedHtml { email }.render()),
        Template::OrderDelivered => (format!("Votre commande {} a été livrée", email.order_number), OrderDeliveredHtml { email }.render()),
        Template::OrderCancelled => (format!("Annulation de votre commande {}", email.order_number), OrderCancelledHtml { email }.render()),
        Template::Welcome => return Ok(None),
    };
    let html = html.map_err(|e| EmailError::Render(e.to_string()))?;
    Ok(Some(RenderedEmail { template, subject, html }))
}

pub fn render_welcome(name: Option<&str>, site_url: &str) -> Result<RenderedEmail, EmailError> {
    let name = name.map(str::trim).filter(|n| !n.is_empty());
    let html = WelcomeHtml { name, shop_url: format!("{site_url}/boutique") }.render().map_err(|e| EmailError::Render(e.to_string()))?;
    Ok(RenderedEmail { template: Template::Welcome, subject: "Bienvenue chez Cactaia.Bijoux".to_string(), html })
}
