//! Service configuration, read from the environment (and `.env` in development).

use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::aggregates::ShippingPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct StripeSettings {
    pub secret_key: String,
    pub publishable_key: Option<String>,
    pub webhook_secret: String,
    pub api_base: String,
}

#[derive(Clone, Debug)]
pub struct EmailSettings {
    pub api_key: String,
    pub api_base: String,
    pub from: String,
    pub admin_email: Option<String>,
}

#[derive(Clone, Debug)]
pub struct StorageSettings {
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub bucket: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub site_url: String,
    pub auth_jwt_secret: String,
    pub currency: String,
    pub shipping: ShippingPolicy,
    pub low_stock_threshold: i32,
    pub nats_url: Option<String>,
    pub stripe: StripeSettings,
    pub email: EmailSettings,
    pub storage: StorageSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));
        let with_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let site_url = with_default("SITE_URL", "http://localhost:3000").trim_end_matches('/').to_string();
        Ok(Self {
            port: parse_or(&get, "PORT", 8083)?,
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            site_url,
            auth_jwt_secret: required("AUTH_JWT_SECRET")?,
            currency: with_default("CURRENCY", "eur").to_lowercase(),
            shipping: ShippingPolicy {
                flat_cents: parse_or(&get, "SHIPPING_FLAT_CENTS", 490)?,
                free_threshold_cents: parse_or(&get, "FREE_SHIPPING_THRESHOLD_CENTS", 5000)?,
            },
            low_stock_threshold: parse_or(&get, "LOW_STOCK_THRESHOLD", 3)?,
            nats_url: get("NATS_URL"),
            stripe: StripeSettings {
                secret_key: required("STRIPE_SECRET_KEY")?,
                publishable_key: get("STRIPE_PUBLISHABLE_KEY"),
                webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
                api_base: with_default("STRIPE_API_BASE", "https://api.stripe.com").trim_end_matches('/').to_string(),
            },
            email: EmailSettings {
                api_key: required("EMAIL_API_KEY")?,
                api_base: with_default("EMAIL_API_BASE", "https://api.resend.com").trim_end_matches('/').to_string(),
                from: with_default("EMAIL_FROM", "Cactaia.Bijoux <commandes@cactaia.bijoux>"),
                admin_email: get("ADMIN_EMAIL"),
            },
            storage: StorageSettings {
                api_base: get("STORAGE_API_BASE").map(|v| v.trim_end_matches('/').to_string()),
                api_key: get("STORAGE_API_KEY"),
                bucket: with_default("STORAGE_BUCKET", "media"),
            },
        })
    }

    pub fn webhook_url(&self) -> String { format!("{}/api/v1/webhooks/stripe", self.site_url) }
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> HashMap<String, String> {
        [
            ("DATABASE_URL", "postgres://localhost/cactaia"),
            ("AUTH_JWT_SECRET", "super-secret"),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_abc"),
            ("EMAIL_API_KEY", "re_123"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_map(&base()).unwrap();
        assert_eq!(config.port, 8083);
        assert_eq!(config.currency, "eur");
        assert_eq!(config.shipping.free_threshold_cents, 5000);
        assert_eq!(config.shipping.flat_cents, 490);
        assert_eq!(config.stripe.api_base, "https://api.stripe.com");
        assert_eq!(config.storage.bucket, "media");
        assert!(config.nats_url.is_none());
        assert_eq!(config.webhook_url(), "http://localhost:3000/api/v1/webhooks/stripe");
    }

    #[test]
    fn test_missing_required() {
        let mut vars = base();
        vars.remove("STRIPE_WEBHOOK_SECRET");
        assert!(matches!(Config::from_map(&vars), Err(ConfigError::Missing("STRIPE_WEBHOOK_SECRET"))));
    }

    #[test]
    fn test_invalid_number() {
        let mut vars = base();
        vars.insert("PORT".into(), "eighty".into());
        assert!(matches!(Config::from_map(&vars), Err(ConfigError::Invalid { key: "PORT", .. })));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let mut vars = base();
        vars.insert("SITE_URL".into(), "https://cactaia.bijoux/".into());
        vars.insert("NATS_URL".into(), "   ".into());
        let config = Config::from_map(&vars).unwrap();
        assert_eq!(config.site_url, "https://cactaia.bijoux");
        assert!(config.nats_url.is_none());
    }
}
