//! HTTP handlers, one module per area of the API.

pub mod addresses;
pub mod catalog;
pub mod checkout;
pub mod emails;
pub mod media;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod reviews;
pub mod users;
pub mod webhooks;
pub mod wishlist;

use axum::Json;
use serde::{Deserialize, Deserializer};

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": "cactaia-bijoux" }))
}

/// `Some("")` clears an optional text field, `None` keeps the current value.
pub(crate) fn merge_text(current: Option<String>, update: Option<String>) -> Option<String> {
    match update {
        None => current,
        Some(v) if v.trim().is_empty() => None,
        Some(v) => Some(v.trim().to_string()),
    }
}

/// Tells an absent field (`None`) apart from an explicit `null` (`Some(None)`).
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        compare_at: Option<Option<i64>>,
    }

    #[test]
    fn test_merge_text() {
        assert_eq!(merge_text(Some("a".into()), None), Some("a".into()));
        assert_eq!(merge_text(Some("a".into()), Some("  ".into())), None);
        assert_eq!(merge_text(None, Some(" b ".into())), Some("b".into()));
    }

    #[test]
    fn test_nullable_field() {
        assert_eq!(serde_json::from_str::<Patch>("{}").unwrap().compare_at, None);
        assert_eq!(serde_json::from_str::<Patch>(r#"{"compare_at":null}"#).unwrap().compare_at, Some(None));
        assert_eq!(serde_json::from_str::<Patch>(r#"{"compare_at":4900}"#).unwrap().compare_at, Some(Some(4900)));
    }
}
