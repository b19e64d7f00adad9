//! API error type and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::auth::SessionError;
use crate::domain::aggregates::{CartError, OrderError, ProductError};
use crate::domain::value_objects::{SkuError, SlugError};
use crate::email::EmailError;
use crate::payments::webhook::WebhookError;
use crate::payments::PaymentError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("authentication required")]
    Unauthorized,

    #[error("admin role required")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("file larger than {max_bytes} bytes")]
    PayloadTooLarge { max_bytes: usize },

    #[error("unsupported media type {0}")]
    UnsupportedMediaType(String),

    #[error("payment provider error")]
    Payment(#[from] PaymentError),

    #[error("storage error")]
    Storage(#[from] StorageError),

    #[error("email error")]
    Email(#[from] EmailError),

    #[error("database error")]
    Database(#[source] sqlx::Error),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Payment(_) | Self::Storage(_) | Self::Email(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("record"),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => Self::Conflict("already exists".into()),
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => Self::Conflict("still referenced by other records".into()),
            other => Self::Database(other),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self { Self::Validation(err.to_string()) }
}

impl From<SessionError> for ApiError {
    fn from(_: SessionError) -> Self { Self::Unauthorized }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::InsufficientStock { .. } => Self::Conflict(err.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidTransition { .. } => Self::Conflict(err.to_string()),
            OrderError::UnknownStatus(_) => Self::Validation(err.to_string()),
        }
    }
}

impl From<ProductError> for ApiError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::InsufficientStock { .. } => Self::Conflict(err.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::MissingSignature | WebhookError::InvalidPayload(_) => Self::BadRequest(err.to_string()),
            WebhookError::InvalidSignatureFormat | WebhookError::InvalidSignature | WebhookError::StaleTimestamp => Self::Unauthorized,
        }
    }
}

impl From<SlugError> for ApiError {
    fn from(err: SlugError) -> Self { Self::Validation(err.to_string()) }
}

impl From<SkuError> for ApiError {
    fn from(err: SkuError) -> Self { Self::Validation(err.to_string()) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::Database(e) => tracing::error!(error = %e, "database error"),
            Self::Payment(e) => tracing::error!(error = %e, "payment provider error"),
            Self::Storage(e) => tracing::error!(error = %e, "storage error"),
            Self::Email(e) => tracing::error!(error = %e, "email provider error"),
            _ => {}
        }
        // Upstream and database details stay in the logs.
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(ApiError::NotFound("order").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::PayloadTooLarge { max_bytes: 1 }.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ApiError::from(sqlx::Error::RowNotFound).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(sqlx::Error::PoolTimedOut).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_domain_errors_map_to_conflict_or_validation() {
        let stock = CartError::InsufficientStock { product_id: Uuid::nil(), name: "Bague".into(), available: 0 };
        assert_eq!(ApiError::from(stock).status_code(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(CartError::Empty).status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::from(SlugError::Empty).status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_error_responses_do_not_leak_details() {
        let response = ApiError::Database(sqlx::Error::Protocol("password=hunter2".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("hunter2"));
        assert!(text.contains("database error"));
    }
}
