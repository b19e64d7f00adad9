//! Request authentication: bearer session tokens and the admin role check.

pub mod session;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

pub use session::{Claims, SessionError};

use crate::db;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role { Customer, Admin }

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Customer => "customer", Self::Admin => "admin" }
    }
}

impl FromStr for Role {
    type Err = ApiError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            other => Err(ApiError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

/// The signed-in user, from a verified session token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: Option<String>,
}

/// A signed-in user whose profile carries the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

impl CurrentUser {
    pub fn from_headers(headers: &axum::http::HeaderMap, secret: &[u8]) -> Result<Self, ApiError> {
        let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()).ok_or(ApiError::Unauthorized)?;
        let token = session::bearer_token(header).ok_or(ApiError::Unauthorized)?;
        let claims = session::verify(token, secret).map_err(|e| {
            tracing::debug!(error = %e, "rejected session token");
            ApiError::Unauthorized
        })?;
        Ok(Self { id: claims.sub, email: claims.email })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers, state.config.auth_jwt_secret.as_bytes())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        match db::users::role_of(&state.db, user.id).await? {
            Some(role) if role == Role::Admin.as_str() => Ok(Self(user)),
            _ => {
                tracing::warn!(user_id = %user.id, "admin route refused");
                Err(ApiError::Forbidden)
            }
        }
    }
}
