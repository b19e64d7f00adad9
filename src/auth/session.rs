//! Verification of the HS256 access tokens issued by the hosted auth platform.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("malformed token")]
    Malformed,
    #[error("unsupported signing algorithm")]
    UnsupportedAlgorithm,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("could not sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for SessionError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidAlgorithm => Self::UnsupportedAlgorithm,
            _ => Self::Malformed,
        }
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    // The platform sets `aud` to the user's role; roles are read from profiles.
    validation.validate_aud = false;
    validation
}

/// Checks algorithm, signature and expiry against the current time.
pub fn verify(token: &str, secret: &[u8]) -> Result<Claims, SessionError> {
    let data = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation())?;
    Ok(data.claims)
}

/// Issues a token in the same format; used for service-to-service calls and tests.
pub fn sign(claims: &Claims, secret: &[u8]) -> Result<String, SessionError> {
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(secret)).map_err(|e| SessionError::Signing(e.to_string()))
}

/// Extracts the token from an `Authorization: Bearer ...` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") { return None; }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const SECRET: &[u8] = b"test-jwt-secret";

    fn claims(exp: i64) -> Claims {
        Claims { sub: Uuid::now_v7(), email: Some("lea@example.com".into()), exp, role: Some("authenticated".into()) }
    }

    fn in_an_hour() -> i64 {
        Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_valid_token() {
        let c = claims(in_an_hour());
        let token = sign(&c, SECRET).unwrap();
        assert_eq!(verify(&token, SECRET).unwrap(), c);
    }

    #[test]
    fn test_expired_token() {
        let token = sign(&claims(Utc::now().timestamp() - 10), SECRET).unwrap();
        assert_eq!(verify(&token, SECRET), Err(SessionError::Expired));
    }

    #[test]
    fn test_wrong_secret() {
        let token = sign(&claims(in_an_hour()), SECRET).unwrap();
        assert_eq!(verify(&token, b"other"), Err(SessionError::InvalidSignature));
    }

    #[test]
    fn test_tampered_payload() {
        let token = sign(&claims(in_an_hour()), SECRET).unwrap();
        let other = sign(&claims(in_an_hour() + 60), SECRET).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = other.split('.').nth(1).unwrap();
        assert_eq!(verify(&parts.join("."), SECRET), Err(SessionError::InvalidSignature));
    }

    #[test]
    fn test_rejects_other_algorithms() {
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS512), &claims(in_an_hour()), &EncodingKey::from_secret(SECRET)).unwrap();
        assert_eq!(verify(&token, SECRET), Err(SessionError::UnsupportedAlgorithm));
    }

    #[test]
    fn test_audience_claim_is_tolerated() {
        #[derive(Serialize)]
        struct PlatformClaims {
            sub: Uuid,
            exp: i64,
            aud: &'static str,
        }
        let sub = Uuid::now_v7();
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &PlatformClaims { sub, exp: in_an_hour(), aud: "authenticated" }, &EncodingKey::from_secret(SECRET)).unwrap();
        assert_eq!(verify(&token, SECRET).unwrap().sub, sub);
    }

    #[test]
    fn test_malformed() {
        assert_eq!(verify("abc", SECRET), Err(SessionError::Malformed));
        assert_eq!(verify("!!.??.##", SECRET), Err(SessionError::Malformed));
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer   xyz "), Some("xyz"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
