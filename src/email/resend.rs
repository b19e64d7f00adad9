//! HTTP client for the transactional email API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{EmailError, EmailMessage, EmailSender};
use crate::config::EmailSettings;

#[derive(Clone)]
pub struct ResendClient {
    http: Client,
    api_base: String,
    api_key: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

impl ResendClient {
    pub fn new(settings: &EmailSettings) -> Self {
        Self { http: Client::new(), api_base: settings.api_base.clone(), api_key: settings.api_key.clone() }
    }
}

#[async_trait]
impl EmailSender for ResendClient {
    async fn send(&self, message: &EmailMessage) -> Result<String, EmailError> {
        let request = SendRequest { from: &message.from, to: [&message.to], subject: &message.subject, html: &message.html };
        let response = self
            .http
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| EmailError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text).ok().and_then(|e| e.message).unwrap_or(text);
            return Err(EmailError::Api { status: status.as_u16(), message });
        }

        let body: SendResponse = response.json().await.map_err(|e| EmailError::Decode(e.to_string()))?;
        Ok(body.id)
    }
}
