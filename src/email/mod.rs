//! Transactional email: rendering, delivery through the email API, and a
//! send log that keeps order emails from going out twice.

pub mod resend;
pub mod templates;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use resend::ResendClient;
pub use templates::{render_order, render_welcome, OrderEmail, RenderedEmail, Template};

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email provider request failed: {0}")]
    Network(String),
    #[error("email provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected email provider response: {0}")]
    Decode(String),
    #[error("email log unavailable: {0}")]
    Log(String),
    #[error("email template failed to render: {0}")]
    Render(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Sends one message and returns the provider's message id.
    async fn send(&self, message: &EmailMessage) -> Result<String, EmailError>;
}

/// Identity of a send for deduplication purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub template: Template,
    pub recipient: String,
    pub order_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent { provider_id: String },
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub key: DedupKey,
    pub subject: String,
    pub user_id: Option<Uuid>,
    pub status: DeliveryStatus,
}

#[async_trait]
pub trait DeliveryLog: Send + Sync {
    async fn already_sent(&self, key: &DedupKey) -> Result<bool, EmailError>;

    async fn record(&self, record: &DeliveryRecord) -> Result<(), EmailError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent(String),
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub rendered: RenderedEmail,
    pub to: String,
    pub order_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl OutgoingEmail {
    fn key(&self) -> DedupKey {
        DedupKey { template: self.rendered.template, recipient: self.to.to_lowercase(), order_id: self.order_id }
    }
}

pub struct Mailer {
    sender: Arc<dyn EmailSender>,
    log: Arc<dyn DeliveryLog>,
    from: String,
    admin_email: Option<String>,
}

impl Mailer {
    pub fn new(sender: Arc<dyn EmailSender>, log: Arc<dyn DeliveryLog>, from: impl Into<String>, admin_email: Option<String>) -> Self {
        Self { sender, log, from: from.into(), admin_email }
    }

    pub fn admin_email(&self) -> Option<&str> { self.admin_email.as_deref() }

    /// Sends unless the same (template, recipient, order) was already sent.
    /// A log lookup failure skips the send rather than risk a duplicate.
    pub async fn send_once(&self, email: OutgoingEmail) -> Delivery {
        let key = email.key();
        match self.log.already_sent(&key).await {
            Ok(true) => {
                tracing::debug!(template = %key.template, order_id = ?key.order_id, "email already sent, skipping");
                return Delivery::Skipped;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, template = %key.template, "email log lookup failed, not sending");
                return Delivery::Skipped;
            }
        }
        self.deliver(email).await
    }

    /// Sends regardless of earlier deliveries; the attempt is still logged.
    pub async fn send_again(&self, email: OutgoingEmail) -> Delivery { self.deliver(email).await }

    async fn deliver(&self, email: OutgoingEmail) -> Delivery {
        let key = email.key();
        let message = EmailMessage { from: self.from.clone(), to: email.to.clone(), subject: email.rendered.subject.clone(), html: email.rendered.html };
        let (status, delivery) = match self.sender.send(&message).await {
            Ok(provider_id) => {
                tracing::info!(template = %key.template, order_id = ?key.order_id, %provider_id, "email sent");
                (DeliveryStatus::Sent { provider_id: provider_id.clone() }, Delivery::Sent(provider_id))
            }
            Err(e) => {
                tracing::error!(template = %key.template, order_id = ?key.order_id, error = %e, "email send failed");
                (DeliveryStatus::Failed { error: e.to_string() }, Delivery::Failed(e.to_string()))
            }
        };
        let record = DeliveryRecord { key, subject: message.subject, user_id: email.user_id, status };
        if let Err(e) = self.log.record(&record).await {
            tracing::warn!(error = %e, "failed to record email delivery");
        }
        delivery
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{MemoryLog, RecordingSender};
    use super::*;

    fn welcome(to: &str) -> OutgoingEmail {
        OutgoingEmail { rendered: render_welcome(Some("Léa"), "https://cactaia.bijoux").unwrap(), to: to.into(), order_id: None, user_id: None }
    }

    fn order_email(order_id: Uuid) -> OutgoingEmail {
        OutgoingEmail { order_id: Some(order_id), ..welcome("lea@example.com") }
    }

    #[tokio::test]
    async fn test_send_once_deduplicates() {
        let sender = Arc::new(RecordingSender::default());
        let log = Arc::new(MemoryLog::default());
        let mailer = Mailer::new(sender.clone(), log.clone(), "shop@cactaia.bijoux", None);

        assert_eq!(mailer.send_once(welcome("lea@example.com")).await, Delivery::Sent("msg_1".into()));
        assert_eq!(mailer.send_once(welcome("LEA@example.com")).await, Delivery::Skipped);
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
        assert_eq!(log.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dedup_is_per_order() {
        let sender = Arc::new(RecordingSender::default());
        let mailer = Mailer::new(sender.clone(), Arc::new(MemoryLog::default()), "shop@cactaia.bijoux", None);
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        assert!(matches!(mailer.send_once(order_email(a)).await, Delivery::Sent(_)));
        assert!(matches!(mailer.send_once(order_email(b)).await, Delivery::Sent(_)));
        assert_eq!(mailer.send_once(order_email(a)).await, Delivery::Skipped);
        assert_eq!(sender.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_send_is_logged_and_retried() {
        let log = Arc::new(MemoryLog::default());
        let failing = Mailer::new(Arc::new(RecordingSender { fail: true, ..Default::default() }), log.clone(), "shop@cactaia.bijoux", None);
        assert!(matches!(failing.send_once(welcome("lea@example.com")).await, Delivery::Failed(_)));
        assert!(matches!(log.records.lock().unwrap()[0].status, DeliveryStatus::Failed { .. }));

        let working = Mailer::new(Arc::new(RecordingSender::default()), log.clone(), "shop@cactaia.bijoux", None);
        assert!(matches!(working.send_once(welcome("lea@example.com")).await, Delivery::Sent(_)));
    }

    #[tokio::test]
    async fn test_send_again_bypasses_dedup() {
        let sender = Arc::new(RecordingSender::default());
        let log = Arc::new(MemoryLog::default());
        let mailer = Mailer::new(sender.clone(), log.clone(), "shop@cactaia.bijoux", None);
        mailer.send_once(welcome("lea@example.com")).await;
        assert!(matches!(mailer.send_again(welcome("lea@example.com")).await, Delivery::Sent(_)));
        assert_eq!(log.records.lock().unwrap().len(), 2);
    }
}
