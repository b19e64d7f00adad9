//! `email_logs`: the delivery log behind [`crate::email::Mailer::send_once`].

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::email::{DedupKey, DeliveryLog, DeliveryRecord, DeliveryStatus, EmailError};
use crate::models::EmailLog;

#[derive(Clone)]
pub struct PgDeliveryLog {
    db: PgPool,
}

impl PgDeliveryLog {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl DeliveryLog for PgDeliveryLog {
    async fn already_sent(&self, key: &DedupKey) -> Result<bool, EmailError> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM email_logs WHERE template = $1 AND lower(recipient) = $2 AND order_id IS NOT DISTINCT FROM $3 AND status = 'sent')",
        )
        .bind(key.template.as_str())
        .bind(&key.recipient)
        .bind(key.order_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| EmailError::Log(e.to_string()))?;
        Ok(row.0)
    }

    async fn record(&self, record: &DeliveryRecord) -> Result<(), EmailError> {
        let (status, provider_id, error) = match &record.status {
            DeliveryStatus::Sent { provider_id } => ("sent", Some(provider_id.as_str()), None),
            DeliveryStatus::Failed { error } => ("failed", None, Some(error.as_str())),
        };
        sqlx::query("INSERT INTO email_logs (id, template, recipient, subject, order_id, user_id, status, provider_id, error) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)")
            .bind(Uuid::now_v7())
            .bind(record.key.template.as_str())
            .bind(&record.key.recipient)
            .bind(&record.subject)
            .bind(record.key.order_id)
            .bind(record.user_id)
            .bind(status)
            .bind(provider_id)
            .bind(error)
            .execute(&self.db)
            .await
            .map_err(|e| EmailError::Log(e.to_string()))?;
        Ok(())
    }
}

pub async fn list(db: &PgPool, order_id: Option<Uuid>, limit: u32, offset: i64) -> sqlx::Result<(Vec<EmailLog>, i64)> {
    let logs = sqlx::query_as::<_, EmailLog>("SELECT * FROM email_logs WHERE ($1::uuid IS NULL OR order_id = $1) ORDER BY created_at DESC LIMIT $2 OFFSET $3")
        .bind(order_id).bind(i64::from(limit)).bind(offset).fetch_all(db).await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM email_logs WHERE ($1::uuid IS NULL OR order_id = $1)").bind(order_id).fetch_one(db).await?;
    Ok((logs, total.0))
}
