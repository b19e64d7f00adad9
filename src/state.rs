//! Shared application state handed to every handler.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::email::Mailer;
use crate::events::EventPublisher;
use crate::payments::PaymentGateway;
use crate::storage::MediaStorage;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub payments: Arc<dyn PaymentGateway>,
    pub mailer: Arc<Mailer>,
    pub storage: Arc<dyn MediaStorage>,
    pub events: EventPublisher,
}
