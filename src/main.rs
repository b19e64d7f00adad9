//! Cactaia.Bijoux - storefront and back office API

use std::sync::Arc;

use anyhow::{Context, Result};
use cactaia_bijoux::db::email_logs::PgDeliveryLog;
use cactaia_bijoux::email::{Mailer, ResendClient};
use cactaia_bijoux::events::EventPublisher;
use cactaia_bijoux::payments::stripe::StripeClient;
use cactaia_bijoux::storage::RestStorage;
use cactaia_bijoux::{build_router, AppState, Config};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,sqlx=warn".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(&config.database_url).await.context("connecting to Postgres")?;
    sqlx::migrate!("./migrations").run(&db).await.context("running migrations")?;

    if config.storage.api_base.is_none() {
        tracing::warn!("STORAGE_API_BASE not set, media uploads will fail");
    }
    if config.email.admin_email.is_none() {
        tracing::warn!("ADMIN_EMAIL not set, new-order alerts are disabled");
    }

    let mailer = Mailer::new(
        Arc::new(ResendClient::new(&config.email)),
        Arc::new(PgDeliveryLog::new(db.clone())),
        config.email.from.clone(),
        config.email.admin_email.clone(),
    );
    let state = AppState {
        db,
        payments: Arc::new(StripeClient::new(&config.stripe)),
        mailer: Arc::new(mailer),
        storage: Arc::new(RestStorage::new(&config.storage)),
        events: EventPublisher::connect(config.nats_url.as_deref()).await,
        config: Arc::new(config),
    };

    let addr = format!("0.0.0.0:{}", state.config.port);
    let app = build_router(state);
    tracing::info!("Cactaia.Bijoux API listening on {addr}");
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
