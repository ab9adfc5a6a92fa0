//! OpenSASE Commerce - order placement and inventory service

use std::sync::Arc;

use anyhow::Result;
use opensase_commerce::config::Config;
use opensase_commerce::http::{router, AppState};
use opensase_commerce::notify::{AuditSink, NatsSink, TracingSink};
use opensase_commerce::store::seed::{seed, SeedCatalog};
use opensase_commerce::store::{CommerceStore, MemoryStore, PgStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    let config = Config::from_env()?;

    let sink: Arc<dyn AuditSink> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => {
                tracing::info!(%url, prefix = %config.nats_subject_prefix, "publishing domain events to NATS");
                Arc::new(NatsSink::new(client, config.nats_subject_prefix.clone()))
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "NATS unavailable, auditing to the log instead");
                Arc::new(TracingSink)
            }
        },
        None => Arc::new(TracingSink),
    };

    match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.database_max_connections)
                .await?
                .with_statement_timeout(config.checkout.timeout);
            tracing::info!("using PostgreSQL store");
            serve(Arc::new(store), sink, &config).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; state is lost on exit");
            serve(Arc::new(MemoryStore::new()), sink, &config).await
        }
    }
}

async fn serve<S: CommerceStore>(store: Arc<S>, sink: Arc<dyn AuditSink>, config: &Config) -> Result<()> {
    if let Some(path) = &config.seed_catalog {
        let catalog = SeedCatalog::from_path(path)?;
        seed(store.as_ref(), catalog, &config.pricing.currency, config.near_expiry_days).await?;
    }

    let state = AppState::new(store, sink, config.pricing.clone(), config.checkout.clone());
    let app = router(state);

    tracing::info!("🚀 OpenSASE Commerce listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?, app).await?;
    Ok(())
}
