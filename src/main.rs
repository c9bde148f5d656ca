//! Storefront sync - per-user store service

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_sync::checkout::FakeGateway;
use storefront_sync::config::{Config, DocumentBackend};
use storefront_sync::domain::StaticCatalog;
use storefront_sync::http::{router, AppState};
use storefront_sync::session::{SessionDeps, SessionRegistry};
use storefront_sync::store::{DocumentStore, MemoryDocumentStore, NatsDocumentStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let backend: Arc<dyn DocumentStore> = match &config.backend {
        DocumentBackend::Memory => {
            tracing::warn!("using in-memory document store; documents are lost on restart");
            Arc::new(MemoryDocumentStore::new())
        }
        DocumentBackend::Nats { url, bucket } => Arc::new(NatsDocumentStore::connect(url, bucket).await?),
    };
    let catalog = match &config.catalog_tax_file {
        Some(path) => StaticCatalog::from_json_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => StaticCatalog::new(),
    };
    tracing::info!(products = catalog.len(), "tax catalog loaded");

    let registry = Arc::new(SessionRegistry::new(SessionDeps { backend, catalog: Arc::new(catalog), options: config.store.clone() }));
    // Online payments are approved by a stand-in until a real gateway is wired in.
    let state = AppState { registry, gateway: Arc::new(FakeGateway::approving()) };

    let addr = config.socket_addr();
    tracing::info!("storefront-sync listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, router(state)).await?;
    Ok(())
}
