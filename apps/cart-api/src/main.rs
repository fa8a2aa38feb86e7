//! # Cart API
//!
//! HTTP server for terminal-facing cart operations.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Cart API Server                               │
//! │                                                                         │
//! │  Terminal ───► HTTP (8080) ───► Routes ───► PostgreSQL                 │
//! │                                       │                                 │
//! │                                       ▼                                 │
//! │                                     Redis                               │
//! │                                  (Pub/Sub)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use cart_api::auth::TerminalGateway;
use cart_api::{ApiConfig, AppState};
use cart_core::PaymentRegistry;
use cart_events::{EventPublisher, Republisher};
use cart_store::Database;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    FmtSubscriber::builder().with_max_level(Level::INFO).with_target(true).with_thread_ids(true).pretty().init();

    info!("Starting cart API server...");

    let config = ApiConfig::load()?;
    info!(port = config.http_port, "Configuration loaded");

    let db = Database::connect(config.store_config()).await?;
    info!("Connected to PostgreSQL and Redis");

    let terminals = TerminalGateway::new(db.pg_pool().clone());
    let publisher = EventPublisher::new(db.deliveries(), db.redis(), config.event_subscribers.clone());
    let payments = PaymentRegistry::default_registry();
    let master_data = Arc::new(cart_api::master_data::PermissiveMasterData) as Arc<dyn cart_core::validation::MasterDataLookup>;

    let (republisher, republisher_handle) = Republisher::new(publisher.clone(), config.event_config());
    let republisher_task = tokio::spawn(republisher.run());

    let state = Arc::new(AppState { db, terminals, publisher, payments, master_data, config: config.clone() });

    let app = cart_api::routes::router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!(%addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    drop(republisher_handle);
    republisher_task.abort();

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
