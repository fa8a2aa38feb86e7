//! # Cart API
//!
//! HTTP façade over the cart engine: terminal preflight, the cart
//! state-machine façade (C6), the transaction finalizer (C7), the
//! void/return processor (C10), and the event delivery ack endpoint.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Cart API Server                               │
//! │                                                                         │
//! │  Terminal ───► HTTP (axum) ───► Façade/Finalizer ───► PostgreSQL        │
//! │                                       │                                 │
//! │                                       ▼                                 │
//! │                                     Redis                               │
//! │                              (cache + pub/sub)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `DATABASE_URL` - PostgreSQL connection string
//! - `REDIS_URL` - Redis connection string
//! - `HTTP_PORT` - HTTP server port (default: 8080)
//! - `JWT_SECRET` - Secret for administrative bearer tokens
//! - `EVENT_SUBSCRIBERS` - comma-separated subscriber names for C8/C9

pub mod auth;
pub mod config;
pub mod error;
pub mod facade;
pub mod finalizer;
pub mod master_data;
pub mod routes;
pub mod void_return;

pub use config::ApiConfig;
pub use error::ApiError;

use std::sync::Arc;

use cart_core::validation::MasterDataLookup;
use cart_core::PaymentRegistry;
use cart_events::EventPublisher;
use cart_store::Database;

use crate::auth::TerminalGateway;

/// Shared application state handed to every route.
pub struct AppState {
    pub db: Database,
    pub terminals: TerminalGateway,
    pub publisher: EventPublisher,
    pub payments: PaymentRegistry,
    pub master_data: Arc<dyn MasterDataLookup>,
    pub config: ApiConfig,
}
