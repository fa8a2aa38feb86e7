//! # cart-store: persistence layer for the cart transaction core.
//!
//! Redis is the primary fast path for in-flight carts; Postgres is the
//! authoritative fallback and the system of record for everything else
//! (transaction log, counters, delivery ledger). Every cross-process call
//! is gated through a per-dependency [`circuit_breaker::CircuitBreakerRegistry`]
//! so a stalled Redis or Postgres degrades the affected path instead of
//! hanging every request.
//!
//! ## Module Organization
//!
//! - [`pool`] - connection pool setup (`Database`, `StoreConfig`)
//! - [`migrations`] - embedded SQL migrations
//! - [`circuit_breaker`] - per-dependency breaker state
//! - [`error`] - store error types
//! - [`repository`] - one repository per persisted entity family

pub mod circuit_breaker;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::StoreError;
pub use pool::{Database, StoreConfig};

pub use repository::cart::CartRepository;
pub use repository::counter::CounterRepository;
pub use repository::delivery::DeliveryRepository;
pub use repository::transaction::TransactionRepository;
