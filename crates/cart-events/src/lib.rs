//! # cart-events: transaction event fan-out
//!
//! Publishes completed transactions to subscribers (Report, Journal,
//! Stock) over a Redis pub/sub channel and tracks per-subscriber delivery
//! status so stragglers can be swept and re-published.
//!
//! - [`publisher`] - writes the delivery ledger row and publishes (C8)
//! - [`republisher`] - scheduled sweep of stale deliveries (C9)
//! - [`config`] - sweep cadence and channel naming
//! - [`error`] - event error types

pub mod config;
pub mod error;
pub mod publisher;
pub mod republisher;

pub use config::EventConfig;
pub use error::EventError;
pub use publisher::EventPublisher;
pub use republisher::{Republisher, RepublisherHandle};
