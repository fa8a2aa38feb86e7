//! # cart-core: Pure Business Logic for the Cart Transaction Core
//!
//! This crate is the **heart** of the transactional POS backend. It
//! contains all business logic with zero I/O: money arithmetic, the cart
//! state machine, the tax/discount engine and the payment orchestrator.
//! Everything here is synchronous, deterministic, and fully unit-testable
//! without mocks.
//!
//! `cart-store`, `cart-events` and `apps/cart-api` depend on this crate for
//! their domain types and business rules; none of them reimplement this
//! logic.

pub mod discount;
pub mod error;
pub mod money;
pub mod payment;
pub mod state_machine;
pub mod tax;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, RoundingMode};
pub use types::*;

/// Placeholder tenant used by fixtures and local tooling; real requests
/// always carry an explicit `tenant_id`.
pub const DEFAULT_TENANT_ID: &str = types::DEFAULT_TENANT_ID;
