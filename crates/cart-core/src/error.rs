//! Domain error types for the cart transaction core.
//!
//! Every variant here is a *business* error — something the state machine,
//! tax engine or payment orchestrator rejected on purpose. None of these
//! represent infrastructure failure; [`cart_store::StoreError`] and
//! [`cart_events::EventError`] carry that, and wrap a [`CoreError`] via
//! `#[from]` where a business rule surfaces through an I/O path.

use thiserror::Error;

/// Errors raised by cart-core business logic.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("cart {cart_id} is in state {current_state:?}, which does not permit {event:?}")]
    InvalidCartState {
        cart_id: String,
        current_state: String,
        event: String,
    },

    #[error("line {line_no} not found in cart")]
    LineNotFound { line_no: u32 },

    #[error("item {item_code} not found")]
    ItemNotFound { item_code: String },

    #[error("discount on line {line_no} would reduce its amount below zero")]
    DiscountExceedsLine { line_no: u32 },

    #[error("cart discount of {requested} exceeds allocatable subtotal of {available}")]
    DiscountExceedsBalance { requested: i64, available: i64 },

    #[error("line {line_no} does not permit discounts")]
    DiscountRestricted { line_no: u32 },

    #[error("payment of {amount} would overpay a balance of {balance}")]
    OverPayment { amount: i64, balance: i64 },

    #[error("cannot bill: balance of {balance} remains unpaid")]
    InsufficientPayment { balance: i64 },

    #[error("transaction {transaction_no} was already voided")]
    TransactionAlreadyVoided { transaction_no: i64 },

    #[error("transaction {transaction_no} was already fully refunded")]
    AlreadyRefunded { transaction_no: i64 },

    #[error("void must be requested from the original terminal")]
    NotSameTerminal,

    #[error("return must be requested from a terminal in the original store")]
    NotSameStore,

    #[error("return quantity {requested} on line {line_no} exceeds remaining returnable quantity {remaining}")]
    ReturnExceedsOriginal {
        line_no: u32,
        requested: String,
        remaining: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Validation errors for request-level input checking.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of {allowed}")]
    NotAllowed { field: String, allowed: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Six-digit error code taxonomy (category XX, module YY, specific ZZ).
///
/// Categories: 10 validation, 20 state machine, 30 tax/discount,
/// 40 payment, 50 void/return, 90 unexpected.
pub mod codes {
    use super::CoreError;

    pub fn for_error(err: &CoreError) -> &'static str {
        match err {
            CoreError::InvalidCartState { .. } => "200101",
            CoreError::LineNotFound { .. } => "200102",
            CoreError::ItemNotFound { .. } => "300101",
            CoreError::DiscountExceedsLine { .. } => "300102",
            CoreError::DiscountExceedsBalance { .. } => "300103",
            CoreError::DiscountRestricted { .. } => "300104",
            CoreError::OverPayment { .. } => "400101",
            CoreError::InsufficientPayment { .. } => "400102",
            CoreError::TransactionAlreadyVoided { .. } => "500101",
            CoreError::AlreadyRefunded { .. } => "500102",
            CoreError::NotSameTerminal => "500103",
            CoreError::NotSameStore => "500104",
            CoreError::ReturnExceedsOriginal { .. } => "500105",
            CoreError::Validation(_) => "100101",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_cart_state_message() {
        let err = CoreError::InvalidCartState {
            cart_id: "c1".into(),
            current_state: "Paying".into(),
            event: "ADD_ITEM".into(),
        };
        assert_eq!(
            err.to_string(),
            "cart c1 is in state \"Paying\", which does not permit \"ADD_ITEM\""
        );
        assert_eq!(codes::for_error(&err), "200101");
    }

    #[test]
    fn validation_error_converts_into_core_error() {
        let v = ValidationError::Required { field: "staff".into() };
        let core: CoreError = v.into();
        assert!(matches!(core, CoreError::Validation(_)));
        assert_eq!(codes::for_error(&core), "100101");
    }
}
