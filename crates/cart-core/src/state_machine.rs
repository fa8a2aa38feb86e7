//! Table-driven cart state machine.
//!
//! This is the *only* authority on event legality. Every façade operation
//! must call [`check_transition`] before mutating a cart; component logic
//! in [`crate::tax`], [`crate::discount`] and [`crate::payment`] assumes the
//! event has already been authorized.

use crate::error::CoreError;
use crate::types::{Cart, CartEvent, CartStatus};

/// Returns the state a cart moves to after `event` succeeds, or `None` if
/// the event does not change state (e.g. GET_CART, ADD_ITEM while already
/// EnteringItem).
fn target_state(state: CartStatus, event: CartEvent) -> Option<CartStatus> {
    use CartEvent::*;
    use CartStatus::*;

    match (state, event) {
        (Initial, GetCart) => Some(Idle),
        (Idle, AddItem) => Some(EnteringItem),
        (Idle, CancelCart) => Some(Cancelled),
        (EnteringItem, CalcSubtotal) => Some(Paying),
        (EnteringItem, CancelCart) => Some(Cancelled),
        (Paying, ResumeItemEntry) => Some(EnteringItem),
        (Paying, Bill) => Some(Completed),
        _ => None,
    }
}

/// Returns whether `event` is permitted while the cart is in `state`,
/// per the table in the component design (independent of whether it
/// also changes state).
fn is_permitted(state: CartStatus, event: CartEvent) -> bool {
    use CartEvent::*;
    use CartStatus::*;

    match state {
        Initial => matches!(event, GetCart),
        Idle => matches!(event, AddItem | CancelCart | GetCart),
        EnteringItem => matches!(
            event,
            AddItem
                | CancelLine
                | UpdateQty
                | UpdatePrice
                | AddLineDiscount
                | AddCartDiscount
                | CalcSubtotal
                | CancelCart
                | GetCart
        ),
        Paying => matches!(event, AddPayment | ResumeItemEntry | Bill | GetCart),
        Completed | Cancelled => matches!(event, GetCart),
    }
}

/// Validates `event` against `cart`'s current state, returning the new
/// state to apply (or the current state, unchanged, if the event is a
/// pure read/mutation that does not transition).
pub fn check_transition(cart: &Cart, event: CartEvent) -> Result<CartStatus, CoreError> {
    if !is_permitted(cart.status, event) {
        return Err(CoreError::InvalidCartState {
            cart_id: cart.cart_id.to_string(),
            current_state: format!("{:?}", cart.status),
            event: format!("{:?}", event),
        });
    }
    Ok(target_state(cart.status, event).unwrap_or(cart.status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionType;
    use chrono::Utc;
    use uuid::Uuid;

    fn cart_in(status: CartStatus) -> Cart {
        Cart {
            cart_id: Uuid::nil(),
            tenant_id: "t1".into(),
            store_code: "S001".into(),
            terminal_no: "01".into(),
            status,
            transaction_type: TransactionType::Sale,
            business_date: 20260726,
            user: None,
            staff: Some("staff-1".into()),
            line_items: vec![],
            subtotal_discounts: vec![],
            payments: vec![],
            taxes: vec![],
            subtotal_amount: crate::money::Money::ZERO,
            total_amount: crate::money::Money::ZERO,
            total_discount_amount: crate::money::Money::ZERO,
            deposit_amount: crate::money::Money::ZERO,
            change_amount: crate::money::Money::ZERO,
            balance_amount: crate::money::Money::ZERO,
            reference_transaction_no: None,
            etag: "v1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn idle_add_item_transitions_to_entering_item() {
        let cart = cart_in(CartStatus::Idle);
        let next = check_transition(&cart, CartEvent::AddItem).unwrap();
        assert_eq!(next, CartStatus::EnteringItem);
    }

    #[test]
    fn paying_add_item_is_rejected() {
        let cart = cart_in(CartStatus::Paying);
        let err = check_transition(&cart, CartEvent::AddItem).unwrap_err();
        assert!(matches!(err, CoreError::InvalidCartState { .. }));
    }

    #[test]
    fn completed_only_permits_get_cart() {
        let cart = cart_in(CartStatus::Completed);
        assert!(check_transition(&cart, CartEvent::GetCart).is_ok());
        assert!(check_transition(&cart, CartEvent::AddPayment).is_err());
    }

    #[test]
    fn bill_transitions_paying_to_completed() {
        let cart = cart_in(CartStatus::Paying);
        let next = check_transition(&cart, CartEvent::Bill).unwrap();
        assert_eq!(next, CartStatus::Completed);
    }

    #[test]
    fn resume_item_entry_returns_to_entering_item() {
        let cart = cart_in(CartStatus::Paying);
        let next = check_transition(&cart, CartEvent::ResumeItemEntry).unwrap();
        assert_eq!(next, CartStatus::EnteringItem);
    }
}
