//! Payment orchestration: dispatches ADD_PAYMENT to a pluggable strategy.
//!
//! New payment methods ship as new compiled strategies registered in
//! [`PaymentRegistry`] — no dynamic code loading, per the design notes.

use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::money::Money;
use crate::types::{Cart, Payment};

/// Contract every payment method implements. `computes_change` is the
/// strategy-property decision from §9.4: whether a method is "cash-type"
/// is a fact about the strategy, not a convention encoded in the code string.
pub trait PaymentStrategy: Send + Sync {
    fn code(&self) -> &'static str;

    fn computes_change(&self) -> bool;

    /// Validates and applies one payment against `cart`'s current balance,
    /// returning the [`Payment`] record to append.
    fn pay(&self, cart: &Cart, amount: Money, deposit_amount: Money, detail: Option<String>) -> Result<Payment, CoreError>;
}

/// Cash: accepts `deposit_amount >= amount`; overpayment becomes change.
pub struct CashStrategy;

impl PaymentStrategy for CashStrategy {
    fn code(&self) -> &'static str {
        "CASH"
    }

    fn computes_change(&self) -> bool {
        true
    }

    fn pay(&self, cart: &Cart, amount: Money, deposit_amount: Money, detail: Option<String>) -> Result<Payment, CoreError> {
        let balance = cart.balance_amount;
        if amount > balance {
            return Err(CoreError::OverPayment { amount: amount.cents(), balance: balance.cents() });
        }
        if deposit_amount < amount {
            return Err(CoreError::InsufficientPayment { balance: (amount - deposit_amount).cents() });
        }
        Ok(Payment {
            payment_no: cart.next_payment_no(),
            payment_code: self.code().to_string(),
            amount,
            deposit_amount,
            detail,
            is_refunded: false,
        })
    }
}

/// Cashless: requires `deposit_amount == amount` exactly; never computes change.
pub struct CashlessStrategy;

impl PaymentStrategy for CashlessStrategy {
    fn code(&self) -> &'static str {
        "CASHLESS"
    }

    fn computes_change(&self) -> bool {
        false
    }

    fn pay(&self, cart: &Cart, amount: Money, deposit_amount: Money, detail: Option<String>) -> Result<Payment, CoreError> {
        let balance = cart.balance_amount;
        if amount > balance {
            return Err(CoreError::OverPayment { amount: amount.cents(), balance: balance.cents() });
        }
        if deposit_amount != amount {
            return Err(CoreError::OverPayment { amount: deposit_amount.cents(), balance: amount.cents() });
        }
        Ok(Payment {
            payment_no: cart.next_payment_no(),
            payment_code: self.code().to_string(),
            amount,
            deposit_amount,
            detail,
            is_refunded: false,
        })
    }
}

/// Compile-time registry of active payment strategies, keyed by
/// `payment_code`. Operators control which codes are active via
/// configuration at composition time, not via dynamic loading.
pub struct PaymentRegistry {
    strategies: BTreeMap<String, Box<dyn PaymentStrategy>>,
}

impl PaymentRegistry {
    pub fn new() -> Self {
        PaymentRegistry { strategies: BTreeMap::new() }
    }

    pub fn register(mut self, payment_code: &str, strategy: Box<dyn PaymentStrategy>) -> Self {
        self.strategies.insert(payment_code.to_string(), strategy);
        self
    }

    pub fn default_registry() -> Self {
        PaymentRegistry::new()
            .register("01", Box::new(CashStrategy))
            .register("11", Box::new(CashlessStrategy))
    }

    pub fn get(&self, payment_code: &str) -> Option<&dyn PaymentStrategy> {
        self.strategies.get(payment_code).map(|b| b.as_ref())
    }
}

impl Default for PaymentRegistry {
    fn default() -> Self {
        Self::default_registry()
    }
}

/// Applies a new payment to `cart` in memory: dispatches to the strategy,
/// appends the resulting `Payment`, and updates `balance_amount` /
/// `change_amount`. Does not persist — the façade is responsible for that.
pub fn add_payment(cart: &mut Cart, strategy: &dyn PaymentStrategy, amount: Money, deposit_amount: Money, detail: Option<String>) -> Result<(), CoreError> {
    let payment = strategy.pay(cart, amount, deposit_amount, detail)?;
    if strategy.computes_change() {
        cart.change_amount += deposit_amount - amount;
    }
    cart.payments.push(payment);
    cart.balance_amount = cart.total_amount - cart.total_paid();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CartStatus, TransactionType};
    use chrono::Utc;
    use uuid::Uuid;

    fn cart_with_balance(balance_cents: i64) -> Cart {
        Cart {
            cart_id: Uuid::nil(),
            tenant_id: "t1".into(),
            store_code: "S001".into(),
            terminal_no: "01".into(),
            status: CartStatus::Paying,
            transaction_type: TransactionType::Sale,
            business_date: 20260726,
            user: None,
            staff: Some("staff-1".into()),
            line_items: vec![],
            subtotal_discounts: vec![],
            payments: vec![],
            taxes: vec![],
            subtotal_amount: Money::from_cents(balance_cents),
            total_amount: Money::from_cents(balance_cents),
            total_discount_amount: Money::ZERO,
            deposit_amount: Money::ZERO,
            change_amount: Money::ZERO,
            balance_amount: Money::from_cents(balance_cents),
            reference_transaction_no: None,
            etag: "v1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn s1_cash_payment_computes_change() {
        let mut cart = cart_with_balance(11_000);
        let registry = PaymentRegistry::default_registry();
        let strategy = registry.get("01").unwrap();
        add_payment(&mut cart, strategy, Money::from_cents(11_000), Money::from_cents(12_000), None).unwrap();
        assert_eq!(cart.change_amount.cents(), 1_000);
        assert_eq!(cart.balance_amount.cents(), 0);
    }

    #[test]
    fn s4_cashless_overpayment_rejected() {
        let cart = cart_with_balance(9_900);
        let registry = PaymentRegistry::default_registry();
        let strategy = registry.get("11").unwrap();
        let err = strategy.pay(&cart, Money::from_cents(10_000), Money::from_cents(10_000), None).unwrap_err();
        assert!(matches!(err, CoreError::OverPayment { .. }));
    }

    #[test]
    fn cashless_requires_exact_deposit() {
        let cart = cart_with_balance(10_000);
        let registry = PaymentRegistry::default_registry();
        let strategy = registry.get("11").unwrap();
        let err = strategy.pay(&cart, Money::from_cents(10_000), Money::from_cents(10_500), None).unwrap_err();
        assert!(matches!(err, CoreError::OverPayment { .. }));
    }

    #[test]
    fn payment_never_overshoots_balance() {
        let cart = cart_with_balance(5_000);
        let registry = PaymentRegistry::default_registry();
        let strategy = registry.get("01").unwrap();
        let err = strategy.pay(&cart, Money::from_cents(6_000), Money::from_cents(6_000), None).unwrap_err();
        assert!(matches!(err, CoreError::OverPayment { .. }));
    }
}
