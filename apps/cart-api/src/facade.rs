//! Cart Service Façade (C6): the entry point for every terminal-facing
//! operation. Loads the cart, gates the requested event through the state
//! machine, mutates via the relevant engine, and saves back with bounded
//! optimistic-concurrency retry. BILL and CANCEL_CART delegate onward to
//! the finalizer.

use std::collections::BTreeMap;

use cart_core::tax::TaxMaster;
use cart_core::validation::{self, MasterDataLookup};
use cart_core::{
    discount, payment, state_machine, tax, Cart, CartEvent, CartStatus, Discount, LineItem, Money, PaymentRegistry,
    TransactionType,
};
use cart_store::{CartRepository, StoreError};
use chrono::Utc;
use uuid::Uuid;

use crate::error::ApiError;

const SAVE_RETRY_ATTEMPTS: u32 = 3;

pub struct CartFacade<'a> {
    pub carts: CartRepository,
    pub payments: &'a PaymentRegistry,
    pub master_data: &'a dyn MasterDataLookup,
}

impl<'a> CartFacade<'a> {
    pub fn new(carts: CartRepository, payments: &'a PaymentRegistry, master_data: &'a dyn MasterDataLookup) -> Self {
        CartFacade { carts, payments, master_data }
    }

    pub async fn get_or_create(&self, tenant_id: &str, store_code: &str, terminal_no: &str, staff: &str, business_date: u32) -> Result<Cart, ApiError> {
        if let Some(existing) = self.carts.find_active_for_terminal(tenant_id, store_code, terminal_no).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let cart = Cart {
            cart_id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            store_code: store_code.to_string(),
            terminal_no: terminal_no.to_string(),
            status: CartStatus::Initial,
            transaction_type: TransactionType::Sale,
            business_date,
            user: None,
            staff: Some(staff.to_string()),
            line_items: Vec::new(),
            subtotal_discounts: Vec::new(),
            payments: Vec::new(),
            taxes: Vec::new(),
            subtotal_amount: Money::ZERO,
            total_amount: Money::ZERO,
            total_discount_amount: Money::ZERO,
            deposit_amount: Money::ZERO,
            change_amount: Money::ZERO,
            balance_amount: Money::ZERO,
            reference_transaction_no: None,
            transaction_no: None,
            etag: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
        };

        self.carts.create(&cart).await?;
        Ok(cart)
    }

    pub async fn load(&self, cart_id: &Uuid) -> Result<Cart, ApiError> {
        Ok(self.carts.load(cart_id).await?)
    }

    /// Loads `cart_id` and validates `event` is legal against its current
    /// state, without mutating or saving. For callers whose own multi-step
    /// side effects (the finalizer's counter allocation and transaction
    /// insert) must succeed before the cart's status is allowed to flip —
    /// unlike [`Self::apply`], which persists the target state immediately.
    pub async fn load_for_event(&self, cart_id: &Uuid, event: CartEvent) -> Result<Cart, ApiError> {
        let cart = self.load(cart_id).await?;
        state_machine::check_transition(&cart, event)?;
        Ok(cart)
    }

    /// Applies `event`, running `mutate` against the in-memory cart after
    /// the state-machine gate passes, then saves with bounded retry on an
    /// etag race. `mutate` must be idempotent-safe to re-run against a
    /// freshly reloaded cart on each retry.
    pub async fn apply<F>(&self, cart_id: &Uuid, event: CartEvent, mutate: F) -> Result<Cart, ApiError>
    where
        F: Fn(&mut Cart) -> Result<(), cart_core::CoreError>,
    {
        let mut attempts = 0;

        loop {
            let mut cart = self.load(cart_id).await?;
            let expected_etag = cart.etag.clone();

            let target_state = state_machine::check_transition(&cart, event)?;

            mutate(&mut cart)?;

            cart.status = target_state;
            cart.etag = Uuid::new_v4().to_string();
            cart.updated_at = Utc::now();

            match self.carts.save(&cart, &expected_etag).await {
                Ok(()) => return Ok(cart),
                Err(StoreError::Conflict { .. }) if attempts < SAVE_RETRY_ATTEMPTS => {
                    attempts += 1;
                    continue;
                }
                Err(StoreError::Conflict { entity, id, .. }) => {
                    return Err(StoreError::ConcurrencyRetryExhausted { entity, id, attempts }.into());
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub fn add_item(
        &self,
        cart: &mut Cart,
        item_code: String,
        description: String,
        unit_price: Money,
        quantity_milli: i64,
        tax_code: Option<String>,
    ) -> Result<(), cart_core::CoreError> {
        validation::validate_item_exists(self.master_data, &item_code)?;

        let line_no = cart.next_line_no();
        let mut line = LineItem {
            line_no,
            item_code,
            description,
            unit_price,
            unit_price_original: unit_price,
            is_unit_price_changed: false,
            quantity_milli,
            amount: Money::ZERO,
            discounts: Vec::new(),
            tax_amount: Money::ZERO,
            tax_code,
            is_cancelled: false,
            is_discount_restricted: false,
        };
        line.amount = line.gross_amount();
        cart.line_items.push(line);
        Ok(())
    }

    pub fn cancel_line(&self, cart: &mut Cart, line_no: u32) -> Result<(), cart_core::CoreError> {
        let line = cart.line_items.iter_mut().find(|l| l.line_no == line_no).ok_or(cart_core::CoreError::LineNotFound { line_no })?;
        line.is_cancelled = true;
        Ok(())
    }

    pub fn update_qty(&self, cart: &mut Cart, line_no: u32, quantity_milli: i64) -> Result<(), cart_core::CoreError> {
        let line = cart.line_items.iter_mut().find(|l| l.line_no == line_no).ok_or(cart_core::CoreError::LineNotFound { line_no })?;
        line.quantity_milli = quantity_milli;
        line.amount = line.gross_amount();
        Ok(())
    }

    pub fn update_price(&self, cart: &mut Cart, line_no: u32, unit_price: Money) -> Result<(), cart_core::CoreError> {
        let line = cart.line_items.iter_mut().find(|l| l.line_no == line_no).ok_or(cart_core::CoreError::LineNotFound { line_no })?;
        line.unit_price = unit_price;
        line.is_unit_price_changed = unit_price != line.unit_price_original;
        line.amount = line.gross_amount();
        Ok(())
    }

    pub fn add_line_discount(&self, cart: &mut Cart, line_no: u32, discount: Discount) -> Result<(), cart_core::CoreError> {
        let tax_code = cart.line_items.iter().find(|l| l.line_no == line_no).and_then(|l| l.tax_code.clone());
        let mode = tax_code
            .and_then(|code| cart.taxes.iter().find(|t| t.tax_code == code))
            .map(|t| t.rounding_mode)
            .unwrap_or_default();

        let line = cart.line_items.iter_mut().find(|l| l.line_no == line_no).ok_or(cart_core::CoreError::LineNotFound { line_no })?;
        discount::apply_line_discount(line, discount, mode)
    }

    pub fn add_cart_discount(&self, cart: &mut Cart, discount: Discount) {
        cart.subtotal_discounts.push(discount);
    }

    pub fn calc_subtotal(&self, cart: &mut Cart, tax_masters: &BTreeMap<String, TaxMaster>) -> Result<(), cart_core::CoreError> {
        tax::calc_subtotal(cart, tax_masters)
    }

    pub fn add_payment(&self, cart: &mut Cart, payment_code: &str, amount: Money, deposit_amount: Money, detail: Option<String>) -> Result<(), cart_core::CoreError> {
        let strategy = self.payments.get(payment_code).ok_or_else(|| {
            cart_core::CoreError::Validation(cart_core::ValidationError::NotAllowed { field: "paymentCode".into(), allowed: "registered payment codes".into() })
        })?;
        payment::add_payment(cart, strategy, amount, deposit_amount, detail)
    }
}
