//! Void and Return Processor (C10): produces reversing transaction
//! records referencing the original, enforcing same-terminal (void) and
//! same-store (return) constraints.

use cart_core::{Cart, CartStatus, CoreError, LineItem, Money, Transaction, TransactionType};
use cart_store::TransactionRepository;
use chrono::Utc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::finalizer::Finalizer;

pub struct VoidReturnProcessor<'a> {
    pub transactions: &'a TransactionRepository,
    pub finalizer: &'a Finalizer<'a>,
}

impl<'a> VoidReturnProcessor<'a> {
    /// Void: same-terminal-only, rejects an already-voided original.
    /// `calling_terminal_no` is the terminal performing the void; it must
    /// match the terminal that originally rang up `transaction_no`.
    pub async fn void(
        &self,
        tenant_id: &str,
        store_code: &str,
        calling_terminal_no: &str,
        business_date: u32,
        transaction_no: i64,
        staff: &str,
    ) -> Result<Transaction, ApiError> {
        let original = self.transactions.find_by_store(tenant_id, store_code, business_date, transaction_no).await?;

        if original.terminal_no != calling_terminal_no {
            return Err(CoreError::NotSameTerminal.into());
        }

        let status = self.transactions.find_status(tenant_id, store_code, calling_terminal_no, business_date, transaction_no).await?;
        if status.is_voided {
            return Err(CoreError::TransactionAlreadyVoided { transaction_no }.into());
        }

        let mut cart = reversing_cart(&original, TransactionType::VoidSale, staff, -1);
        cart.line_items = original.line_items.iter().map(negate_line).collect();
        cart.reference_transaction_no = Some(transaction_no);

        let mut finalized = self.finalizer.finalize(&mut cart).await?;
        finalized.reference_transaction_no = Some(transaction_no);

        self.transactions
            .mark_voided(tenant_id, store_code, calling_terminal_no, business_date, transaction_no, finalized.transaction_no, staff)
            .await?;

        Ok(finalized)
    }

    /// Return: same-store, any terminal. `lines` are `(line_no, quantity_milli)`
    /// pairs, each bounded by the remaining returnable quantity.
    pub async fn return_transaction(
        &self,
        tenant_id: &str,
        store_code: &str,
        calling_terminal_no: &str,
        business_date: u32,
        transaction_no: i64,
        staff: &str,
        lines: Vec<(u32, i64)>,
    ) -> Result<Transaction, ApiError> {
        if store_code.is_empty() {
            return Err(ApiError::BadRequest("storeCode required".into()));
        }

        let original = self.transactions.find_by_store(tenant_id, store_code, business_date, transaction_no).await?;
        let original_terminal_no = original.terminal_no.clone();

        let mut status = self.transactions.find_status(tenant_id, store_code, &original_terminal_no, business_date, transaction_no).await?;
        if status.is_refunded {
            return Err(CoreError::AlreadyRefunded { transaction_no }.into());
        }

        let mut return_lines = Vec::new();
        for (line_no, requested_milli) in &lines {
            let original_line = original.line_items.iter().find(|l| l.line_no == *line_no).ok_or(CoreError::LineNotFound { line_no: *line_no })?;

            let already_returned = status.returned_quantity_milli.get(line_no).copied().unwrap_or(0);
            let remaining = original_line.quantity_milli - already_returned;

            if *requested_milli > remaining {
                return Err(CoreError::ReturnExceedsOriginal {
                    line_no: *line_no,
                    requested: format!("{:.3}", *requested_milli as f64 / 1000.0),
                    remaining: format!("{:.3}", remaining as f64 / 1000.0),
                }
                .into());
            }

            let mut reversed = original_line.clone();
            reversed.quantity_milli = -*requested_milli;
            reversed.amount = reversed.gross_amount();
            return_lines.push(reversed);

            *status.returned_quantity_milli.entry(*line_no).or_insert(0) += requested_milli;
        }

        let fully_refunded = original
            .line_items
            .iter()
            .filter(|l| !l.is_cancelled)
            .all(|l| status.returned_quantity_milli.get(&l.line_no).copied().unwrap_or(0) >= l.quantity_milli);

        let mut cart = reversing_cart(&original, TransactionType::Return, staff, 1);
        cart.line_items = return_lines;
        cart.reference_transaction_no = Some(transaction_no);
        cart.terminal_no = calling_terminal_no.to_string();

        recompute_cart_totals(&mut cart);

        let mut finalized = self.finalizer.finalize(&mut cart).await?;
        finalized.reference_transaction_no = Some(transaction_no);

        self.transactions
            .record_return(tenant_id, store_code, &original_terminal_no, business_date, transaction_no, &status.returned_quantity_milli, fully_refunded)
            .await?;

        Ok(finalized)
    }
}

fn reversing_cart(original: &Transaction, transaction_type: TransactionType, staff: &str, _sign: i64) -> Cart {
    let now = Utc::now();
    Cart {
        cart_id: Uuid::new_v4(),
        tenant_id: original.tenant_id.clone(),
        store_code: original.store_code.clone(),
        terminal_no: original.terminal_no.clone(),
        status: CartStatus::Paying,
        transaction_type,
        business_date: original.business_date,
        user: None,
        staff: Some(staff.to_string()),
        line_items: original.line_items.clone(),
        subtotal_discounts: Vec::new(),
        payments: original.payments.clone(),
        taxes: original.taxes.clone(),
        subtotal_amount: negate(original.subtotal_amount),
        total_amount: negate(original.total_amount),
        total_discount_amount: negate(original.total_discount_amount),
        deposit_amount: negate(original.deposit_amount),
        change_amount: Money::ZERO,
        balance_amount: Money::ZERO,
        reference_transaction_no: None,
        transaction_no: None,
        etag: Uuid::new_v4().to_string(),
        created_at: now,
        updated_at: now,
    }
}

fn negate(amount: Money) -> Money {
    amount.negate()
}

fn negate_line(line: &LineItem) -> LineItem {
    let mut reversed = line.clone();
    reversed.quantity_milli = -reversed.quantity_milli;
    reversed.amount = reversed.amount.negate();
    reversed
}

fn recompute_cart_totals(cart: &mut Cart) {
    let subtotal: Money = cart.line_items.iter().map(line_net).fold(Money::ZERO, |acc, a| acc + a);
    cart.subtotal_amount = subtotal;
    cart.total_amount = subtotal;
    cart.balance_amount = Money::ZERO;
}

fn line_net(line: &LineItem) -> Money {
    line.amount
}

#[cfg(test)]
mod tests {
    // Requires a live store (original transaction lookup + finalizer),
    // which this repo has no integration-test harness for.
}
