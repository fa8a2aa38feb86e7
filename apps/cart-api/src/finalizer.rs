//! Transaction Finalizer (C7): triggered by BILL. Allocates counters,
//! renders receipt/journal text, persists the immutable transaction, flips
//! the cart to Completed, and hands off to the event publisher.

use cart_core::{Cart, CoreError, Transaction};
use cart_store::{CounterRepository, TransactionRepository};
use cart_events::EventPublisher;
use chrono::Utc;
use tracing::info;

use crate::error::ApiError;

pub struct Finalizer<'a> {
    pub counters: &'a CounterRepository,
    pub transactions: &'a TransactionRepository,
    pub publisher: &'a EventPublisher,
}

const TRANSACTION_NO_COUNTER: &str = "transaction_no";
const RECEIPT_NO_COUNTER: &str = "receipt_no";

impl<'a> Finalizer<'a> {
    /// Runs C7 steps 1-6 against a cart already gated into Paying with a
    /// closed balance. The cart passed in is mutated to Completed only
    /// after every prior step has succeeded.
    pub async fn finalize(&self, cart: &mut Cart) -> Result<Transaction, ApiError> {
        if cart.balance_amount.is_positive() {
            return Err(CoreError::InsufficientPayment { balance: cart.balance_amount.cents() }.into());
        }

        let terminal_id = cart.terminal_id();

        let transaction_no = self
            .counters
            .allocate(&terminal_id, TRANSACTION_NO_COUNTER)
            .await
            .map_err(|e| ApiError::CounterAllocationFailed(e.to_string()))?;

        let receipt_no = self
            .counters
            .allocate(&terminal_id, RECEIPT_NO_COUNTER)
            .await
            .map_err(|e| ApiError::CounterAllocationFailed(e.to_string()))?;

        let generate_date_time = Utc::now();
        let receipt_text = render_receipt_text(cart, transaction_no, receipt_no, generate_date_time);
        let journal_text = render_journal_text(cart, transaction_no, receipt_no, generate_date_time);

        let transaction = Transaction {
            tenant_id: cart.tenant_id.clone(),
            store_code: cart.store_code.clone(),
            terminal_no: cart.terminal_no.clone(),
            business_date: cart.business_date,
            transaction_no,
            receipt_no,
            transaction_type: cart.transaction_type,
            reference_transaction_no: cart.reference_transaction_no,
            line_items: cart.line_items.clone(),
            payments: cart.payments.clone(),
            taxes: cart.taxes.clone(),
            subtotal_amount: cart.subtotal_amount,
            total_amount: cart.total_amount,
            total_discount_amount: cart.total_discount_amount,
            deposit_amount: cart.deposit_amount,
            change_amount: cart.change_amount,
            staff: cart.staff.clone(),
            generate_date_time,
            receipt_text,
            journal_text,
        };

        self.transactions.insert(&transaction).await?;

        cart.status = cart_core::CartStatus::Completed;
        cart.transaction_no = Some(transaction_no);
        cart.updated_at = generate_date_time;

        if let Err(err) = self.publisher.publish(&transaction).await {
            // Publication failure never rolls back a finalized transaction
            // (§4.8: "return success to C7 regardless of subscriber fate").
            tracing::warn!(transaction_no, error = %err, "event publication failed after finalize");
        }

        info!(transaction_no, receipt_no, "transaction finalized");
        Ok(transaction)
    }
}

fn render_receipt_text(cart: &Cart, transaction_no: i64, receipt_no: i64, generated_at: chrono::DateTime<Utc>) -> String {
    let mut lines = vec![
        format!("Receipt #{receipt_no}  Tx #{transaction_no}"),
        format!("{} {} {}", cart.tenant_id, cart.store_code, cart.terminal_no),
        generated_at.to_rfc3339(),
        "-".repeat(32),
    ];
    for line in cart.active_line_items() {
        lines.push(format!("{:<20} {:>10}", line.description, line.amount));
    }
    lines.push("-".repeat(32));
    lines.push(format!("{:<20} {:>10}", "Subtotal", cart.subtotal_amount));
    lines.push(format!("{:<20} {:>10}", "Total", cart.total_amount));
    lines.push(format!("{:<20} {:>10}", "Change", cart.change_amount));
    lines.join("\n")
}

fn render_journal_text(cart: &Cart, transaction_no: i64, receipt_no: i64, generated_at: chrono::DateTime<Utc>) -> String {
    format!(
        "TX={transaction_no} RCPT={receipt_no} TYPE={} TERM={} DATE={} TOTAL={}",
        cart.transaction_type.code(),
        cart.terminal_id(),
        generated_at.to_rfc3339(),
        cart.total_amount
    )
}

#[cfg(test)]
mod tests {
    // Finalizer orchestration requires a live store + event publisher,
    // which this repo has no test harness for. The text-rendering helpers
    // above have no business-rule surface worth unit testing independent
    // of a real cart fixture.
}
