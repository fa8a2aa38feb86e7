//! Core domain types shared across the cart transaction pipeline.
//!
//! Every entity here is multi-tenant: `tenant_id` is carried on the cart and
//! the transaction record, and is expected to be enforced at the query
//! layer by `cart-store` (cross-tenant reads are never permitted).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::{Money, RoundingMode};

/// Lifecycle state of a [`Cart`]. See the state machine in
/// [`crate::state_machine`] for the permitted-event table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    Initial,
    Idle,
    EnteringItem,
    Paying,
    Completed,
    Cancelled,
}

impl CartStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CartStatus::Completed | CartStatus::Cancelled)
    }
}

/// Transaction type codes, carried verbatim on both the cart and the
/// resulting transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum TransactionType {
    Sale = 101,
    Return = 102,
    VoidSale = -101,
    CancelSale = 201,
    CancelReturn = 202,
}

impl TransactionType {
    pub fn code(&self) -> i32 {
        *self as i32
    }
}

/// An event recognized by the state machine. Every API operation names one
/// of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartEvent {
    AddItem,
    CancelLine,
    UpdateQty,
    UpdatePrice,
    AddLineDiscount,
    AddCartDiscount,
    CalcSubtotal,
    AddPayment,
    Bill,
    ResumeItemEntry,
    CancelCart,
    GetCart,
}

/// `type` on a [`Discount`]: an amount discount subtracts directly; a
/// percent discount is computed against the base amount at allocation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Amount,
    Percent,
}

/// A discount applied either to a single line or to the cart as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discount {
    #[serde(rename = "type")]
    pub kind: DiscountType,
    /// For `Amount`, minor units; for `Percent`, basis points.
    pub value: i64,
    pub detail: String,
    /// Materialized once allocation runs; `None` before the first CALC_SUBTOTAL.
    pub amount_applied: Option<Money>,
}

/// A single cart line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// 1-based, stable once assigned. Cancelled lines are flagged, never renumbered.
    pub line_no: u32,
    pub item_code: String,
    pub description: String,
    pub unit_price: Money,
    pub unit_price_original: Money,
    pub is_unit_price_changed: bool,
    /// Positive, may carry fractional units (e.g. weighed goods) — represented
    /// in thousandths to stay integer: `3500` means `3.5` units.
    pub quantity_milli: i64,
    pub amount: Money,
    pub discounts: Vec<Discount>,
    pub tax_amount: Money,
    pub tax_code: Option<String>,
    pub is_cancelled: bool,
    pub is_discount_restricted: bool,
}

impl LineItem {
    pub fn quantity_as_f64(&self) -> f64 {
        self.quantity_milli as f64 / 1000.0
    }

    /// Gross amount before any discount: `unit_price * quantity`.
    pub fn gross_amount(&self) -> Money {
        // quantity_milli / 1000, applied to cents keeps the multiply exact
        // because both operands are integers; divide last.
        Money::from_cents((self.unit_price.cents() as i128 * self.quantity_milli as i128 / 1000) as i64)
    }

    /// Amount after line-level discounts (not yet including cart-discount
    /// allocation or tax).
    pub fn net_of_line_discounts(&self) -> Money {
        let discounted: Money = self
            .discounts
            .iter()
            .filter_map(|d| d.amount_applied)
            .fold(Money::ZERO, |acc, a| acc + a);
        self.gross_amount() - discounted
    }
}

/// `tax_type` on a [`TaxLine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxType {
    Exclusive,
    Inclusive,
    Exempt,
}

/// One computed tax bucket within a cart, one per distinct `tax_code` in use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxLine {
    pub tax_code: String,
    pub tax_name: String,
    pub tax_type: TaxType,
    /// Basis points.
    pub rate_bps: u32,
    pub rounding_mode: RoundingMode,
    pub target_amount: Money,
    pub target_quantity_milli: i64,
    pub tax_amount: Money,
}

/// `payment_code` family — whether a strategy computes change is a property
/// of the strategy, not a string convention on the code (§9.4 decision).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub payment_no: u32,
    pub payment_code: String,
    pub amount: Money,
    pub deposit_amount: Money,
    pub detail: Option<String>,
    pub is_refunded: bool,
}

/// The mutable working document for an in-flight sale, return, void or
/// cancellation. Lives in [`crate::state_machine`] + `cart-store`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub cart_id: Uuid,
    pub tenant_id: String,
    pub store_code: String,
    pub terminal_no: String,
    pub status: CartStatus,
    pub transaction_type: TransactionType,
    /// YYYYMMDD.
    pub business_date: u32,
    pub user: Option<String>,
    pub staff: Option<String>,
    pub line_items: Vec<LineItem>,
    pub subtotal_discounts: Vec<Discount>,
    pub payments: Vec<Payment>,
    pub taxes: Vec<TaxLine>,
    pub subtotal_amount: Money,
    pub total_amount: Money,
    pub total_discount_amount: Money,
    pub deposit_amount: Money,
    pub change_amount: Money,
    pub balance_amount: Money,
    /// Reference to an original transaction, set on void/return carts.
    pub reference_transaction_no: Option<i64>,
    /// Set by the finalizer once BILL's transaction insert succeeds, after
    /// which `status` also flips to `Completed`. A retried BILL against an
    /// already-`Completed` cart uses this to return the existing
    /// transaction instead of re-running finalization.
    pub transaction_no: Option<i64>,
    /// Optimistic-concurrency token, opaque to business logic.
    pub etag: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn terminal_id(&self) -> String {
        format!("{}-{}-{}", self.tenant_id, self.store_code, self.terminal_no)
    }

    pub fn active_line_items(&self) -> impl Iterator<Item = &LineItem> {
        self.line_items.iter().filter(|l| !l.is_cancelled)
    }

    pub fn total_paid(&self) -> Money {
        self.payments.iter().map(|p| p.amount).sum()
    }

    pub fn next_line_no(&self) -> u32 {
        self.line_items.iter().map(|l| l.line_no).max().unwrap_or(0) + 1
    }

    pub fn next_payment_no(&self) -> u32 {
        self.payments.iter().map(|p| p.payment_no).max().unwrap_or(0) + 1
    }
}

/// Immutable record of a completed cart, written once at BILL and never
/// mutated afterward. Void/return produce *new* transaction records that
/// reference this one; they never edit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub tenant_id: String,
    pub store_code: String,
    pub terminal_no: String,
    pub business_date: u32,
    pub transaction_no: i64,
    pub receipt_no: i64,
    pub transaction_type: TransactionType,
    pub reference_transaction_no: Option<i64>,
    pub line_items: Vec<LineItem>,
    pub payments: Vec<Payment>,
    pub taxes: Vec<TaxLine>,
    pub subtotal_amount: Money,
    pub total_amount: Money,
    pub total_discount_amount: Money,
    pub deposit_amount: Money,
    pub change_amount: Money,
    pub staff: Option<String>,
    pub generate_date_time: DateTime<Utc>,
    pub receipt_text: String,
    pub journal_text: String,
}

/// After-the-fact void/return flags tracked alongside a [`Transaction`].
/// This is the *only* thing ever allowed to mutate post-BILL; the
/// transaction itself is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatus {
    pub tenant_id: String,
    pub store_code: String,
    pub terminal_no: String,
    pub business_date: u32,
    pub transaction_no: i64,
    pub is_voided: bool,
    pub void_transaction_no: Option<i64>,
    pub void_date_time: Option<DateTime<Utc>>,
    pub void_staff_id: Option<String>,
    pub is_refunded: bool,
    /// Cumulative returned quantity per original line_no, in milli-units.
    /// Used to decide whether a return is full or partial (§9.1 decision).
    pub returned_quantity_milli: std::collections::BTreeMap<u32, i64>,
}

impl TransactionStatus {
    pub fn new(tenant_id: String, store_code: String, terminal_no: String, business_date: u32, transaction_no: i64) -> Self {
        TransactionStatus {
            tenant_id,
            store_code,
            terminal_no,
            business_date,
            transaction_no,
            is_voided: false,
            void_transaction_no: None,
            void_date_time: None,
            void_staff_id: None,
            is_refunded: false,
            returned_quantity_milli: std::collections::BTreeMap::new(),
        }
    }
}

/// One per terminal: the source of `transaction_no` / `receipt_no` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalCounter {
    pub terminal_id: String,
    pub counters: std::collections::BTreeMap<String, i64>,
}

/// Per-subscriber delivery status for one published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

/// Overall rollup across a delivery's subscriber entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallDeliveryStatus {
    Pending,
    Delivered,
    PartiallyDelivered,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDeliveryEntry {
    pub service_name: String,
    pub status: DeliveryStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Tracks fan-out of one published transaction event to its subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDelivery {
    pub event_id: Uuid,
    pub tenant_id: String,
    pub published_at: DateTime<Utc>,
    pub overall_status: OverallDeliveryStatus,
    pub payload: serde_json::Value,
    pub services: Vec<ServiceDeliveryEntry>,
}

impl EventDelivery {
    /// Recomputes `overall_status` from the per-service entries: delivered
    /// if all delivered, failed if all failed, partially_delivered if mixed
    /// with at least one delivered, pending otherwise.
    pub fn recompute_overall_status(&mut self) {
        let total = self.services.len();
        let delivered = self.services.iter().filter(|s| s.status == DeliveryStatus::Delivered).count();
        let failed = self.services.iter().filter(|s| s.status == DeliveryStatus::Failed).count();

        self.overall_status = if total > 0 && delivered == total {
            OverallDeliveryStatus::Delivered
        } else if total > 0 && failed == total {
            OverallDeliveryStatus::Failed
        } else if delivered > 0 {
            OverallDeliveryStatus::PartiallyDelivered
        } else {
            OverallDeliveryStatus::Pending
        };
    }
}

pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000000";
pub const MAX_CART_LINE_ITEMS: usize = 200;
pub const MAX_LINE_QUANTITY_MILLI: i64 = 999_000;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_line(line_no: u32, unit_price_cents: i64, qty_milli: i64) -> LineItem {
        LineItem {
            line_no,
            item_code: "A".into(),
            description: "Widget".into(),
            unit_price: Money::from_cents(unit_price_cents),
            unit_price_original: Money::from_cents(unit_price_cents),
            is_unit_price_changed: false,
            quantity_milli: qty_milli,
            amount: Money::from_cents(unit_price_cents * qty_milli / 1000),
            discounts: vec![],
            tax_amount: Money::ZERO,
            tax_code: Some("A".into()),
            is_cancelled: false,
            is_discount_restricted: false,
        }
    }

    #[test]
    fn gross_amount_multiplies_price_by_quantity() {
        let line = sample_line(1, 5000, 2000);
        assert_eq!(line.gross_amount().cents(), 10_000);
    }

    #[test]
    fn net_of_line_discounts_subtracts_applied_amounts() {
        let mut line = sample_line(1, 5000, 2000);
        line.discounts.push(Discount {
            kind: DiscountType::Amount,
            value: 500,
            detail: "promo".into(),
            amount_applied: Some(Money::from_cents(500)),
        });
        assert_eq!(line.net_of_line_discounts().cents(), 9_500);
    }

    #[test]
    fn event_delivery_overall_status_rollup() {
        let mut delivery = EventDelivery {
            event_id: Uuid::nil(),
            tenant_id: "t1".into(),
            published_at: Utc::now(),
            overall_status: OverallDeliveryStatus::Pending,
            payload: serde_json::json!({}),
            services: vec![
                ServiceDeliveryEntry {
                    service_name: "Report".into(),
                    status: DeliveryStatus::Delivered,
                    delivered_at: Some(Utc::now()),
                    error_message: None,
                },
                ServiceDeliveryEntry {
                    service_name: "Journal".into(),
                    status: DeliveryStatus::Pending,
                    delivered_at: None,
                    error_message: None,
                },
            ],
        };
        delivery.recompute_overall_status();
        assert_eq!(delivery.overall_status, OverallDeliveryStatus::PartiallyDelivered);

        delivery.services[1].status = DeliveryStatus::Delivered;
        delivery.recompute_overall_status();
        assert_eq!(delivery.overall_status, OverallDeliveryStatus::Delivered);
    }

    #[test]
    fn cart_next_line_no_and_total_paid() {
        let mut cart = test_cart();
        assert_eq!(cart.next_line_no(), 1);
        cart.line_items.push(sample_line(1, 1000, 1000));
        assert_eq!(cart.next_line_no(), 2);

        cart.payments.push(Payment {
            payment_no: 1,
            payment_code: "01".into(),
            amount: Money::from_cents(1000),
            deposit_amount: Money::from_cents(1000),
            detail: None,
            is_refunded: false,
        });
        assert_eq!(cart.total_paid().cents(), 1000);
    }

    fn test_cart() -> Cart {
        Cart {
            cart_id: Uuid::nil(),
            tenant_id: "t1".into(),
            store_code: "S001".into(),
            terminal_no: "01".into(),
            status: CartStatus::Idle,
            transaction_type: TransactionType::Sale,
            business_date: 20260726,
            user: None,
            staff: Some("staff-1".into()),
            line_items: vec![],
            subtotal_discounts: vec![],
            payments: vec![],
            taxes: vec![],
            subtotal_amount: Money::ZERO,
            total_amount: Money::ZERO,
            total_discount_amount: Money::ZERO,
            deposit_amount: Money::ZERO,
            change_amount: Money::ZERO,
            balance_amount: Money::ZERO,
            reference_transaction_no: None,
            transaction_no: None,
            etag: "v1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
