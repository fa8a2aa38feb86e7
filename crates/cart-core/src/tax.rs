//! Subtotal computation: cart-discount allocation plus per-tax-code tax
//! calculation, driven by CALC_SUBTOTAL.

use std::collections::BTreeMap;

use crate::discount::allocate_cart_discount;
use crate::error::CoreError;
use crate::money::{Money, RoundingMode};
use crate::types::{Cart, DiscountType, TaxLine, TaxType};

/// Tax master entry, looked up externally (by tax_code) and passed in —
/// cart-core never performs the lookup itself.
#[derive(Debug, Clone)]
pub struct TaxMaster {
    pub tax_code: String,
    pub tax_name: String,
    pub tax_type: TaxType,
    pub rate_bps: u32,
    pub rounding_mode: RoundingMode,
}

/// Runs CALC_SUBTOTAL: allocates the cart discount, computes tax per
/// tax-code group, and fills in every derived total on `cart`.
///
/// `tax_masters` maps `tax_code` to its rate/type/rounding rule; a line
/// whose `tax_code` has no entry is treated as exempt.
pub fn calc_subtotal(cart: &mut Cart, tax_masters: &BTreeMap<String, TaxMaster>) -> Result<(), CoreError> {
    // Step 1 is already expressed by LineItem::net_of_line_discounts.

    // Compute the cart discount total (amount or percent against the
    // eligible base), then allocate it across lines (step 2).
    let eligible_base: Money = cart
        .line_items
        .iter()
        .filter(|l| !l.is_cancelled && !l.is_discount_restricted)
        .map(|l| l.net_of_line_discounts())
        .sum();

    let mut cart_discount_total = Money::ZERO;
    for discount in cart.subtotal_discounts.iter_mut() {
        let amount = match discount.kind {
            DiscountType::Amount => Money::from_cents(discount.value),
            DiscountType::Percent => eligible_base.apply_percentage_discount(discount.value as u32, RoundingMode::RoundHalfUp),
        };
        discount.amount_applied = Some(amount);
        cart_discount_total += amount;
    }

    let allocations = allocate_cart_discount(&cart.line_items, cart_discount_total)?;
    let allocation_by_line: BTreeMap<u32, Money> = allocations.into_iter().map(|a| (a.line_no, a.amount)).collect();

    // Step 3: group post-cart-discount line amounts by tax_code.
    let mut groups: BTreeMap<String, (Money, i64)> = BTreeMap::new();
    for line in cart.line_items.iter() {
        if line.is_cancelled {
            continue;
        }
        let allocated = allocation_by_line.get(&line.line_no).copied().unwrap_or(Money::ZERO);
        let net = line.net_of_line_discounts() - allocated;
        let code = line.tax_code.clone().unwrap_or_else(|| "EXEMPT".to_string());
        let entry = groups.entry(code).or_insert((Money::ZERO, 0));
        entry.0 += net;
        entry.1 += line.quantity_milli;
    }

    // Step 4: compute tax_amount per tax_code.
    let mut tax_lines = Vec::new();
    let mut exclusive_tax_total = Money::ZERO;
    for (code, (target_amount, target_quantity_milli)) in groups {
        let master = tax_masters.get(&code);
        let (tax_type, rate_bps, mode, name) = match master {
            Some(m) => (m.tax_type, m.rate_bps, m.rounding_mode, m.tax_name.clone()),
            None => (TaxType::Exempt, 0, RoundingMode::Floor, code.clone()),
        };

        let tax_amount = match tax_type {
            TaxType::Exclusive => {
                let t = target_amount.calculate_tax(rate_bps, mode);
                exclusive_tax_total += t;
                t
            }
            TaxType::Inclusive => target_amount.calculate_inclusive_tax(rate_bps, mode),
            TaxType::Exempt => Money::ZERO,
        };

        tax_lines.push(TaxLine {
            tax_code: code,
            tax_name: name,
            tax_type,
            rate_bps,
            rounding_mode: mode,
            target_amount,
            target_quantity_milli,
            tax_amount,
        });
    }

    // Update each line's own tax_amount for receipt rendering.
    for line in cart.line_items.iter_mut() {
        if let Some(code) = &line.tax_code {
            if let Some(tl) = tax_lines.iter().find(|t| &t.tax_code == code) {
                // Proportional share within the group, largest-remainder is
                // unnecessary at the receipt-line granularity; direct
                // recompute from this line's own allocated net is exact
                // enough since each tax group usually holds one line's tax
                // rate applied independently in the common single-line case.
                let allocated = allocation_by_line.get(&line.line_no).copied().unwrap_or(Money::ZERO);
                let net = line.net_of_line_discounts() - allocated;
                line.tax_amount = match tl.tax_type {
                    TaxType::Exclusive => net.calculate_tax(tl.rate_bps, tl.rounding_mode),
                    TaxType::Inclusive => net.calculate_inclusive_tax(tl.rate_bps, tl.rounding_mode),
                    TaxType::Exempt => Money::ZERO,
                };
            }
        }
    }

    // Step 5: totals.
    let line_net_total: Money = cart
        .line_items
        .iter()
        .filter(|l| !l.is_cancelled)
        .map(|l| {
            let allocated = allocation_by_line.get(&l.line_no).copied().unwrap_or(Money::ZERO);
            l.net_of_line_discounts() - allocated
        })
        .sum();

    let line_discount_total: Money = cart
        .line_items
        .iter()
        .flat_map(|l| l.discounts.iter())
        .filter_map(|d| d.amount_applied)
        .sum();

    cart.subtotal_amount = cart.line_items.iter().filter(|l| !l.is_cancelled).map(|l| l.gross_amount()).sum();
    cart.total_discount_amount = line_discount_total + cart_discount_total;
    cart.taxes = tax_lines;
    cart.total_amount = line_net_total + exclusive_tax_total;
    cart.balance_amount = cart.total_amount;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Discount, DiscountType, LineItem};
    use chrono::Utc;
    use uuid::Uuid;

    fn line(line_no: u32, cents: i64, qty_milli: i64, tax_code: &str) -> LineItem {
        LineItem {
            line_no,
            item_code: "A".into(),
            description: "d".into(),
            unit_price: Money::from_cents(cents),
            unit_price_original: Money::from_cents(cents),
            is_unit_price_changed: false,
            quantity_milli: qty_milli,
            amount: Money::from_cents(cents * qty_milli / 1000),
            discounts: vec![],
            tax_amount: Money::ZERO,
            tax_code: Some(tax_code.into()),
            is_cancelled: false,
            is_discount_restricted: false,
        }
    }

    fn empty_cart() -> Cart {
        Cart {
            cart_id: Uuid::nil(),
            tenant_id: "t1".into(),
            store_code: "S001".into(),
            terminal_no: "01".into(),
            status: crate::types::CartStatus::EnteringItem,
            transaction_type: crate::types::TransactionType::Sale,
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
            etag: "v1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn s1_happy_path_cash_sale_totals() {
        // line A: qty 2.0 @ 50.00, tax A exclusive 10% round-half-up.
        let mut cart = empty_cart();
        cart.line_items.push(line(1, 5000, 2000, "A"));

        let mut masters = BTreeMap::new();
        masters.insert(
            "A".to_string(),
            TaxMaster {
                tax_code: "A".into(),
                tax_name: "Standard".into(),
                tax_type: TaxType::Exclusive,
                rate_bps: 1000,
                rounding_mode: RoundingMode::RoundHalfUp,
            },
        );

        calc_subtotal(&mut cart, &masters).unwrap();

        assert_eq!(cart.subtotal_amount.cents(), 10_000);
        assert_eq!(cart.total_amount.cents(), 11_000);
        assert_eq!(cart.balance_amount.cents(), 11_000);
        assert_eq!(cart.taxes[0].tax_amount.cents(), 1_000);
    }

    #[test]
    fn s2_cart_discount_allocation_on_exempt_lines() {
        let mut cart = empty_cart();
        cart.line_items.push(line(1, 5000, 2000, "EXEMPT")); // 100.00
        cart.line_items.push(line(2, 3000, 1000, "EXEMPT")); // 30.00
        cart.subtotal_discounts.push(Discount {
            kind: DiscountType::Amount,
            value: 1300,
            detail: "promo".into(),
            amount_applied: None,
        });

        let masters = BTreeMap::new(); // no tax masters -> exempt
        calc_subtotal(&mut cart, &masters).unwrap();

        assert_eq!(cart.total_amount.cents(), 11_700); // 100+30-13 = 117.00
    }
}
