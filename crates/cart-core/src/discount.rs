//! Line and cart discount allocation.
//!
//! Line discounts are applied directly to a single line, in order of
//! addition. Cart discounts are recorded against the cart and then
//! *allocated* across eligible lines in proportion to each line's
//! pre-cart-discount, post-line-discount amount, using largest-remainder
//! rounding so the allocated amounts sum exactly to the cart discount.

use crate::error::CoreError;
use crate::money::{Money, RoundingMode};
use crate::types::{Discount, DiscountType, LineItem};

/// Applies a new line discount to `line`, appending it to `line.discounts`
/// with `amount_applied` materialized immediately (line discounts do not
/// wait for CALC_SUBTOTAL, unlike cart discounts).
pub fn apply_line_discount(line: &mut LineItem, mut discount: Discount, mode: RoundingMode) -> Result<(), CoreError> {
    if line.is_discount_restricted {
        return Err(CoreError::DiscountRestricted { line_no: line.line_no });
    }

    let base = line.net_of_line_discounts();
    let amount = match discount.kind {
        DiscountType::Amount => Money::from_cents(discount.value),
        DiscountType::Percent => base.apply_percentage_discount(discount.value as u32, mode),
    };

    if amount > base {
        return Err(CoreError::DiscountExceedsLine { line_no: line.line_no });
    }

    discount.amount_applied = Some(amount);
    line.discounts.push(discount);
    Ok(())
}

/// One line's share of an allocated cart discount.
pub struct Allocation {
    pub line_no: u32,
    pub amount: Money,
}

/// Allocates `cart_discount` across `lines` in proportion to each eligible
/// line's post-line-discount amount, using largest-remainder rounding so
/// the allocated amounts sum exactly to `cart_discount`. Discount-restricted
/// and cancelled lines are excluded and receive a zero allocation.
pub fn allocate_cart_discount(lines: &[LineItem], cart_discount: Money) -> Result<Vec<Allocation>, CoreError> {
    let eligible: Vec<&LineItem> = lines
        .iter()
        .filter(|l| !l.is_cancelled && !l.is_discount_restricted)
        .collect();

    let base_total: i64 = eligible.iter().map(|l| l.net_of_line_discounts().cents()).sum();

    if cart_discount.cents() > base_total {
        return Err(CoreError::DiscountExceedsBalance {
            requested: cart_discount.cents(),
            available: base_total,
        });
    }

    if base_total == 0 || cart_discount.is_zero() {
        return Ok(lines
            .iter()
            .map(|l| Allocation { line_no: l.line_no, amount: Money::ZERO })
            .collect());
    }

    // Largest-remainder method: compute each line's exact share as a
    // rational number, floor it, then distribute the leftover cents (the
    // difference between the discount total and the sum of floors) to the
    // lines with the largest fractional remainders.
    struct Share {
        line_no: u32,
        floor: i64,
        remainder_numerator: i64, // numerator of the fractional remainder, over base_total
    }

    let total_cents = cart_discount.cents() as i128;
    let mut shares: Vec<Share> = eligible
        .iter()
        .map(|l| {
            let base = l.net_of_line_discounts().cents() as i128;
            let scaled = base * total_cents;
            let floor = (scaled / base_total as i128) as i64;
            let remainder = (scaled % base_total as i128) as i64;
            Share {
                line_no: l.line_no,
                floor,
                remainder_numerator: remainder,
            }
        })
        .collect();

    let floor_sum: i64 = shares.iter().map(|s| s.floor).sum();
    let mut leftover = cart_discount.cents() - floor_sum;

    // Distribute leftover cents to the largest remainders first; ties break
    // by line_no ascending for determinism.
    shares.sort_by(|a, b| b.remainder_numerator.cmp(&a.remainder_numerator).then(a.line_no.cmp(&b.line_no)));
    for share in shares.iter_mut() {
        if leftover <= 0 {
            break;
        }
        share.floor += 1;
        leftover -= 1;
    }

    let mut allocations: Vec<Allocation> = shares
        .into_iter()
        .map(|s| Allocation { line_no: s.line_no, amount: Money::from_cents(s.floor) })
        .collect();

    // Include excluded lines with a zero allocation so callers can zip by
    // line_no against the full line set.
    for l in lines {
        if l.is_cancelled || l.is_discount_restricted {
            allocations.push(Allocation { line_no: l.line_no, amount: Money::ZERO });
        }
    }
    allocations.sort_by_key(|a| a.line_no);
    Ok(allocations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(line_no: u32, cents: i64) -> LineItem {
        LineItem {
            line_no,
            item_code: "A".into(),
            description: "d".into(),
            unit_price: Money::from_cents(cents),
            unit_price_original: Money::from_cents(cents),
            is_unit_price_changed: false,
            quantity_milli: 1000,
            amount: Money::from_cents(cents),
            discounts: vec![],
            tax_amount: Money::ZERO,
            tax_code: None,
            is_cancelled: false,
            is_discount_restricted: false,
        }
    }

    #[test]
    fn line_discount_amount_subtracts_directly() {
        let mut l = line(1, 5000);
        apply_line_discount(
            &mut l,
            Discount { kind: DiscountType::Amount, value: 500, detail: "d".into(), amount_applied: None },
            RoundingMode::RoundHalfUp,
        )
        .unwrap();
        assert_eq!(l.net_of_line_discounts().cents(), 4500);
    }

    #[test]
    fn line_discount_cannot_drive_amount_negative() {
        let mut l = line(1, 1000);
        let err = apply_line_discount(
            &mut l,
            Discount { kind: DiscountType::Amount, value: 2000, detail: "d".into(), amount_applied: None },
            RoundingMode::RoundHalfUp,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::DiscountExceedsLine { .. }));
    }

    #[test]
    fn discount_restricted_line_rejects_line_discount() {
        let mut l = line(1, 1000);
        l.is_discount_restricted = true;
        let err = apply_line_discount(
            &mut l,
            Discount { kind: DiscountType::Amount, value: 100, detail: "d".into(), amount_applied: None },
            RoundingMode::RoundHalfUp,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::DiscountRestricted { .. }));
    }

    #[test]
    fn cart_discount_allocation_uses_largest_remainder() {
        // S2 scenario: A:2@50=100, B:1@30=30, cart discount 13.
        // A gets floor(13*100/130)=10, B gets 13-10=3.
        let lines = vec![line(1, 10_000), line(2, 3_000)];
        let allocations = allocate_cart_discount(&lines, Money::from_cents(1300)).unwrap();
        let a = allocations.iter().find(|a| a.line_no == 1).unwrap();
        let b = allocations.iter().find(|a| a.line_no == 2).unwrap();
        assert_eq!(a.amount.cents(), 1000);
        assert_eq!(b.amount.cents(), 300);
        assert_eq!(a.amount.cents() + b.amount.cents(), 1300);
    }

    #[test]
    fn cart_discount_exceeding_base_is_rejected() {
        let lines = vec![line(1, 1000)];
        let err = allocate_cart_discount(&lines, Money::from_cents(2000)).unwrap_err();
        assert!(matches!(err, CoreError::DiscountExceedsBalance { .. }));
    }

    #[test]
    fn restricted_lines_excluded_from_allocation() {
        let mut restricted = line(2, 5000);
        restricted.is_discount_restricted = true;
        let lines = vec![line(1, 5000), restricted];
        let allocations = allocate_cart_discount(&lines, Money::from_cents(1000)).unwrap();
        let a = allocations.iter().find(|a| a.line_no == 1).unwrap();
        let b = allocations.iter().find(|a| a.line_no == 2).unwrap();
        assert_eq!(a.amount.cents(), 1000);
        assert_eq!(b.amount.cents(), 0);
    }
}
