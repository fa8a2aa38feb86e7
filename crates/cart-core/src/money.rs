//! Fixed-point money type.
//!
//! All monetary values in the cart transaction core are integer minor units
//! (cents). Floating point is never used for money: every line total, tax
//! amount and payment is an exact integer, and rounding only happens at
//! well-defined points (tax computation, discount allocation) under an
//! explicit [`RoundingMode`].

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// An amount of money in integer minor units (cents).
///
/// Using `i64` gives headroom well beyond any realistic transaction size
/// while keeping arithmetic exact. Never use `f64` for money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

/// Rounding rule applied when a computation produces a fractional minor
/// unit (tax, percentage discount). The rule is selected per tax master
/// entry / discount context, not globally fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Always round toward zero (truncate the fractional part).
    Floor,
    /// Round half away from zero at the 0.5 boundary.
    #[default]
    RoundHalfUp,
    /// Always round away from zero.
    Ceil,
}

impl Money {
    pub const ZERO: Money = Money(0);

    /// Constructs from a raw cent count.
    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Constructs from major/minor units, e.g. `from_major_minor(1, 50)` == $1.50.
    pub fn from_major_minor(major: i64, minor: i64) -> Self {
        Money(major * 100 + minor)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn dollars(&self) -> i64 {
        self.0 / 100
    }

    pub fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    pub fn zero() -> Self {
        Money(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    pub fn negate(&self) -> Self {
        Money(-self.0)
    }

    /// Computes tax on this amount at `rate` (basis points), applying
    /// `mode` to the fractional minor unit. This is the exclusive-tax
    /// formula from the tax engine: `tax = round(amount * rate)`.
    pub fn calculate_tax(self, rate_bps: u32, mode: RoundingMode) -> Money {
        Money(round_ratio(self.0 as i128, rate_bps as i128, 10_000, mode))
    }

    /// Computes the tax component of a tax-inclusive amount:
    /// `tax = round(amount * rate / (1 + rate))`.
    pub fn calculate_inclusive_tax(self, rate_bps: u32, mode: RoundingMode) -> Money {
        let numerator = self.0 as i128 * rate_bps as i128;
        let denominator = 10_000 + rate_bps as i128;
        Money(round_ratio(numerator, 1, denominator, mode))
    }

    /// Applies a percentage discount (basis points) to this amount,
    /// rounding the discount amount under `mode`.
    pub fn apply_percentage_discount(self, discount_bps: u32, mode: RoundingMode) -> Money {
        Money(round_ratio(self.0 as i128, discount_bps as i128, 10_000, mode))
    }

    pub fn multiply_quantity(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }
}

/// Rounds `numerator * ratio_num / ratio_den` under the given mode, keeping
/// everything in `i128` to avoid overflow during the intermediate multiply.
fn round_ratio(numerator: i128, ratio_num: i128, ratio_den: i128, mode: RoundingMode) -> i64 {
    let n = numerator * ratio_num;
    let d = ratio_den;
    let sign = if (n < 0) != (d < 0) { -1 } else { 1 };
    let n = n.abs();
    let d = d.abs();
    let quotient = n / d;
    let remainder = n % d;

    let rounded = match mode {
        RoundingMode::Floor => quotient,
        RoundingMode::Ceil => {
            if remainder > 0 {
                quotient + 1
            } else {
                quotient
            }
        }
        RoundingMode::RoundHalfUp => {
            if remainder * 2 >= d {
                quotient + 1
            } else {
                quotient
            }
        }
    };

    (sign as i128 * rounded) as i64
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Mul<i32> for Money {
    type Output = Money;
    fn mul(self, rhs: i32) -> Money {
        Money(self.0 * rhs as i64)
    }
}

impl Mul<i64> for Money {
    type Output = Money;
    fn mul(self, rhs: i64) -> Money {
        Money(self.0 * rhs)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_dollars_and_cents() {
        assert_eq!(Money::from_cents(1050).to_string(), "$10.50");
        assert_eq!(Money::from_cents(-500).to_string(), "-$5.00");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
    }

    #[test]
    fn exclusive_tax_rounds_half_up_by_default() {
        // 100.00 at 10% = 10.00 exactly
        let amount = Money::from_cents(10_000);
        assert_eq!(amount.calculate_tax(1000, RoundingMode::RoundHalfUp).cents(), 1000);

        // 547 cents at 8% = 43.76 -> rounds to 44
        let amount = Money::from_cents(547);
        assert_eq!(amount.calculate_tax(800, RoundingMode::RoundHalfUp).cents(), 44);
    }

    #[test]
    fn rounding_modes_differ_at_the_boundary() {
        // 5 cents at 50% -> exactly 2.5, half-up rounds to 3, floor rounds to 2
        let amount = Money::from_cents(5);
        assert_eq!(amount.calculate_tax(5000, RoundingMode::Floor).cents(), 2);
        assert_eq!(amount.calculate_tax(5000, RoundingMode::RoundHalfUp).cents(), 3);
        assert_eq!(amount.calculate_tax(5000, RoundingMode::Ceil).cents(), 3);
    }

    #[test]
    fn inclusive_tax_extracts_embedded_component() {
        // 110.00 inclusive at 10% -> tax = 110 * 0.10 / 1.10 = 10.00
        let amount = Money::from_cents(11_000);
        assert_eq!(amount.calculate_inclusive_tax(1000, RoundingMode::RoundHalfUp).cents(), 1000);
    }

    #[test]
    fn arithmetic_operators() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(250);
        assert_eq!((a + b).cents(), 1250);
        assert_eq!((a - b).cents(), 750);
        assert_eq!((a * 3).cents(), 3000);
    }

    #[test]
    fn sum_over_iterator() {
        let lines = vec![Money::from_cents(100), Money::from_cents(200), Money::from_cents(300)];
        let total: Money = lines.into_iter().sum();
        assert_eq!(total.cents(), 600);
    }
}
