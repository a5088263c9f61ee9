//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  In many retail systems:                                                │
//! │    Rs 10.00 / 3 = Rs 3.33 (×3 = Rs 9.99)  → Lost Rs 0.01!              │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Minor Units                                      │
//! │    1000 paisa / 3 = 333 paisa (×3 = 999 paisa)                         │
//! │    We KNOW we lost one unit, and handle it explicitly                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use khata_core::money::Money;
//!
//! // Create from minor units (preferred)
//! let price = Money::from_cents(1099); // Rs 10.99
//!
//! // Arithmetic operations
//! let doubled = price * 2;                     // Rs 21.98
//! let total = price + Money::from_cents(500);  // Rs 15.99
//!
//! // NEVER do this:
//! // let bad = Money::from_float(10.99); // NO SUCH METHOD EXISTS!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for corrections and refunds
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price_cents ──► ReceiptItem.total_cents ──► Receipt.total      │
/// │                                                                         │
/// │  Receipt.credit_cents ──► Credit.total_cents ──► amount_left (derived)  │
/// │                                                                         │
/// │  EVERY monetary value in the system flows through this type            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from the smallest currency unit.
    ///
    /// ## Example
    /// ```rust
    /// use khata_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // Represents Rs 10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    ///
    /// ## Why Minor Units?
    /// Using the smallest unit eliminates all floating-point concerns.
    /// The database, calculations, and wire payloads all use minor units.
    /// Only the UI converts to rupees for display.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ## Example
    /// ```rust
    /// use khata_core::money::Money;
    ///
    /// let price = Money::from_major_minor(10, 99); // Rs 10.99
    /// assert_eq!(price.cents(), 1099);
    ///
    /// let negative = Money::from_major_minor(-5, 50); // -Rs 5.50 (correction)
    /// assert_eq!(negative.cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        // Handle sign: if major is negative, minor should subtract
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in the smallest currency unit.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (rupees) portion.
    #[inline]
    pub const fn rupees(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    ///
    /// ## Example
    /// ```rust
    /// use khata_core::money::Money;
    ///
    /// let zero = Money::zero();
    /// assert_eq!(zero.cents(), 0);
    /// assert!(zero.is_zero());
    /// ```
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Subtracts, flooring the result at zero.
    ///
    /// Derived balances (credit left to pay, customer outstanding) must
    /// never render negative when repayments overshoot. This is the one
    /// subtraction those paths are allowed to use.
    ///
    /// ## Example
    /// ```rust
    /// use khata_core::money::Money;
    ///
    /// let total = Money::from_cents(5000);
    /// let paid = Money::from_cents(6000);
    /// assert_eq!(total.saturating_sub(paid), Money::zero());
    /// ```
    #[inline]
    pub const fn saturating_sub(&self, other: Self) -> Self {
        let diff = self.0 - other.0;
        if diff < 0 {
            Money(0)
        } else {
            Money(diff)
        }
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use khata_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299); // Rs 2.99
    /// let line_total = unit_price.multiply_quantity(3);
    /// assert_eq!(line_total.cents(), 897); // Rs 8.97
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for debugging and log output. Use frontend formatting for
/// actual UI display to handle localization properly.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}Rs {}.{:02}",
            sign,
            self.rupees().abs(),
            self.minor_part()
        )
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

/// Addition of two Money values.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

/// Addition assignment (+=).
impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Subtraction of two Money values.
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Subtraction assignment (-=).
impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by integer (for quantity calculations).
impl Mul<i32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i32) -> Self {
        Money(self.0 * qty as i64)
    }
}

/// Multiplication by i64.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

/// Summation over iterators, so aggregate functions can fold receipts
/// and payments without intermediate accumulators.
impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.rupees(), 10);
        assert_eq!(money.minor_part(), 99);
    }

    #[test]
    fn test_from_major_minor() {
        let money = Money::from_major_minor(10, 99);
        assert_eq!(money.cents(), 1099);

        let negative = Money::from_major_minor(-5, 50);
        assert_eq!(negative.cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "Rs 10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "Rs 5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-Rs 5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "Rs 0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        let result: Money = a * 3;
        assert_eq!(result.cents(), 3000);
    }

    #[test]
    fn test_saturating_sub_clamps_at_zero() {
        let total = Money::from_cents(5000);

        assert_eq!(total.saturating_sub(Money::from_cents(1500)).cents(), 3500);
        assert_eq!(total.saturating_sub(Money::from_cents(5000)).cents(), 0);
        // Overpayment never renders a negative balance
        assert_eq!(total.saturating_sub(Money::from_cents(9000)).cents(), 0);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let positive = Money::from_cents(100);
        assert!(!positive.is_zero());
        assert!(positive.is_positive());
        assert!(!positive.is_negative());

        let negative = Money::from_cents(-100);
        assert!(!negative.is_zero());
        assert!(!negative.is_positive());
        assert!(negative.is_negative());
    }

    #[test]
    fn test_multiply_quantity() {
        let unit_price = Money::from_cents(299);
        let line_total = unit_price.multiply_quantity(3);
        assert_eq!(line_total.cents(), 897);
    }

    #[test]
    fn test_sum_over_iterator() {
        let amounts = [
            Money::from_cents(1000),
            Money::from_cents(250),
            Money::from_cents(750),
        ];
        let total: Money = amounts.iter().copied().sum();
        assert_eq!(total.cents(), 2000);
    }

    /// Critical test: Verify that Rs 10.00 / 3 × 3 behaves as expected.
    /// This documents the intentional precision loss.
    #[test]
    fn test_division_precision_loss_documented() {
        let ten = Money::from_cents(1000);
        // If we split Rs 10.00 three ways: Rs 3.33 each
        let one_third = Money::from_cents(1000 / 3); // 333
        let reconstructed: Money = one_third * 3; // 999

        assert_eq!(reconstructed.cents(), 999);
        assert_ne!(reconstructed.cents(), ten.cents());

        let lost = ten - reconstructed;
        assert_eq!(lost.cents(), 1);
    }
}
