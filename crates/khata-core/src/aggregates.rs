//! # Aggregate Computation
//!
//! Derived amounts over base records: sales totals, settlement state,
//! credit balances, stock arithmetic.
//!
//! ## Recompute, Don't Store
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Store snapshot (records)            Derived on every read              │
//! │                                                                         │
//! │  receipts ───────────┐                                                  │
//! │                      ├──► total_sales_on(day)      ──► "Today: Rs …"   │
//! │  payments ───────────┼──► settlement(receipt)      ──► Paid / Partial  │
//! │                      │                                                  │
//! │  credits ────────────┼──► credit_amount_left       ──► "Owes Rs …"     │
//! │                      └──► customer_balance         ──► ledger header   │
//! │                                                                         │
//! │  Recomputing beats caching here: record volumes are small (one         │
//! │  shop), and a stale stored status is a real-world complaint.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function here is pure and total: slices in, values out, no
//! clock, no store, no panics.

use chrono::NaiveDate;

use crate::money::Money;
use crate::types::{Credit, Payment, PaymentKind, Receipt, ReceiptItem, Settlement};

// =============================================================================
// Receipt Totals
// =============================================================================

/// Sums line totals (unit price × quantity) over receipt items.
///
/// The store calls this inside the creating transaction to materialize
/// `Receipt.total_cents`; reports call it again to verify. Both sides
/// must agree because items are frozen snapshots.
///
/// ## Example
/// ```rust
/// use khata_core::aggregates::items_total;
/// # use khata_core::types::ReceiptItem;
/// # use chrono::Utc;
/// # fn item(price: i64, qty: i64) -> ReceiptItem {
/// #     ReceiptItem {
/// #         id: "i".into(), receipt_id: "r".into(), product_id: "p".into(),
/// #         name_snapshot: "x".into(), sku_snapshot: "x".into(),
/// #         price_cents: price, quantity: qty, total_cents: price * qty,
/// #         created_at: Utc::now(),
/// #     }
/// # }
/// let items = vec![item(250, 2), item(1000, 1)];
/// assert_eq!(items_total(&items).cents(), 1500);
/// ```
pub fn items_total(items: &[ReceiptItem]) -> Money {
    items
        .iter()
        .map(|item| item.unit_price().multiply_quantity(item.quantity))
        .sum()
}

// =============================================================================
// Sales Totals
// =============================================================================

/// Total sales for one business day.
///
/// Cancelled receipts never count, whatever their amounts.
pub fn total_sales_on(receipts: &[Receipt], day: NaiveDate) -> Money {
    receipts
        .iter()
        .filter(|r| !r.is_cancelled && r.issued_on == day)
        .map(Receipt::total)
        .sum()
}

/// Total sales for an inclusive date range.
pub fn total_sales_between(receipts: &[Receipt], from: NaiveDate, to: NaiveDate) -> Money {
    receipts
        .iter()
        .filter(|r| !r.is_cancelled && r.issued_on >= from && r.issued_on <= to)
        .map(Receipt::total)
        .sum()
}

// =============================================================================
// Settlement
// =============================================================================

/// Sums every payment recorded against the given receipt.
pub fn receipt_paid_total(receipt_id: &str, payments: &[Payment]) -> Money {
    payments
        .iter()
        .filter(|p| p.receipt_id.as_deref() == Some(receipt_id))
        .map(Payment::amount)
        .sum()
}

/// Derives the settlement state of a receipt from its payments.
///
/// Rules, in order:
/// 1. Cancelled receipts are `Cancelled`, whatever was paid.
/// 2. Paid covers the total (including a zero total) → `Paid`.
/// 3. Nothing paid → `Unpaid`.
/// 4. Anything in between → `Partial`.
pub fn settlement(receipt: &Receipt, payments: &[Payment]) -> Settlement {
    if receipt.is_cancelled {
        return Settlement::Cancelled;
    }

    let paid = receipt_paid_total(&receipt.id, payments);
    if paid >= receipt.total() {
        Settlement::Paid
    } else if paid.is_zero() {
        Settlement::Unpaid
    } else {
        Settlement::Partial
    }
}

/// Filters receipts down to those in the wanted settlement state.
pub fn filter_by_settlement<'a>(
    receipts: &'a [Receipt],
    payments: &[Payment],
    want: Settlement,
) -> Vec<&'a Receipt> {
    receipts
        .iter()
        .filter(|r| settlement(r, payments) == want)
        .collect()
}

// =============================================================================
// Credit Balances
// =============================================================================

/// Amount still owed on a credit, floored at zero.
///
/// `total - paid`, except an overshooting repayment renders as settled
/// rather than as the shop owing the customer.
#[inline]
pub fn credit_amount_left(total: Money, paid: Money) -> Money {
    total.saturating_sub(paid)
}

/// Sums the amount left across a customer's open credits.
pub fn outstanding_credit(credits: &[Credit]) -> Money {
    credits.iter().map(Credit::amount_left).sum()
}

/// A customer's running balance: credit carried on their receipts minus
/// repayments they have made, floored at zero.
///
/// Callers pass the customer's own receipts and payments; this function
/// filters out cancelled receipts and non-repayment payments.
pub fn customer_balance(receipts: &[Receipt], payments: &[Payment]) -> Money {
    let carried: Money = receipts
        .iter()
        .filter(|r| !r.is_cancelled)
        .map(Receipt::credit)
        .sum();

    let repaid: Money = payments
        .iter()
        .filter(|p| p.kind == PaymentKind::Repayment)
        .map(Payment::amount)
        .sum();

    carried.saturating_sub(repaid)
}

// =============================================================================
// Stock Arithmetic
// =============================================================================

/// Applies one inventory delta to a stock level. Restocks add, never
/// replace: 10 on hand restocked by 5 twice is 20, not 5.
#[inline]
pub const fn apply_restock(on_hand: i64, delta: i64) -> i64 {
    on_hand + delta
}

/// Folds a series of deltas into a final stock level.
pub fn replay_stock(initial: i64, deltas: &[i64]) -> i64 {
    deltas.iter().fold(initial, |acc, d| apply_restock(acc, *d))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn receipt(id: &str, total: i64, credit: i64, cancelled: bool, issued: NaiveDate) -> Receipt {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        Receipt {
            id: id.to_string(),
            customer_id: None,
            total_cents: total,
            paid_cents: 0,
            tax_cents: 0,
            credit_cents: credit,
            is_cancelled: cancelled,
            issued_on: issued,
            note: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn payment(receipt_id: Option<&str>, amount: i64, kind: PaymentKind) -> Payment {
        Payment {
            id: "pay".to_string(),
            customer_id: None,
            receipt_id: receipt_id.map(str::to_string),
            credit_id: None,
            amount_cents: amount,
            method: crate::types::PaymentMethod::Cash,
            kind,
            note: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap(),
        }
    }

    fn item(price: i64, qty: i64) -> ReceiptItem {
        ReceiptItem {
            id: "i".to_string(),
            receipt_id: "r".to_string(),
            product_id: "p".to_string(),
            name_snapshot: "x".to_string(),
            sku_snapshot: "X".to_string(),
            price_cents: price,
            quantity: qty,
            total_cents: price * qty,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_daily_total_skips_cancelled_and_other_days() {
        let d = day(2024, 3, 1);
        let receipts = vec![
            receipt("r1", 1000, 0, false, d),
            receipt("r2", 2500, 0, false, d),
            receipt("r3", 9999, 0, true, d),              // cancelled
            receipt("r4", 4000, 0, false, day(2024, 3, 2)), // other day
        ];
        assert_eq!(total_sales_on(&receipts, d).cents(), 3500);
    }

    #[test]
    fn test_range_total_is_inclusive() {
        let receipts = vec![
            receipt("r1", 100, 0, false, day(2024, 3, 1)),
            receipt("r2", 200, 0, false, day(2024, 3, 15)),
            receipt("r3", 400, 0, false, day(2024, 3, 31)),
            receipt("r4", 800, 0, false, day(2024, 4, 1)),
        ];
        let total = total_sales_between(&receipts, day(2024, 3, 1), day(2024, 3, 31));
        assert_eq!(total.cents(), 700);
    }

    #[test]
    fn test_items_total_matches_stored() {
        let items = vec![item(250, 2), item(1000, 1), item(75, 4)];
        let computed = items_total(&items);
        let stored: i64 = items.iter().map(|i| i.total_cents).sum();
        assert_eq!(computed.cents(), stored);
        assert_eq!(computed.cents(), 1800);
    }

    #[test]
    fn test_settlement_states() {
        let d = day(2024, 3, 1);
        let r = receipt("r1", 10000, 0, false, d);

        let full = vec![payment(Some("r1"), 10000, PaymentKind::Receipt)];
        assert_eq!(settlement(&r, &full), Settlement::Paid);

        let partial = vec![payment(Some("r1"), 6000, PaymentKind::Receipt)];
        assert_eq!(settlement(&r, &partial), Settlement::Partial);

        assert_eq!(settlement(&r, &[]), Settlement::Unpaid);

        // Payments against other receipts do not count
        let other = vec![payment(Some("r2"), 10000, PaymentKind::Receipt)];
        assert_eq!(settlement(&r, &other), Settlement::Unpaid);
    }

    #[test]
    fn test_settlement_cancelled_wins() {
        let r = receipt("r1", 10000, 0, true, day(2024, 3, 1));
        let full = vec![payment(Some("r1"), 10000, PaymentKind::Receipt)];
        assert_eq!(settlement(&r, &full), Settlement::Cancelled);
    }

    #[test]
    fn test_settlement_zero_total_is_paid() {
        let r = receipt("r1", 0, 0, false, day(2024, 3, 1));
        assert_eq!(settlement(&r, &[]), Settlement::Paid);
    }

    #[test]
    fn test_filter_by_settlement() {
        let d = day(2024, 3, 1);
        let receipts = vec![
            receipt("r1", 1000, 0, false, d),
            receipt("r2", 1000, 0, false, d),
        ];
        let payments = vec![payment(Some("r1"), 1000, PaymentKind::Receipt)];
        let paid = filter_by_settlement(&receipts, &payments, Settlement::Paid);
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].id, "r1");
    }

    #[test]
    fn test_credit_amount_left_clamps_at_zero() {
        let total = Money::from_cents(5000);
        assert_eq!(credit_amount_left(total, Money::from_cents(1500)).cents(), 3500);
        assert_eq!(credit_amount_left(total, Money::from_cents(5000)).cents(), 0);
        assert_eq!(credit_amount_left(total, Money::from_cents(7000)).cents(), 0);
    }

    #[test]
    fn test_customer_balance_floors_at_zero() {
        let d = day(2024, 3, 1);
        let receipts = vec![
            receipt("r1", 5000, 3000, false, d),
            receipt("r2", 2000, 2000, false, d),
            receipt("r3", 9000, 9000, true, d), // cancelled credit never counts
        ];

        let repayments = vec![payment(None, 1000, PaymentKind::Repayment)];
        assert_eq!(customer_balance(&receipts, &repayments).cents(), 4000);

        // Counter payments are not repayments
        let counter = vec![payment(Some("r1"), 1000, PaymentKind::Receipt)];
        assert_eq!(customer_balance(&receipts, &counter).cents(), 5000);

        // Overshoot floors at zero
        let over = vec![payment(None, 99999, PaymentKind::Repayment)];
        assert_eq!(customer_balance(&receipts, &over).cents(), 0);
    }

    #[test]
    fn test_restock_is_additive() {
        let mut stock = 10;
        stock = apply_restock(stock, 5);
        stock = apply_restock(stock, 5);
        assert_eq!(stock, 20);

        assert_eq!(replay_stock(10, &[5, 5, -3]), 17);
    }
}
