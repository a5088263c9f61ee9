//! # Domain Types
//!
//! Core domain records used throughout Khata.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Records                                  │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Customer     │   │     Receipt     │   │     Credit      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  customer_id    │   │  total_cents    │       │
//! │  │  name, mobile   │   │  total_cents    │──►│  paid_cents     │       │
//! │  │  is_active      │   │  is_cancelled   │   │  due_on         │       │
//! │  └─────────────────┘   └───────┬─────────┘   └─────────────────┘       │
//! │                                │ owns                                   │
//! │  ┌─────────────────┐   ┌───────▼─────────┐   ┌─────────────────┐       │
//! │  │    Product      │◄──│  ReceiptItem    │   │    Payment      │       │
//! │  │  sku, price     │   │  qty × price    │   │  method, kind   │       │
//! │  │  qty_on_hand    │   │  snapshots      │   │  amount_cents   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Contact      │   │  Conversation   │   │    Message      │       │
//! │  │  channel_id     │◄──│  channel (uniq) │◄──│  channel        │       │
//! │  │  display_name   │   │  member_ids     │   │  sent_at, body  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Derived, Never Stored
//! Settlement status, credit amount-left, and customer balances are
//! recomputed from these records on every read (see [`crate::aggregates`]).
//! Only receipt totals are materialized, and only because receipt items
//! are immutable snapshots frozen at creation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::money::Money;

// =============================================================================
// Record Stamp
// =============================================================================

/// Identity and timestamp assigned to every record at creation.
///
/// IDs and timestamps come from the application, never from the store,
/// so records are complete values before the first write and chat
/// messages can be published before they are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecordStamp {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Creation instant, also the initial updated_at.
    #[ts(as = "String")]
    pub at: DateTime<Utc>,
}

impl RecordStamp {
    /// Mints a fresh stamp: new UUID v4, current UTC instant.
    pub fn mint() -> Self {
        RecordStamp {
            id: Uuid::new_v4().to_string(),
            at: Utc::now(),
        }
    }

    /// Builds a stamp from known parts (inbound records arrive stamped).
    pub fn with(id: impl Into<String>, at: DateTime<Utc>) -> Self {
        RecordStamp { id: id.into(), at }
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A shop customer. Receipts, payments, and credits reference the
/// customer by id; the reverse links are queries, not stored lists.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown in lists and on shared receipts.
    pub name: String,

    /// Mobile number, also the customer's chat identity.
    pub mobile: String,

    /// Free-form note (address, nickname, anything).
    pub note: Option<String>,

    /// Whether the customer is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale. Stock is adjusted only through
/// additive inventory entries, never set directly.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown on receipts.
    pub name: String,

    /// Stock Keeping Unit - business identifier, unique per shop.
    pub sku: String,

    /// Unit price in the smallest currency unit.
    pub price_cents: i64,

    /// Current stock level (sum of all inventory deltas).
    pub quantity_on_hand: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the unit price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether the requested quantity is on hand.
    #[inline]
    pub fn has_stock(&self, quantity: i64) -> bool {
        self.quantity_on_hand >= quantity
    }
}

// =============================================================================
// Payment Method & Kind
// =============================================================================

/// How a payment was tendered.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on an external terminal.
    Card,
    /// Mobile wallet transfer (JazzCash, Easypaisa, etc.).
    Wallet,
    /// Anything else (bank transfer, barter, adjustment).
    Other,
}

/// What a payment settles.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    /// Settles (part of) a receipt at the counter.
    Receipt,
    /// Repays (part of) an outstanding credit.
    Repayment,
}

// =============================================================================
// Settlement
// =============================================================================

/// Settlement state of a receipt, always derived from its payments.
///
/// Never stored: computing it on read is what keeps a cancelled or
/// late-paid receipt from showing a stale badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    /// Paid in full (paid >= total).
    Paid,
    /// Partially paid (0 < paid < total).
    Partial,
    /// Nothing paid yet.
    Unpaid,
    /// Receipt was cancelled; amounts are ignored.
    Cancelled,
}

impl Default for Settlement {
    fn default() -> Self {
        Settlement::Unpaid
    }
}

// =============================================================================
// Receipt
// =============================================================================

/// A sale receipt. Owns its line items and payments; optionally linked
/// to one customer and one credit (the unpaid remainder).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Receipt {
    pub id: String,

    /// Customer this receipt belongs to, if any (walk-ins have none).
    pub customer_id: Option<String>,

    /// Grand total in the smallest currency unit.
    /// Recomputed from items inside the creating transaction; items are
    /// immutable snapshots, so the stored value cannot drift afterwards.
    pub total_cents: i64,

    /// Amount tendered at the counter.
    pub paid_cents: i64,

    /// Tax portion captured at sale time.
    pub tax_cents: i64,

    /// Remainder carried to the customer's credit ledger.
    pub credit_cents: i64,

    /// Whether the receipt was cancelled (soft void, kept for history).
    pub is_cancelled: bool,

    /// Business date the receipt was issued (local day, not UTC instant).
    #[ts(as = "String")]
    pub issued_on: NaiveDate,

    pub note: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Receipt {
    /// Returns the grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns the amount tendered as Money.
    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    /// Returns the credit remainder as Money.
    #[inline]
    pub fn credit(&self) -> Money {
        Money::from_cents(self.credit_cents)
    }
}

// =============================================================================
// Receipt Item
// =============================================================================

/// A line item on a receipt.
/// Uses the snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReceiptItem {
    pub id: String,
    pub receipt_id: String,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Unit price in the smallest currency unit at time of sale (frozen).
    pub price_cents: i64,
    /// Quantity sold.
    pub quantity: i64,
    /// Line total (price × quantity).
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl ReceiptItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment record: counter settlement or credit repayment.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub customer_id: Option<String>,
    pub receipt_id: Option<String>,
    pub credit_id: Option<String>,
    /// Amount paid in the smallest currency unit.
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub kind: PaymentKind,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Credit
// =============================================================================

/// An entry in the credit ledger (the "khata" itself).
///
/// Stores only what was borrowed and what has been repaid. The amount
/// left is derived on every read so it can never disagree with the
/// repayment history.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Credit {
    pub id: String,
    pub customer_id: Option<String>,
    /// Receipt this credit was carried from, if any.
    pub receipt_id: Option<String>,
    /// Original amount owed in the smallest currency unit.
    pub total_cents: i64,
    /// Sum of repayments recorded so far.
    pub paid_cents: i64,
    /// Date the customer promised to pay by (local day).
    #[ts(as = "String")]
    pub due_on: NaiveDate,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Credit {
    /// Returns the original amount as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns repayments so far as Money.
    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    /// Amount still owed, floored at zero.
    #[inline]
    pub fn amount_left(&self) -> Money {
        self.total().saturating_sub(self.paid())
    }

    /// Whether the credit is fully repaid.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.amount_left().is_zero()
    }

    /// Days past due as of `today` (zero when not yet due).
    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        (today - self.due_on).num_days().max(0)
    }
}

// =============================================================================
// Inventory Entry
// =============================================================================

/// An additive stock movement. Restocks are positive deltas, shrinkage
/// and corrections negative; stock on hand is the running sum.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryEntry {
    pub id: String,
    pub product_id: String,
    /// Signed stock delta applied by this entry.
    pub quantity_delta: i64,
    /// Optional purchase cost per unit, for margin reports.
    pub unit_cost_cents: Option<i64>,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Chat Records
// =============================================================================

/// A chat peer: a customer or supplier reachable over the signaling
/// broker. `channel_id` is the direct channel shared with them.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Contact {
    pub id: String,
    pub display_name: String,
    pub mobile: String,
    /// Broker channel for the direct conversation with this contact.
    pub channel_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Direct (1:1) or group conversation.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Direct,
    Group,
}

impl Default for ConversationKind {
    fn default() -> Self {
        ConversationKind::Direct
    }
}

/// A conversation thread bound to one broker channel.
///
/// Membership lives here as a JSON array in the store; group membership
/// changes go through the backend API, which is the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Conversation {
    pub id: String,
    /// Broker channel name, unique across conversations.
    pub channel: String,
    pub kind: ConversationKind,
    /// Group subject; unused for direct conversations.
    pub subject: Option<String>,
    /// Member identities (mobile numbers).
    pub member_ids: Vec<String>,
    /// Instant of the latest message or signal, for list ordering.
    #[ts(as = "String")]
    pub last_activity_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A chat message as stored locally.
///
/// `sent_at` is decoded from the broker's delivery token, so ordering
/// is by broker time, not local arrival order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Message {
    pub id: String,
    /// Broker channel the message was published on.
    pub channel: String,
    /// Sender identity (mobile number).
    pub author: String,
    pub body: String,
    /// Broker time, decoded from the delivery token.
    #[ts(as = "String")]
    pub sent_at: DateTime<Utc>,
    /// Raw delivery token, kept for history paging.
    pub delivery_token: Option<String>,
    pub is_read: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_stamp_mint_is_unique() {
        let a = RecordStamp::mint();
        let b = RecordStamp::mint();
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.len(), 36);
    }

    #[test]
    fn test_payment_method_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Wallet).unwrap(),
            "\"wallet\""
        );
        let parsed: PaymentMethod = serde_json::from_str("\"card\"").unwrap();
        assert_eq!(parsed, PaymentMethod::Card);
    }

    #[test]
    fn test_settlement_default() {
        assert_eq!(Settlement::default(), Settlement::Unpaid);
    }

    #[test]
    fn test_credit_amount_left_clamps() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let mut credit = Credit {
            id: "c1".to_string(),
            customer_id: None,
            receipt_id: None,
            total_cents: 5000,
            paid_cents: 1500,
            due_on: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            note: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(credit.amount_left().cents(), 3500);
        assert!(!credit.is_settled());

        credit.paid_cents = 6000;
        assert_eq!(credit.amount_left().cents(), 0);
        assert!(credit.is_settled());
    }

    #[test]
    fn test_credit_days_overdue() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let credit = Credit {
            id: "c1".to_string(),
            customer_id: None,
            receipt_id: None,
            total_cents: 5000,
            paid_cents: 0,
            due_on: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            note: None,
            created_at: now,
            updated_at: now,
        };
        let before = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let after = NaiveDate::from_ymd_opt(2024, 3, 13).unwrap();
        assert_eq!(credit.days_overdue(before), 0);
        assert_eq!(credit.days_overdue(after), 3);
    }

    #[test]
    fn test_product_has_stock() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let product = Product {
            id: "p1".to_string(),
            name: "Sugar 1kg".to_string(),
            sku: "SUGAR-1KG".to_string(),
            price_cents: 18000,
            quantity_on_hand: 10,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(product.has_stock(10));
        assert!(!product.has_stock(11));
        assert_eq!(product.price().cents(), 18000);
    }
}
