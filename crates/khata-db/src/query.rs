//! # Typed Queries
//!
//! Filter builders for receipt and message listings.
//!
//! ## Why Typed Filters?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ❌ WRONG: caller-assembled filter strings                              │
//! │     list_receipts("customer_id = '" + id + "' AND day = ...")          │
//! │     (injection-prone, typo'd column names fail at runtime)             │
//! │                                                                         │
//! │  ✅ CORRECT: typed predicates compiled to bound parameters              │
//! │     ReceiptQuery::new().for_customer(id).on(day).limit(20)             │
//! │     → SELECT ... WHERE customer_id = ?1 AND issued_on = ?2 LIMIT ?3    │
//! │                                                                         │
//! │  Every value reaches SQLite as a bind parameter, never by string       │
//! │  interpolation.                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite};

/// Default page size for listings.
const DEFAULT_LIMIT: u32 = 100;

/// Default page size for message history.
const DEFAULT_MESSAGE_LIMIT: u32 = 50;

// =============================================================================
// Receipt Query
// =============================================================================

/// Filter set for receipt listings.
///
/// ## Example
/// ```rust,ignore
/// // Today's receipts for one customer, cancelled excluded (default)
/// let q = ReceiptQuery::new().for_customer(&customer.id).on(today);
/// let receipts = db.receipts().query(&q).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReceiptQuery {
    customer_id: Option<String>,
    day: Option<NaiveDate>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    include_cancelled: bool,
    limit: Option<u32>,
}

impl ReceiptQuery {
    /// New query: all receipts, cancelled excluded, newest first.
    pub fn new() -> Self {
        ReceiptQuery::default()
    }

    /// Restricts to one customer.
    pub fn for_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    /// Restricts to one business day.
    pub fn on(mut self, day: NaiveDate) -> Self {
        self.day = Some(day);
        self
    }

    /// Restricts to an inclusive date range.
    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Includes cancelled receipts (excluded by default).
    pub fn include_cancelled(mut self) -> Self {
        self.include_cancelled = true;
        self
    }

    /// Caps the number of rows returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Compiles the filter set to SQL with bound parameters.
    pub(crate) fn build(&self) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(
            "SELECT id, customer_id, total_cents, paid_cents, tax_cents, credit_cents, \
             is_cancelled, issued_on, note, created_at, updated_at \
             FROM receipts WHERE 1=1",
        );

        if !self.include_cancelled {
            qb.push(" AND is_cancelled = 0");
        }

        if let Some(customer_id) = &self.customer_id {
            qb.push(" AND customer_id = ").push_bind(customer_id.clone());
        }

        if let Some(day) = self.day {
            qb.push(" AND issued_on = ").push_bind(day);
        }

        if let Some(from) = self.from {
            qb.push(" AND issued_on >= ").push_bind(from);
        }

        if let Some(to) = self.to {
            qb.push(" AND issued_on <= ").push_bind(to);
        }

        qb.push(" ORDER BY issued_on DESC, created_at DESC");
        qb.push(" LIMIT ")
            .push_bind(i64::from(self.limit.unwrap_or(DEFAULT_LIMIT)));

        qb
    }
}

// =============================================================================
// Message Query
// =============================================================================

/// Filter set for message history, always newest first.
///
/// ## Example
/// ```rust,ignore
/// // Latest page of a conversation
/// let q = MessageQuery::channel(&convo.channel);
/// let page = db.chat().messages(&q).await?;
///
/// // Next page: everything strictly before the oldest loaded message
/// let older = MessageQuery::channel(&convo.channel)
///     .before(page.last().unwrap().sent_at);
/// ```
#[derive(Debug, Clone)]
pub struct MessageQuery {
    channel: String,
    before: Option<DateTime<Utc>>,
    unread_only: bool,
    limit: Option<u32>,
}

impl MessageQuery {
    /// New query over one conversation channel.
    pub fn channel(channel: impl Into<String>) -> Self {
        MessageQuery {
            channel: channel.into(),
            before: None,
            unread_only: false,
            limit: None,
        }
    }

    /// Only messages sent strictly before the given instant (paging).
    pub fn before(mut self, at: DateTime<Utc>) -> Self {
        self.before = Some(at);
        self
    }

    /// Only unread messages.
    pub fn unread_only(mut self) -> Self {
        self.unread_only = true;
        self
    }

    /// Caps the number of rows returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Compiles the filter set to SQL with bound parameters.
    pub(crate) fn build(&self) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(
            "SELECT id, channel, author, body, sent_at, delivery_token, is_read, created_at \
             FROM messages WHERE channel = ",
        );
        qb.push_bind(self.channel.clone());

        if let Some(before) = self.before {
            qb.push(" AND sent_at < ").push_bind(before);
        }

        if self.unread_only {
            qb.push(" AND is_read = 0");
        }

        // Newest first; id breaks ties from same-tick history backfill
        qb.push(" ORDER BY sent_at DESC, id DESC");
        qb.push(" LIMIT ")
            .push_bind(i64::from(self.limit.unwrap_or(DEFAULT_MESSAGE_LIMIT)));

        qb
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_query_excludes_cancelled_by_default() {
        let sql_default = ReceiptQuery::new().build().into_sql();
        assert!(sql_default.contains("is_cancelled = 0"));

        let sql_all = ReceiptQuery::new().include_cancelled().build().into_sql();
        assert!(!sql_all.contains("is_cancelled = 0"));
    }

    #[test]
    fn test_receipt_query_binds_filters() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let sql = ReceiptQuery::new()
            .for_customer("c1")
            .on(day)
            .limit(10)
            .build()
            .into_sql();

        // Filters appear as bind placeholders, never as literals
        assert!(sql.contains("customer_id = ?"));
        assert!(sql.contains("issued_on = ?"));
        assert!(!sql.contains("c1"));
        assert!(!sql.contains("2024"));
    }

    #[test]
    fn test_receipt_query_range() {
        let from = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let sql = ReceiptQuery::new().between(from, to).build().into_sql();

        assert!(sql.contains("issued_on >= ?"));
        assert!(sql.contains("issued_on <= ?"));
    }

    #[test]
    fn test_message_query_orders_newest_first() {
        let sql = MessageQuery::channel("ch.1").build().into_sql();
        assert!(sql.contains("ORDER BY sent_at DESC, id DESC"));
        assert!(sql.contains("channel = ?"));
        assert!(!sql.contains("ch.1"));
    }

    #[test]
    fn test_message_query_paging_and_unread() {
        let sql = MessageQuery::channel("ch.1")
            .before(chrono::Utc::now())
            .unread_only()
            .limit(20)
            .build()
            .into_sql();

        assert!(sql.contains("sent_at < ?"));
        assert!(sql.contains("is_read = 0"));
    }
}
