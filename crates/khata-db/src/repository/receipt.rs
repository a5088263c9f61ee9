//! # Receipt Repository
//!
//! Database operations for receipts, their line items, and payments.
//!
//! ## Receipt Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Receipt Lifecycle                                  │
//! │                                                                         │
//! │  1. CREATE (one transaction)                                           │
//! │     └── create() → receipt row (total recomputed from items)           │
//! │                  → item rows (line totals recomputed)                  │
//! │                  → stock decremented per line                          │
//! │                  → counter payment row when paid_cents > 0             │
//! │                                                                         │
//! │  2. SETTLE LATER (optional)                                            │
//! │     └── add_payment() → payment row + paid_cents bump                  │
//! │                                                                         │
//! │  3. CANCEL (optional)                                                  │
//! │     └── cancel() → is_cancelled = 1, stock restored per line           │
//! │         Payments are kept; settlement derives Cancelled regardless.    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals are materialized at creation because items are immutable
//! snapshots; everything else about a receipt's money state (settlement,
//! balances) is derived from payment rows on read.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::changes::{ChangeEvent, ChangeOp, Entity};
use crate::error::{StoreError, StoreResult};
use crate::query::ReceiptQuery;
use crate::writer::StoreWriter;
use khata_core::{
    aggregates, validation, CoreError, Payment, PaymentKind, PaymentMethod, Receipt, ReceiptItem,
    RecordStamp, ValidationError,
};

/// Repository for receipt database operations.
#[derive(Debug, Clone)]
pub struct ReceiptRepository {
    pool: SqlitePool,
}

impl ReceiptRepository {
    /// Creates a new ReceiptRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReceiptRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a receipt by ID.
    pub async fn get_by_id(&self, id: &str) -> StoreResult<Option<Receipt>> {
        let receipt = sqlx::query_as::<_, Receipt>(
            "SELECT id, customer_id, total_cents, paid_cents, tax_cents, credit_cents, \
             is_cancelled, issued_on, note, created_at, updated_at \
             FROM receipts WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(receipt)
    }

    /// Gets all items for a receipt, in insertion order.
    pub async fn items(&self, receipt_id: &str) -> StoreResult<Vec<ReceiptItem>> {
        let items = sqlx::query_as::<_, ReceiptItem>(
            "SELECT id, receipt_id, product_id, name_snapshot, sku_snapshot, \
             price_cents, quantity, total_cents, created_at \
             FROM receipt_items WHERE receipt_id = ?1 \
             ORDER BY created_at, id",
        )
        .bind(receipt_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets all payments recorded against a receipt, oldest first.
    pub async fn payments(&self, receipt_id: &str) -> StoreResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT id, customer_id, receipt_id, credit_id, amount_cents, \
             method, kind, note, created_at \
             FROM payments WHERE receipt_id = ?1 \
             ORDER BY created_at, id",
        )
        .bind(receipt_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Lists receipts matching a typed filter, newest first.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let today = db
    ///     .receipts()
    ///     .query(&ReceiptQuery::new().on(local_today))
    ///     .await?;
    /// ```
    pub async fn query(&self, filter: &ReceiptQuery) -> StoreResult<Vec<Receipt>> {
        let mut qb = filter.build();
        let receipts = qb
            .build_query_as::<Receipt>()
            .fetch_all(&self.pool)
            .await?;

        Ok(receipts)
    }

    /// Lists every receipt for a customer, cancelled included.
    ///
    /// The customer ledger view shows cancelled receipts struck through,
    /// so they are not filtered here.
    pub async fn receipts_for_customer(&self, customer_id: &str) -> StoreResult<Vec<Receipt>> {
        self.query(
            &ReceiptQuery::new()
                .for_customer(customer_id)
                .include_cancelled(),
        )
        .await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Creates a receipt with its line items.
    ///
    /// ## What This Does (single transaction)
    /// 1. Recomputes every line total (quantity × unit price) and the
    ///    receipt total from the lines; caller-provided totals are ignored
    /// 2. Checks and decrements stock for every line
    /// 3. Inserts the receipt and its items
    /// 4. When `paid_cents > 0`, records the counter tender as a cash
    ///    payment row (card/wallet tenders: create unpaid, then
    ///    `add_payment` in the same writer)
    ///
    /// ## Returns
    /// The stored receipt, with the recomputed `total_cents`.
    pub async fn create(
        &self,
        w: &mut StoreWriter,
        receipt: &Receipt,
        items: &[ReceiptItem],
    ) -> StoreResult<Receipt> {
        validation::validate_receipt_size(items.len()).map_err(CoreError::from)?;

        let total_cents = aggregates::items_total(items).cents();

        debug!(
            id = %receipt.id,
            items = items.len(),
            total_cents = total_cents,
            "Creating receipt"
        );

        let stored = Receipt {
            total_cents,
            ..receipt.clone()
        };

        sqlx::query(
            "INSERT INTO receipts (\
             id, customer_id, total_cents, paid_cents, tax_cents, credit_cents, \
             is_cancelled, issued_on, note, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&stored.id)
        .bind(&stored.customer_id)
        .bind(stored.total_cents)
        .bind(stored.paid_cents)
        .bind(stored.tax_cents)
        .bind(stored.credit_cents)
        .bind(stored.is_cancelled)
        .bind(stored.issued_on)
        .bind(&stored.note)
        .bind(stored.created_at)
        .bind(stored.updated_at)
        .execute(w.conn())
        .await?;

        for item in items {
            self.insert_item(w, &stored.id, item).await?;
        }

        if stored.paid_cents > 0 {
            let stamp = RecordStamp::mint();
            let tender = Payment {
                id: stamp.id,
                customer_id: stored.customer_id.clone(),
                receipt_id: Some(stored.id.clone()),
                credit_id: None,
                amount_cents: stored.paid_cents,
                method: PaymentMethod::Cash,
                kind: PaymentKind::Receipt,
                note: None,
                created_at: stamp.at,
            };
            self.insert_payment_row(w, &tender).await?;
        }

        w.stage(ChangeEvent::new(Entity::Receipt, &stored.id, ChangeOp::Created));
        Ok(stored)
    }

    /// Records a payment against a receipt and bumps its paid total.
    ///
    /// ## Rules
    /// - Amount must be positive
    /// - Receipt must exist and not be cancelled
    /// - Credit repayments go through `CreditRepository::record_repayment`
    pub async fn add_payment(&self, w: &mut StoreWriter, payment: &Payment) -> StoreResult<()> {
        validation::validate_payment_amount(payment.amount_cents).map_err(CoreError::from)?;

        if payment.kind != PaymentKind::Receipt {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "credit repayments go through record_repayment".to_string(),
            }
            .into());
        }

        let receipt_id = payment.receipt_id.as_deref().ok_or_else(|| {
            CoreError::Validation(ValidationError::Required {
                field: "receipt_id".to_string(),
            })
        })?;

        debug!(
            receipt_id = %receipt_id,
            amount_cents = payment.amount_cents,
            "Recording receipt payment"
        );

        let cancelled: Option<bool> =
            sqlx::query_scalar("SELECT is_cancelled FROM receipts WHERE id = ?1")
                .bind(receipt_id)
                .fetch_optional(w.conn())
                .await?;

        match cancelled {
            None => return Err(StoreError::not_found("Receipt", receipt_id)),
            Some(true) => return Err(CoreError::ReceiptCancelled(receipt_id.to_string()).into()),
            Some(false) => {}
        }

        self.insert_payment_row(w, payment).await?;

        let now = Utc::now();
        sqlx::query(
            "UPDATE receipts SET paid_cents = paid_cents + ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(receipt_id)
        .bind(payment.amount_cents)
        .bind(now)
        .execute(w.conn())
        .await?;

        w.stage(ChangeEvent::new(Entity::Receipt, receipt_id, ChangeOp::Updated));
        Ok(())
    }

    /// Cancels a receipt and restores the stock its lines consumed.
    ///
    /// Payments already recorded are kept for history; settlement derives
    /// Cancelled regardless of amounts from the moment this commits.
    pub async fn cancel(&self, w: &mut StoreWriter, id: &str) -> StoreResult<()> {
        debug!(id = %id, "Cancelling receipt");

        let cancelled: Option<bool> =
            sqlx::query_scalar("SELECT is_cancelled FROM receipts WHERE id = ?1")
                .bind(id)
                .fetch_optional(w.conn())
                .await?;

        match cancelled {
            None => return Err(StoreError::not_found("Receipt", id)),
            Some(true) => return Err(CoreError::ReceiptCancelled(id.to_string()).into()),
            Some(false) => {}
        }

        let lines: Vec<(String, i64)> =
            sqlx::query_as("SELECT product_id, quantity FROM receipt_items WHERE receipt_id = ?1")
                .bind(id)
                .fetch_all(w.conn())
                .await?;

        let now = Utc::now();

        for (product_id, quantity) in &lines {
            sqlx::query(
                "UPDATE products \
                 SET quantity_on_hand = quantity_on_hand + ?2, updated_at = ?3 \
                 WHERE id = ?1",
            )
            .bind(product_id)
            .bind(quantity)
            .bind(now)
            .execute(w.conn())
            .await?;

            w.stage(ChangeEvent::new(Entity::Product, product_id, ChangeOp::Updated));
        }

        sqlx::query("UPDATE receipts SET is_cancelled = 1, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(w.conn())
            .await?;

        w.stage(ChangeEvent::new(Entity::Receipt, id, ChangeOp::Updated));
        Ok(())
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    /// Inserts one line item and decrements its product's stock.
    async fn insert_item(
        &self,
        w: &mut StoreWriter,
        receipt_id: &str,
        item: &ReceiptItem,
    ) -> StoreResult<()> {
        validation::validate_quantity(item.quantity).map_err(CoreError::from)?;

        let available: Option<i64> =
            sqlx::query_scalar("SELECT quantity_on_hand FROM products WHERE id = ?1")
                .bind(&item.product_id)
                .fetch_optional(w.conn())
                .await?;

        let available = available.ok_or_else(|| StoreError::not_found("Product", &item.product_id))?;

        if available < item.quantity {
            return Err(CoreError::InsufficientStock {
                sku: item.sku_snapshot.clone(),
                available,
                requested: item.quantity,
            }
            .into());
        }

        // Line total always recomputed from the frozen unit price
        let line_total = item.price_cents * item.quantity;

        sqlx::query(
            "INSERT INTO receipt_items (\
             id, receipt_id, product_id, name_snapshot, sku_snapshot, \
             price_cents, quantity, total_cents, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&item.id)
        .bind(receipt_id)
        .bind(&item.product_id)
        .bind(&item.name_snapshot)
        .bind(&item.sku_snapshot)
        .bind(item.price_cents)
        .bind(item.quantity)
        .bind(line_total)
        .bind(item.created_at)
        .execute(w.conn())
        .await?;

        let now = Utc::now();
        sqlx::query(
            "UPDATE products \
             SET quantity_on_hand = quantity_on_hand - ?2, updated_at = ?3 \
             WHERE id = ?1",
        )
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(now)
        .execute(w.conn())
        .await?;

        w.stage(ChangeEvent::new(
            Entity::Product,
            &item.product_id,
            ChangeOp::Updated,
        ));
        Ok(())
    }

    /// Inserts a raw payment row and stages its event.
    async fn insert_payment_row(&self, w: &mut StoreWriter, payment: &Payment) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO payments (\
             id, customer_id, receipt_id, credit_id, amount_cents, \
             method, kind, note, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&payment.id)
        .bind(&payment.customer_id)
        .bind(&payment.receipt_id)
        .bind(&payment.credit_id)
        .bind(payment.amount_cents)
        .bind(payment.method)
        .bind(payment.kind)
        .bind(&payment.note)
        .bind(payment.created_at)
        .execute(w.conn())
        .await?;

        w.stage(ChangeEvent::new(
            Entity::Payment,
            &payment.id,
            ChangeOp::Created,
        ));
        Ok(())
    }
}
