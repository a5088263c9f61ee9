//! # Credit Repository
//!
//! Database operations for the credit ledger (the khata itself) and the
//! reminder dedup log.
//!
//! ## Ledger Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  credits row:    total_cents  (what was borrowed, fixed at open)       │
//! │                  paid_cents   (sum of repayments, bumped per payment)  │
//! │                                                                         │
//! │  amount left =   total - paid, clamped at zero, derived on read        │
//! │                                                                         │
//! │  record_repayment() inserts the payment row AND bumps paid_cents in    │
//! │  one transaction, rejecting amounts above the remaining balance        │
//! │  (overshoot must be an explicit correction, not a typo).               │
//! │                                                                         │
//! │  credit_reminders PK (credit_id, reminded_on) makes "remind once per   │
//! │  day" a constraint, not a convention: try_mark_reminded() returns      │
//! │  true for exactly one caller per credit per local day.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::changes::{ChangeEvent, ChangeOp, Entity};
use crate::error::{StoreError, StoreResult};
use crate::writer::StoreWriter;
use khata_core::{
    aggregates, validation, CoreError, Credit, Money, Payment, PaymentKind, ValidationError,
};

/// Repository for credit ledger operations.
#[derive(Debug, Clone)]
pub struct CreditRepository {
    pool: SqlitePool,
}

impl CreditRepository {
    /// Creates a new CreditRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CreditRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a credit by ID.
    pub async fn get_by_id(&self, id: &str) -> StoreResult<Option<Credit>> {
        let credit = sqlx::query_as::<_, Credit>(
            "SELECT id, customer_id, receipt_id, total_cents, paid_cents, \
             due_on, note, created_at, updated_at \
             FROM credits WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credit)
    }

    /// Lists a customer's open credits (not fully repaid), oldest due first.
    pub async fn outstanding_for_customer(&self, customer_id: &str) -> StoreResult<Vec<Credit>> {
        let credits = sqlx::query_as::<_, Credit>(
            "SELECT id, customer_id, receipt_id, total_cents, paid_cents, \
             due_on, note, created_at, updated_at \
             FROM credits \
             WHERE customer_id = ?1 AND paid_cents < total_cents \
             ORDER BY due_on, created_at",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(credits)
    }

    /// Lists open credits due on or before `horizon` (past due included),
    /// oldest due first.
    ///
    /// ## Usage
    /// The reminder scanner calls this with `today + window_days`.
    pub async fn due_within(&self, horizon: NaiveDate) -> StoreResult<Vec<Credit>> {
        let credits = sqlx::query_as::<_, Credit>(
            "SELECT id, customer_id, receipt_id, total_cents, paid_cents, \
             due_on, note, created_at, updated_at \
             FROM credits \
             WHERE paid_cents < total_cents AND due_on <= ?1 \
             ORDER BY due_on, created_at",
        )
        .bind(horizon)
        .fetch_all(&self.pool)
        .await?;

        Ok(credits)
    }

    /// Gets all repayments recorded against a credit, oldest first.
    pub async fn repayments(&self, credit_id: &str) -> StoreResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT id, customer_id, receipt_id, credit_id, amount_cents, \
             method, kind, note, created_at \
             FROM payments WHERE credit_id = ?1 \
             ORDER BY created_at, id",
        )
        .bind(credit_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Checks whether a reminder was already sent for a credit on a day.
    pub async fn was_reminded(&self, credit_id: &str, day: NaiveDate) -> StoreResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM credit_reminders WHERE credit_id = ?1 AND reminded_on = ?2",
        )
        .bind(credit_id)
        .bind(day)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Opens a credit ledger entry, optionally carried from a receipt.
    pub async fn open(&self, w: &mut StoreWriter, credit: &Credit) -> StoreResult<()> {
        if credit.total_cents <= 0 {
            return Err(CoreError::Validation(ValidationError::MustBePositive {
                field: "total_cents".to_string(),
            })
            .into());
        }

        debug!(
            id = %credit.id,
            total_cents = credit.total_cents,
            due_on = %credit.due_on,
            "Opening credit"
        );

        sqlx::query(
            "INSERT INTO credits (\
             id, customer_id, receipt_id, total_cents, paid_cents, \
             due_on, note, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&credit.id)
        .bind(&credit.customer_id)
        .bind(&credit.receipt_id)
        .bind(credit.total_cents)
        .bind(credit.paid_cents)
        .bind(credit.due_on)
        .bind(&credit.note)
        .bind(credit.created_at)
        .bind(credit.updated_at)
        .execute(w.conn())
        .await?;

        w.stage(ChangeEvent::new(Entity::Credit, &credit.id, ChangeOp::Created));
        Ok(())
    }

    /// Records a repayment: payment row plus paid_cents bump, same
    /// transaction.
    ///
    /// ## Rules
    /// - Amount must be positive
    /// - Payment kind must be `Repayment` with `credit_id` set
    /// - Amount must not exceed the remaining balance
    pub async fn record_repayment(&self, w: &mut StoreWriter, payment: &Payment) -> StoreResult<()> {
        validation::validate_payment_amount(payment.amount_cents).map_err(CoreError::from)?;

        if payment.kind != PaymentKind::Repayment {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "receipt settlements go through add_payment".to_string(),
            }
            .into());
        }

        let credit_id = payment.credit_id.as_deref().ok_or_else(|| {
            CoreError::Validation(ValidationError::Required {
                field: "credit_id".to_string(),
            })
        })?;

        debug!(
            credit_id = %credit_id,
            amount_cents = payment.amount_cents,
            "Recording repayment"
        );

        let amounts: Option<(i64, i64)> =
            sqlx::query_as("SELECT total_cents, paid_cents FROM credits WHERE id = ?1")
                .bind(credit_id)
                .fetch_optional(w.conn())
                .await?;

        let (total_cents, paid_cents) =
            amounts.ok_or_else(|| StoreError::not_found("Credit", credit_id))?;

        let balance = aggregates::credit_amount_left(
            Money::from_cents(total_cents),
            Money::from_cents(paid_cents),
        );

        if payment.amount_cents > balance.cents() {
            return Err(CoreError::RepaymentExceedsBalance {
                credit_id: credit_id.to_string(),
                balance_cents: balance.cents(),
                amount_cents: payment.amount_cents,
            }
            .into());
        }

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

        let now = Utc::now();
        sqlx::query(
            "UPDATE credits SET paid_cents = paid_cents + ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(credit_id)
        .bind(payment.amount_cents)
        .bind(now)
        .execute(w.conn())
        .await?;

        w.stage(ChangeEvent::new(Entity::Payment, &payment.id, ChangeOp::Created));
        w.stage(ChangeEvent::new(Entity::Credit, credit_id, ChangeOp::Updated));
        Ok(())
    }

    /// Marks a credit as reminded for a day; returns whether this call
    /// won the mark.
    ///
    /// ## Exactly Once
    /// `INSERT OR IGNORE` against the (credit_id, reminded_on) primary key
    /// means exactly one caller per credit per day sees `true`. Notify
    /// only after the writer commits, so a rolled-back mark never
    /// suppresses a later one.
    ///
    /// No change event is staged: the reminder log is scanner
    /// bookkeeping, not displayed data.
    pub async fn try_mark_reminded(
        &self,
        w: &mut StoreWriter,
        credit_id: &str,
        reminded_on: NaiveDate,
    ) -> StoreResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT OR IGNORE INTO credit_reminders (credit_id, reminded_on, created_at) \
             VALUES (?1, ?2, ?3)",
        )
        .bind(credit_id)
        .bind(reminded_on)
        .bind(now)
        .execute(w.conn())
        .await?;

        let won = result.rows_affected() == 1;
        debug!(credit_id = %credit_id, reminded_on = %reminded_on, won = won, "Reminder mark");

        Ok(won)
    }
}
