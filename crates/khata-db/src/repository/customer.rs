//! # Customer Repository
//!
//! Database operations for customers.
//!
//! Customers are soft-deleted: receipts, payments and credit ledgers keep
//! referencing a deactivated customer, and listings filter on `is_active`.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::changes::{ChangeEvent, ChangeOp, Entity};
use crate::error::{StoreError, StoreResult};
use crate::writer::StoreWriter;
use khata_core::Customer;

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> StoreResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, name, mobile, note, is_active, created_at, updated_at \
             FROM customers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Lists all active customers, name order.
    pub async fn list_active(&self) -> StoreResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            "SELECT id, name, mobile, note, is_active, created_at, updated_at \
             FROM customers WHERE is_active = 1 \
             ORDER BY name COLLATE NOCASE",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Searches active customers by name or mobile number.
    ///
    /// ## Matching
    /// Case-insensitive substring on `name`, plain substring on `mobile`.
    pub async fn search(&self, query: &str, limit: u32) -> StoreResult<Vec<Customer>> {
        let pattern = format!("%{}%", query.trim());

        let customers = sqlx::query_as::<_, Customer>(
            "SELECT id, name, mobile, note, is_active, created_at, updated_at \
             FROM customers \
             WHERE is_active = 1 AND (name LIKE ?1 OR mobile LIKE ?1) \
             ORDER BY name COLLATE NOCASE LIMIT ?2",
        )
        .bind(pattern)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Counts active customers (for diagnostics).
    pub async fn count(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts a customer.
    ///
    /// Fails with `UniqueViolation` when the mobile number is already taken.
    pub async fn insert(&self, w: &mut StoreWriter, customer: &Customer) -> StoreResult<()> {
        debug!(id = %customer.id, name = %customer.name, "Inserting customer");

        sqlx::query(
            "INSERT INTO customers (id, name, mobile, note, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.mobile)
        .bind(&customer.note)
        .bind(customer.is_active)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(w.conn())
        .await?;

        w.stage(ChangeEvent::new(
            Entity::Customer,
            &customer.id,
            ChangeOp::Created,
        ));
        Ok(())
    }

    /// Updates a customer's editable fields (name, mobile, note).
    pub async fn update(&self, w: &mut StoreWriter, customer: &Customer) -> StoreResult<()> {
        debug!(id = %customer.id, "Updating customer");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE customers SET name = ?2, mobile = ?3, note = ?4, updated_at = ?5 \
             WHERE id = ?1",
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.mobile)
        .bind(&customer.note)
        .bind(now)
        .execute(w.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Customer", &customer.id));
        }

        w.stage(ChangeEvent::new(
            Entity::Customer,
            &customer.id,
            ChangeOp::Updated,
        ));
        Ok(())
    }

    /// Soft-deletes a customer by setting is_active = false.
    ///
    /// ## Why Soft Delete?
    /// - Historical receipts and credit ledgers still reference the customer
    /// - Can be restored if deleted by mistake
    pub async fn soft_delete(&self, w: &mut StoreWriter, id: &str) -> StoreResult<()> {
        debug!(id = %id, "Soft-deleting customer");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE customers SET is_active = 0, updated_at = ?2 \
             WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(now)
        .execute(w.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Customer", id));
        }

        w.stage(ChangeEvent::new(Entity::Customer, id, ChangeOp::Deleted));
        Ok(())
    }
}
