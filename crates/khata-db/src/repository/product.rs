//! # Product Repository
//!
//! Database operations for products and inventory entries.
//!
//! ## Stock Is a Running Sum
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  inventory_entries (append-only)        products.quantity_on_hand       │
//! │                                                                         │
//! │   +10  restock              ──────►        10                           │
//! │    +5  restock              ──────►        15                           │
//! │    -2  shrinkage            ──────►        13                           │
//! │                                                                         │
//! │  record_inventory_entry() inserts the entry AND applies its delta,     │
//! │  exactly once, inside the caller's transaction. Replaying all          │
//! │  entries from zero must reproduce quantity_on_hand.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::changes::{ChangeEvent, ChangeOp, Entity};
use crate::error::{StoreError, StoreResult};
use crate::writer::StoreWriter;
use khata_core::{InventoryEntry, Product};

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, sku, price_cents, quantity_on_hand, is_active, \
             created_at, updated_at \
             FROM products WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by SKU (exact match).
    pub async fn get_by_sku(&self, sku: &str) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, sku, price_cents, quantity_on_hand, is_active, \
             created_at, updated_at \
             FROM products WHERE sku = ?1",
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists all active products, name order.
    pub async fn list_active(&self) -> StoreResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT id, name, sku, price_cents, quantity_on_hand, is_active, \
             created_at, updated_at \
             FROM products WHERE is_active = 1 \
             ORDER BY name COLLATE NOCASE",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Searches active products by name or SKU.
    pub async fn search(&self, query: &str, limit: u32) -> StoreResult<Vec<Product>> {
        let pattern = format!("%{}%", query.trim());

        let products = sqlx::query_as::<_, Product>(
            "SELECT id, name, sku, price_cents, quantity_on_hand, is_active, \
             created_at, updated_at \
             FROM products \
             WHERE is_active = 1 AND (name LIKE ?1 OR sku LIKE ?1) \
             ORDER BY name COLLATE NOCASE LIMIT ?2",
        )
        .bind(pattern)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists the inventory entries for a product, newest first.
    pub async fn entries_for_product(&self, product_id: &str) -> StoreResult<Vec<InventoryEntry>> {
        let entries = sqlx::query_as::<_, InventoryEntry>(
            "SELECT id, product_id, quantity_delta, unit_cost_cents, note, created_at \
             FROM inventory_entries WHERE product_id = ?1 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts a product.
    ///
    /// Fails with `UniqueViolation` when the SKU is already taken.
    pub async fn insert(&self, w: &mut StoreWriter, product: &Product) -> StoreResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            "INSERT INTO products \
             (id, name, sku, price_cents, quantity_on_hand, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.price_cents)
        .bind(product.quantity_on_hand)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(w.conn())
        .await?;

        w.stage(ChangeEvent::new(
            Entity::Product,
            &product.id,
            ChangeOp::Created,
        ));
        Ok(())
    }

    /// Updates a product's editable fields (name, sku, price).
    ///
    /// Stock is deliberately not updatable here; it only moves through
    /// inventory entries and receipt lines.
    pub async fn update(&self, w: &mut StoreWriter, product: &Product) -> StoreResult<()> {
        debug!(id = %product.id, "Updating product");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET name = ?2, sku = ?3, price_cents = ?4, updated_at = ?5 \
             WHERE id = ?1",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.price_cents)
        .bind(now)
        .execute(w.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", &product.id));
        }

        w.stage(ChangeEvent::new(
            Entity::Product,
            &product.id,
            ChangeOp::Updated,
        ));
        Ok(())
    }

    /// Applies a signed stock delta to a product.
    ///
    /// ## Arguments
    /// * `delta` - Positive to add stock, negative to remove
    pub async fn adjust_stock(&self, w: &mut StoreWriter, id: &str, delta: i64) -> StoreResult<()> {
        debug!(id = %id, delta = %delta, "Adjusting stock");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products \
             SET quantity_on_hand = quantity_on_hand + ?2, updated_at = ?3 \
             WHERE id = ?1",
        )
        .bind(id)
        .bind(delta)
        .bind(now)
        .execute(w.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", id));
        }

        w.stage(ChangeEvent::new(Entity::Product, id, ChangeOp::Updated));
        Ok(())
    }

    /// Records an inventory entry and applies its delta to the product.
    ///
    /// ## Exactly Once
    /// The entry row and the stock adjustment land in the same transaction,
    /// so an entry can never be recorded without moving stock, nor stock
    /// moved twice for one entry.
    pub async fn record_inventory_entry(
        &self,
        w: &mut StoreWriter,
        entry: &InventoryEntry,
    ) -> StoreResult<()> {
        debug!(
            id = %entry.id,
            product_id = %entry.product_id,
            delta = %entry.quantity_delta,
            "Recording inventory entry"
        );

        sqlx::query(
            "INSERT INTO inventory_entries \
             (id, product_id, quantity_delta, unit_cost_cents, note, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&entry.id)
        .bind(&entry.product_id)
        .bind(entry.quantity_delta)
        .bind(entry.unit_cost_cents)
        .bind(&entry.note)
        .bind(entry.created_at)
        .execute(w.conn())
        .await?;

        self.adjust_stock(w, &entry.product_id, entry.quantity_delta)
            .await?;

        w.stage(ChangeEvent::new(
            Entity::InventoryEntry,
            &entry.id,
            ChangeOp::Created,
        ));
        Ok(())
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// ## Why Soft Delete?
    /// - Historical receipt items still reference this product
    /// - Can be restored if deleted by mistake
    pub async fn soft_delete(&self, w: &mut StoreWriter, id: &str) -> StoreResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?2 \
             WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(now)
        .execute(w.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", id));
        }

        w.stage(ChangeEvent::new(Entity::Product, id, ChangeOp::Deleted));
        Ok(())
    }
}
