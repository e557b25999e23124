//! # Product Repository
//!
//! Database operations for the product catalog, including the stock writes a
//! completing sale needs.
//!
//! ## Stock Debits
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 Completion-Time Stock Update                        │
//! │                                                                     │
//! │  ❌ Read-then-write loses races between registers:                  │
//! │     SELECT stock ... ; UPDATE products SET stock = 7                │
//! │                                                                     │
//! │  ✅ Conditional decrement is atomic per product:                    │
//! │     UPDATE products SET stock = stock - 3                           │
//! │     WHERE id = ? AND stock >= 3                                     │
//! │                                                                     │
//! │  Zero rows affected means the shelf emptied since the line was      │
//! │  scanned. The whole batch runs in one transaction, so a shortfall   │
//! │  on any product rolls back every earlier decrement.                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use till_core::Product;
use till_engine::{CatalogStore, StockDebit, StockDebitOutcome, StorageError};

use crate::error::{DbError, DbResult};

/// Repository for product catalog operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets an active product by its barcode.
    ///
    /// Deactivated products are invisible here: a register can no longer
    /// scan them onto a sale.
    pub async fn find_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, barcode, name, description, price_cents, stock,
                   is_active, created_at, updated_at, version
            FROM products
            WHERE barcode = ?1 AND is_active = 1
            "#,
        )
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its ID, active or not.
    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, barcode, name, description, price_cents, stock,
                   is_active, created_at, updated_at, version
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, barcode, name, description, price_cents, stock,
                   is_active, created_at, updated_at, version
            FROM products
            WHERE is_active = 1
            ORDER BY name
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// Fails with `DbError::UniqueViolation` if the barcode is taken.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(barcode = %product.barcode, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, barcode, name, description, price_cents, stock,
                is_active, created_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(product.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates an existing product.
    ///
    /// The write applies only if the stored version equals
    /// `product.version`; a stale version fails with
    /// `DbError::StaleVersion` and writes nothing.
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                barcode = ?2,
                name = ?3,
                description = ?4,
                price_cents = ?5,
                stock = ?6,
                is_active = ?7,
                updated_at = ?8,
                version = version + 1
            WHERE id = ?1 AND version = ?9
            "#,
        )
        .bind(&product.id)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(Utc::now())
        .bind(product.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return if self.find_by_id(&product.id).await?.is_some() {
                Err(DbError::stale("Product", &product.id))
            } else {
                Err(DbError::not_found("Product", &product.id))
            };
        }

        Ok(())
    }

    /// Conditionally decrements stock for every debit, all-or-nothing.
    ///
    /// Runs inside one transaction; a shortfall on any product rolls the
    /// whole batch back and reports that product with its current stock.
    pub async fn debit_stock(&self, debits: &[StockDebit]) -> DbResult<StockDebitOutcome> {
        let mut tx = self.pool.begin().await?;

        for debit in debits {
            let result = sqlx::query(
                r#"
                UPDATE products SET
                    stock = stock - ?2,
                    updated_at = ?3,
                    version = version + 1
                WHERE id = ?1 AND stock >= ?2
                "#,
            )
            .bind(&debit.product_id)
            .bind(debit.quantity)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                let shelf: Option<(String, i64)> =
                    sqlx::query_as("SELECT name, stock FROM products WHERE id = ?1")
                        .bind(&debit.product_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                tx.rollback().await?;

                return match shelf {
                    Some((name, stock)) => {
                        debug!(
                            product_id = %debit.product_id,
                            available = stock,
                            requested = debit.quantity,
                            "Stock debit refused"
                        );
                        Ok(StockDebitOutcome::Insufficient {
                            product_id: debit.product_id.clone(),
                            name,
                            available: stock,
                            requested: debit.quantity,
                        })
                    }
                    None => Err(DbError::not_found("Product", &debit.product_id)),
                };
            }
        }

        tx.commit().await?;
        Ok(StockDebitOutcome::Applied)
    }

    /// Unconditionally adds stock back (reversal of a debit).
    pub async fn credit_stock(&self, credits: &[StockDebit]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        for credit in credits {
            let result = sqlx::query(
                r#"
                UPDATE products SET
                    stock = stock + ?2,
                    updated_at = ?3,
                    version = version + 1
                WHERE id = ?1
                "#,
            )
            .bind(&credit.product_id)
            .bind(credit.quantity)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(DbError::not_found("Product", &credit.product_id));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Soft-deletes a product. Historical sale lines keep referencing it.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                is_active = 0,
                updated_at = ?2,
                version = version + 1
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics and seeding).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// CatalogStore implementation
// =============================================================================

#[async_trait]
impl CatalogStore for ProductRepository {
    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StorageError> {
        Ok(ProductRepository::find_by_barcode(self, barcode).await?)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Product>, StorageError> {
        Ok(ProductRepository::find_by_id(self, id).await?)
    }

    async fn debit_stock(&self, debits: &[StockDebit]) -> Result<StockDebitOutcome, StorageError> {
        Ok(ProductRepository::debit_stock(self, debits).await?)
    }

    async fn credit_stock(&self, credits: &[StockDebit]) -> Result<(), StorageError> {
        Ok(ProductRepository::credit_stock(self, credits).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
