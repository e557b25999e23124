//! # Sale Repository
//!
//! Database operations for sale aggregates and the invoice counter.
//!
//! ## Aggregate Saves
//! A sale is loaded and stored whole: the sale row plus all of its line rows
//! in one transaction. Updates are guarded by an optimistic version check
//! (`WHERE version = ?`), so a writer holding a stale copy fails with
//! `DbError::StaleVersion` instead of silently clobbering newer data.
//!
//! ## Invoice Counter
//! ```text
//! INSERT INTO invoice_counters (day, seq) VALUES (?, 1)
//! ON CONFLICT (day) DO UPDATE SET seq = seq + 1
//! RETURNING seq
//! ```
//! One statement, one row per day: two registers creating sales at the same
//! moment get consecutive sequence numbers, never the same one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use till_core::{Money, PaymentMethod, Sale, SaleItem, SaleStatus};
use till_engine::{SaleLedger, StorageError};

use crate::error::{DbError, DbResult};

// =============================================================================
// Row types
// =============================================================================

/// A `sales` table row, before its lines are attached.
#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    invoice_number: String,
    sale_date: DateTime<Utc>,
    cashier_id: String,
    status: SaleStatus,
    subtotal_cents: i64,
    tax_cents: i64,
    total_cents: i64,
    payment_method: Option<PaymentMethod>,
    customer_name: Option<String>,
    customer_tax_id: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl SaleRow {
    fn into_sale(self, items: Vec<SaleItem>) -> Sale {
        Sale {
            id: self.id,
            invoice_number: self.invoice_number,
            sale_date: self.sale_date,
            cashier_id: self.cashier_id,
            status: self.status,
            subtotal_cents: self.subtotal_cents,
            tax_cents: self.tax_cents,
            total_cents: self.total_cents,
            payment_method: self.payment_method,
            customer_name: self.customer_name,
            customer_tax_id: self.customer_tax_id,
            completed_at: self.completed_at,
            updated_at: self.updated_at,
            version: self.version,
            items,
        }
    }
}

/// A `sale_items` table row. The owning sale id and position stay in the
/// database; in memory the `Vec` order carries them.
#[derive(Debug, sqlx::FromRow)]
struct SaleItemRow {
    id: String,
    product_id: String,
    name_snapshot: String,
    quantity: i64,
    unit_price_cents: i64,
    discount_cents: i64,
    line_total_cents: i64,
}

impl From<SaleItemRow> for SaleItem {
    fn from(row: SaleItemRow) -> Self {
        SaleItem {
            id: row.id,
            product_id: row.product_id,
            name_snapshot: row.name_snapshot,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
            discount_cents: row.discount_cents,
            line_total_cents: row.line_total_cents,
        }
    }
}

const SALE_COLUMNS: &str = "id, invoice_number, sale_date, cashier_id, status, \
     subtotal_cents, tax_cents, total_cents, payment_method, customer_name, \
     customer_tax_id, completed_at, updated_at, version";

// =============================================================================
// Sale Repository
// =============================================================================

/// Repository for sale aggregate operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Loads a sale and its lines by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let query = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
        let row = sqlx::query_as::<_, SaleRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let items = self.load_items(&row.id).await?;
                Ok(Some(row.into_sale(items)))
            }
            None => Ok(None),
        }
    }

    /// Loads a sale by its invoice number.
    pub async fn get_by_invoice_number(&self, invoice_number: &str) -> DbResult<Option<Sale>> {
        let query = format!("SELECT {SALE_COLUMNS} FROM sales WHERE invoice_number = ?1");
        let row = sqlx::query_as::<_, SaleRow>(&query)
            .bind(invoice_number)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let items = self.load_items(&row.id).await?;
                Ok(Some(row.into_sale(items)))
            }
            None => Ok(None),
        }
    }

    /// Persists a new sale aggregate (sale row + line rows, one transaction).
    ///
    /// Fails with `DbError::UniqueViolation` if the invoice number is taken.
    pub async fn insert_sale(&self, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, invoice_number = %sale.invoice_number, "Inserting sale");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, invoice_number, sale_date, cashier_id, status,
                subtotal_cents, tax_cents, total_cents,
                payment_method, customer_name, customer_tax_id,
                completed_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.invoice_number)
        .bind(sale.sale_date)
        .bind(&sale.cashier_id)
        .bind(sale.status)
        .bind(sale.subtotal_cents)
        .bind(sale.tax_cents)
        .bind(sale.total_cents)
        .bind(sale.payment_method)
        .bind(&sale.customer_name)
        .bind(&sale.customer_tax_id)
        .bind(sale.completed_at)
        .bind(sale.updated_at)
        .bind(sale.version)
        .execute(&mut *tx)
        .await?;

        Self::insert_items(&mut tx, sale).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Persists an existing sale aggregate.
    ///
    /// The write applies only if the stored version equals `sale.version`;
    /// on success the stored version becomes `sale.version + 1`. Line rows
    /// are rewritten in the same transaction, so readers always see a
    /// consistent aggregate.
    pub async fn update_sale(&self, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, version = sale.version, "Updating sale");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                status = ?2,
                subtotal_cents = ?3,
                tax_cents = ?4,
                total_cents = ?5,
                payment_method = ?6,
                customer_name = ?7,
                customer_tax_id = ?8,
                completed_at = ?9,
                updated_at = ?10,
                version = version + 1
            WHERE id = ?1 AND version = ?11
            "#,
        )
        .bind(&sale.id)
        .bind(sale.status)
        .bind(sale.subtotal_cents)
        .bind(sale.tax_cents)
        .bind(sale.total_cents)
        .bind(sale.payment_method)
        .bind(&sale.customer_name)
        .bind(&sale.customer_tax_id)
        .bind(sale.completed_at)
        .bind(sale.updated_at)
        .bind(sale.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM sales WHERE id = ?1")
                .bind(&sale.id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;

            return if exists.is_some() {
                Err(DbError::stale("Sale", &sale.id))
            } else {
                Err(DbError::not_found("Sale", &sale.id))
            };
        }

        sqlx::query("DELETE FROM sale_items WHERE sale_id = ?1")
            .bind(&sale.id)
            .execute(&mut *tx)
            .await?;
        Self::insert_items(&mut tx, sale).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Deletes a sale. Its line rows go with it (ON DELETE CASCADE).
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        Ok(())
    }

    /// Sales opened in `[start, end)`, oldest first.
    pub async fn find_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<Sale>> {
        let query = format!(
            "SELECT {SALE_COLUMNS} FROM sales \
             WHERE sale_date >= ?1 AND sale_date < ?2 \
             ORDER BY sale_date"
        );
        let rows = sqlx::query_as::<_, SaleRow>(&query)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        let mut sales = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.load_items(&row.id).await?;
            sales.push(row.into_sale(items));
        }

        Ok(sales)
    }

    /// Sum of totals over COMPLETED sales opened in `[start, end)`.
    pub async fn total_completed_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Money> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total_cents), 0)
            FROM sales
            WHERE status = ?1 AND sale_date >= ?2 AND sale_date < ?3
            "#,
        )
        .bind(SaleStatus::Completed)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(total))
    }

    /// Next value of the atomic per-day invoice sequence.
    pub async fn next_invoice_sequence(&self, date_prefix: &str) -> DbResult<i64> {
        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO invoice_counters (day, seq) VALUES (?1, 1)
            ON CONFLICT (day) DO UPDATE SET seq = seq + 1
            RETURNING seq
            "#,
        )
        .bind(date_prefix)
        .fetch_one(&self.pool)
        .await?;

        Ok(seq)
    }

    /// Loads a sale's lines in display order.
    async fn load_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let rows = sqlx::query_as::<_, SaleItemRow>(
            r#"
            SELECT id, product_id, name_snapshot, quantity,
                   unit_price_cents, discount_cents, line_total_cents
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY position
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SaleItem::from).collect())
    }

    /// Inserts a sale's line rows, positions taken from Vec order.
    async fn insert_items(tx: &mut Transaction<'_, Sqlite>, sale: &Sale) -> DbResult<()> {
        for (position, item) in sale.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, position, product_id, name_snapshot,
                    quantity, unit_price_cents, discount_cents, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&item.id)
            .bind(&sale.id)
            .bind(position as i64)
            .bind(&item.product_id)
            .bind(&item.name_snapshot)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.discount_cents)
            .bind(item.line_total_cents)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

// =============================================================================
// SaleLedger implementation
// =============================================================================

#[async_trait]
impl SaleLedger for SaleRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Sale>, StorageError> {
        Ok(self.get_by_id(id).await?)
    }

    async fn find_by_invoice_number(
        &self,
        invoice_number: &str,
    ) -> Result<Option<Sale>, StorageError> {
        Ok(self.get_by_invoice_number(invoice_number).await?)
    }

    async fn insert(&self, sale: &Sale) -> Result<(), StorageError> {
        Ok(self.insert_sale(sale).await?)
    }

    async fn update(&self, sale: &Sale) -> Result<(), StorageError> {
        Ok(self.update_sale(sale).await?)
    }

    async fn find_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sale>, StorageError> {
        Ok(SaleRepository::find_between(self, start, end).await?)
    }

    async fn total_completed_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Money, StorageError> {
        Ok(SaleRepository::total_completed_between(self, start, end).await?)
    }

    async fn next_invoice_sequence(&self, date_prefix: &str) -> Result<i64, StorageError> {
        Ok(SaleRepository::next_invoice_sequence(self, date_prefix).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
