//! # Storage Traits
//!
//! The two collaborator seams the engine depends on, supplied at
//! construction. `till-db` implements both over SQLite; tests implement them
//! over in-memory maps.
//!
//! ## Contract Summary
//! ```text
//! CatalogStore                      SaleLedger
//! ────────────────                  ────────────────
//! find_by_barcode  (read)           find_by_id / find_by_invoice_number
//! find_by_id       (read)           insert / update (optimistic version)
//! debit_stock      (conditional,    find_between / total_completed_between
//!                   all-or-nothing) next_invoice_sequence (atomic counter)
//! credit_stock     (unconditional)
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use till_core::{Money, Product, Sale};

// =============================================================================
// Storage Error
// =============================================================================

/// Failures a storage implementation may report to the engine.
///
/// Implementations translate their own error types into these three kinds;
/// the engine only ever branches on `Conflict`.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Optimistic version check or unique constraint lost a race.
    /// The operation as a whole can be retried.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage cannot currently be reached (pool exhausted, closed, ...).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("{0}")]
    Backend(String),
}

// =============================================================================
// Stock Debit
// =============================================================================

/// One product's share of a completion-time stock decrement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDebit {
    pub product_id: String,
    pub quantity: i64,
}

/// Result of an all-or-nothing stock debit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockDebitOutcome {
    /// Every product had enough stock; all decrements were applied.
    Applied,

    /// At least one product fell short; nothing was applied.
    Insufficient {
        product_id: String,
        name: String,
        available: i64,
        requested: i64,
    },
}

// =============================================================================
// Catalog Store
// =============================================================================

/// Read access to the product catalog plus the stock writes a completing
/// sale needs.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Looks up an active product by its barcode.
    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StorageError>;

    /// Looks up a product by its id, active or not.
    async fn find_by_id(&self, id: &str) -> Result<Option<Product>, StorageError>;

    /// Conditionally decrements stock for every debit, all-or-nothing.
    ///
    /// Each decrement applies only while `stock >= quantity` holds for that
    /// product at write time. If any product falls short the whole batch is
    /// rolled back and the outcome names the first offending product.
    async fn debit_stock(&self, debits: &[StockDebit]) -> Result<StockDebitOutcome, StorageError>;

    /// Unconditionally adds stock back (reversal of a debit).
    async fn credit_stock(&self, credits: &[StockDebit]) -> Result<(), StorageError>;
}

// =============================================================================
// Sale Ledger
// =============================================================================

/// Durable storage for sale aggregates.
///
/// Aggregates are saved whole: a successful `insert`/`update` leaves the sale
/// row and all of its item rows visible to other readers at once, never a
/// partial write.
#[async_trait]
pub trait SaleLedger: Send + Sync {
    /// Loads a sale and its lines by id.
    async fn find_by_id(&self, id: &str) -> Result<Option<Sale>, StorageError>;

    /// Loads a sale by its invoice number.
    async fn find_by_invoice_number(
        &self,
        invoice_number: &str,
    ) -> Result<Option<Sale>, StorageError>;

    /// Persists a new sale aggregate.
    ///
    /// Fails with `Conflict` if the invoice number is already taken.
    async fn insert(&self, sale: &Sale) -> Result<(), StorageError>;

    /// Persists an existing sale aggregate.
    ///
    /// The write applies only if the stored version equals `sale.version`;
    /// on success the stored version becomes `sale.version + 1`. A stale
    /// version fails with `Conflict` and writes nothing.
    async fn update(&self, sale: &Sale) -> Result<(), StorageError>;

    /// Sales opened in `[start, end)`, oldest first.
    async fn find_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sale>, StorageError>;

    /// Sum of `total` over COMPLETED sales opened in `[start, end)`.
    async fn total_completed_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Money, StorageError>;

    /// Next value of the atomic per-day invoice sequence for `date_prefix`
    /// (first call for a prefix returns 1).
    ///
    /// Two concurrent callers never observe the same value for the same
    /// prefix.
    async fn next_invoice_sequence(&self, date_prefix: &str) -> Result<i64, StorageError>;
}
