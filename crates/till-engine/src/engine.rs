//! # Sale Engine
//!
//! Enforces the sale state machine and keeps monetary totals consistent with
//! the lines, against whatever storage implements the [`CatalogStore`] and
//! [`SaleLedger`] traits.
//!
//! ## Concurrency Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Two mechanisms, two scopes                                         │
//! │                                                                     │
//! │  In-process:  a per-sale-id async mutex serializes mutating         │
//! │               operations on the same sale within this engine.      │
//! │                                                                     │
//! │  Cross-process: the ledger's optimistic version check catches       │
//! │               writers this engine cannot see; the engine reloads    │
//! │               and retries a bounded number of times.                │
//! │                                                                     │
//! │  Stock:       debits happen as one all-or-nothing conditional      │
//! │               batch at completion; a failed final save credits     │
//! │               the batch back before the error surfaces.            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine itself spawns no tasks; each operation runs to completion on
//! the caller's task and may block on storage I/O.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};
use uuid::Uuid;

use till_core::{
    validation, Money, PaymentMethod, Sale, SaleItem, SaleStatus, TaxRate, ValidationError,
    MAX_SALE_ITEMS,
};

use crate::error::{EngineError, EngineResult};
use crate::invoice;
use crate::store::{CatalogStore, SaleLedger, StockDebit, StockDebitOutcome, StorageError};

// =============================================================================
// Configuration
// =============================================================================

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tax rate applied to every sale's subtotal.
    pub tax_rate: TaxRate,

    /// How many times a conflicted operation is retried before the
    /// `Conflict` surfaces to the caller.
    pub max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            // 21% (2100 basis points)
            tax_rate: TaxRate::from_bps(2100),
            max_retries: 3,
        }
    }
}

// =============================================================================
// Per-Sale Locks
// =============================================================================

/// Registry of per-sale async mutexes.
///
/// Entries are created on first use and dropped once a sale reaches a
/// terminal state, so the map stays proportional to the number of open
/// sales.
#[derive(Debug, Default)]
struct SaleLocks {
    inner: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SaleLocks {
    fn for_sale(&self, sale_id: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().expect("sale lock registry poisoned");
        map.entry(sale_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn release(&self, sale_id: &str) {
        let mut map = self.inner.lock().expect("sale lock registry poisoned");
        map.remove(sale_id);
    }
}

// =============================================================================
// Sale Engine
// =============================================================================

/// The sale lifecycle engine.
///
/// Collaborators are supplied at construction; the engine never reaches into
/// ambient state (the cashier identity is an explicit parameter on
/// [`SaleEngine::create_sale`]).
///
/// ## Usage
/// ```rust,ignore
/// let engine = SaleEngine::new(product_repo, sale_repo);
///
/// let sale = engine.create_sale("cashier-7").await?;
/// engine.add_item_by_barcode(&sale.id, "5901234123457", 2).await?;
/// let done = engine
///     .complete_sale(&sale.id, PaymentMethod::Cash, None, None)
///     .await?;
/// ```
#[derive(Debug)]
pub struct SaleEngine<C, L> {
    catalog: C,
    ledger: L,
    config: EngineConfig,
    locks: SaleLocks,
}

impl<C: CatalogStore, L: SaleLedger> SaleEngine<C, L> {
    /// Creates an engine with the default configuration.
    pub fn new(catalog: C, ledger: L) -> Self {
        Self::with_config(catalog, ledger, EngineConfig::default())
    }

    /// Creates an engine with an explicit configuration.
    pub fn with_config(catalog: C, ledger: L, config: EngineConfig) -> Self {
        SaleEngine {
            catalog,
            ledger,
            config,
            locks: SaleLocks::default(),
        }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Lifecycle operations
    // -------------------------------------------------------------------------

    /// Opens a new empty sale for `cashier_id`.
    ///
    /// The invoice number is `YYYYMMDD-NNNN` where NNNN comes from the
    /// ledger's atomic per-day sequence. An invoice-number collision (only
    /// possible if an external writer raced the sequence) is retried with a
    /// fresh number.
    pub async fn create_sale(&self, cashier_id: &str) -> EngineResult<Sale> {
        validation::validate_cashier_id(cashier_id)?;

        let mut attempts = 0;
        loop {
            let now = Utc::now();
            let prefix = invoice::date_prefix(now);
            let sequence = self.ledger.next_invoice_sequence(&prefix).await?;
            let number = invoice::invoice_number(&prefix, sequence);

            let sale = Sale::new(Uuid::new_v4().to_string(), number, cashier_id, now);

            match self.ledger.insert(&sale).await {
                Ok(()) => {
                    info!(
                        sale_id = %sale.id,
                        invoice_number = %sale.invoice_number,
                        cashier_id = %cashier_id,
                        "Sale created"
                    );
                    return Ok(sale);
                }
                Err(StorageError::Conflict(reason)) if attempts < self.config.max_retries => {
                    attempts += 1;
                    debug!(attempt = attempts, reason = %reason, "Invoice collision, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Adds `quantity` units of the product with `barcode` to the sale.
    ///
    /// An existing line for the same product grows; otherwise a new line is
    /// appended with the catalog price snapshotted. The availability check
    /// is cumulative: units already on the sale count against stock.
    /// Returns the affected line.
    pub async fn add_item_by_barcode(
        &self,
        sale_id: &str,
        barcode: &str,
        quantity: i64,
    ) -> EngineResult<SaleItem> {
        validation::validate_barcode(barcode)?;
        validation::validate_quantity(quantity)?;

        let lock = self.locks.for_sale(sale_id);
        let _guard = lock.lock().await;

        let mut attempts = 0;
        loop {
            let mut sale = self.load_in_progress(sale_id).await?;

            let product = self
                .catalog
                .find_by_barcode(barcode)
                .await?
                .ok_or_else(|| EngineError::ProductNotFound(barcode.to_string()))?;

            let already_on_sale = sale.quantity_of(&product.id);
            let cumulative = already_on_sale + quantity;
            if !product.can_sell(cumulative) {
                return Err(EngineError::InsufficientStock {
                    product: product.name.clone(),
                    available: product.stock,
                    requested: cumulative,
                });
            }

            if already_on_sale == 0 && sale.items.len() >= MAX_SALE_ITEMS {
                return Err(ValidationError::OutOfRange {
                    field: "sale lines".to_string(),
                    min: 0,
                    max: MAX_SALE_ITEMS as i64,
                }
                .into());
            }

            let pos = sale.upsert_line(&product, quantity);
            sale.recalculate(self.config.tax_rate);
            sale.touch(Utc::now());

            match self.ledger.update(&sale).await {
                Ok(()) => {
                    let item = sale.items[pos].clone();
                    info!(
                        sale_id = %sale_id,
                        barcode = %barcode,
                        quantity = item.quantity,
                        total = %sale.total(),
                        "Line added"
                    );
                    return Ok(item);
                }
                Err(StorageError::Conflict(reason)) if attempts < self.config.max_retries => {
                    attempts += 1;
                    debug!(attempt = attempts, reason = %reason, "Stale sale, reloading");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Removes the line `item_id` from the sale and recomputes totals.
    pub async fn remove_item(&self, sale_id: &str, item_id: &str) -> EngineResult<()> {
        let lock = self.locks.for_sale(sale_id);
        let _guard = lock.lock().await;

        let mut attempts = 0;
        loop {
            let mut sale = self.load_in_progress(sale_id).await?;

            if sale.remove_line(item_id).is_none() {
                return Err(EngineError::ItemNotFound {
                    sale_id: sale_id.to_string(),
                    item_id: item_id.to_string(),
                });
            }

            sale.recalculate(self.config.tax_rate);
            sale.touch(Utc::now());

            match self.ledger.update(&sale).await {
                Ok(()) => {
                    info!(sale_id = %sale_id, item_id = %item_id, total = %sale.total(), "Line removed");
                    return Ok(());
                }
                Err(StorageError::Conflict(reason)) if attempts < self.config.max_retries => {
                    attempts += 1;
                    debug!(attempt = attempts, reason = %reason, "Stale sale, reloading");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Completes the sale: re-validates stock, debits it, freezes the sale.
    ///
    /// Stock for every line is re-checked at completion time because other
    /// registers may have sold from the same shelf since the lines were
    /// added. The debit is all-or-nothing; if the final sale write then
    /// fails, the debit is credited back so no partial effect survives.
    pub async fn complete_sale(
        &self,
        sale_id: &str,
        payment_method: PaymentMethod,
        customer_name: Option<String>,
        customer_tax_id: Option<String>,
    ) -> EngineResult<Sale> {
        let lock = self.locks.for_sale(sale_id);
        let _guard = lock.lock().await;

        let mut attempts = 0;
        loop {
            let mut sale = self.load_in_progress(sale_id).await?;

            if sale.is_empty() {
                return Err(EngineError::EmptySale(sale_id.to_string()));
            }

            let debits: Vec<StockDebit> = sale
                .items
                .iter()
                .map(|item| StockDebit {
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                })
                .collect();

            match self.catalog.debit_stock(&debits).await? {
                StockDebitOutcome::Applied => {}
                StockDebitOutcome::Insufficient {
                    name,
                    available,
                    requested,
                    ..
                } => {
                    return Err(EngineError::InsufficientStock {
                        product: name,
                        available,
                        requested,
                    });
                }
            }

            let now = Utc::now();
            sale.payment_method = Some(payment_method);
            sale.customer_name = customer_name.clone();
            sale.customer_tax_id = customer_tax_id.clone();
            sale.status = SaleStatus::Completed;
            sale.completed_at = Some(now);
            sale.touch(now);

            match self.ledger.update(&sale).await {
                Ok(()) => {
                    sale.version += 1;
                    self.locks.release(sale_id);
                    info!(
                        sale_id = %sale_id,
                        invoice_number = %sale.invoice_number,
                        total = %sale.total(),
                        ?payment_method,
                        "Sale completed"
                    );
                    return Ok(sale);
                }
                Err(StorageError::Conflict(reason)) => {
                    // The debit already happened; reverse it before anything
                    // else can observe a half-completed checkout.
                    self.catalog.credit_stock(&debits).await?;
                    if attempts < self.config.max_retries {
                        attempts += 1;
                        debug!(attempt = attempts, reason = %reason, "Stale sale, reloading");
                        continue;
                    }
                    return Err(EngineError::Conflict(reason));
                }
                Err(err) => {
                    self.catalog.credit_stock(&debits).await?;
                    return Err(err.into());
                }
            }
        }
    }

    /// Cancels an in-progress sale. Stock is never touched: nothing was
    /// committed while the sale was open.
    pub async fn cancel_sale(&self, sale_id: &str) -> EngineResult<Sale> {
        let lock = self.locks.for_sale(sale_id);
        let _guard = lock.lock().await;

        let mut attempts = 0;
        loop {
            let mut sale = self.load_in_progress(sale_id).await?;

            sale.status = SaleStatus::Cancelled;
            sale.touch(Utc::now());

            match self.ledger.update(&sale).await {
                Ok(()) => {
                    sale.version += 1;
                    self.locks.release(sale_id);
                    info!(sale_id = %sale_id, invoice_number = %sale.invoice_number, "Sale cancelled");
                    return Ok(sale);
                }
                Err(StorageError::Conflict(reason)) if attempts < self.config.max_retries => {
                    attempts += 1;
                    debug!(attempt = attempts, reason = %reason, "Stale sale, reloading");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    // -------------------------------------------------------------------------
    // Read operations
    // -------------------------------------------------------------------------

    /// Loads a sale by id.
    pub async fn sale(&self, sale_id: &str) -> EngineResult<Sale> {
        self.ledger
            .find_by_id(sale_id)
            .await?
            .ok_or_else(|| EngineError::SaleNotFound(sale_id.to_string()))
    }

    /// Loads a sale by invoice number.
    pub async fn sale_by_invoice_number(&self, invoice_number: &str) -> EngineResult<Sale> {
        self.ledger
            .find_by_invoice_number(invoice_number)
            .await?
            .ok_or_else(|| EngineError::SaleNotFound(invoice_number.to_string()))
    }

    /// Sales opened in `[start, end)`, oldest first.
    pub async fn sales_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> EngineResult<Vec<Sale>> {
        Ok(self.ledger.find_between(start, end).await?)
    }

    /// Sales opened today (UTC).
    pub async fn today_sales(&self) -> EngineResult<Vec<Sale>> {
        let (start, end) = today_bounds();
        self.sales_between(start, end).await
    }

    /// Revenue of today's completed sales (UTC).
    pub async fn today_total(&self) -> EngineResult<Money> {
        let (start, end) = today_bounds();
        Ok(self.ledger.total_completed_between(start, end).await?)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Loads the sale and verifies it still accepts mutations.
    async fn load_in_progress(&self, sale_id: &str) -> EngineResult<Sale> {
        let sale = self
            .ledger
            .find_by_id(sale_id)
            .await?
            .ok_or_else(|| EngineError::SaleNotFound(sale_id.to_string()))?;

        if !sale.is_in_progress() {
            return Err(EngineError::InvalidState {
                sale_id: sale.id,
                status: sale.status,
            });
        }

        Ok(sale)
    }
}

/// Start and end of the current UTC day.
fn today_bounds() -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use till_core::Product;

    // -------------------------------------------------------------------------
    // In-memory fakes
    // -------------------------------------------------------------------------

    #[derive(Debug, Clone, Default)]
    struct MemoryCatalog {
        products: Arc<StdMutex<HashMap<String, Product>>>,
    }

    impl MemoryCatalog {
        fn with_product(self, product: Product) -> Self {
            self.products
                .lock()
                .unwrap()
                .insert(product.id.clone(), product);
            self
        }

        fn stock_of(&self, product_id: &str) -> i64 {
            self.products.lock().unwrap()[product_id].stock
        }

        fn set_stock(&self, product_id: &str, stock: i64) {
            self.products
                .lock()
                .unwrap()
                .get_mut(product_id)
                .unwrap()
                .stock = stock;
        }
    }

    #[async_trait]
    impl CatalogStore for MemoryCatalog {
        async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StorageError> {
            Ok(self
                .products
                .lock()
                .unwrap()
                .values()
                .find(|p| p.barcode == barcode && p.is_active)
                .cloned())
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<Product>, StorageError> {
            Ok(self.products.lock().unwrap().get(id).cloned())
        }

        async fn debit_stock(
            &self,
            debits: &[StockDebit],
        ) -> Result<StockDebitOutcome, StorageError> {
            let mut products = self.products.lock().unwrap();

            for debit in debits {
                let product = products
                    .get(&debit.product_id)
                    .ok_or_else(|| StorageError::Backend("unknown product".to_string()))?;
                if product.stock < debit.quantity {
                    return Ok(StockDebitOutcome::Insufficient {
                        product_id: product.id.clone(),
                        name: product.name.clone(),
                        available: product.stock,
                        requested: debit.quantity,
                    });
                }
            }

            for debit in debits {
                products.get_mut(&debit.product_id).unwrap().stock -= debit.quantity;
            }
            Ok(StockDebitOutcome::Applied)
        }

        async fn credit_stock(&self, credits: &[StockDebit]) -> Result<(), StorageError> {
            let mut products = self.products.lock().unwrap();
            for credit in credits {
                products.get_mut(&credit.product_id).unwrap().stock += credit.quantity;
            }
            Ok(())
        }
    }

    #[derive(Debug, Clone, Default)]
    struct MemoryLedger {
        sales: Arc<StdMutex<HashMap<String, Sale>>>,
        counters: Arc<StdMutex<HashMap<String, i64>>>,
        /// Each pending unit makes the next `update` fail with Conflict.
        update_conflicts: Arc<AtomicU32>,
    }

    impl MemoryLedger {
        fn inject_update_conflicts(&self, n: u32) {
            self.update_conflicts.store(n, Ordering::SeqCst);
        }

        fn stored(&self, sale_id: &str) -> Sale {
            self.sales.lock().unwrap()[sale_id].clone()
        }
    }

    #[async_trait]
    impl SaleLedger for MemoryLedger {
        async fn find_by_id(&self, id: &str) -> Result<Option<Sale>, StorageError> {
            Ok(self.sales.lock().unwrap().get(id).cloned())
        }

        async fn find_by_invoice_number(
            &self,
            invoice_number: &str,
        ) -> Result<Option<Sale>, StorageError> {
            Ok(self
                .sales
                .lock()
                .unwrap()
                .values()
                .find(|s| s.invoice_number == invoice_number)
                .cloned())
        }

        async fn insert(&self, sale: &Sale) -> Result<(), StorageError> {
            let mut sales = self.sales.lock().unwrap();
            if sales.values().any(|s| s.invoice_number == sale.invoice_number) {
                return Err(StorageError::Conflict(format!(
                    "invoice number {} already exists",
                    sale.invoice_number
                )));
            }
            sales.insert(sale.id.clone(), sale.clone());
            Ok(())
        }

        async fn update(&self, sale: &Sale) -> Result<(), StorageError> {
            if self
                .update_conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StorageError::Conflict("injected".to_string()));
            }

            let mut sales = self.sales.lock().unwrap();
            let stored = sales
                .get_mut(&sale.id)
                .ok_or_else(|| StorageError::Backend("sale missing".to_string()))?;
            if stored.version != sale.version {
                return Err(StorageError::Conflict(format!(
                    "sale {} version {} is stale",
                    sale.id, sale.version
                )));
            }
            let mut next = sale.clone();
            next.version += 1;
            *stored = next;
            Ok(())
        }

        async fn find_between(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<Sale>, StorageError> {
            let mut sales: Vec<Sale> = self
                .sales
                .lock()
                .unwrap()
                .values()
                .filter(|s| s.sale_date >= start && s.sale_date < end)
                .cloned()
                .collect();
            sales.sort_by_key(|s| s.sale_date);
            Ok(sales)
        }

        async fn total_completed_between(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Money, StorageError> {
            Ok(self
                .sales
                .lock()
                .unwrap()
                .values()
                .filter(|s| {
                    s.status == SaleStatus::Completed && s.sale_date >= start && s.sale_date < end
                })
                .map(|s| s.total())
                .sum())
        }

        async fn next_invoice_sequence(&self, date_prefix: &str) -> Result<i64, StorageError> {
            let mut counters = self.counters.lock().unwrap();
            let seq = counters.entry(date_prefix.to_string()).or_insert(0);
            *seq += 1;
            Ok(*seq)
        }
    }

    // -------------------------------------------------------------------------
    // Test helpers
    // -------------------------------------------------------------------------

    fn product(id: &str, barcode: &str, price_cents: i64, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            barcode: barcode.to_string(),
            name: format!("Product {}", id),
            description: None,
            price_cents,
            stock,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            version: 0,
        }
    }

    fn engine_with(
        catalog: MemoryCatalog,
        ledger: MemoryLedger,
    ) -> SaleEngine<MemoryCatalog, MemoryLedger> {
        SaleEngine::new(catalog, ledger)
    }

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_sale_opens_in_progress_with_invoice_number() {
        let ledger = MemoryLedger::default();
        let engine = engine_with(MemoryCatalog::default(), ledger.clone());

        let sale = engine.create_sale("cashier-1").await.unwrap();

        assert_eq!(sale.status, SaleStatus::InProgress);
        assert_eq!(sale.cashier_id, "cashier-1");
        assert_eq!(sale.total_cents, 0);

        let expected = invoice::invoice_number(&invoice::date_prefix(Utc::now()), 1);
        assert_eq!(sale.invoice_number, expected);

        // Persisted as created.
        assert_eq!(ledger.stored(&sale.id).invoice_number, sale.invoice_number);
    }

    #[tokio::test]
    async fn test_create_sale_sequences_same_day() {
        let engine = engine_with(MemoryCatalog::default(), MemoryLedger::default());

        let a = engine.create_sale("cashier-1").await.unwrap();
        let b = engine.create_sale("cashier-1").await.unwrap();

        assert_eq!(invoice::parse(&a.invoice_number).unwrap().1, 1);
        assert_eq!(invoice::parse(&b.invoice_number).unwrap().1, 2);
    }

    #[tokio::test]
    async fn test_create_sale_rejects_blank_cashier() {
        let engine = engine_with(MemoryCatalog::default(), MemoryLedger::default());
        let err = engine.create_sale("  ").await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_creation_never_duplicates_invoice_numbers() {
        let engine = Arc::new(engine_with(MemoryCatalog::default(), MemoryLedger::default()));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(
                async move { engine.create_sale("cashier-1").await },
            ));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().unwrap().invoice_number);
        }

        let mut deduped = numbers.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), numbers.len());
    }

    // -------------------------------------------------------------------------
    // Adding lines
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_add_item_merges_and_computes_worked_example() {
        // qty 2 then qty 1 at 100.00 → one line of 3, subtotal 300.00,
        // tax 63.00 (21%), total 363.00
        let catalog = MemoryCatalog::default().with_product(product("p1", "123", 10000, 50));
        let engine = engine_with(catalog, MemoryLedger::default());

        let sale = engine.create_sale("cashier-1").await.unwrap();
        engine.add_item_by_barcode(&sale.id, "123", 2).await.unwrap();
        let line = engine.add_item_by_barcode(&sale.id, "123", 1).await.unwrap();

        assert_eq!(line.quantity, 3);
        assert_eq!(line.line_total_cents, 30000);

        let sale = engine.sale(&sale.id).await.unwrap();
        assert_eq!(sale.items.len(), 1);
        assert_eq!(sale.subtotal_cents, 30000);
        assert_eq!(sale.tax_cents, 6300);
        assert_eq!(sale.total_cents, 36300);
    }

    #[tokio::test]
    async fn test_add_item_unknown_barcode_leaves_sale_unchanged() {
        let catalog = MemoryCatalog::default().with_product(product("p1", "123", 10000, 50));
        let engine = engine_with(catalog, MemoryLedger::default());

        let sale = engine.create_sale("cashier-1").await.unwrap();
        let err = engine
            .add_item_by_barcode(&sale.id, "999", 1)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::ProductNotFound(_)));
        let sale = engine.sale(&sale.id).await.unwrap();
        assert!(sale.is_empty());
        assert_eq!(sale.total_cents, 0);
    }

    #[tokio::test]
    async fn test_add_item_unknown_sale() {
        let engine = engine_with(MemoryCatalog::default(), MemoryLedger::default());
        let err = engine
            .add_item_by_barcode("missing", "123", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SaleNotFound(_)));
    }

    #[tokio::test]
    async fn test_add_item_over_stock_leaves_sale_and_stock_unchanged() {
        let catalog = MemoryCatalog::default().with_product(product("p1", "123", 10000, 5));
        let engine = engine_with(catalog.clone(), MemoryLedger::default());

        let sale = engine.create_sale("cashier-1").await.unwrap();
        let err = engine
            .add_item_by_barcode(&sale.id, "123", 6)
            .await
            .unwrap_err();

        match err {
            EngineError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(engine.sale(&sale.id).await.unwrap().is_empty());
        assert_eq!(catalog.stock_of("p1"), 5);
    }

    #[tokio::test]
    async fn test_add_item_stock_check_is_cumulative() {
        let catalog = MemoryCatalog::default().with_product(product("p1", "123", 10000, 5));
        let engine = engine_with(catalog, MemoryLedger::default());

        let sale = engine.create_sale("cashier-1").await.unwrap();
        engine.add_item_by_barcode(&sale.id, "123", 3).await.unwrap();

        // 3 on the sale + 3 more = 6 > 5 in stock.
        let err = engine
            .add_item_by_barcode(&sale.id, "123", 3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientStock { requested: 6, .. }
        ));

        // The sale still holds the first three units.
        assert_eq!(engine.sale(&sale.id).await.unwrap().items[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_add_item_rejects_bad_quantity() {
        let catalog = MemoryCatalog::default().with_product(product("p1", "123", 10000, 50));
        let engine = engine_with(catalog, MemoryLedger::default());
        let sale = engine.create_sale("cashier-1").await.unwrap();

        for qty in [0, -1, 1000] {
            let err = engine
                .add_item_by_barcode(&sale.id, "123", qty)
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)), "qty {qty}");
        }
    }

    #[tokio::test]
    async fn test_add_item_retries_through_conflicts() {
        let catalog = MemoryCatalog::default().with_product(product("p1", "123", 10000, 50));
        let ledger = MemoryLedger::default();
        let engine = engine_with(catalog, ledger.clone());

        let sale = engine.create_sale("cashier-1").await.unwrap();

        // Three conflicts, max_retries 3: the fourth try lands.
        ledger.inject_update_conflicts(3);
        let line = engine.add_item_by_barcode(&sale.id, "123", 2).await.unwrap();
        assert_eq!(line.quantity, 2);
    }

    #[tokio::test]
    async fn test_add_item_surfaces_conflict_when_retries_exhausted() {
        let catalog = MemoryCatalog::default().with_product(product("p1", "123", 10000, 50));
        let ledger = MemoryLedger::default();
        let engine = engine_with(catalog, ledger.clone());

        let sale = engine.create_sale("cashier-1").await.unwrap();

        ledger.inject_update_conflicts(4);
        let err = engine
            .add_item_by_barcode(&sale.id, "123", 2)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    // -------------------------------------------------------------------------
    // Removing lines
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_remove_item_recomputes_totals() {
        let catalog = MemoryCatalog::default()
            .with_product(product("p1", "123", 10000, 50))
            .with_product(product("p2", "456", 5000, 50));
        let engine = engine_with(catalog, MemoryLedger::default());

        let sale = engine.create_sale("cashier-1").await.unwrap();
        let keep = engine.add_item_by_barcode(&sale.id, "123", 1).await.unwrap();
        let surplus = engine.add_item_by_barcode(&sale.id, "456", 2).await.unwrap();

        engine.remove_item(&sale.id, &surplus.id).await.unwrap();

        let sale = engine.sale(&sale.id).await.unwrap();
        assert_eq!(sale.items.len(), 1);
        assert_eq!(sale.items[0].id, keep.id);
        assert_eq!(sale.subtotal_cents, 10000);
        assert_eq!(sale.tax_cents, 2100);
        assert_eq!(sale.total_cents, 12100);
    }

    #[tokio::test]
    async fn test_remove_item_unknown_id() {
        let catalog = MemoryCatalog::default().with_product(product("p1", "123", 10000, 50));
        let engine = engine_with(catalog, MemoryLedger::default());

        let sale = engine.create_sale("cashier-1").await.unwrap();
        engine.add_item_by_barcode(&sale.id, "123", 1).await.unwrap();

        let err = engine.remove_item(&sale.id, "missing").await.unwrap_err();
        assert!(matches!(err, EngineError::ItemNotFound { .. }));
    }

    // -------------------------------------------------------------------------
    // Completion
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_complete_sale_debits_stock_and_freezes() {
        let catalog = MemoryCatalog::default().with_product(product("p1", "123", 10000, 3));
        let engine = engine_with(catalog.clone(), MemoryLedger::default());

        let sale = engine.create_sale("cashier-1").await.unwrap();
        engine.add_item_by_barcode(&sale.id, "123", 3).await.unwrap();

        let done = engine
            .complete_sale(
                &sale.id,
                PaymentMethod::Cash,
                Some("Ada".to_string()),
                Some("X-123".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(done.status, SaleStatus::Completed);
        assert_eq!(done.payment_method, Some(PaymentMethod::Cash));
        assert_eq!(done.customer_name.as_deref(), Some("Ada"));
        assert_eq!(done.customer_tax_id.as_deref(), Some("X-123"));
        assert!(done.completed_at.is_some());
        assert_eq!(catalog.stock_of("p1"), 0);
    }

    #[tokio::test]
    async fn test_complete_empty_sale_fails_and_stays_in_progress() {
        let engine = engine_with(MemoryCatalog::default(), MemoryLedger::default());

        let sale = engine.create_sale("cashier-1").await.unwrap();
        let err = engine
            .complete_sale(&sale.id, PaymentMethod::Cash, None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::EmptySale(_)));
        assert_eq!(
            engine.sale(&sale.id).await.unwrap().status,
            SaleStatus::InProgress
        );
    }

    #[tokio::test]
    async fn test_complete_recheck_catches_stock_consumed_since_add() {
        let catalog = MemoryCatalog::default().with_product(product("p1", "123", 10000, 5));
        let engine = engine_with(catalog.clone(), MemoryLedger::default());

        let sale = engine.create_sale("cashier-1").await.unwrap();
        engine.add_item_by_barcode(&sale.id, "123", 4).await.unwrap();

        // Another register sells from the same shelf.
        catalog.set_stock("p1", 2);

        let err = engine
            .complete_sale(&sale.id, PaymentMethod::Cash, None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientStock {
                available: 2,
                requested: 4,
                ..
            }
        ));

        // No partial effects: stock untouched, sale still open.
        assert_eq!(catalog.stock_of("p1"), 2);
        assert_eq!(
            engine.sale(&sale.id).await.unwrap().status,
            SaleStatus::InProgress
        );
    }

    #[tokio::test]
    async fn test_complete_multi_product_debit_is_all_or_nothing() {
        let catalog = MemoryCatalog::default()
            .with_product(product("p1", "123", 10000, 10))
            .with_product(product("p2", "456", 5000, 1));
        let engine = engine_with(catalog.clone(), MemoryLedger::default());

        let sale = engine.create_sale("cashier-1").await.unwrap();
        engine.add_item_by_barcode(&sale.id, "123", 2).await.unwrap();
        engine.add_item_by_barcode(&sale.id, "456", 1).await.unwrap();

        // Second product's shelf empties before completion.
        catalog.set_stock("p2", 0);

        let err = engine
            .complete_sale(&sale.id, PaymentMethod::Cash, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientStock { .. }));

        // The first product was not debited.
        assert_eq!(catalog.stock_of("p1"), 10);
    }

    #[tokio::test]
    async fn test_complete_conflict_credits_stock_back() {
        let catalog = MemoryCatalog::default().with_product(product("p1", "123", 10000, 5));
        let ledger = MemoryLedger::default();
        let config = EngineConfig {
            max_retries: 0,
            ..EngineConfig::default()
        };
        let engine = SaleEngine::with_config(catalog.clone(), ledger.clone(), config);

        let sale = engine.create_sale("cashier-1").await.unwrap();
        engine.add_item_by_barcode(&sale.id, "123", 2).await.unwrap();

        ledger.inject_update_conflicts(1);
        let err = engine
            .complete_sale(&sale.id, PaymentMethod::Cash, None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Conflict(_)));
        assert_eq!(catalog.stock_of("p1"), 5);
    }

    // -------------------------------------------------------------------------
    // Cancellation and terminal states
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_cancel_never_touches_stock() {
        let catalog = MemoryCatalog::default().with_product(product("p1", "123", 10000, 5));
        let engine = engine_with(catalog.clone(), MemoryLedger::default());

        let sale = engine.create_sale("cashier-1").await.unwrap();
        engine.add_item_by_barcode(&sale.id, "123", 4).await.unwrap();

        let cancelled = engine.cancel_sale(&sale.id).await.unwrap();
        assert_eq!(cancelled.status, SaleStatus::Cancelled);
        assert_eq!(catalog.stock_of("p1"), 5);
    }

    #[tokio::test]
    async fn test_terminal_sales_reject_all_mutations() {
        let catalog = MemoryCatalog::default().with_product(product("p1", "123", 10000, 50));
        let engine = engine_with(catalog, MemoryLedger::default());

        let sale = engine.create_sale("cashier-1").await.unwrap();
        let line = engine.add_item_by_barcode(&sale.id, "123", 1).await.unwrap();
        engine
            .complete_sale(&sale.id, PaymentMethod::CreditCard, None, None)
            .await
            .unwrap();

        let add = engine.add_item_by_barcode(&sale.id, "123", 1).await;
        let remove = engine.remove_item(&sale.id, &line.id).await;
        let complete = engine
            .complete_sale(&sale.id, PaymentMethod::Cash, None, None)
            .await;
        let cancel = engine.cancel_sale(&sale.id).await;

        for result in [
            add.map(|_| ()),
            remove,
            complete.map(|_| ()),
            cancel.map(|_| ()),
        ] {
            assert!(matches!(result.unwrap_err(), EngineError::InvalidState { .. }));
        }
    }

    #[tokio::test]
    async fn test_cancelled_sale_rejects_completion() {
        let engine = engine_with(MemoryCatalog::default(), MemoryLedger::default());

        let sale = engine.create_sale("cashier-1").await.unwrap();
        engine.cancel_sale(&sale.id).await.unwrap();

        let err = engine
            .complete_sale(&sale.id, PaymentMethod::Cash, None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidState {
                status: SaleStatus::Cancelled,
                ..
            }
        ));
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_sale_by_invoice_number() {
        let engine = engine_with(MemoryCatalog::default(), MemoryLedger::default());
        let sale = engine.create_sale("cashier-1").await.unwrap();

        let found = engine
            .sale_by_invoice_number(&sale.invoice_number)
            .await
            .unwrap();
        assert_eq!(found.id, sale.id);

        let err = engine.sale_by_invoice_number("20000101-0001").await;
        assert!(matches!(err.unwrap_err(), EngineError::SaleNotFound(_)));
    }

    #[tokio::test]
    async fn test_today_total_counts_only_completed() {
        let catalog = MemoryCatalog::default().with_product(product("p1", "123", 10000, 50));
        let engine = engine_with(catalog, MemoryLedger::default());

        // One completed sale of 121.00, one cancelled, one still open.
        let completed = engine.create_sale("cashier-1").await.unwrap();
        engine
            .add_item_by_barcode(&completed.id, "123", 1)
            .await
            .unwrap();
        engine
            .complete_sale(&completed.id, PaymentMethod::Cash, None, None)
            .await
            .unwrap();

        let cancelled = engine.create_sale("cashier-1").await.unwrap();
        engine
            .add_item_by_barcode(&cancelled.id, "123", 2)
            .await
            .unwrap();
        engine.cancel_sale(&cancelled.id).await.unwrap();

        let open = engine.create_sale("cashier-1").await.unwrap();
        engine.add_item_by_barcode(&open.id, "123", 3).await.unwrap();

        assert_eq!(engine.today_total().await.unwrap().cents(), 12100);
        assert_eq!(engine.today_sales().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_sales_between_filters_by_open_date() {
        let ledger = MemoryLedger::default();
        let engine = engine_with(MemoryCatalog::default(), ledger.clone());

        let sale = engine.create_sale("cashier-1").await.unwrap();

        let far_past = sale.sale_date - Duration::days(10);
        let past = sale.sale_date - Duration::days(1);
        let future = sale.sale_date + Duration::days(1);

        assert_eq!(engine.sales_between(past, future).await.unwrap().len(), 1);
        assert!(engine.sales_between(far_past, past).await.unwrap().is_empty());
    }
}
