//! # till-engine: Sale Lifecycle Engine for Tillpoint
//!
//! This crate owns the only stateful workflow in the system: the life of a
//! sale from an empty in-progress transaction to a completed or cancelled
//! one.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                │
//! │                                                                     │
//! │  1. CREATE                                                          │
//! │     └── create_sale(cashier) → Sale { InProgress, invoice number }  │
//! │                                                                     │
//! │  2. BUILD                                                           │
//! │     └── add_item_by_barcode() → merge or append line, recalc        │
//! │     └── remove_item()         → drop line, recalc                   │
//! │                                                                     │
//! │  3. CLOSE (one of)                                                  │
//! │     └── complete_sale() → re-check stock, debit it, Completed       │
//! │     └── cancel_sale()   → Cancelled, stock untouched                │
//! │                                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Storage is abstracted behind two traits supplied at construction:
//! [`CatalogStore`] for product reads and stock writes, [`SaleLedger`] for
//! durable sale aggregates and the invoice sequence. The engine performs no
//! SQL and holds no pool; it can run against any implementation of the two
//! traits (the in-file tests use plain in-memory maps).

pub mod engine;
pub mod error;
pub mod invoice;
pub mod store;

pub use engine::{EngineConfig, SaleEngine};
pub use error::{EngineError, EngineResult};
pub use store::{CatalogStore, SaleLedger, StockDebit, StockDebitOutcome, StorageError};
