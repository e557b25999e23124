//! # till-db: Database Layer for Tillpoint
//!
//! SQLite storage for the sale engine, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Tillpoint Data Flow                            │
//! │                                                                     │
//! │  SaleEngine (till-engine)                                           │
//! │       │  CatalogStore / SaleLedger traits                           │
//! │       ▼                                                             │
//! │  ┌───────────────────────────────────────────────────────────────┐  │
//! │  │                    till-db (THIS CRATE)                       │  │
//! │  │                                                               │  │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌──────────────┐  │  │
//! │  │   │   Database    │   │  Repositories  │   │  Migrations  │  │  │
//! │  │   │   (pool.rs)   │◄──│  product.rs    │   │  (embedded)  │  │  │
//! │  │   │  SqlitePool   │   │  sale.rs       │   │  001_init    │  │  │
//! │  │   └───────────────┘   └────────────────┘   └──────────────┘  │  │
//! │  └───────────────────────────────────────────────────────────────┘  │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  SQLite database file (WAL mode)                                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/till.db")).await?;
//! let engine = db.engine();
//!
//! let sale = engine.create_sale("cashier-7").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
