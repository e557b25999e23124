//! # till-core: Pure Business Logic for Tillpoint
//!
//! This crate is the heart of Tillpoint. It contains the sale-transaction
//! data model and all of its arithmetic as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Tillpoint Architecture                          │
//! │                                                                     │
//! │  ┌───────────────────────────────────────────────────────────────┐  │
//! │  │                 till-engine (lifecycle)                       │  │
//! │  │   create ──► add/remove items ──► complete / cancel           │  │
//! │  └──────────────────────────────┬────────────────────────────────┘  │
//! │                                 │                                   │
//! │  ┌──────────────────────────────▼────────────────────────────────┐  │
//! │  │               ★ till-core (THIS CRATE) ★                      │  │
//! │  │                                                               │  │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │  │
//! │  │   │   types   │  │   money   │  │   error   │  │ validation│  │  │
//! │  │   │ Sale/Item │  │   Money   │  │ Validation│  │   rules   │  │  │
//! │  │   │  Product  │  │  TaxRate  │  │   Error   │  │  checks   │  │  │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │  │
//! │  │                                                               │  │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS            │  │
//! │  └───────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every function is deterministic; timestamps come in
//!    as parameters, never from a clock read
//! 2. **Integer Money**: all monetary values are cents (i64), never floats
//! 3. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{ValidationError, ValidationResult};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single sale.
///
/// Prevents runaway transactions; one register checkout never legitimately
/// reaches this.
pub const MAX_SALE_ITEMS: usize = 100;

/// Maximum quantity of a single line in a sale.
///
/// Guards against fat-finger entry (1000 typed instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;
