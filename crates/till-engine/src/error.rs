//! # Engine Error Types
//!
//! Failures the sale lifecycle can surface to a caller.
//!
//! ## Error Flow
//! ```text
//! ValidationError (till-core)  ──┐
//! StorageError (store traits)  ──┼──► EngineError ──► caller decides
//! lifecycle rule violations    ──┘                    user-facing message
//! ```
//!
//! Every error is scoped to the single operation that raised it; none is
//! fatal to the process. `Conflict` is the one kind the engine retries
//! internally (a bounded number of times) before surfacing.

use thiserror::Error;

use till_core::{SaleStatus, ValidationError};

use crate::store::StorageError;

/// Sale lifecycle errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No sale exists with the given id.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// No active product matches the given barcode.
    #[error("Product not found for barcode: {0}")]
    ProductNotFound(String),

    /// The given item id is not a line of the sale.
    #[error("Item {item_id} is not a line of sale {sale_id}")]
    ItemNotFound { sale_id: String, item_id: String },

    /// Operation requires an in-progress sale.
    ///
    /// Raised when mutating a completed, cancelled, or refunded sale.
    #[error("Sale {sale_id} is {status:?}, operation requires an in-progress sale")]
    InvalidState { sale_id: String, status: SaleStatus },

    /// Completion attempted on a sale with no lines.
    #[error("Sale {0} has no lines to complete")]
    EmptySale(String),

    /// Requested quantity exceeds available stock.
    ///
    /// `requested` is the cumulative quantity (existing line + new units at
    /// add-time, or the full line at completion time).
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Concurrent modification detected and retries exhausted.
    ///
    /// The whole operation can be retried by the caller.
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    /// Caller input failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Storage failed for a reason other than a conflict.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Maps storage failures into the engine taxonomy.
///
/// Conflicts keep their identity so callers can distinguish "retry the
/// operation" from "storage is broken". Everything else is opaque here.
impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(reason) => EngineError::Conflict(reason),
            other => EngineError::Storage(other.to_string()),
        }
    }
}

/// Convenience type alias for Results with EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EngineError::InsufficientStock {
            product: "Coca-Cola 330ml".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Coca-Cola 330ml: available 3, requested 5"
        );
    }

    #[test]
    fn test_storage_conflict_keeps_identity() {
        let err: EngineError = StorageError::Conflict("sale s1 version 2".to_string()).into();
        assert!(matches!(err, EngineError::Conflict(_)));

        let err: EngineError = StorageError::Backend("disk full".to_string()).into();
        assert!(matches!(err, EngineError::Storage(_)));
    }

    #[test]
    fn test_validation_converts() {
        let err: EngineError = ValidationError::Required {
            field: "barcode".to_string(),
        }
        .into();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
