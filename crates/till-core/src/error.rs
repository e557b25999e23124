//! # Error Types
//!
//! Input-validation errors for till-core.
//!
//! Domain-rule failures (wrong lifecycle state, insufficient stock, and so
//! on) are reported by the lifecycle engine; this module covers the earlier
//! layer, where caller input is checked before any business logic runs.

use thiserror::Error;

/// Input validation errors.
///
/// These occur when caller-supplied input does not meet requirements.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. barcode with forbidden characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;
