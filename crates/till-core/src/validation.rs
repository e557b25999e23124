//! # Validation Module
//!
//! Input validation for caller-supplied values, run before business logic.
//!
//! Storage constraints (NOT NULL, UNIQUE, foreign keys) back these checks at
//! the database layer; validating here gives callers precise errors instead
//! of constraint violations.

use crate::error::{ValidationError, ValidationResult};
use crate::MAX_ITEM_QUANTITY;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product barcode.
///
/// ## Rules
/// - Must not be empty
/// - Maximum 64 characters
/// - Only alphanumeric characters and hyphens
///
/// ```rust
/// use till_core::validation::validate_barcode;
///
/// assert!(validate_barcode("5901234123457").is_ok());
/// assert!(validate_barcode("").is_err());
/// assert!(validate_barcode("has space").is_err());
/// ```
pub fn validate_barcode(barcode: &str) -> ValidationResult<()> {
    let barcode = barcode.trim();

    if barcode.is_empty() {
        return Err(ValidationError::Required {
            field: "barcode".to_string(),
        });
    }

    if barcode.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "barcode".to_string(),
            max: 64,
        });
    }

    if !barcode.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must contain only letters, numbers, and hyphens".to_string(),
        });
    }

    Ok(())
}

/// Validates a cashier identifier.
pub fn validate_cashier_id(cashier_id: &str) -> ValidationResult<()> {
    if cashier_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "cashier_id".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (free items).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a line discount in cents against the gross line amount.
///
/// A discount may not be negative and may not exceed the gross
/// (quantity × unit price), which would drive the line total negative.
pub fn validate_discount_cents(discount: i64, gross: i64) -> ValidationResult<()> {
    if discount < 0 || discount > gross {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: gross,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
