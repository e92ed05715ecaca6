//! # Error Types
//!
//! Domain-specific error types for dukon-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  dukon-core errors (this file)                                         │
//! │  ├── CoreError        - Settlement/ledger rule violations              │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  dukon-db errors (separate crate)                                      │
//! │  └── DbError          - Database/transaction failures, wraps both     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → API layer → caller      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product name, amounts, etc.)
//! 3. Errors are enum variants, never String
//! 4. Every variant aborts the enclosing settlement transaction

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Settlement engine errors.
///
/// These errors represent business rule violations. Every one of them
/// aborts the whole enclosing transaction - a failed sale leaves
/// inventory, debts, and payments exactly as they were.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found (absent or soft-deleted).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Batch cannot be found.
    #[error("Product batch not found: {0}")]
    BatchNotFound(String),

    /// Debtor cannot be found.
    #[error("Debtor not found: {0}")]
    DebtorNotFound(String),

    /// No open debt matches the given sale or debt reference.
    #[error("Debt not found: {0}")]
    DebtNotFound(String),

    /// Sale cannot be found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Insufficient stock to fulfil a line item.
    ///
    /// ## When This Occurs
    /// All open batches of the product together hold less than the
    /// requested quantity. The whole sale is aborted - no batch is
    /// decremented for any line item.
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Payments exceed what is owed.
    ///
    /// ## When This Occurs
    /// - Sale payments convert to more than `total_sold`
    /// - A debt payment exceeds the outstanding amount
    /// - A batch purchase payment exceeds `buy_price × quantity`
    #[error("Overpayment: paid {paid} so'm against {due} so'm due")]
    Overpayment { paid: i64, due: i64 },

    /// Underpaid sale submitted without a debtor to carry the debt.
    #[error("Debtor is required for a credit sale: paid {paid} so'm of {sold} so'm")]
    DebtorRequired { paid: i64, sold: i64 },

    /// Payment method string is not one of the closed set.
    #[error("Invalid payment method: {0}")]
    InvalidPaymentMethod(String),

    /// A USD payment was supplied without an exchange rate.
    #[error("Exchange rate is required for USD payments")]
    MissingExchangeRate,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before settlement logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or positive.
    #[error("{field} must not be negative")]
    MustBeNonNegative { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., malformed phone number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Collection has too many entries.
    #[error("{field} cannot have more than {max} entries")]
    TooMany { field: String, max: usize },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "Shakar".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Shakar: available 3, requested 5"
        );

        let err = CoreError::Overpayment {
            paid: 1100,
            due: 1000,
        };
        assert_eq!(err.to_string(), "Overpayment: paid 1100 so'm against 1000 so'm due");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "total_sold".to_string(),
        };
        assert_eq!(err.to_string(), "total_sold is required");

        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "amount".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
