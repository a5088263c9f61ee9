//! # Error Types
//!
//! Domain-specific error types for khata-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  khata-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  khata-db errors (separate crate)                                      │
//! │  └── StoreError       - Database operation failures                    │
//! │                                                                         │
//! │  khata-agent errors (separate crate)                                   │
//! │  └── AgentError       - Transport/API/config failures                  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → StoreError/AgentError → UI alert  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, ID, amounts)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic
/// failures. They should be caught and translated to user-friendly
/// messages; none of them is retryable.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Customer cannot be found (bad id or soft-deleted).
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Product cannot be found (bad id, bad SKU, or soft-deleted).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Receipt cannot be found.
    #[error("Receipt not found: {0}")]
    ReceiptNotFound(String),

    /// Credit ledger entry cannot be found.
    #[error("Credit not found: {0}")]
    CreditNotFound(String),

    /// Insufficient stock to complete a sale.
    ///
    /// ## When This Occurs
    /// - Trying to sell more than is on hand
    ///
    /// ## User Workflow
    /// ```text
    /// Add to receipt (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "SUGAR-1KG", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 SUGAR-1KG in stock"
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Operation attempted on a cancelled receipt.
    ///
    /// Cancelled receipts are frozen history: no payments, no items,
    /// no re-cancel.
    #[error("Receipt {0} is cancelled, cannot perform operation")]
    ReceiptCancelled(String),

    /// Receipt has exceeded maximum allowed line items.
    #[error("Receipt cannot have more than {max} items")]
    ReceiptTooLarge { max: usize },

    /// A repayment would exceed the credit's remaining balance.
    ///
    /// Rejected before the zero-clamp on derived balances can hide the
    /// overshoot; overpayments must be explicit corrections, not typos.
    #[error("Repayment of {amount_cents} exceeds remaining balance {balance_cents} on credit {credit_id}")]
    RepaymentExceedsBalance {
        credit_id: String,
        balance_cents: i64,
        amount_cents: i64,
    },

    /// Payment amount is invalid.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid token, bad mobile).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate SKU).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
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
            sku: "SUGAR-1KG".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for SUGAR-1KG: available 3, requested 5"
        );
    }

    #[test]
    fn test_repayment_error_message() {
        let err = CoreError::RepaymentExceedsBalance {
            credit_id: "c1".to_string(),
            balance_cents: 3500,
            amount_cents: 5000,
        };
        assert_eq!(
            err.to_string(),
            "Repayment of 5000 exceeds remaining balance 3500 on credit c1"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "mobile".to_string(),
        };
        assert_eq!(err.to_string(), "mobile is required");

        let err = ValidationError::TooShort {
            field: "mobile".to_string(),
            min: 7,
        };
        assert_eq!(err.to_string(), "mobile must be at least 7 characters");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
