//! # Validation Module
//!
//! Input validation utilities for Khata.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend                                                     │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── UNIQUE constraints                                                │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Defense in depth: multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use khata_core::validation::{validate_mobile, validate_quantity};
//!
//! // Normalize a mobile number before storing it
//! let mobile = validate_mobile("+92 300 111-2222").unwrap();
//! assert_eq!(mobile, "+923001112222");
//!
//! // Validate quantity before a receipt line is added
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_MESSAGE_CHARS, MAX_RECEIPT_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a customer or contact name.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 120 characters
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 120 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 120,
        });
    }

    Ok(())
}

/// Validates and normalizes a mobile number.
///
/// Mobile numbers double as chat identities, so they are normalized to
/// a single canonical form before they reach the store or the wire.
///
/// ## Rules
/// - Spaces and dashes are stripped
/// - An optional leading `+`, then digits only
/// - 7 to 15 digits after normalization
///
/// ## Returns
/// The normalized number (e.g., `"+923001112222"`).
///
/// ## Example
/// ```rust
/// use khata_core::validation::validate_mobile;
///
/// assert_eq!(validate_mobile("+92 300 111-2222").unwrap(), "+923001112222");
/// assert!(validate_mobile("not a number").is_err());
/// ```
pub fn validate_mobile(mobile: &str) -> ValidationResult<String> {
    let normalized: String = mobile
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    if normalized.is_empty() {
        return Err(ValidationError::Required {
            field: "mobile".to_string(),
        });
    }

    let digits = normalized.strip_prefix('+').unwrap_or(&normalized);

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "mobile".to_string(),
            reason: "must contain only digits with an optional leading +".to_string(),
        });
    }

    if digits.len() < 7 {
        return Err(ValidationError::TooShort {
            field: "mobile".to_string(),
            min: 7,
        });
    }

    if digits.len() > 15 {
        return Err(ValidationError::TooLong {
            field: "mobile".to_string(),
            max: 15,
        });
    }

    Ok(normalized)
}

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - Must be between 1 and 50 characters
/// - Should contain only alphanumeric characters, hyphens, underscores
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - Must be between 1 and 200 characters
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

/// Validates and trims a chat message body.
///
/// ## Rules
/// - Must not be empty after trimming
/// - Must be at most [`MAX_MESSAGE_CHARS`] characters
///
/// ## Returns
/// The trimmed body.
pub fn validate_message_body(body: &str) -> ValidationResult<String> {
    let body = body.trim();

    if body.is_empty() {
        return Err(ValidationError::Required {
            field: "message".to_string(),
        });
    }

    if body.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ValidationError::TooLong {
            field: "message".to_string(),
            max: MAX_MESSAGE_CHARS,
        });
    }

    Ok(body.to_string())
}

/// Validates a broker channel name.
///
/// ## Rules
/// - Must not be empty
/// - Maximum 92 characters (broker limit)
/// - No whitespace, commas, or path characters (broker reserves them)
pub fn validate_channel(channel: &str) -> ValidationResult<()> {
    let channel = channel.trim();

    if channel.is_empty() {
        return Err(ValidationError::Required {
            field: "channel".to_string(),
        });
    }

    if channel.len() > 92 {
        return Err(ValidationError::TooLong {
            field: "channel".to_string(),
            max: 92,
        });
    }

    if channel
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, ',' | ':' | '*' | '/' | '\\'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "channel".to_string(),
            reason: "must not contain whitespace, commas, or path characters".to_string(),
        });
    }

    Ok(())
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (returns all/default results)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
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

/// Validates a price in the smallest currency unit.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items)
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

/// Validates a payment amount.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Cannot pay zero or negative amounts
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates receipt size (number of line items).
///
/// ## Rules
/// - Must have at least one item
/// - Must not exceed MAX_RECEIPT_ITEMS (100)
pub fn validate_receipt_size(item_count: usize) -> ValidationResult<()> {
    if item_count == 0 {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if item_count > MAX_RECEIPT_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_RECEIPT_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Rules
/// - Must be a valid UUID format
/// - 36 characters with hyphens: xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
