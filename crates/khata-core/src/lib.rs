//! # khata-core: Pure Business Logic for Khata
//!
//! This crate is the **heart** of Khata. It contains all business logic
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Khata Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                       Frontend (mobile)                         │   │
//! │  │    Receipt UI ──► Khata UI ──► Inventory UI ──► Chat UI        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ khata-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │aggregates │  │   chat    │  │   │
//! │  │   │  Receipt  │  │   Money   │  │  totals   │  │ ordering  │  │   │
//! │  │   │  Credit   │  │  (cents)  │  │settlement │  │  tokens   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   khata-db (Database Layer)                     │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Customer, Receipt, Credit, Message, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`aggregates`] - Derived amounts: sales totals, settlement, balances
//! - [`chat`] - Delivery-token decoding and message ordering
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Derived, Not Stored**: Settlement status and amounts left are always
//!    recomputed from base records, never persisted
//! 5. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use khata_core::aggregates::credit_amount_left;
//! use khata_core::money::Money;
//!
//! // A 5000-cent credit with 1500 cents repaid leaves 3500 owed.
//! let left = credit_amount_left(Money::from_cents(5000), Money::from_cents(1500));
//! assert_eq!(left.cents(), 3500);
//!
//! // Overpayment clamps at zero, never goes negative.
//! let over = credit_amount_left(Money::from_cents(5000), Money::from_cents(6000));
//! assert_eq!(over.cents(), 0);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregates;
pub mod chat;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use khata_core::Money` instead of
// `use khata_core::money::Money`

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed on a single receipt
///
/// ## Business Reason
/// Prevents runaway receipts and keeps shared-view rendering bounded.
/// Can be made configurable per-shop in future versions.
pub const MAX_RECEIPT_ITEMS: usize = 100;

/// Maximum quantity of a single item on a receipt line
///
/// ## Business Reason
/// Prevents accidental over-entry (e.g., typing 1000 instead of 10).
/// Configurable per-shop in future versions.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum characters in a chat message body
///
/// ## Business Reason
/// Keeps wire payloads small enough for the signaling broker's message
/// size limit with headroom for the envelope.
pub const MAX_MESSAGE_CHARS: usize = 2000;
