//! # khata-db: Record Store for Khata
//!
//! This crate provides database access for the Khata ledger.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Khata Data Flow                                 │
//! │                                                                         │
//! │  App / khata-agent services                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     khata-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐  ┌───────────────┐  ┌───────────────────┐  │   │
//! │  │   │   Database   │  │ Repositories  │  │    StoreWriter    │  │   │
//! │  │   │   (pool.rs)  │  │ customer/     │  │    (writer.rs)    │  │   │
//! │  │   │              │  │ product/      │  │                   │  │   │
//! │  │   │ SqlitePool   │◄─│ receipt/      │─►│ one transaction,  │  │   │
//! │  │   │ ChangeBus    │  │ credit/chat   │  │ events on commit  │  │   │
//! │  │   └──────────────┘  └───────────────┘  └───────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐  ┌───────────────┐                          │   │
//! │  │   │ Typed queries│  │  Migrations   │                          │   │
//! │  │   │  (query.rs)  │  │  (embedded)   │                          │   │
//! │  │   └──────────────┘  └───────────────┘                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <app data dir>/khata.db  (WAL, foreign keys on)              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`writer`] - Single-transaction write scoping
//! - [`changes`] - Post-commit change event bus
//! - [`query`] - Typed receipt/message filters
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Store error types
//! - [`repository`] - Repository implementations (customer, receipt, etc.)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use khata_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/khata.db")).await?;
//!
//! // Reads: straight from repositories
//! let customers = db.customers().search("ali", 20).await?;
//!
//! // Writes: one writer, one transaction, events on commit
//! let mut w = db.writer().await?;
//! db.customers().insert(&mut w, &customer).await?;
//! w.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod changes;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod query;
pub mod repository;
pub mod writer;

// =============================================================================
// Re-exports
// =============================================================================

pub use changes::{ChangeBus, ChangeEvent, ChangeOp, Entity};
pub use error::{StoreError, StoreResult};
pub use pool::{Database, DbConfig};
pub use query::{MessageQuery, ReceiptQuery};
pub use writer::StoreWriter;

// Repository re-exports for convenience
pub use repository::chat::ChatRepository;
pub use repository::credit::CreditRepository;
pub use repository::customer::CustomerRepository;
pub use repository::product::ProductRepository;
pub use repository::receipt::ReceiptRepository;
