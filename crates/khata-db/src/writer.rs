//! # Store Writer
//!
//! The single write path into the store.
//!
//! ## Exactly One Transaction, By Construction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Write Transaction Scoping                          │
//! │                                                                         │
//! │  let mut w = db.writer().await?;          ← BEGIN (the only way)       │
//! │                                                                         │
//! │  db.receipts().create(&mut w, ...).await?;   ← writes take &mut w      │
//! │  db.credits().open(&mut w, ...).await?;      ← same transaction        │
//! │                                                                         │
//! │  w.commit().await?;                       ← COMMIT, then publish       │
//! │                                                                         │
//! │  Repository write methods only accept a &mut StoreWriter, so:          │
//! │  • a write outside a transaction does not typecheck                    │
//! │  • nesting is impossible (writer() is the only BEGIN)                  │
//! │  • dropping the writer rolls back and publishes nothing                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Change events raised during the transaction are staged on the writer
//! and handed to the [`ChangeBus`] strictly after commit. Subscribers
//! therefore never observe a change that later rolled back.

use sqlx::{Sqlite, SqliteConnection, Transaction};
use tracing::debug;

use crate::changes::{ChangeBus, ChangeEvent};
use crate::error::{StoreError, StoreResult};

/// An open write transaction with its staged change events.
///
/// Created by `Database::writer()`; consumed by [`commit`] or
/// [`rollback`] (or dropped, which rolls back).
///
/// [`commit`]: StoreWriter::commit
/// [`rollback`]: StoreWriter::rollback
pub struct StoreWriter {
    tx: Transaction<'static, Sqlite>,
    bus: ChangeBus,
    pending: Vec<ChangeEvent>,
}

impl StoreWriter {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>, bus: ChangeBus) -> Self {
        StoreWriter {
            tx,
            bus,
            pending: Vec::new(),
        }
    }

    /// The transaction connection repositories execute against.
    pub(crate) fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Stages a change event for publication after commit.
    pub(crate) fn stage(&mut self, event: ChangeEvent) {
        self.pending.push(event);
    }

    /// Events staged so far (diagnostics and tests).
    pub fn staged(&self) -> &[ChangeEvent] {
        &self.pending
    }

    /// Commits the transaction, then publishes the staged events.
    ///
    /// Publication happens strictly after the commit returns: if the
    /// commit fails, no subscriber ever hears about the writes.
    pub async fn commit(self) -> StoreResult<()> {
        let events = self.pending.len();

        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        for event in self.pending {
            self.bus.publish(event);
        }

        debug!(events, "Write transaction committed");
        Ok(())
    }

    /// Rolls back explicitly, discarding all writes and staged events.
    ///
    /// Dropping the writer has the same effect; this variant surfaces
    /// rollback errors instead of swallowing them.
    pub async fn rollback(self) -> StoreResult<()> {
        let discarded = self.pending.len();

        self.tx
            .rollback()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        debug!(discarded, "Write transaction rolled back");
        Ok(())
    }
}

impl std::fmt::Debug for StoreWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreWriter")
            .field("pending", &self.pending.len())
            .finish()
    }
}
