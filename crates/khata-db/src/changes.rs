//! # Change Bus
//!
//! Broadcast notifications for committed record changes.
//!
//! ## Why A Bus And Not Live Queries?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Change Notification Flow                            │
//! │                                                                         │
//! │  StoreWriter.commit()                                                  │
//! │       │                                                                 │
//! │       │  (only after the transaction is durable)                        │
//! │       ▼                                                                 │
//! │  ChangeBus.publish(ChangeEvent)                                        │
//! │       │                                                                 │
//! │       ├──► UI subscriber       → re-runs its queries, re-renders       │
//! │       ├──► Aggregates cache    → recomputes day totals                 │
//! │       └──► Anything else       → subscribe() is all it takes           │
//! │                                                                         │
//! │  Observers subscribe to the STORE, not to screens. A render pass       │
//! │  can never mutate records, and a write path can never depend on        │
//! │  who is currently watching.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events carry identity (what changed), not data. Subscribers re-read
//! through repositories, which keeps every reader on the committed
//! snapshot instead of a payload that may already be stale.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the broadcast channel. Laggy subscribers lose oldest
/// events first and should fall back to a full re-read.
const CHANGE_BUS_CAPACITY: usize = 256;

// =============================================================================
// Event Types
// =============================================================================

/// Which record family changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Customer,
    Product,
    Receipt,
    Payment,
    Credit,
    InventoryEntry,
    Contact,
    Conversation,
    Message,
}

/// What happened to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Created,
    Updated,
    /// Soft deletes included; the row still exists but is inactive.
    Deleted,
}

/// A committed change to one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity: Entity,
    pub entity_id: String,
    pub op: ChangeOp,
}

impl ChangeEvent {
    /// Builds a change event.
    pub fn new(entity: Entity, entity_id: impl Into<String>, op: ChangeOp) -> Self {
        ChangeEvent {
            entity,
            entity_id: entity_id.into(),
            op,
        }
    }
}

// =============================================================================
// Change Bus
// =============================================================================

/// Fan-out of committed change events to any number of subscribers.
///
/// Cloning is cheap (shared sender); dropping a receiver unsubscribes.
#[derive(Debug, Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    /// Creates a new bus with the default capacity.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_BUS_CAPACITY);
        ChangeBus { tx }
    }

    /// Subscribes to committed changes from this point forward.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Publishes one event to all current subscribers.
    ///
    /// Publishing with no subscribers is not an error; the event is
    /// simply dropped.
    pub fn publish(&self, event: ChangeEvent) {
        match self.tx.send(event.clone()) {
            Ok(receivers) => {
                debug!(
                    entity = ?event.entity,
                    entity_id = %event.entity_id,
                    op = ?event.op,
                    receivers,
                    "Change published"
                );
            }
            Err(_) => {
                debug!(entity = ?event.entity, entity_id = %event.entity_id, "No subscribers");
            }
        }
    }

    /// Number of live subscribers (diagnostics).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        ChangeBus::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
