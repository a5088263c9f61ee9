//! # Inbound Applier
//!
//! Consumes deliveries from the transport and applies them locally.
//!
//! ```text
//! ┌───────────┐   Delivery    ┌─────────────────┐
//! │ Transport │ ────────────► │ InboundApplier  │
//! └───────────┘   (mpsc)      └────────┬────────┘
//!                                      │
//!                     ┌────────────────┴──────────────┐
//!                     ▼                               ▼
//!              Chat envelope                   Typing envelope
//!              INSERT OR IGNORE                flip in-memory
//!              into messages                   typing registry
//!              (id-idempotent,                 (TTL-bounded,
//!               sent_at from token)             never persisted)
//! ```
//!
//! Messages may arrive out of order or more than once; the store keyed
//! on the broker-assigned id absorbs both. `sent_at` comes from the
//! delivery token so history reads sort by broker time, not arrival.

use std::sync::Arc;

use chrono::Utc;
use khata_core::chat::decode_delivery_token;
use khata_core::Message;
use khata_db::Database;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::chat::TypingRegistry;
use crate::error::{AgentError, AgentResult};
use crate::protocol::{ChatPayload, Envelope};
use crate::transport::Delivery;

// =============================================================================
// Applier Handle
// =============================================================================

/// Handle for stopping a running [`InboundApplier`].
#[derive(Clone)]
pub struct InboundApplierHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl InboundApplierHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> AgentResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| AgentError::ChannelClosed("inbound shutdown".into()))
    }
}

// =============================================================================
// Inbound Applier
// =============================================================================

/// Background task that writes inbound deliveries through the store.
pub struct InboundApplier {
    db: Arc<Database>,
    typing: Arc<TypingRegistry>,
    delivery_rx: mpsc::Receiver<Delivery>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl InboundApplier {
    /// Creates the applier and its handle.
    pub fn new(
        db: Arc<Database>,
        typing: Arc<TypingRegistry>,
        delivery_rx: mpsc::Receiver<Delivery>,
    ) -> (Self, InboundApplierHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let applier = InboundApplier {
            db,
            typing,
            delivery_rx,
            shutdown_rx,
        };
        (applier, InboundApplierHandle { shutdown_tx })
    }

    /// Main applier loop. A failed apply is logged and the loop keeps
    /// going; one bad delivery must not stall the stream.
    pub async fn run(mut self) {
        info!("Inbound applier started");

        loop {
            tokio::select! {
                Some(delivery) = self.delivery_rx.recv() => {
                    if let Err(e) = self.apply(delivery).await {
                        error!(?e, "Failed to apply delivery");
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    info!("Inbound applier shutting down");
                    break;
                }
                else => {
                    info!("Delivery stream closed");
                    break;
                }
            }
        }
    }

    async fn apply(&self, delivery: Delivery) -> AgentResult<()> {
        match delivery.envelope {
            Envelope::Chat(payload) => self.apply_chat(payload, delivery.token).await,
            Envelope::Typing(payload) => {
                debug!(
                    channel = %payload.channel,
                    author = %payload.author,
                    active = payload.active,
                    "Typing signal"
                );
                self.typing
                    .observe(&payload.channel, &payload.author, payload.active)
                    .await;
                Ok(())
            }
        }
    }

    async fn apply_chat(&self, payload: ChatPayload, token: Option<String>) -> AgentResult<()> {
        let now = Utc::now();

        // Broker time from the token; arrival time if it is missing or bad.
        let sent_at = match token.as_deref() {
            Some(raw) => match decode_delivery_token(raw) {
                Ok(at) => at,
                Err(e) => {
                    warn!(id = %payload.id, ?e, "Bad delivery token, using arrival time");
                    now
                }
            },
            None => now,
        };

        let message = Message {
            id: payload.id,
            channel: payload.channel,
            author: payload.author,
            body: payload.content,
            sent_at,
            delivery_token: token,
            is_read: false,
            created_at: now,
        };

        let mut w = self.db.writer().await?;
        let inserted = self.db.chat().insert_message(&mut w, &message).await?;
        w.commit().await?;

        if inserted {
            debug!(id = %message.id, channel = %message.channel, "Stored inbound message");
        } else {
            debug!(id = %message.id, "Duplicate delivery ignored");
        }

        Ok(())
    }
}
