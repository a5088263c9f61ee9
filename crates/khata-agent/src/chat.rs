//! # Chat Service
//!
//! Outbound chat operations and the transient typing registry.
//!
//! ## Send Flow
//! ```text
//! send_message(channel, body)
//!     │
//!     ├─ validate channel + body (trimmed)
//!     ├─ mint stamp (id + instant)
//!     ├─ publish Chat envelope ──────────► bridge ──► broker
//!     │       (fire-and-forget, bounded by publish_timeout)
//!     └─ return optimistic Message (is_read = true, no token)
//!
//! The durable copy is written when the broker echoes the message back
//! through the inbound applier. Insert is id-idempotent, so the echo
//! lands exactly once regardless of how many peers relay it.
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use khata_core::{validation, Message, RecordStamp};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, error};

use crate::error::{AgentError, AgentResult};
use crate::protocol::Envelope;
use crate::transport::Signaling;

/// Default bound on a single publish attempt.
const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Chat Service
// =============================================================================

/// Outbound chat facade over a [`Signaling`] transport.
pub struct ChatService {
    transport: Arc<dyn Signaling>,
    /// Own identity (mobile number) stamped on every outbound envelope.
    author: String,
    publish_timeout: Duration,
}

impl ChatService {
    /// Creates a chat service publishing as `author`.
    pub fn new(transport: Arc<dyn Signaling>, author: impl Into<String>) -> Self {
        ChatService {
            transport,
            author: author.into(),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    /// Overrides the publish timeout.
    pub fn with_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    /// Sends a chat message to a channel.
    ///
    /// Returns the optimistic local copy: stamped with a fresh id and the
    /// local send instant, marked read. The broker echo later supplies the
    /// authoritative `sent_at` and delivery token via the inbound applier.
    ///
    /// Publish failures are logged and returned. There is no retry and no
    /// outbox; the caller decides whether to resend.
    pub async fn send_message(&self, channel: &str, body: &str) -> AgentResult<Message> {
        validation::validate_channel(channel)?;
        let body = validation::validate_message_body(body)?;

        let stamp = RecordStamp::mint();
        let envelope = Envelope::chat(&stamp.id, &self.author, &body, channel);

        self.publish(channel, envelope).await?;
        debug!(channel = %channel, id = %stamp.id, "Chat message published");

        Ok(Message {
            id: stamp.id,
            channel: channel.to_string(),
            author: self.author.clone(),
            body,
            sent_at: stamp.at,
            delivery_token: None,
            is_read: true,
            created_at: stamp.at,
        })
    }

    /// Publishes a typing indicator. Transient: peers hold it in memory
    /// with a short TTL, nothing is persisted.
    pub async fn send_typing(&self, channel: &str, active: bool) -> AgentResult<()> {
        validation::validate_channel(channel)?;
        let envelope = Envelope::typing(&self.author, channel, active);
        self.publish(channel, envelope).await
    }

    async fn publish(&self, channel: &str, envelope: Envelope) -> AgentResult<()> {
        match timeout(
            self.publish_timeout,
            self.transport.publish(channel, envelope),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!(channel = %channel, ?e, "Publish failed");
                Err(e)
            }
            Err(_) => {
                error!(channel = %channel, "Publish timed out");
                Err(AgentError::Timeout(self.publish_timeout.as_secs()))
            }
        }
    }
}

// =============================================================================
// Typing Registry
// =============================================================================

/// In-memory registry of who is typing where.
///
/// Entries expire after the TTL; an explicit `active = false` clears
/// immediately. Never persisted.
pub struct TypingRegistry {
    ttl: Duration,
    entries: RwLock<HashMap<(String, String), Instant>>,
}

impl TypingRegistry {
    /// Creates a registry with the given entry TTL.
    pub fn new(ttl: Duration) -> Self {
        TypingRegistry {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Records a typing indicator for `author` on `channel`.
    pub async fn observe(&self, channel: &str, author: &str, active: bool) {
        let key = (channel.to_string(), author.to_string());
        let mut entries = self.entries.write().await;
        if active {
            entries.insert(key, Instant::now());
        } else {
            entries.remove(&key);
        }
        // Drop anything stale while we hold the lock
        let ttl = self.ttl;
        entries.retain(|_, at| at.elapsed() < ttl);
    }

    /// Returns true if anyone is actively typing on `channel`.
    pub async fn is_typing(&self, channel: &str) -> bool {
        let entries = self.entries.read().await;
        entries
            .iter()
            .any(|((c, _), at)| c == channel && at.elapsed() < self.ttl)
    }

    /// Returns the authors actively typing on `channel`, sorted.
    pub async fn typists(&self, channel: &str) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut authors: Vec<String> = entries
            .iter()
            .filter(|((c, _), at)| c == channel && at.elapsed() < self.ttl)
            .map(|((_, a), _)| a.clone())
            .collect();
        authors.sort();
        authors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackSignaling;

    fn service(loopback: &Arc<LoopbackSignaling>) -> ChatService {
        ChatService::new(loopback.clone() as Arc<dyn Signaling>, "923001112222")
    }

    #[tokio::test]
    async fn test_send_message_publishes_and_returns_optimistic_copy() {
        let loopback = Arc::new(LoopbackSignaling::new());
        let chat = service(&loopback);

        let message = chat
            .send_message("dm.923009998888", "  Salaam, order ready?  ")
            .await
            .unwrap();

        assert_eq!(message.body, "Salaam, order ready?");
        assert_eq!(message.author, "923001112222");
        assert!(message.is_read);
        assert!(message.delivery_token.is_none());

        let sent = loopback.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "dm.923009998888");
        match &sent[0].1 {
            Envelope::Chat(payload) => {
                assert_eq!(payload.id, message.id);
                assert_eq!(payload.content, "Salaam, order ready?");
                assert_eq!(payload.channel, "dm.923009998888");
            }
            other => panic!("expected chat envelope, got {}", other.kind_name()),
        }
    }

    #[tokio::test]
    async fn test_send_message_rejects_blank_body() {
        let loopback = Arc::new(LoopbackSignaling::new());
        let chat = service(&loopback);

        let err = chat.send_message("dm.1", "   ").await.unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
        assert!(loopback.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_message_surfaces_disconnect() {
        let loopback = Arc::new(LoopbackSignaling::new());
        loopback.set_connected(false);
        let chat = service(&loopback);

        let err = chat.send_message("dm.1", "hello").await.unwrap_err();
        assert!(matches!(err, AgentError::Disconnected));
    }

    #[tokio::test]
    async fn test_send_typing_publishes_flag() {
        let loopback = Arc::new(LoopbackSignaling::new());
        let chat = service(&loopback);

        chat.send_typing("dm.1", true).await.unwrap();
        chat.send_typing("dm.1", false).await.unwrap();

        let sent = loopback.sent();
        assert_eq!(sent.len(), 2);
        match (&sent[0].1, &sent[1].1) {
            (Envelope::Typing(start), Envelope::Typing(stop)) => {
                assert!(start.active);
                assert!(!stop.active);
                assert_eq!(start.author, "923001112222");
            }
            _ => panic!("expected typing envelopes"),
        }
    }

    #[tokio::test]
    async fn test_typing_registry_tracks_and_clears() {
        let registry = TypingRegistry::new(Duration::from_secs(60));

        registry.observe("dm.1", "a", true).await;
        registry.observe("dm.1", "b", true).await;
        registry.observe("dm.2", "c", true).await;

        assert!(registry.is_typing("dm.1").await);
        assert_eq!(registry.typists("dm.1").await, vec!["a", "b"]);

        registry.observe("dm.1", "a", false).await;
        assert_eq!(registry.typists("dm.1").await, vec!["b"]);
        assert!(!registry.is_typing("dm.3").await);
    }

    #[tokio::test]
    async fn test_typing_registry_expires_entries() {
        // Zero TTL: every entry is stale the instant it lands
        let registry = TypingRegistry::new(Duration::ZERO);

        registry.observe("dm.1", "a", true).await;
        assert!(!registry.is_typing("dm.1").await);
        assert!(registry.typists("dm.1").await.is_empty());
    }
}
