//! # Chat Wire Protocol
//!
//! Envelope and frame types for the chat bridge.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Chat Bridge Frames                               │
//! │                                                                         │
//! │  PUBLISH (agent → bridge)                                              │
//! │  ────────────────────────                                              │
//! │  { "channel": "dm.9230...", "message":                                 │
//! │      { "kind": "chat", "payload": { id, author, content, channel } } } │
//! │                                                                         │
//! │  DELIVER (bridge → agent)                                              │
//! │  ────────────────────────                                              │
//! │  Same frame plus "token": the broker-assigned delivery token            │
//! │  (100ns ticks since epoch). The token timestamp, not arrival order,    │
//! │  decides how messages sort in a conversation.                          │
//! │                                                                         │
//! │  TYPING (both directions, never stored)                                │
//! │  ──────────────────────────────────────                                │
//! │  { "kind": "typing", "payload": { author, channel, active } }          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Envelopes serialize as adjacently tagged JSON:
//! ```json
//! { "kind": "chat", "payload": { "id": "...", "author": "...", ... } }
//! ```

use serde::{Deserialize, Serialize};

// =============================================================================
// Envelope (Tagged Union)
// =============================================================================

/// All chat bridge envelopes.
///
/// Uses serde's adjacently tagged enum for clean JSON serialization:
/// `{ "kind": "chat", "payload": { ... } }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Envelope {
    /// A chat message.
    Chat(ChatPayload),

    /// A transient typing signal. Never persisted.
    Typing(TypingPayload),
}

// =============================================================================
// Payloads
// =============================================================================

/// A chat message on the wire.
///
/// The `id` is minted by the sender; receivers insert id-idempotently so
/// broker redelivery never duplicates a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    /// Message identifier (UUID v4, sender-minted).
    pub id: String,

    /// Sender identity (account or device id).
    pub author: String,

    /// Message body.
    pub content: String,

    /// Conversation channel this message belongs to.
    pub channel: String,
}

/// A typing indicator on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    /// Who is typing.
    pub author: String,

    /// Conversation channel.
    pub channel: String,

    /// True while composing; false when the composer goes idle.
    pub active: bool,
}

// =============================================================================
// Frame
// =============================================================================

/// One wire frame: an envelope addressed to a channel.
///
/// Outbound frames carry no token. Inbound frames carry the broker's
/// delivery token when the broker assigned one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Broker channel the envelope rides on.
    pub channel: String,

    /// The envelope itself.
    pub message: Envelope,

    /// Broker delivery token (inbound only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Frame {
    /// Builds an outbound frame (no token).
    pub fn outbound(channel: impl Into<String>, message: Envelope) -> Self {
        Frame {
            channel: channel.into(),
            message,
            token: None,
        }
    }

    /// Serializes to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// =============================================================================
// Helper Constructors
// =============================================================================

impl Envelope {
    /// Returns the envelope kind as a string (for logging).
    pub fn kind_name(&self) -> &'static str {
        match self {
            Envelope::Chat(_) => "chat",
            Envelope::Typing(_) => "typing",
        }
    }

    /// Creates a chat message envelope.
    pub fn chat(id: &str, author: &str, content: &str, channel: &str) -> Self {
        Envelope::Chat(ChatPayload {
            id: id.to_string(),
            author: author.to_string(),
            content: content.to_string(),
            channel: channel.to_string(),
        })
    }

    /// Creates a typing signal envelope.
    pub fn typing(author: &str, channel: &str, active: bool) -> Self {
        Envelope::Typing(TypingPayload {
            author: author.to_string(),
            channel: channel.to_string(),
            active,
        })
    }
}
