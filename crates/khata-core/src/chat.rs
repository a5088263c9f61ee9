//! # Chat Ordering
//!
//! Delivery-token decoding and client-side message ordering.
//!
//! ## Why Decode Tokens At All?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE ARRIVAL-ORDER PROBLEM                                              │
//! │                                                                         │
//! │  The signaling broker stamps each delivery with a token:                │
//! │    "17069647980005352"  (17 digits, 100 ns ticks since Unix epoch)      │
//! │                                                                         │
//! │  Deliveries can arrive out of order (reconnects, history backfill),     │
//! │  so arrival order is NOT message order.                                 │
//! │                                                                         │
//! │  token / 10^7            → whole seconds                                │
//! │  (token % 10^7) × 100    → nanoseconds remainder                        │
//! │                                                                         │
//! │  Decode once at apply time, store the instant, sort by it on read.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Conversations render newest-first; the store orders the same way, and
//! [`sort_newest_first`] re-asserts it after client-side merges.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::ValidationError;
use crate::types::Message;
use crate::validation::ValidationResult;

/// Broker token resolution: ticks of 100 ns, i.e. 10^7 per second.
pub const TOKEN_TICKS_PER_SECOND: i64 = 10_000_000;

// =============================================================================
// Delivery Tokens
// =============================================================================

/// Decodes a broker delivery token into a UTC instant.
///
/// ## Example
/// ```rust
/// use khata_core::chat::decode_delivery_token;
///
/// // 2024-01-01 00:00:00 UTC in 100 ns ticks
/// let at = decode_delivery_token("17040672000000000").unwrap();
/// assert_eq!(at.to_rfc3339(), "2024-01-01T00:00:00+00:00");
/// ```
///
/// ## Errors
/// Rejects empty, non-numeric, negative, and out-of-range tokens.
pub fn decode_delivery_token(token: &str) -> ValidationResult<DateTime<Utc>> {
    let token = token.trim();

    if token.is_empty() {
        return Err(ValidationError::Required {
            field: "delivery_token".to_string(),
        });
    }

    let ticks: i64 = token.parse().map_err(|_| ValidationError::InvalidFormat {
        field: "delivery_token".to_string(),
        reason: "must be a decimal tick count".to_string(),
    })?;

    if ticks < 0 {
        return Err(ValidationError::InvalidFormat {
            field: "delivery_token".to_string(),
            reason: "must not be negative".to_string(),
        });
    }

    let secs = ticks / TOKEN_TICKS_PER_SECOND;
    let nanos = (ticks % TOKEN_TICKS_PER_SECOND) * 100;

    match Utc.timestamp_opt(secs, nanos as u32) {
        chrono::LocalResult::Single(at) => Ok(at),
        _ => Err(ValidationError::InvalidFormat {
            field: "delivery_token".to_string(),
            reason: "tick count is out of range".to_string(),
        }),
    }
}

/// Encodes a UTC instant as a broker delivery token.
///
/// Used when paging history ("everything before this token") and by
/// tests that fabricate deliveries.
pub fn encode_delivery_token(at: DateTime<Utc>) -> String {
    let secs = at.timestamp();
    let sub_ticks = i64::from(at.timestamp_subsec_nanos()) / 100;
    (secs * TOKEN_TICKS_PER_SECOND + sub_ticks).to_string()
}

// =============================================================================
// Ordering
// =============================================================================

/// Sorts messages newest-first by decoded broker time, id as tie-break.
///
/// The tie-break keeps the order deterministic when two deliveries land
/// on the same tick (bulk history backfill does this).
pub fn sort_newest_first(messages: &mut [Message]) {
    messages.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then_with(|| b.id.cmp(&a.id)));
}

/// Returns the most recent message, if any.
pub fn latest_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().max_by(|a, b| {
        a.sent_at
            .cmp(&b.sent_at)
            .then_with(|| a.id.cmp(&b.id))
    })
}

/// Counts unread messages from peers. Own messages are never unread.
pub fn unread_count(messages: &[Message], own_identity: &str) -> usize {
    messages
        .iter()
        .filter(|m| !m.is_read && m.author != own_identity)
        .count()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, author: &str, sent_at: DateTime<Utc>, is_read: bool) -> Message {
        Message {
            id: id.to_string(),
            channel: "ch.test".to_string(),
            author: author.to_string(),
            body: "hello".to_string(),
            sent_at,
            delivery_token: Some(encode_delivery_token(sent_at)),
            is_read,
            created_at: sent_at,
        }
    }

    #[test]
    fn test_decode_known_token() {
        let at = decode_delivery_token("17040672000000000").unwrap();
        assert_eq!(at.to_rfc3339(), "2024-01-01T00:00:00+00:00");

        // Sub-second ticks survive the decode
        let at = decode_delivery_token("17040672000005352").unwrap();
        assert_eq!(at.timestamp_subsec_nanos(), 535_200);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_delivery_token("").is_err());
        assert!(decode_delivery_token("   ").is_err());
        assert!(decode_delivery_token("not-a-token").is_err());
        assert!(decode_delivery_token("-17040672000000000").is_err());
        // Larger than i64
        assert!(decode_delivery_token("99999999999999999999999").is_err());
    }

    #[test]
    fn test_newest_first_ordering() {
        let t1 = decode_delivery_token("17040672000000000").unwrap();
        let t2 = decode_delivery_token("17040672600000000").unwrap();
        let t3 = decode_delivery_token("17040673200000000").unwrap();

        // Arrival order scrambled: T3, T1, T2
        let mut messages = vec![
            message("m3", "a", t3, true),
            message("m1", "a", t1, true),
            message("m2", "a", t2, true),
        ];
        sort_newest_first(&mut messages);

        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m3", "m2", "m1"]);
    }

    #[test]
    fn test_ordering_tie_breaks_on_id() {
        let t = decode_delivery_token("17040672000000000").unwrap();
        let mut messages = vec![message("a", "x", t, true), message("b", "x", t, true)];
        sort_newest_first(&mut messages);
        assert_eq!(messages[0].id, "b");

        assert_eq!(latest_message(&messages).map(|m| m.id.as_str()), Some("b"));
    }

    #[test]
    fn test_unread_count_skips_own_messages() {
        let t = decode_delivery_token("17040672000000000").unwrap();
        let messages = vec![
            message("m1", "+923001112222", t, false),
            message("m2", "+923001112222", t, true),
            message("m3", "me", t, false),
        ];
        assert_eq!(unread_count(&messages, "me"), 1);
    }
}
