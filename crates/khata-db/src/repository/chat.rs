//! # Chat Repository
//!
//! Database operations for contacts, conversations, and messages.
//!
//! ## Idempotent Message Inserts
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The same message can arrive twice:                                    │
//! │                                                                         │
//! │    live delivery ──────┐                                               │
//! │                        ├──► insert_message(id = "m1")                  │
//! │    history backfill ───┘                                               │
//! │                                                                         │
//! │  Messages are keyed by the publisher-assigned id, and inserts use      │
//! │  INSERT OR IGNORE: the first write wins, the duplicate reports         │
//! │  `false` and changes nothing. Ordering never depends on arrival        │
//! │  order, only on the broker timestamp stored in sent_at.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::changes::{ChangeEvent, ChangeOp, Entity};
use crate::error::StoreResult;
use crate::query::MessageQuery;
use crate::writer::StoreWriter;
use khata_core::{Contact, Conversation, ConversationKind, Message};

/// Database row for a conversation; `member_ids` is JSON TEXT in the
/// store and a `Vec<String>` in the domain type.
#[derive(Debug, sqlx::FromRow)]
struct ConversationRow {
    id: String,
    channel: String,
    kind: ConversationKind,
    subject: Option<String>,
    member_ids: String,
    last_activity_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl ConversationRow {
    fn into_conversation(self) -> StoreResult<Conversation> {
        let member_ids: Vec<String> = serde_json::from_str(&self.member_ids)?;
        Ok(Conversation {
            id: self.id,
            channel: self.channel,
            kind: self.kind,
            subject: self.subject,
            member_ids,
            last_activity_at: self.last_activity_at,
            created_at: self.created_at,
        })
    }
}

/// Repository for chat database operations.
#[derive(Debug, Clone)]
pub struct ChatRepository {
    pool: SqlitePool,
}

impl ChatRepository {
    /// Creates a new ChatRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ChatRepository { pool }
    }

    // =========================================================================
    // Contacts
    // =========================================================================

    /// Lists all contacts, display-name order.
    pub async fn contacts(&self) -> StoreResult<Vec<Contact>> {
        let contacts = sqlx::query_as::<_, Contact>(
            "SELECT id, display_name, mobile, channel_id, created_at, updated_at \
             FROM contacts ORDER BY display_name COLLATE NOCASE",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(contacts)
    }

    /// Gets a contact by mobile number.
    pub async fn contact_by_mobile(&self, mobile: &str) -> StoreResult<Option<Contact>> {
        let contact = sqlx::query_as::<_, Contact>(
            "SELECT id, display_name, mobile, channel_id, created_at, updated_at \
             FROM contacts WHERE mobile = ?1",
        )
        .bind(mobile)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contact)
    }

    /// Inserts or refreshes a contact, keyed by mobile number.
    ///
    /// On the refresh path the stored row keeps its original id; the
    /// staged change event carries that id, not the caller's.
    pub async fn upsert_contact(&self, w: &mut StoreWriter, contact: &Contact) -> StoreResult<()> {
        debug!(mobile = %contact.mobile, "Upserting contact");

        let now = Utc::now();

        let stored_id: String = sqlx::query_scalar(
            "INSERT INTO contacts (id, display_name, mobile, channel_id, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(mobile) DO UPDATE SET \
               display_name = excluded.display_name, \
               channel_id = excluded.channel_id, \
               updated_at = ?7 \
             RETURNING id",
        )
        .bind(&contact.id)
        .bind(&contact.display_name)
        .bind(&contact.mobile)
        .bind(&contact.channel_id)
        .bind(contact.created_at)
        .bind(contact.updated_at)
        .bind(now)
        .fetch_one(w.conn())
        .await?;

        w.stage(ChangeEvent::new(Entity::Contact, &stored_id, ChangeOp::Updated));
        Ok(())
    }

    // =========================================================================
    // Conversations
    // =========================================================================

    /// Lists all conversations, most recently active first.
    pub async fn conversations(&self) -> StoreResult<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            "SELECT id, channel, kind, subject, member_ids, last_activity_at, created_at \
             FROM conversations ORDER BY last_activity_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ConversationRow::into_conversation).collect()
    }

    /// Gets the conversation bound to a broker channel.
    pub async fn conversation_by_channel(&self, channel: &str) -> StoreResult<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>(
            "SELECT id, channel, kind, subject, member_ids, last_activity_at, created_at \
             FROM conversations WHERE channel = ?1",
        )
        .bind(channel)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ConversationRow::into_conversation).transpose()
    }

    /// Inserts or refreshes a conversation, keyed by channel.
    ///
    /// Membership and subject follow the given record (the backend API is
    /// the source of truth for groups); `last_activity_at` only moves
    /// forward via `insert_message`. On the refresh path the stored row
    /// keeps its original id, and the staged change event carries that id.
    pub async fn upsert_conversation(
        &self,
        w: &mut StoreWriter,
        conversation: &Conversation,
    ) -> StoreResult<()> {
        debug!(channel = %conversation.channel, kind = ?conversation.kind, "Upserting conversation");

        let member_ids = serde_json::to_string(&conversation.member_ids)?;

        let stored_id: String = sqlx::query_scalar(
            "INSERT INTO conversations \
             (id, channel, kind, subject, member_ids, last_activity_at, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(channel) DO UPDATE SET \
               kind = excluded.kind, \
               subject = excluded.subject, \
               member_ids = excluded.member_ids \
             RETURNING id",
        )
        .bind(&conversation.id)
        .bind(&conversation.channel)
        .bind(conversation.kind)
        .bind(&conversation.subject)
        .bind(member_ids)
        .bind(conversation.last_activity_at)
        .bind(conversation.created_at)
        .fetch_one(w.conn())
        .await?;

        w.stage(ChangeEvent::new(
            Entity::Conversation,
            &stored_id,
            ChangeOp::Updated,
        ));
        Ok(())
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Lists messages matching a typed filter, newest first.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let page = db
    ///     .chat()
    ///     .messages(&MessageQuery::channel("dm.923001112222"))
    ///     .await?;
    /// ```
    pub async fn messages(&self, filter: &MessageQuery) -> StoreResult<Vec<Message>> {
        let mut qb = filter.build();
        let messages = qb
            .build_query_as::<Message>()
            .fetch_all(&self.pool)
            .await?;

        Ok(messages)
    }

    /// Counts unread messages on a channel authored by someone else.
    pub async fn unread_count(&self, channel: &str, own_identity: &str) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages \
             WHERE channel = ?1 AND is_read = 0 AND author != ?2",
        )
        .bind(channel)
        .bind(own_identity)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Inserts a message if its id is new; returns whether a row landed.
    ///
    /// A successful insert also advances the conversation's
    /// `last_activity_at` to the message's `sent_at` (never backwards, so
    /// history backfill doesn't reorder the conversation list).
    pub async fn insert_message(&self, w: &mut StoreWriter, message: &Message) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO messages \
             (id, channel, author, body, sent_at, delivery_token, is_read, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&message.id)
        .bind(&message.channel)
        .bind(&message.author)
        .bind(&message.body)
        .bind(message.sent_at)
        .bind(&message.delivery_token)
        .bind(message.is_read)
        .bind(message.created_at)
        .execute(w.conn())
        .await?;

        let inserted = result.rows_affected() == 1;

        if inserted {
            sqlx::query(
                "UPDATE conversations SET last_activity_at = ?2 \
                 WHERE channel = ?1 AND last_activity_at < ?2",
            )
            .bind(&message.channel)
            .bind(message.sent_at)
            .execute(w.conn())
            .await?;

            w.stage(ChangeEvent::new(Entity::Message, &message.id, ChangeOp::Created));
        } else {
            debug!(id = %message.id, "Duplicate message delivery ignored");
        }

        Ok(inserted)
    }

    /// Marks every unread message on a channel (authored by others) read.
    ///
    /// ## Returns
    /// Number of messages flipped.
    pub async fn mark_read(
        &self,
        w: &mut StoreWriter,
        channel: &str,
        own_identity: &str,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = 1 \
             WHERE channel = ?1 AND is_read = 0 AND author != ?2",
        )
        .bind(channel)
        .bind(own_identity)
        .execute(w.conn())
        .await?;

        let flipped = result.rows_affected();
        if flipped > 0 {
            // Identity is the channel: readers refetch the thread
            w.stage(ChangeEvent::new(Entity::Message, channel, ChangeOp::Updated));
        }

        Ok(flipped)
    }

    /// Gets one message by id (diagnostics, duplicate investigation).
    pub async fn message_by_id(&self, id: &str) -> StoreResult<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(
            "SELECT id, channel, author, body, sent_at, delivery_token, is_read, created_at \
             FROM messages WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }
}
