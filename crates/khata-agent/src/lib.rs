//! # Khata Agent
//!
//! Background services that keep a shop's ledger talking to the outside
//! world: realtime chat over the bridge, credit due reminders, and the
//! few hosted-backend calls the app needs.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        khata-agent                           │
//! │                                                              │
//! │  ┌────────────┐     ┌─────────────┐     ┌────────────────┐  │
//! │  │ChatService │ ──► │ WsTransport │ ──► │  chat bridge   │  │
//! │  └────────────┘     └──────┬──────┘     └────────────────┘  │
//! │                            │ deliveries                     │
//! │                     ┌──────▼────────┐      ┌────────────┐   │
//! │                     │InboundApplier │ ───► │  khata-db  │   │
//! │                     └───────────────┘      └──────▲─────┘   │
//! │  ┌─────────────────┐                              │         │
//! │  │ ReminderScanner │ ─────────────────────────────┘         │
//! │  └────────┬────────┘                                        │
//! │           └──► Notifier (log line, chat, SMS, ...)          │
//! │                                                             │
//! │  ┌───────────┐                                              │
//! │  │ ApiClient │ ──► hosted backend (auth, groups, wallets)   │
//! │  └───────────┘                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each service is an independent tokio task created with a `new`/`spawn`
//! that hands back a handle; handles stop their task over an mpsc signal.
//! Nothing here blocks the store: writes go through `Database::writer`
//! like every other caller.
//!
//! ## Wiring
//! ```rust,ignore
//! use std::sync::Arc;
//! use khata_agent::{
//!     AgentConfig, ChatService, InboundApplier, LogNotifier,
//!     ReminderScanner, TypingRegistry, WsTransport,
//! };
//! use khata_db::{Database, DbConfig};
//!
//! # async fn wire() -> khata_agent::AgentResult<()> {
//! let config = AgentConfig::load_or_default(None);
//! let db = Arc::new(Database::new(DbConfig::new("khata.db")).await?);
//!
//! // Reminders run with or without connectivity
//! let (scanner, reminders) = ReminderScanner::new(
//!     db.clone(),
//!     Arc::new(LogNotifier),
//!     config.reminder.window_days,
//!     config.reminder_tick(),
//! );
//! tokio::spawn(scanner.run());
//!
//! // Chat only once a bridge endpoint is configured
//! if let Some(transport_config) = config.transport_config() {
//!     let (transport, deliveries) = WsTransport::spawn(transport_config);
//!     let typing = Arc::new(TypingRegistry::new(config.typing_ttl()));
//!     let (applier, inbound) = InboundApplier::new(db.clone(), typing.clone(), deliveries);
//!     tokio::spawn(applier.run());
//!
//!     let chat = ChatService::new(Arc::new(transport), "923001112222")
//!         .with_publish_timeout(config.publish_timeout());
//!     chat.send_message("dm.923009998888", "Salaam!").await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod inbound;
pub mod protocol;
pub mod reminder;
pub mod transport;

pub use api::{ApiClient, LoginResponse, PaymentProvider, Profile};
pub use chat::{ChatService, TypingRegistry};
pub use config::{AgentConfig, ApiSettings, ChatSettings, DeviceSettings, ReminderSettings};
pub use error::{AgentError, AgentResult};
pub use inbound::{InboundApplier, InboundApplierHandle};
pub use protocol::{ChatPayload, Envelope, Frame, TypingPayload};
pub use reminder::{DueCredit, LogNotifier, Notifier, ReminderScanner, ReminderScannerHandle};
pub use transport::{ConnectionState, Delivery, Signaling, TransportConfig, WsTransport};
