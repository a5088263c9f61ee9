//! # Agent Error Types
//!
//! Error types for the background services.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Agent Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  InvalidEnvelope        │ │
//! │  │  MissingDeviceId│  │  Disconnected   │  │  SerializationFailed    │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │     Store       │  │   Backend API   │  │      Internal           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  StoreError     │  │  Unauthorized   │  │  ChannelClosed          │ │
//! │  │  (passthrough)  │  │  NotFound       │  │  ShuttingDown           │ │
//! │  │  Validation     │  │  Rejected/Api   │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Store and validation failures pass through unchanged so callers can
//! still match on the inner variants; everything network-shaped collapses
//! into agent-level categories the UI can alert on.

use thiserror::Error;

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Agent error type covering all background-service failures.
#[derive(Debug, Error)]
pub enum AgentError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid agent configuration.
    #[error("Invalid agent configuration: {0}")]
    InvalidConfig(String),

    /// Missing device ID (required before any service starts).
    #[error("Device ID not configured. Run initial setup first.")]
    MissingDeviceId,

    /// Invalid endpoint URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Failed to establish the WebSocket connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected to the chat bridge.
    #[error("Disconnected from chat bridge")]
    Disconnected,

    /// Operation timed out.
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    /// TLS/SSL error.
    #[error("TLS error: {0}")]
    TlsError(String),

    /// WebSocket protocol error.
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Received a frame that is not a known envelope.
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Failed to serialize or deserialize a wire payload.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Store Errors (passthrough)
    // =========================================================================
    /// Record store failure.
    #[error(transparent)]
    Store(#[from] khata_db::StoreError),

    /// Input rejected before it reached the wire or the store.
    #[error(transparent)]
    Validation(#[from] khata_core::ValidationError),

    // =========================================================================
    // Backend API Errors
    // =========================================================================
    /// Backend rejected the credentials or the token expired.
    #[error("Not authorized. Sign in again.")]
    Unauthorized,

    /// Backend resource does not exist.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Backend rejected the request payload.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Backend returned an unexpected status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// HTTP request never completed.
    #[error("HTTP request failed: {0}")]
    HttpFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Channel send/receive failed (peer task gone).
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// Agent is shutting down.
    #[error("Agent is shutting down")]
    ShuttingDown,

    /// Internal agent error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for AgentError {
    fn from(err: url::ParseError) -> Self {
        AgentError::InvalidUrl(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AgentError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed => AgentError::Disconnected,
            WsError::AlreadyClosed => AgentError::Disconnected,
            WsError::Protocol(p) => AgentError::WebSocketError(p.to_string()),
            WsError::Io(io) => AgentError::ConnectionFailed(io.to_string()),
            WsError::Tls(tls) => AgentError::TlsError(tls.to_string()),
            other => AgentError::WebSocketError(other.to_string()),
        }
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for AgentError {
    fn from(err: toml::de::Error) -> Self {
        AgentError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for AgentError {
    fn from(err: toml::ser::Error) -> Self {
        AgentError::ConfigSaveFailed(err.to_string())
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            AgentError::ConnectionFailed(err.to_string())
        } else {
            AgentError::HttpFailed(err.to_string())
        }
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl AgentError {
    /// Returns true if the failure is transient and retrying may succeed.
    ///
    /// ## Retryable Errors
    /// - Connection failures (network issues)
    /// - Timeouts and disconnections
    /// - Transport-level WebSocket errors
    ///
    /// ## Non-Retryable Errors
    /// - Configuration problems
    /// - Rejected credentials and payloads
    /// - Store and validation failures
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::ConnectionFailed(_)
                | AgentError::Disconnected
                | AgentError::Timeout(_)
                | AgentError::WebSocketError(_)
                | AgentError::HttpFailed(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            AgentError::InvalidConfig(_)
                | AgentError::MissingDeviceId
                | AgentError::InvalidUrl(_)
                | AgentError::ConfigLoadFailed(_)
                | AgentError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if the user needs to sign in again.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, AgentError::Unauthorized)
    }
}
