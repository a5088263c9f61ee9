//! # Agent Configuration
//!
//! TOML file + `KHATA_*` environment overrides.
//!
//! ## Example
//! ```toml
//! [device]
//! id = "a1b2c3d4-..."
//! name = "Counter PC"
//!
//! [chat]
//! endpoint_url = "wss://bridge.khata.pk/chat"
//! typing_ttl_secs = 6
//!
//! [reminder]
//! window_days = 3
//! tick_secs = 3600
//!
//! [api]
//! base_url = "https://api.khata.pk/v1"
//! ```
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! a working offline configuration: chat and API stay off until their
//! URLs are set. The device id is minted on first default and should be
//! pinned with [`AgentConfig::save`].

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::error::{AgentError, AgentResult};
use crate::transport::TransportConfig;

// =============================================================================
// Settings Sections
// =============================================================================

/// Identity of this agent installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Stable identifier for this device.
    #[serde(default = "default_device_id")]
    pub id: String,

    /// Human-readable label.
    #[serde(default = "default_device_name")]
    pub name: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            id: default_device_id(),
            name: default_device_name(),
        }
    }
}

/// Chat bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    /// WebSocket URL of the chat bridge. Chat stays off when unset.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// How long a typing indicator stays fresh.
    #[serde(default = "default_typing_ttl_secs")]
    pub typing_ttl_secs: u64,

    /// Bound on a single publish attempt.
    #[serde(default = "default_publish_timeout_secs")]
    pub publish_timeout_secs: u64,

    /// WebSocket connect timeout.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        ChatSettings {
            endpoint_url: None,
            typing_ttl_secs: default_typing_ttl_secs(),
            publish_timeout_secs: default_publish_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Credit reminder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderSettings {
    /// Days ahead of the due date reminders start.
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Scan interval in seconds.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        ReminderSettings {
            window_days: default_window_days(),
            tick_secs: default_tick_secs(),
        }
    }
}

/// Hosted backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Backend base URL. API calls stay off when unset.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: None,
            timeout_secs: default_api_timeout_secs(),
        }
    }
}

// =============================================================================
// Agent Configuration
// =============================================================================

/// Top-level agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub device: DeviceSettings,
    pub chat: ChatSettings,
    pub reminder: ReminderSettings,
    pub api: ApiSettings,
}

impl AgentConfig {
    /// Loads configuration from `path`, or the default location.
    ///
    /// Environment overrides are applied after the file is read, then the
    /// result is validated.
    pub fn load(path: Option<PathBuf>) -> AgentResult<Self> {
        let path = match path {
            Some(p) => p,
            None => Self::default_config_path()?,
        };

        let raw = std::fs::read_to_string(&path)?;
        let mut config: AgentConfig = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;

        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Loads configuration, falling back to defaults on any failure.
    pub fn load_or_default(path: Option<PathBuf>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(?e, "Using default configuration");
                let mut config = Self::default();
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Saves configuration to `path`, or the default location.
    pub fn save(&self, path: Option<PathBuf>) -> AgentResult<()> {
        let path = match path {
            Some(p) => p,
            None => Self::default_config_path()?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AgentError::ConfigSaveFailed(e.to_string()))?;
        }

        let raw = toml::to_string_pretty(self)?;
        std::fs::write(&path, raw).map_err(|e| AgentError::ConfigSaveFailed(e.to_string()))?;

        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Default configuration file path for the current platform.
    pub fn default_config_path() -> AgentResult<PathBuf> {
        let dirs = directories::ProjectDirs::from("pk", "khata", "khata")
            .ok_or_else(|| AgentError::ConfigLoadFailed("no home directory".into()))?;
        Ok(dirs.config_dir().join("agent.toml"))
    }

    /// Applies `KHATA_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("KHATA_DEVICE_ID") {
            if !id.is_empty() {
                self.device.id = id;
            }
        }
        if let Ok(name) = std::env::var("KHATA_DEVICE_NAME") {
            if !name.is_empty() {
                self.device.name = name;
            }
        }
        if let Ok(url) = std::env::var("KHATA_CHAT_URL") {
            self.chat.endpoint_url = Some(url);
        }
        if let Ok(url) = std::env::var("KHATA_API_URL") {
            self.api.base_url = Some(url);
        }
        if let Ok(days) = std::env::var("KHATA_REMINDER_WINDOW_DAYS") {
            if let Ok(v) = days.parse() {
                self.reminder.window_days = v;
            }
        }
        if let Ok(secs) = std::env::var("KHATA_REMINDER_TICK_SECS") {
            if let Ok(v) = secs.parse() {
                self.reminder.tick_secs = v;
            }
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> AgentResult<()> {
        if self.device.id.trim().is_empty() {
            return Err(AgentError::MissingDeviceId);
        }

        if let Some(url) = &self.chat.endpoint_url {
            let parsed = Url::parse(url)?;
            if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
                return Err(AgentError::InvalidConfig(format!(
                    "chat endpoint must be ws:// or wss://, got {}://",
                    parsed.scheme()
                )));
            }
        }

        if let Some(url) = &self.api.base_url {
            let parsed = Url::parse(url)?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(AgentError::InvalidConfig(format!(
                    "api base url must be http:// or https://, got {}://",
                    parsed.scheme()
                )));
            }
        }

        if self.chat.typing_ttl_secs == 0 {
            return Err(AgentError::InvalidConfig(
                "typing_ttl_secs must be positive".into(),
            ));
        }

        if self.reminder.tick_secs == 0 {
            return Err(AgentError::InvalidConfig(
                "reminder tick_secs must be positive".into(),
            ));
        }

        Ok(())
    }

    // =========================================================================
    // Derived Values
    // =========================================================================

    pub fn typing_ttl(&self) -> Duration {
        Duration::from_secs(self.chat.typing_ttl_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.chat.publish_timeout_secs)
    }

    pub fn reminder_tick(&self) -> Duration {
        Duration::from_secs(self.reminder.tick_secs)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Transport configuration, when a chat endpoint is set.
    pub fn transport_config(&self) -> Option<TransportConfig> {
        self.chat.endpoint_url.as_ref().map(|url| TransportConfig {
            url: url.clone(),
            connect_timeout: Duration::from_secs(self.chat.connect_timeout_secs),
            ..Default::default()
        })
    }
}

// =============================================================================
// Defaults
// =============================================================================

fn default_device_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_device_name() -> String {
    "Khata Counter".to_string()
}

fn default_typing_ttl_secs() -> u64 {
    6
}

fn default_publish_timeout_secs() -> u64 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_window_days() -> u32 {
    3
}

fn default_tick_secs() -> u64 {
    3600
}

fn default_api_timeout_secs() -> u64 {
    15
}
