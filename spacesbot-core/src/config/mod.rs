//! Bot configuration
//!
//! Configuration comes from a TOML file or from `SPACESBOT_*` environment
//! variables. Loaders return the parsed values as-is; callers layer their
//! own overrides (CLI flags) on top and then run [`BotConfig::validate`].

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

mod error;

pub use error::ConfigError;

use crate::reader::ReadMarkerStrategy;
use crate::rooms::RoomId;

/// Main bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Homeserver base URL, e.g. `https://matrix.example.org`
    pub homeserver: String,

    /// Fully-qualified account id, e.g. `@bot:example.org`
    pub user_id: String,

    /// Access token for the account's long-lived session
    pub access_token: String,

    /// Root space the traversal starts from
    pub root_space_id: RoomId,

    /// Profile settings applied at startup
    pub presence: PresenceConfig,

    /// Traversal tunables
    pub traversal: TraversalConfig,

    /// Read-marker sweep tunables
    pub reader: ReaderConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Profile settings applied at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Display name shown to other users
    pub display_name: String,

    /// Status message attached to the `unavailable` presence
    pub status_msg: String,
}

/// Traversal tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Pause between federation joins
    #[serde(with = "humantime_serde")]
    pub join_delay: Duration,

    /// Join attempts per room before giving up
    pub max_join_attempts: u32,
}

/// Read-marker sweep tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Which sweep strategy to run
    pub strategy: ReadMarkerStrategy,

    /// Events requested per history page
    pub page_limit: u32,

    /// Pause between history pages within one room
    #[serde(with = "humantime_serde")]
    pub page_delay: Duration,

    /// Pause between rooms after a marker update
    #[serde(with = "humantime_serde")]
    pub room_delay: Duration,

    /// Long-poll timeout for the initial sync
    #[serde(with = "humantime_serde")]
    pub sync_timeout: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            homeserver: String::new(),
            user_id: String::new(),
            access_token: String::new(),
            root_space_id: RoomId::new(""),
            presence: PresenceConfig::default(),
            traversal: TraversalConfig::default(),
            reader: ReaderConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            display_name: "spacesbot".to_string(),
            status_msg: "I am just a bot".to_string(),
        }
    }
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            join_delay: Duration::from_secs(5),
            max_join_attempts: 3,
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            strategy: ReadMarkerStrategy::Paginate,
            page_limit: 1000,
            page_delay: Duration::from_millis(500),
            room_delay: Duration::from_secs(5),
            sync_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_target: true,
        }
    }
}

impl BotConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables follow the pattern `SPACESBOT_<SECTION>_<KEY>`, e.g.
    /// `SPACESBOT_ACCESS_TOKEN` or `SPACESBOT_READER_STRATEGY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(homeserver) = env::var("SPACESBOT_HOMESERVER") {
            config.homeserver = homeserver;
        }
        if let Ok(user_id) = env::var("SPACESBOT_USER_ID") {
            config.user_id = user_id;
        }
        if let Ok(token) = env::var("SPACESBOT_ACCESS_TOKEN") {
            config.access_token = token;
        }
        if let Ok(root) = env::var("SPACESBOT_ROOT_SPACE") {
            config.root_space_id = RoomId::new(root);
        }

        if let Ok(attempts) = env::var("SPACESBOT_TRAVERSAL_MAX_JOIN_ATTEMPTS") {
            config.traversal.max_join_attempts = attempts.parse().map_err(|e| {
                ConfigError::InvalidValue(format!("Invalid max join attempts: {}", e))
            })?;
        }

        if let Ok(strategy) = env::var("SPACESBOT_READER_STRATEGY") {
            config.reader.strategy = ReadMarkerStrategy::parse(&strategy).ok_or_else(|| {
                ConfigError::InvalidValue(format!("Invalid reader strategy: {}", strategy))
            })?;
        }
        if let Ok(limit) = env::var("SPACESBOT_READER_PAGE_LIMIT") {
            config.reader.page_limit = limit
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid page limit: {}", e)))?;
        }

        if let Ok(level) = env::var("SPACESBOT_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(json) = env::var("SPACESBOT_LOG_JSON") {
            config.logging.json_format = json
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid JSON flag: {}", e)))?;
        }

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.homeserver.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "homeserver must be set".to_string(),
            ));
        }
        if !self.homeserver.starts_with("http://") && !self.homeserver.starts_with("https://") {
            return Err(ConfigError::ValidationFailed(format!(
                "homeserver must be an http(s) URL, got: {}",
                self.homeserver
            )));
        }

        if !self.user_id.starts_with('@') || !self.user_id.contains(':') {
            return Err(ConfigError::ValidationFailed(format!(
                "user_id must look like @user:server, got: {}",
                self.user_id
            )));
        }

        if self.access_token.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "access_token must be set".to_string(),
            ));
        }

        if !self.root_space_id.as_str().starts_with('!')
            || self.root_space_id.server_name().is_err()
        {
            return Err(ConfigError::ValidationFailed(format!(
                "root_space_id must look like !space:server, got: {}",
                self.root_space_id
            )));
        }

        if self.traversal.max_join_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_join_attempts must be greater than 0".to_string(),
            ));
        }

        if self.reader.page_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "page_limit must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }
}
