//! Client Configuration
//!
//! Where the client finds the service, how long it waits for each kind of
//! call, and how conversations open.
//!
//! # Layers
//!
//! Later layers win:
//! 1. Built-in defaults ([`ClientConfig::default`])
//! 2. `client.toml` under the user config directory
//!    (`$XDG_CONFIG_HOME/edubot/client.toml`, usually `~/.config/edubot/`)
//! 3. `EDUBOT_*` environment variables
//! 4. Command-line flags, applied by the caller through [`ConfigOverrides`]
//!
//! # `client.toml`
//!
//! ```toml
//! [service]
//! base_url = "http://localhost:8000"
//!
//! [timeouts]
//! chat_secs = 30
//! upload_secs = 60
//! delete_secs = 15
//! recovery_delay_ms = 2000
//!
//! [documents]
//! max_upload_mb = 50
//!
//! [conversation]
//! history_limit = 50
//! greet_on_start = true
//! load_history_on_start = false
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{parse_base_url, DEFAULT_BASE_URL};

const BYTES_PER_MB: u64 = 1024 * 1024;

// =============================================================================
// Error Types
// =============================================================================

/// Why a configuration could not be produced
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `client.toml` exists but could not be read
    #[error("cannot read {path}: {source}")]
    ReadError {
        /// File that was opened
        path: PathBuf,
        /// Cause
        source: std::io::Error,
    },

    /// `client.toml` is not valid TOML for [`ClientToml`]
    #[error("client.toml is malformed: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid client setting: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Highest layer that changed the configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// A command-line flag
    Cli,
    /// An `EDUBOT_*` variable
    Env,
    /// `client.toml`
    File,
    /// Nothing overrode the defaults
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Cli => "command line",
            Self::Env => "environment",
            Self::File => "client.toml",
            Self::Default => "defaults",
        };
        f.write_str(label)
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Service section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceToml {
    /// Root URL of the document Q&A service
    pub base_url: Option<String>,
}

/// Timeouts section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsToml {
    /// Bound on one chat turn, in seconds
    pub chat_secs: Option<u64>,

    /// Bound on one upload, in seconds
    pub upload_secs: Option<u64>,

    /// Bound on one delete, in seconds
    pub delete_secs: Option<u64>,

    /// Wait before a new session replaces an expired one, in milliseconds
    pub recovery_delay_ms: Option<u64>,
}

/// Documents section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsToml {
    /// Largest accepted upload, in MiB
    pub max_upload_mb: Option<u64>,
}

/// Conversation section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationToml {
    /// Most turns fetched when loading history
    pub history_limit: Option<usize>,

    /// Whether a new conversation opens with a greeting
    pub greet_on_start: Option<bool>,

    /// Whether a new conversation tries to load stored history first
    pub load_history_on_start: Option<bool>,
}

/// Root TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Service settings
    pub service: ServiceToml,

    /// Call bounds
    pub timeouts: TimeoutsToml,

    /// Document settings
    pub documents: DocumentsToml,

    /// Conversation settings
    pub conversation: ConversationToml,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Resolved client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Root URL of the document Q&A service
    pub base_url: String,

    /// Bound on one chat turn
    pub chat_timeout: Duration,

    /// Bound on one upload
    pub upload_timeout: Duration,

    /// Bound on one delete
    pub delete_timeout: Duration,

    /// Wait before a new session replaces an expired one
    pub recovery_delay: Duration,

    /// Largest accepted upload in bytes
    pub max_upload_bytes: u64,

    /// Most turns fetched when loading history
    pub history_limit: usize,

    /// Whether a new conversation opens with a greeting
    pub greet_on_start: bool,

    /// Whether a new conversation tries to load stored history first
    pub load_history_on_start: bool,

    /// `client.toml` that was read, if any
    pub config_file_path: Option<PathBuf>,

    /// Highest layer applied
    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(60),
            delete_timeout: Duration::from_secs(15),
            recovery_delay: Duration::from_secs(2),
            max_upload_bytes: 50 * BYTES_PER_MB,
            history_limit: 50,
            greet_on_start: true,
            load_history_on_start: false,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Built-in defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest layer that changed a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Record the layer a caller applied
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check values that would make the client unusable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for an unusable service URL,
    /// a zero timeout, a zero upload limit or a zero history limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_base_url(&self.base_url)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        for (name, value) in [
            ("chat timeout", self.chat_timeout),
            ("upload timeout", self.upload_timeout),
            ("delete timeout", self.delete_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "max upload size must be greater than zero".to_string(),
            ));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "history limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// `client.toml` under the user config directory, if there is one
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("edubot").join("client.toml"))
}

/// Defaults, then `client.toml`, then `EDUBOT_*` variables
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    let mut config = load_file_config(path)?;
    apply_env_config(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Defaults plus the file at `path`, without environment overrides
fn load_file_config(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ClientToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ClientConfig, toml: &ClientToml) {
    if let Some(ref url) = toml.service.base_url {
        config.base_url = url.clone();
    }

    if let Some(secs) = toml.timeouts.chat_secs {
        config.chat_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = toml.timeouts.upload_secs {
        config.upload_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = toml.timeouts.delete_secs {
        config.delete_timeout = Duration::from_secs(secs);
    }
    if let Some(ms) = toml.timeouts.recovery_delay_ms {
        config.recovery_delay = Duration::from_millis(ms);
    }

    if let Some(mb) = toml.documents.max_upload_mb {
        config.max_upload_bytes = mb.saturating_mul(BYTES_PER_MB);
    }

    if let Some(limit) = toml.conversation.history_limit {
        config.history_limit = limit;
    }
    if let Some(greet) = toml.conversation.greet_on_start {
        config.greet_on_start = greet;
    }
    if let Some(load) = toml.conversation.load_history_on_start {
        config.load_history_on_start = load;
    }
}

fn parse_flag(value: &str) -> bool {
    value != "0" && value.to_lowercase() != "false"
}

/// Apply environment variable overrides to the config
///
/// `lookup` resolves a variable name; the loader passes the process
/// environment.
fn apply_env_config<F>(config: &mut ClientConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("EDUBOT_API_BASE") {
        config.base_url = url;
        config.source = ConfigSource::Env;
    }

    if let Some(secs) = lookup("EDUBOT_CHAT_TIMEOUT").and_then(|v| v.parse::<u64>().ok()) {
        config.chat_timeout = Duration::from_secs(secs);
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = lookup("EDUBOT_UPLOAD_TIMEOUT").and_then(|v| v.parse::<u64>().ok()) {
        config.upload_timeout = Duration::from_secs(secs);
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = lookup("EDUBOT_DELETE_TIMEOUT").and_then(|v| v.parse::<u64>().ok()) {
        config.delete_timeout = Duration::from_secs(secs);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = lookup("EDUBOT_RECOVERY_DELAY_MS").and_then(|v| v.parse::<u64>().ok()) {
        config.recovery_delay = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }

    if let Some(mb) = lookup("EDUBOT_MAX_UPLOAD_MB").and_then(|v| v.parse::<u64>().ok()) {
        config.max_upload_bytes = mb.saturating_mul(BYTES_PER_MB);
        config.source = ConfigSource::Env;
    }

    if let Some(limit) = lookup("EDUBOT_HISTORY_LIMIT").and_then(|v| v.parse::<usize>().ok()) {
        config.history_limit = limit;
        config.source = ConfigSource::Env;
    }
    if let Some(greet) = lookup("EDUBOT_GREET") {
        config.greet_on_start = parse_flag(&greet);
        config.source = ConfigSource::Env;
    }
    if let Some(load) = lookup("EDUBOT_LOAD_HISTORY") {
        config.load_history_on_start = parse_flag(&load);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Service URL override
    pub base_url: Option<String>,

    /// Chat timeout override (seconds)
    pub chat_timeout_secs: Option<u64>,

    /// Upload timeout override (seconds)
    pub upload_timeout_secs: Option<u64>,

    /// History limit override
    pub history_limit: Option<usize>,

    /// Greeting override
    pub greet_on_start: Option<bool>,

    /// History-on-start override
    pub load_history_on_start: Option<bool>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set service URL override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set chat timeout override
    #[must_use]
    pub fn with_chat_timeout_secs(mut self, secs: u64) -> Self {
        self.chat_timeout_secs = Some(secs);
        self
    }

    /// Set upload timeout override
    #[must_use]
    pub fn with_upload_timeout_secs(mut self, secs: u64) -> Self {
        self.upload_timeout_secs = Some(secs);
        self
    }

    /// Set history limit override
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Set greeting override
    #[must_use]
    pub fn with_greet_on_start(mut self, greet: bool) -> Self {
        self.greet_on_start = Some(greet);
        self
    }

    /// Set history-on-start override
    #[must_use]
    pub fn with_load_history_on_start(mut self, load: bool) -> Self {
        self.load_history_on_start = Some(load);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ClientConfig) {
        if self.base_url.is_some()
            || self.chat_timeout_secs.is_some()
            || self.upload_timeout_secs.is_some()
            || self.history_limit.is_some()
            || self.greet_on_start.is_some()
            || self.load_history_on_start.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.base_url = url.clone();
        }
        if let Some(secs) = self.chat_timeout_secs {
            config.chat_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.upload_timeout_secs {
            config.upload_timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = self.history_limit {
            config.history_limit = limit;
        }
        if let Some(greet) = self.greet_on_start {
            config.greet_on_start = greet;
        }
        if let Some(load) = self.load_history_on_start {
            config.load_history_on_start = load;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
