//! Configuration management for the Lantern discovery engine
//!
//! Everything the engine needs to know about its environment is resolved once
//! at process startup (from defaults, a TOML file, or `LANTERN_*` environment
//! variables) and handed to the engine constructor.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Resource marker used by clients running in an uncensored region.
pub const UNCENSORED_MARKER: &str = "-lan-";

/// Resource marker used by clients running in a censored region.
pub const CENSORED_MARKER: &str = "-lac-";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Signaling account configuration
    pub account: AccountConfig,

    /// Discovery engine configuration
    pub discovery: DiscoveryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Signaling account configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account user name (e.g. `bob@example.com`)
    pub username: String,

    /// Account password
    pub password: String,

    /// Whether this client runs inside a censored region
    pub censored: bool,

    /// Two letter country code reported to the hub
    pub country_code: String,
}

/// Discovery engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Identifier of the controlling hub
    pub hub_identifier: String,

    /// Chat domain the hub subscribes to our presence from
    pub hub_chat_domain: String,

    /// Substrings identifying server-managed (cloud hosted) proxies
    pub cloud_markers: Vec<String>,

    /// Port used to reach server-managed proxies
    pub server_managed_port: u16,

    /// Resource marker carried by peers able to act as proxies
    pub peer_marker: String,

    /// Liveness probe connect timeout
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Minimum interval between accepted report scheduling requests
    #[serde(with = "humantime_serde")]
    pub report_debounce: Duration,

    /// Reply timeout handed to the signaling layer
    #[serde(with = "humantime_serde")]
    pub reply_timeout: Duration,

    /// Hardware tag sent alongside our certificate
    pub local_tag: String,

    /// Client version string included in reports
    pub version: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics collection
    pub enabled: bool,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            censored: false,
            country_code: "US".to_string(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            hub_identifier: "lantern-controller@appspot.com".to_string(),
            hub_chat_domain: "lantern-controller.appspotchat.com".to_string(),
            cloud_markers: vec!["appspot".to_string()],
            server_managed_port: 443,
            peer_marker: UNCENSORED_MARKER.to_string(),
            probe_timeout: Duration::from_secs(60),
            report_debounce: Duration::from_secs(10),
            reply_timeout: Duration::from_secs(30),
            local_tag: "000000000000".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AccountConfig {
    /// Resource marker we log in with, picked from the censorship flag
    pub fn resource_marker(&self) -> &'static str {
        if self.censored {
            CENSORED_MARKER
        } else {
            UNCENSORED_MARKER
        }
    }

    /// Ensure both credentials are present before attempting a login
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        if self.username.trim().is_empty() {
            return Err(ConfigError::MissingCredential("username"));
        }
        if self.password.trim().is_empty() {
            return Err(ConfigError::MissingCredential("password"));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: LANTERN_<SECTION>_<KEY>
    /// Example: LANTERN_ACCOUNT_USERNAME=bob@example.com
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Account config
        if let Ok(username) = env::var("LANTERN_ACCOUNT_USERNAME") {
            config.account.username = username;
        }
        if let Ok(password) = env::var("LANTERN_ACCOUNT_PASSWORD") {
            config.account.password = password;
        }
        if let Ok(censored) = env::var("LANTERN_ACCOUNT_CENSORED") {
            config.account.censored = censored
                .parse()
                .map_err(|e: std::str::ParseBoolError| ConfigError::InvalidValue {
                    variable: "LANTERN_ACCOUNT_CENSORED",
                    reason: e.to_string(),
                })?;
        }
        if let Ok(country) = env::var("LANTERN_ACCOUNT_COUNTRY_CODE") {
            config.account.country_code = country;
        }

        // Discovery config
        if let Ok(hub) = env::var("LANTERN_DISCOVERY_HUB_IDENTIFIER") {
            config.discovery.hub_identifier = hub;
        }
        if let Ok(markers) = env::var("LANTERN_DISCOVERY_CLOUD_MARKERS") {
            config.discovery.cloud_markers = markers
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
        }
        if let Ok(timeout) = env::var("LANTERN_DISCOVERY_PROBE_TIMEOUT") {
            config.discovery.probe_timeout = humantime_serde::re::humantime::parse_duration(
                &timeout,
            )
            .map_err(|e| ConfigError::InvalidValue {
                variable: "LANTERN_DISCOVERY_PROBE_TIMEOUT",
                reason: e.to_string(),
            })?;
        }
        if let Ok(tag) = env::var("LANTERN_DISCOVERY_LOCAL_TAG") {
            config.discovery.local_tag = tag;
        }

        // Logging config
        if let Ok(level) = env::var("LANTERN_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(json) = env::var("LANTERN_LOG_JSON") {
            config.logging.json_format = json
                .parse()
                .map_err(|e: std::str::ParseBoolError| ConfigError::InvalidValue {
                    variable: "LANTERN_LOG_JSON",
                    reason: e.to_string(),
                })?;
        }

        // Metrics config
        if let Ok(enabled) = env::var("LANTERN_METRICS_ENABLED") {
            config.metrics.enabled = enabled
                .parse()
                .map_err(|e: std::str::ParseBoolError| ConfigError::InvalidValue {
                    variable: "LANTERN_METRICS_ENABLED",
                    reason: e.to_string(),
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// Credentials are not checked here; a missing account is reported when
    /// the engine starts, since tooling can run without one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discovery.hub_identifier.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "hub_identifier must not be empty".to_string(),
            ));
        }

        if !self.discovery.hub_identifier.contains('@') {
            return Err(ConfigError::ValidationFailed(format!(
                "hub_identifier is not an account identifier: {}",
                self.discovery.hub_identifier
            )));
        }

        if self.discovery.cloud_markers.iter().any(|m| m.trim().is_empty()) {
            return Err(ConfigError::ValidationFailed(
                "cloud_markers must not contain empty entries".to_string(),
            ));
        }

        if self.discovery.server_managed_port == 0 {
            return Err(ConfigError::ValidationFailed(
                "server_managed_port must be greater than 0".to_string(),
            ));
        }

        if self.discovery.peer_marker.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "peer_marker must not be empty".to_string(),
            ));
        }

        if self.discovery.probe_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "probe_timeout must be greater than 0".to_string(),
            ));
        }

        if self.discovery.local_tag.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "local_tag must not be empty".to_string(),
            ));
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;

        std::fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Default location of the configuration file
    pub fn default_path() -> PathBuf {
        PathBuf::from("lantern.toml")
    }
}
