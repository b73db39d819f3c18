//! Error types for the discovery engine

use thiserror::Error;

use crate::config::ConfigError;

/// Result type for discovery engine operations
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Errors surfaced by the discovery engine
///
/// Only `Initialization` is fatal. Everything else is logged at the point it
/// happens and at worst leaves a pool temporarily empty.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The engine cannot start without an authenticated channel
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// A candidate identifier could not be classified
    #[error("Classification error: {0}")]
    Classification(#[from] ClassificationError),

    /// Liveness probe failed
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// Signaling channel failure
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Certificate store failure
    #[error("Keystore error: {0}")]
    Keystore(#[from] KeystoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Report payload could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DiscoveryError {
    fn from(e: serde_json::Error) -> Self {
        DiscoveryError::Serialization(e.to_string())
    }
}

/// Why a raw identifier was rejected by the classifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("empty identifier")]
    Empty,

    #[error("malformed peer identifier '{identifier}': {reason}")]
    MalformedUri { identifier: String, reason: String },

    #[error("missing port in direct endpoint '{0}'")]
    MissingPort(String),

    #[error("invalid port in direct endpoint '{identifier}': {port}")]
    InvalidPort { identifier: String, port: String },

    #[error("missing host in direct endpoint '{0}'")]
    MissingHost(String),
}

/// Liveness probe failures
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("connection to {address} timed out after {timeout_ms}ms")]
    Timeout { address: String, timeout_ms: u128 },

    #[error("connection to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProbeError {
    /// Short human readable reason, used in diagnostics sent to the hub
    pub fn reason(&self) -> String {
        match self {
            ProbeError::Timeout { timeout_ms, .. } => format!("connect timed out after {}ms", timeout_ms),
            ProbeError::Connect { source, .. } => source.to_string(),
        }
    }
}

/// Signaling channel failures
#[derive(Error, Debug, Clone)]
pub enum ChannelError {
    #[error("login failed: {0}")]
    Login(String),

    #[error("not connected")]
    NotConnected,

    #[error("send to {to} failed: {reason}")]
    Send { to: String, reason: String },
}

/// Certificate store failures
#[derive(Error, Debug)]
pub enum KeystoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),
}
