//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// An environment override could not be parsed
    #[error("invalid value for {variable}: {reason}")]
    InvalidValue { variable: &'static str, reason: String },

    #[error("invalid configuration: {0}")]
    ValidationFailed(String),

    /// The signaling account is missing its user name or password
    #[error("missing account credential: {0}")]
    MissingCredential(&'static str),
}
