//! The controller hub
//!
//! The hub is a well-known identifier that pushes control messages (a JSON
//! body on a plain message) listing servers to try, when to report next and
//! optional update notices. It also receives our periodic info report and
//! probe failure diagnostics.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

use super::errors::{DiscoveryError, DiscoveryResult};

/// Addressing rules for the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubAddress {
    identifier: String,
    account_prefix: String,
    chat_domain: String,
}

impl HubAddress {
    /// `identifier` is the hub's bare id (`lantern-controller@appspot.com`),
    /// `chat_domain` the domain its chat sessions come from
    pub fn new(identifier: impl Into<String>, chat_domain: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let account_prefix = match identifier.split_once('@') {
            Some((local, _)) => format!("{}@", local),
            None => format!("{}@", identifier),
        };
        Self {
            identifier,
            account_prefix,
            chat_domain: chat_domain.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// `lantern-controller.appspotchat.com` -> `lantern-controller.appspot`
    fn domain_stem(&self) -> &str {
        let domain = self.chat_domain.as_str();
        match domain.find("chat.") {
            Some(i) => &domain[..i],
            None => domain,
        }
    }

    /// `true` for any identifier the hub speaks from
    pub fn is_hub(&self, from: &str) -> bool {
        from.starts_with(&self.identifier)
            || (from.starts_with(&self.account_prefix) && from.contains(self.domain_stem()))
    }

    /// Only the hub's chat sessions may subscribe to our presence
    pub fn may_subscribe(&self, from: &str) -> bool {
        from.starts_with(&self.account_prefix) && from.ends_with(&self.chat_domain)
    }
}

#[derive(Debug, Deserialize)]
struct RawHubMessage {
    #[serde(default)]
    servers: Option<Value>,
    #[serde(default)]
    update_time: Option<Value>,
    #[serde(default)]
    update: Option<Value>,
}

/// A parsed hub control message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubMessage {
    /// Candidate identifiers, in announced order
    pub servers: Vec<String>,
    /// Delay before the next info report
    pub report_after: Option<Duration>,
    /// Update notice, values flattened to strings
    pub update: Option<BTreeMap<String, String>>,
}

impl HubMessage {
    pub fn parse(body: &str) -> DiscoveryResult<Self> {
        let raw: RawHubMessage = serde_json::from_str(body)?;

        // A missing or unusable list must not cost us update_time and update
        let servers = match raw.servers {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries
                .into_iter()
                .filter_map(|v| match v {
                    // Non-string entries are not identifiers; skip them
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            Some(other) => {
                warn!(servers = %other, "Hub servers field is not a list");
                Vec::new()
            }
        };

        let report_after = match raw.update_time {
            None | Some(Value::Null) => None,
            Some(value) => Some(Duration::from_millis(millis(&value)?)),
        };

        let update = match raw.update {
            None | Some(Value::Null) => None,
            Some(Value::Object(notice)) => Some(notice),
            Some(other) => {
                warn!(update = %other, "Hub update field is not an object");
                None
            }
        }
        .map(|notice| {
            notice
                .into_iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (k, v)
                })
                .collect()
        });

        Ok(Self {
            servers,
            report_after,
            update,
        })
    }
}

/// `update_time` arrives either as a number or as a numeric string
fn millis(value: &Value) -> DiscoveryResult<u64> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| DiscoveryError::Serialization(format!("invalid update_time: {}", value)))
}
