//! Signaling message model
//!
//! Typed messages carry a numeric type tag plus string properties; plain
//! messages carry a text body (JSON for the hub).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Property key carrying the sender's hardware tag
pub const PROP_MAC: &str = "mac";
/// Property key carrying a base64 certificate
pub const PROP_CERT: &str = "cert";
/// Property key carrying a human readable diagnostic
pub const PROP_MESSAGE: &str = "message";

/// Typed message kinds understood by the certificate exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    InfoRequest,
    InfoResponse,
    Error,
}

impl MessageType {
    /// Wire code of this message type
    pub fn code(self) -> i64 {
        match self {
            MessageType::InfoRequest => 0,
            MessageType::InfoResponse => 1,
            MessageType::Error => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(MessageType::InfoRequest),
            1 => Some(MessageType::InfoResponse),
            2 => Some(MessageType::Error),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::InfoRequest => "INFO_REQUEST",
            MessageType::InfoResponse => "INFO_RESPONSE",
            MessageType::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Message handed to the channel for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: String,
    pub message_type: Option<MessageType>,
    pub properties: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl OutboundMessage {
    /// A typed message with no properties yet
    pub fn typed(to: impl Into<String>, message_type: MessageType) -> Self {
        Self {
            to: to.into(),
            message_type: Some(message_type),
            properties: BTreeMap::new(),
            body: None,
        }
    }

    /// A plain message carrying only a body
    pub fn plain(to: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            message_type: None,
            properties: BTreeMap::new(),
            body: Some(body.into()),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Raw message as delivered by the channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundMessage {
    pub from: String,
    pub type_code: Option<i64>,
    pub properties: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl InboundMessage {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, message_type: MessageType) -> Self {
        self.type_code = Some(message_type.code());
        self
    }

    pub fn with_type_code(mut self, code: i64) -> Self {
        self.type_code = Some(code);
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}
