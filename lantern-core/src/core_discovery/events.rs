//! Inbound events
//!
//! Everything the channel delivers is turned into one `InboundEvent` and
//! dispatched by a single match in the engine.

use std::collections::BTreeMap;

use super::message::InboundMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable,
}

/// A roster entry changed presence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEvent {
    pub from: String,
    pub availability: Availability,
}

impl PresenceEvent {
    pub fn available(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            availability: Availability::Available,
        }
    }

    pub fn unavailable(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            availability: Availability::Unavailable,
        }
    }

    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
    }
}

/// A message carrying a type tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedMessage {
    pub from: String,
    pub type_code: i64,
    pub properties: BTreeMap<String, String>,
}

impl TypedMessage {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// A message without a type tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainMessage {
    pub from: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Presence(PresenceEvent),
    Typed(TypedMessage),
    Plain(PlainMessage),
    /// Someone asked to subscribe to our presence
    SubscriptionRequest { from: String },
}

impl From<InboundMessage> for InboundEvent {
    fn from(msg: InboundMessage) -> Self {
        match msg.type_code {
            Some(type_code) => InboundEvent::Typed(TypedMessage {
                from: msg.from,
                type_code,
                properties: msg.properties,
            }),
            None => InboundEvent::Plain(PlainMessage {
                from: msg.from,
                body: msg.body,
            }),
        }
    }
}

impl From<PresenceEvent> for InboundEvent {
    fn from(presence: PresenceEvent) -> Self {
        InboundEvent::Presence(presence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_discovery::message::MessageType;

    #[test]
    fn test_message_with_type_becomes_typed() {
        let msg = InboundMessage::new("alice@example.com/-lan-1")
            .with_type(MessageType::InfoResponse)
            .with_property("mac", "aa");
        match InboundEvent::from(msg) {
            InboundEvent::Typed(typed) => {
                assert_eq!(typed.type_code, MessageType::InfoResponse.code());
                assert_eq!(typed.property("mac"), Some("aa"));
            }
            other => panic!("expected typed message, got {:?}", other),
        }
    }

    #[test]
    fn test_message_without_type_becomes_plain() {
        let msg = InboundMessage::new("lantern-controller@appspot.com").with_body("{}");
        assert_eq!(
            InboundEvent::from(msg),
            InboundEvent::Plain(PlainMessage {
                from: "lantern-controller@appspot.com".to_string(),
                body: Some("{}".to_string()),
            })
        );
    }
}
