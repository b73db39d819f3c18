/*
    TypedMessageDispatcher - trust gate + routing for typed messages

        TypedMessage
            │
            ├─ sender not a PeerUri ───────────► drop (MalformedSender)
            ├─ sender not in trusted pool ─────► drop (Untrusted), never answered
            │
            ├─ INFO_REQUEST  ──► CertificateExchange::handle_request
            ├─ INFO_RESPONSE ──► CertificateExchange::handle_response
            ├─ ERROR         ──► remove sender from both peer pools
            └─ anything else ──► drop (UnknownType)

    Holds no state of its own beyond the registry it consults.
*/

use std::sync::Arc;
use tracing::{info, warn};

use super::cert_exchange::{CertificateExchange, CertificateOutcome};
use super::events::TypedMessage;
use super::identifier::PeerUri;
use super::message::{MessageType, PROP_MESSAGE};
use super::metrics;
use super::registry::ProxyRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    MalformedSender,
    Untrusted,
    Request(CertificateOutcome),
    Response(CertificateOutcome),
    /// Peer reported a protocol error and was removed from this many pools
    PeerError { removed: usize },
    UnknownType(i64),
}

impl DispatchOutcome {
    fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::MalformedSender => "malformed_sender",
            DispatchOutcome::Untrusted => "untrusted",
            DispatchOutcome::Request(_) => "info_request",
            DispatchOutcome::Response(_) => "info_response",
            DispatchOutcome::PeerError { .. } => "peer_error",
            DispatchOutcome::UnknownType(_) => "unknown_type",
        }
    }
}

pub struct TypedMessageDispatcher {
    registry: Arc<ProxyRegistry>,
    exchange: Arc<CertificateExchange>,
}

impl TypedMessageDispatcher {
    pub fn new(registry: Arc<ProxyRegistry>, exchange: Arc<CertificateExchange>) -> Self {
        Self { registry, exchange }
    }

    pub async fn dispatch(&self, message: &TypedMessage) -> DispatchOutcome {
        let outcome = self.route(message).await;
        metrics::typed_message(outcome.label());
        outcome
    }

    async fn route(&self, message: &TypedMessage) -> DispatchOutcome {
        let sender = match PeerUri::parse(&message.from) {
            Ok(sender) => sender,
            Err(e) => {
                warn!(from = %message.from, error = %e, "Dropping typed message from malformed sender");
                return DispatchOutcome::MalformedSender;
            }
        };

        if !self.registry.is_trusted_member(&sender) {
            warn!(from = %sender, type_code = message.type_code, "Ignoring message from untrusted peer");
            return DispatchOutcome::Untrusted;
        }

        match MessageType::from_code(message.type_code) {
            Some(MessageType::InfoRequest) => {
                DispatchOutcome::Request(self.exchange.handle_request(message).await)
            }
            Some(MessageType::InfoResponse) => {
                DispatchOutcome::Response(self.exchange.handle_response(message))
            }
            Some(MessageType::Error) => {
                info!(
                    from = %sender,
                    reason = message.property(PROP_MESSAGE).unwrap_or_default(),
                    "Peer reported an error"
                );
                let removed = self.registry.remove_peer(&sender, "peer_error");
                DispatchOutcome::PeerError { removed }
            }
            None => {
                warn!(from = %sender, type_code = message.type_code, "Did not understand type");
                DispatchOutcome::UnknownType(message.type_code)
            }
        }
    }
}
