/*
    CertificateExchange - INFO_REQUEST / INFO_RESPONSE

    Bootstraps mutual trust material between peers:

        us                                   peer
        │── INFO_REQUEST {mac, cert} ───────► │   (sent once, on pool admission)
        │                                     │── keystore.add(mac, cert)
        │ ◄────────── INFO_RESPONSE {mac, cert}│
        │── keystore.add(mac, cert)           │

    Certificates travel in both directions in the request itself, so a lost
    response still leaves the peer holding ours. There is no retry: a peer that
    never answers simply stays admitted without a stored certificate.

    Whether a message may reach these handlers at all is decided by the
    dispatcher (trust gate), not here.
*/

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::collaborators::{CertificateStore, MessagingChannel};
use super::errors::ChannelError;
use super::events::TypedMessage;
use super::identifier::PeerUri;
use super::message::{MessageType, OutboundMessage, PROP_CERT, PROP_MAC};
use super::metrics;

/// What happened to the certificate carried by an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateOutcome {
    /// Handed to the keystore under this tag
    Stored { tag: String },
    /// No (or a blank) certificate in the message
    Missing,
    /// Certificate present but unusable
    Malformed(String),
    /// Keystore rejected it
    StoreFailed(String),
}

pub struct CertificateExchange {
    channel: Arc<dyn MessagingChannel>,
    keystore: Arc<dyn CertificateStore>,
    local_tag: String,
}

impl CertificateExchange {
    pub fn new(
        channel: Arc<dyn MessagingChannel>,
        keystore: Arc<dyn CertificateStore>,
        local_tag: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            keystore,
            local_tag: local_tag.into(),
        }
    }

    /// Our tag and certificate, addressed to `to`
    fn local_info(&self, to: &str, message_type: MessageType) -> OutboundMessage {
        OutboundMessage::typed(to, message_type)
            .with_property(PROP_MAC, self.local_tag.clone())
            .with_property(PROP_CERT, self.keystore.local_certificate_base64())
    }

    /// Send our certificate and ask for the peer's
    pub async fn request(&self, peer: &PeerUri) -> Result<(), ChannelError> {
        info!(peer = %peer, "Requesting certificate");
        self.channel
            .send(self.local_info(peer.as_str(), MessageType::InfoRequest))
            .await
    }

    /// INFO_REQUEST: store the sender's certificate, then answer with ours
    pub async fn handle_request(&self, message: &TypedMessage) -> CertificateOutcome {
        info!(from = %message.from, "Handling INFO request");
        let outcome = self.absorb(message);

        // The sender becomes the recipient
        let reply = self.local_info(&message.from, MessageType::InfoResponse);
        if let Err(e) = self.channel.send(reply).await {
            error!(to = %message.from, error = %e, "Could not send INFO response");
        }
        outcome
    }

    /// INFO_RESPONSE: store the sender's certificate
    pub fn handle_response(&self, message: &TypedMessage) -> CertificateOutcome {
        info!(from = %message.from, "Handling INFO response");
        self.absorb(message)
    }

    fn absorb(&self, message: &TypedMessage) -> CertificateOutcome {
        let cert = match message.property(PROP_CERT).map(str::trim) {
            Some(cert) if !cert.is_empty() => cert,
            _ => {
                warn!(from = %message.from, "No cert for peer");
                return CertificateOutcome::Missing;
            }
        };

        let tag = match message.property(PROP_MAC).map(str::trim) {
            Some(tag) if !tag.is_empty() => tag,
            _ => {
                warn!(from = %message.from, "Certificate without a tag, skipping");
                return CertificateOutcome::Malformed("missing tag".to_string());
            }
        };

        match STANDARD.decode(cert) {
            Ok(decoded) => debug!(from = %message.from, bytes = decoded.len(), "Got certificate"),
            Err(e) => {
                warn!(from = %message.from, error = %e, "Certificate is not valid base64");
                return CertificateOutcome::Malformed(e.to_string());
            }
        }

        match self.keystore.add_certificate(tag, cert) {
            Ok(()) => {
                metrics::certificate_stored(true);
                info!(from = %message.from, tag, "Stored peer certificate");
                CertificateOutcome::Stored {
                    tag: tag.to_string(),
                }
            }
            Err(e) => {
                metrics::certificate_stored(false);
                error!(from = %message.from, tag, error = %e, "Could not add cert");
                CertificateOutcome::StoreFailed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_discovery::memory::{MemoryKeystore, RecordingChannel};
    use std::collections::BTreeMap;

    const PEER: &str = "alice@example.com/-lan-1";

    fn exchange() -> (CertificateExchange, Arc<RecordingChannel>, Arc<MemoryKeystore>) {
        let channel = Arc::new(RecordingChannel::new("bob@example.com/-lan-2"));
        let keystore = Arc::new(MemoryKeystore::new("bG9jYWwtY2VydA=="));
        let exchange = CertificateExchange::new(channel.clone(), keystore.clone(), "bob-tag");
        (exchange, channel, keystore)
    }

    fn typed(message_type: MessageType, props: &[(&str, &str)]) -> TypedMessage {
        TypedMessage {
            from: PEER.to_string(),
            type_code: message_type.code(),
            properties: props
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[tokio::test]
    async fn test_request_carries_local_certificate() {
        let (exchange, channel, _) = exchange();
        exchange.request(&PeerUri::parse(PEER).unwrap()).await.unwrap();

        let sent = channel.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, PEER);
        assert_eq!(sent[0].message_type, Some(MessageType::InfoRequest));
        assert_eq!(sent[0].property(PROP_MAC), Some("bob-tag"));
        assert_eq!(sent[0].property(PROP_CERT), Some("bG9jYWwtY2VydA=="));
    }

    #[tokio::test]
    async fn test_request_handler_stores_and_replies() {
        let (exchange, channel, keystore) = exchange();
        let msg = typed(
            MessageType::InfoRequest,
            &[(PROP_MAC, "alice-tag"), (PROP_CERT, "YWxpY2UtY2VydA==")],
        );

        let outcome = exchange.handle_request(&msg).await;
        assert_eq!(
            outcome,
            CertificateOutcome::Stored {
                tag: "alice-tag".to_string()
            }
        );
        assert_eq!(keystore.certificate("alice-tag").as_deref(), Some("YWxpY2UtY2VydA=="));

        let sent = channel.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, PEER);
        assert_eq!(sent[0].message_type, Some(MessageType::InfoResponse));
    }

    #[tokio::test]
    async fn test_request_without_cert_still_replies() {
        let (exchange, channel, keystore) = exchange();
        let msg = typed(MessageType::InfoRequest, &[(PROP_MAC, "alice-tag")]);

        assert_eq!(exchange.handle_request(&msg).await, CertificateOutcome::Missing);
        assert_eq!(keystore.len(), 0);
        assert_eq!(channel.sent_messages().len(), 1);
    }

    #[test]
    fn test_response_handler_stores_without_reply() {
        let (exchange, channel, keystore) = exchange();
        let msg = typed(
            MessageType::InfoResponse,
            &[(PROP_MAC, "alice-tag"), (PROP_CERT, "YWxpY2UtY2VydA==")],
        );

        assert!(matches!(exchange.handle_response(&msg), CertificateOutcome::Stored { .. }));
        assert_eq!(keystore.len(), 1);
        assert!(channel.sent_messages().is_empty());
    }

    #[test]
    fn test_malformed_certificate_is_skipped() {
        let (exchange, _, keystore) = exchange();
        let msg = typed(
            MessageType::InfoResponse,
            &[(PROP_MAC, "alice-tag"), (PROP_CERT, "not base64!!")],
        );
        assert!(matches!(exchange.handle_response(&msg), CertificateOutcome::Malformed(_)));

        let blank = typed(MessageType::InfoResponse, &[(PROP_MAC, "alice-tag"), (PROP_CERT, "  ")]);
        assert_eq!(exchange.handle_response(&blank), CertificateOutcome::Missing);

        let untagged = typed(MessageType::InfoResponse, &[(PROP_CERT, "YWxpY2UtY2VydA==")]);
        assert!(matches!(exchange.handle_response(&untagged), CertificateOutcome::Malformed(_)));

        assert_eq!(keystore.len(), 0);
    }

    #[test]
    fn test_keystore_failure_is_not_fatal() {
        let (exchange, _, keystore) = exchange();
        keystore.fail_writes(true);
        let msg = typed(
            MessageType::InfoResponse,
            &[(PROP_MAC, "alice-tag"), (PROP_CERT, "YWxpY2UtY2VydA==")],
        );
        assert!(matches!(exchange.handle_response(&msg), CertificateOutcome::StoreFailed(_)));
    }
}
