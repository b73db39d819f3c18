/*
    PresenceReactor - roster presence transitions -> peer pools

    available:   hub? ─► marker? ─► not self? ─► PeerUri ─► oracle
                                                            │
                                     trusted ◄── true ──────┤
                                     anonymous ◄── false ───┘
                 admitted (first time only) ─► INFO_REQUEST to the peer

    unavailable: remove from BOTH peer pools, whatever the oracle says now

    Only roster entries whose resource carries the proxy-capable marker are
    Lantern peers; everything else is ignored without a log line above trace.
*/

use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use super::cert_exchange::CertificateExchange;
use super::collaborators::TrustOracle;
use super::events::PresenceEvent;
use super::hub::HubAddress;
use super::identifier::PeerUri;
use super::registry::{PeerKind, ProxyRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceOutcome {
    /// Not a proxy-capable peer
    NotLantern,
    Hub,
    SelfIdentity,
    Malformed,
    Admitted(PeerKind),
    AlreadyMember(PeerKind),
    Removed { pools: usize },
}

pub struct PresenceReactor {
    registry: Arc<ProxyRegistry>,
    exchange: Arc<CertificateExchange>,
    trust: Arc<dyn TrustOracle>,
    hub: HubAddress,
    self_identifier: String,
    resource_filter: String,
}

impl PresenceReactor {
    pub fn new(
        registry: Arc<ProxyRegistry>,
        exchange: Arc<CertificateExchange>,
        trust: Arc<dyn TrustOracle>,
        hub: HubAddress,
        self_identifier: impl Into<String>,
        peer_marker: &str,
    ) -> Self {
        Self {
            registry,
            exchange,
            trust,
            hub,
            self_identifier: self_identifier.into(),
            resource_filter: format!("/{}", peer_marker),
        }
    }

    pub async fn react(&self, event: &PresenceEvent) -> PresenceOutcome {
        let from = event.from.trim();

        if self.hub.is_hub(from) {
            debug!(from, available = event.is_available(), "Hub presence");
            return PresenceOutcome::Hub;
        }
        if !from.contains(&self.resource_filter) {
            trace!(from, "Ignoring non-Lantern presence");
            return PresenceOutcome::NotLantern;
        }
        if from == self.self_identifier {
            return PresenceOutcome::SelfIdentity;
        }

        let peer = match PeerUri::parse(from) {
            Ok(peer) => peer,
            Err(e) => {
                warn!(from, error = %e, "Could not parse peer identifier");
                return PresenceOutcome::Malformed;
            }
        };

        if event.is_available() {
            self.on_available(peer).await
        } else {
            self.on_unavailable(&peer)
        }
    }

    async fn on_available(&self, peer: PeerUri) -> PresenceOutcome {
        let kind = PeerKind::from_trust(self.trust.is_trusted(peer.as_str()));
        if !self.registry.admit_peer(kind, peer.clone()) {
            debug!(%peer, ?kind, "Peer already known");
            return PresenceOutcome::AlreadyMember(kind);
        }

        info!(%peer, ?kind, "Admitted peer proxy");
        if let Err(e) = self.exchange.request(&peer).await {
            warn!(%peer, error = %e, "Could not send INFO request");
        }
        PresenceOutcome::Admitted(kind)
    }

    fn on_unavailable(&self, peer: &PeerUri) -> PresenceOutcome {
        let pools = self.registry.remove_peer(peer, "unavailable");
        info!(%peer, pools, "Peer went unavailable");
        PresenceOutcome::Removed { pools }
    }
}
