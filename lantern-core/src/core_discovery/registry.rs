/*
    ProxyRegistry - the four rotating pools

    ┌────────────────┬─────────────────────┬──────────────────────────────┐
    │ pool           │ element             │ filled by                    │
    ├────────────────┼─────────────────────┼──────────────────────────────┤
    │ general        │ DirectEndpoint      │ hub servers list, after probe│
    │ server_managed │ DirectEndpoint      │ hub servers list, after probe│
    │ trusted        │ PeerUri             │ presence (oracle), hub list  │
    │ anonymous      │ PeerUri             │ presence (oracle), hub list  │
    └────────────────┴─────────────────────┴──────────────────────────────┘

    Each pool is its own unit of mutual exclusion; no operation here holds
    two pool locks at once. Peer removal always hits both peer pools because
    the trust verdict may have changed since admission.
*/

use serde::Serialize;
use tracing::debug;

use super::identifier::{DirectEndpoint, PeerUri};
use super::metrics;
use super::pool::RotatingPool;

/// Which pool a direct endpoint belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectKind {
    General,
    ServerManaged,
}

/// Which pool a peer belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerKind {
    Trusted,
    Anonymous,
}

impl PeerKind {
    pub fn from_trust(trusted: bool) -> Self {
        if trusted {
            PeerKind::Trusted
        } else {
            PeerKind::Anonymous
        }
    }
}

/// Member counts per pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolSizes {
    pub general: usize,
    pub server_managed: usize,
    pub trusted: usize,
    pub anonymous: usize,
}

#[derive(Debug)]
pub struct ProxyRegistry {
    general: RotatingPool<DirectEndpoint>,
    server_managed: RotatingPool<DirectEndpoint>,
    trusted: RotatingPool<PeerUri>,
    anonymous: RotatingPool<PeerUri>,
}

impl Default for ProxyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self {
            general: RotatingPool::new("general"),
            server_managed: RotatingPool::new("server_managed"),
            trusted: RotatingPool::new("trusted"),
            anonymous: RotatingPool::new("anonymous"),
        }
    }

    pub fn direct(&self, kind: DirectKind) -> &RotatingPool<DirectEndpoint> {
        match kind {
            DirectKind::General => &self.general,
            DirectKind::ServerManaged => &self.server_managed,
        }
    }

    pub fn peers(&self, kind: PeerKind) -> &RotatingPool<PeerUri> {
        match kind {
            PeerKind::Trusted => &self.trusted,
            PeerKind::Anonymous => &self.anonymous,
        }
    }

    pub fn admit_direct(&self, kind: DirectKind, endpoint: DirectEndpoint) -> bool {
        let pool = self.direct(kind);
        let admitted = pool.try_admit(endpoint);
        if admitted {
            metrics::pool_admitted(pool.name(), pool.len());
        }
        admitted
    }

    /// Admit a peer. The caller owns the admission side effect (INFO_REQUEST)
    /// and must fire it only when this returns `true`.
    pub fn admit_peer(&self, kind: PeerKind, peer: PeerUri) -> bool {
        let pool = self.peers(kind);
        let admitted = pool.try_admit(peer);
        if admitted {
            metrics::pool_admitted(pool.name(), pool.len());
        }
        admitted
    }

    /// Remove a peer from both peer pools, returning how many held it
    pub fn remove_peer(&self, peer: &PeerUri, reason: &'static str) -> usize {
        let mut removed = 0;
        for pool in [&self.trusted, &self.anonymous] {
            if pool.remove(peer) {
                metrics::pool_removed(pool.name(), reason, pool.len());
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(%peer, reason, "Removed peer");
        }
        removed
    }

    pub fn remove_direct(&self, kind: DirectKind, endpoint: &DirectEndpoint, reason: &'static str) -> bool {
        let pool = self.direct(kind);
        let removed = pool.remove(endpoint);
        if removed {
            metrics::pool_removed(pool.name(), reason, pool.len());
        }
        removed
    }

    /// Remove every direct endpoint (either pool) dialing `host:port`
    pub fn remove_direct_address(&self, host: &str, port: u16, reason: &'static str) -> Vec<DirectEndpoint> {
        let mut removed = Vec::new();
        for pool in [&self.general, &self.server_managed] {
            let gone = pool.remove_matching(|e| e.dials(host, port));
            for _ in &gone {
                metrics::pool_removed(pool.name(), reason, pool.len());
            }
            removed.extend(gone);
        }
        removed
    }

    /// Trust gate: only members of the trusted pool may drive the exchange
    pub fn is_trusted_member(&self, peer: &PeerUri) -> bool {
        self.trusted.contains(peer)
    }

    pub fn sizes(&self) -> PoolSizes {
        PoolSizes {
            general: self.general.len(),
            server_managed: self.server_managed.len(),
            trusted: self.trusted.len(),
            anonymous: self.anonymous.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(raw: &str) -> PeerUri {
        PeerUri::parse(raw).unwrap()
    }

    #[test]
    fn test_remove_peer_hits_both_pools() {
        let registry = ProxyRegistry::new();
        let alice = peer("alice@example.com/-lan-1");

        assert!(registry.admit_peer(PeerKind::Anonymous, alice.clone()));
        assert_eq!(registry.remove_peer(&alice, "unavailable"), 1);
        assert_eq!(registry.sizes(), PoolSizes::default());

        // Present in both after a trust change
        registry.admit_peer(PeerKind::Anonymous, alice.clone());
        registry.admit_peer(PeerKind::Trusted, alice.clone());
        assert_eq!(registry.remove_peer(&alice, "unavailable"), 2);
        assert_eq!(registry.remove_peer(&alice, "unavailable"), 0);
    }

    #[test]
    fn test_remove_direct_address_spans_pools() {
        let registry = ProxyRegistry::new();
        registry.admit_direct(DirectKind::General, DirectEndpoint::parse("10.0.0.5:8080").unwrap());
        registry.admit_direct(DirectKind::General, DirectEndpoint::parse("10.0.0.6:8080").unwrap());
        registry.admit_direct(
            DirectKind::ServerManaged,
            DirectEndpoint::new("x", "10.0.0.5", 8080),
        );

        let removed = registry.remove_direct_address("10.0.0.5", 8080, "probe_failed");
        assert_eq!(removed.len(), 2);
        assert_eq!(
            registry.sizes(),
            PoolSizes {
                general: 1,
                ..PoolSizes::default()
            }
        );
    }

    #[test]
    fn test_trust_gate_ignores_anonymous_pool() {
        let registry = ProxyRegistry::new();
        let carol = peer("carol@example.com/-lan-3");
        registry.admit_peer(PeerKind::Anonymous, carol.clone());
        assert!(!registry.is_trusted_member(&carol));

        registry.admit_peer(PeerKind::Trusted, carol.clone());
        assert!(registry.is_trusted_member(&carol));
    }
}
