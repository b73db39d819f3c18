//! Proxy discovery, trust classification and rotation
//!
//! Peers and relay servers are announced over a presence-based signaling
//! channel. This module classifies what is announced, probes directly dialed
//! endpoints, keeps four rotating pools of usable proxies and runs the small
//! certificate exchange between trusted peers.

pub mod cert_exchange;
pub mod classifier;
pub mod collaborators;
pub mod dispatcher;
pub mod engine;
pub mod errors;
pub mod events;
pub mod hub;
pub mod identifier;
pub mod memory;
pub mod message;
pub mod metrics;
pub mod pool;
pub mod presence;
pub mod prober;
pub mod registry;
pub mod report;
pub mod secret_keys;

#[cfg(test)]
mod tests;

pub use cert_exchange::{CertificateExchange, CertificateOutcome};
pub use classifier::{CategoryKind, Classification, Classifier};
pub use collaborators::{
    CertificateStore, Collaborators, DeferredScheduler, DeferredTask, MessagingChannel, OutboundPresence,
    TrustOracle, UpdateNotifier, UsageReporter, UsageSnapshot,
};
pub use dispatcher::{DispatchOutcome, TypedMessageDispatcher};
pub use engine::{AdmissionOutcome, DiscoveryEngine, EventOutcome, HubOutcome};
pub use errors::{ChannelError, ClassificationError, DiscoveryError, DiscoveryResult, KeystoreError, ProbeError};
pub use events::{Availability, InboundEvent, PlainMessage, PresenceEvent, TypedMessage};
pub use hub::{HubAddress, HubMessage};
pub use identifier::{DirectEndpoint, PeerUri};
pub use message::{InboundMessage, MessageType, OutboundMessage};
pub use pool::{PoolLease, RotatingPool};
pub use presence::{PresenceOutcome, PresenceReactor};
pub use prober::{LivenessProber, TcpProber};
pub use registry::{DirectKind, PeerKind, PoolSizes, ProxyRegistry};
pub use report::{InfoReport, InfoReporter, ReportScheduler, TokioScheduler};
pub use secret_keys::SecretKeyCache;
