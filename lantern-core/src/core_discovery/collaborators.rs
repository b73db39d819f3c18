//! Seams to the world outside the discovery engine
//!
//! The engine never talks to a socket, a keystore file or a UI directly. It is
//! handed implementations of these traits at construction time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use super::errors::{ChannelError, KeystoreError};
use super::events::PresenceEvent;
use super::message::OutboundMessage;

/// Presence stanza we emit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundPresence {
    /// Broadcast availability to our roster
    Available,
    /// Directed availability to a single identifier
    AvailableTo(String),
    /// Accept a presence subscription request
    Subscribed { to: String },
}

/// Signaling channel (an XMPP-family client in production)
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    /// Authenticate and bind a session. Returns our full identifier.
    async fn login(
        &self,
        username: &str,
        password: &str,
        resource_marker: &str,
    ) -> Result<String, ChannelError>;

    /// Deliver a message
    async fn send(&self, message: OutboundMessage) -> Result<(), ChannelError>;

    /// Deliver a presence stanza
    async fn send_presence(&self, presence: OutboundPresence) -> Result<(), ChannelError>;

    /// Presences currently known for our roster, used to pick up peers that
    /// were online before we connected
    async fn roster_presences(&self) -> Result<Vec<PresenceEvent>, ChannelError>;
}

/// External authority answering "is this peer trusted"
pub trait TrustOracle: Send + Sync {
    fn is_trusted(&self, identifier: &str) -> bool;
}

/// Certificate storage
pub trait CertificateStore: Send + Sync {
    /// Persist a peer certificate under its hardware tag
    fn add_certificate(&self, tag: &str, base64_cert: &str) -> Result<(), KeystoreError>;

    /// Our own certificate, base64 encoded
    fn local_certificate_base64(&self) -> String;
}

/// Usage counters and whitelist changes since the last confirmed report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub bytes_proxied: u64,
    pub direct_bytes: u64,
    pub requests_proxied: u64,
    pub direct_requests: u64,
    pub whitelist_additions: Vec<String>,
    pub whitelist_removals: Vec<String>,
}

/// Statistics and whitelist bookkeeping
pub trait UsageReporter: Send + Sync {
    fn snapshot(&self) -> UsageSnapshot;

    /// Called only after a report was handed to the channel successfully
    fn mark_reported(&self);
}

/// Receives update notices pushed by the hub
pub trait UpdateNotifier: Send + Sync {
    fn notify_update(&self, update: BTreeMap<String, String>);
}

pub type DeferredTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs a task once after a delay
pub trait DeferredScheduler: Send + Sync {
    fn schedule_once(&self, delay: Duration, task: DeferredTask);
}

/// Everything the engine consumes, bundled for construction
#[derive(Clone)]
pub struct Collaborators {
    pub channel: Arc<dyn MessagingChannel>,
    pub trust: Arc<dyn TrustOracle>,
    pub keystore: Arc<dyn CertificateStore>,
    pub usage: Arc<dyn UsageReporter>,
    /// `None` runs deferred reports on the tokio runtime, cancelled by
    /// engine shutdown
    pub scheduler: Option<Arc<dyn DeferredScheduler>>,
    pub updates: Option<Arc<dyn UpdateNotifier>>,
}
