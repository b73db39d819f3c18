//! In-memory collaborators
//!
//! Stand-ins for the signaling channel, keystore, trust oracle and friends.
//! They record everything handed to them so tests and the scenario harness
//! can assert on it.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::collaborators::{
    CertificateStore, Collaborators, DeferredScheduler, DeferredTask, MessagingChannel, OutboundPresence,
    TrustOracle, UpdateNotifier, UsageReporter, UsageSnapshot,
};
use super::errors::{ChannelError, KeystoreError, ProbeError};
use super::events::PresenceEvent;
use super::identifier::DirectEndpoint;
use super::message::{MessageType, OutboundMessage};
use super::prober::LivenessProber;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Channel that records outbound traffic instead of sending it
#[derive(Debug, Default)]
pub struct RecordingChannel {
    local_identifier: String,
    sent: Mutex<Vec<OutboundMessage>>,
    presences: Mutex<Vec<OutboundPresence>>,
    roster: Mutex<Vec<PresenceEvent>>,
    logins: Mutex<Vec<String>>,
    fail_sends: AtomicBool,
    fail_login: AtomicBool,
}

impl RecordingChannel {
    /// `local_identifier` is what `login` reports back as our full id
    pub fn new(local_identifier: impl Into<String>) -> Self {
        Self {
            local_identifier: local_identifier.into(),
            ..Default::default()
        }
    }

    /// Presences returned by `roster_presences`
    pub fn set_roster(&self, roster: Vec<PresenceEvent>) {
        *lock(&self.roster) = roster;
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_login(&self, fail: bool) {
        self.fail_login.store(fail, Ordering::SeqCst);
    }

    pub fn sent_messages(&self) -> Vec<OutboundMessage> {
        lock(&self.sent).clone()
    }

    pub fn sent_of_type(&self, message_type: MessageType) -> Vec<OutboundMessage> {
        lock(&self.sent)
            .iter()
            .filter(|m| m.message_type == Some(message_type))
            .cloned()
            .collect()
    }

    /// Plain (untyped) messages, i.e. info reports
    pub fn sent_plain(&self) -> Vec<OutboundMessage> {
        lock(&self.sent)
            .iter()
            .filter(|m| m.message_type.is_none())
            .cloned()
            .collect()
    }

    pub fn sent_presences(&self) -> Vec<OutboundPresence> {
        lock(&self.presences).clone()
    }

    /// Resource markers passed to `login`
    pub fn logins(&self) -> Vec<String> {
        lock(&self.logins).clone()
    }
}

#[async_trait]
impl MessagingChannel for RecordingChannel {
    async fn login(&self, username: &str, _password: &str, resource_marker: &str) -> Result<String, ChannelError> {
        if self.fail_login.load(Ordering::SeqCst) {
            return Err(ChannelError::Login(format!("rejected credentials for {}", username)));
        }
        lock(&self.logins).push(resource_marker.to_string());
        Ok(self.local_identifier.clone())
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), ChannelError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ChannelError::Send {
                to: message.to,
                reason: "channel offline".to_string(),
            });
        }
        lock(&self.sent).push(message);
        Ok(())
    }

    async fn send_presence(&self, presence: OutboundPresence) -> Result<(), ChannelError> {
        lock(&self.presences).push(presence);
        Ok(())
    }

    async fn roster_presences(&self) -> Result<Vec<PresenceEvent>, ChannelError> {
        Ok(lock(&self.roster).clone())
    }
}

/// Trust oracle backed by a fixed set
#[derive(Debug, Default)]
pub struct StaticTrustOracle {
    trusted: Mutex<HashSet<String>>,
}

impl StaticTrustOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trust(&self, identifier: &str) {
        lock(&self.trusted).insert(identifier.to_string());
    }

    pub fn distrust(&self, identifier: &str) {
        lock(&self.trusted).remove(identifier);
    }
}

impl TrustOracle for StaticTrustOracle {
    fn is_trusted(&self, identifier: &str) -> bool {
        lock(&self.trusted).contains(identifier)
    }
}

/// Keystore holding certificates in a map
#[derive(Debug, Default)]
pub struct MemoryKeystore {
    local_certificate: String,
    certificates: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryKeystore {
    pub fn new(local_certificate: impl Into<String>) -> Self {
        Self {
            local_certificate: local_certificate.into(),
            ..Default::default()
        }
    }

    pub fn certificate(&self, tag: &str) -> Option<String> {
        lock(&self.certificates).get(tag).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.certificates).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl CertificateStore for MemoryKeystore {
    fn add_certificate(&self, tag: &str, base64_cert: &str) -> Result<(), KeystoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KeystoreError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "keystore is read-only",
            )));
        }
        lock(&self.certificates).insert(tag.to_string(), base64_cert.to_string());
        Ok(())
    }

    fn local_certificate_base64(&self) -> String {
        self.local_certificate.clone()
    }
}

/// Usage reporter with a settable snapshot; resets it when reported
#[derive(Debug, Default)]
pub struct CountingUsageReporter {
    current: Mutex<UsageSnapshot>,
    reported: AtomicUsize,
}

impl CountingUsageReporter {
    pub fn new(initial: UsageSnapshot) -> Self {
        Self {
            current: Mutex::new(initial),
            reported: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, snapshot: UsageSnapshot) {
        *lock(&self.current) = snapshot;
    }

    /// How many reports were confirmed sent
    pub fn reported_count(&self) -> usize {
        self.reported.load(Ordering::SeqCst)
    }
}

impl UsageReporter for CountingUsageReporter {
    fn snapshot(&self) -> UsageSnapshot {
        lock(&self.current).clone()
    }

    fn mark_reported(&self) {
        *lock(&self.current) = UsageSnapshot::default();
        self.reported.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records update notices
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    updates: Mutex<Vec<BTreeMap<String, String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<BTreeMap<String, String>> {
        lock(&self.updates).clone()
    }
}

impl UpdateNotifier for RecordingNotifier {
    fn notify_update(&self, update: BTreeMap<String, String>) {
        lock(&self.updates).push(update);
    }
}

/// Holds deferred tasks until told to run them
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Mutex<Vec<(Duration, DeferredTask)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        lock(&self.tasks).len()
    }

    pub fn delays(&self) -> Vec<Duration> {
        lock(&self.tasks).iter().map(|(d, _)| *d).collect()
    }

    /// Run every pending task in scheduling order, ignoring their delays
    pub async fn run_pending(&self) -> usize {
        let tasks: Vec<_> = lock(&self.tasks).drain(..).collect();
        let count = tasks.len();
        for (_, task) in tasks {
            task.await;
        }
        count
    }
}

impl DeferredScheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, task: DeferredTask) {
        lock(&self.tasks).push((delay, task));
    }
}

/// Prober answering from a fixed set of reachable addresses
#[derive(Debug, Default)]
pub struct StaticProber {
    reachable: Mutex<HashSet<(String, u16)>>,
    probed: Mutex<Vec<DirectEndpoint>>,
}

impl StaticProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(&self, host: &str, port: u16) {
        lock(&self.reachable).insert((host.to_ascii_lowercase(), port));
    }

    pub fn probed(&self) -> Vec<DirectEndpoint> {
        lock(&self.probed).clone()
    }
}

#[async_trait]
impl LivenessProber for StaticProber {
    async fn probe(&self, endpoint: &DirectEndpoint) -> Result<(), ProbeError> {
        lock(&self.probed).push(endpoint.clone());
        let key = (endpoint.host().to_ascii_lowercase(), endpoint.port());
        if lock(&self.reachable).contains(&key) {
            Ok(())
        } else {
            Err(ProbeError::Connect {
                address: endpoint.address(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "Connection refused"),
            })
        }
    }
}

/// A full set of in-memory collaborators, keeping typed handles for assertions
pub struct MemoryCollaborators {
    pub channel: Arc<RecordingChannel>,
    pub trust: Arc<StaticTrustOracle>,
    pub keystore: Arc<MemoryKeystore>,
    pub usage: Arc<CountingUsageReporter>,
    pub updates: Arc<RecordingNotifier>,
}

impl MemoryCollaborators {
    pub fn new(local_identifier: &str) -> Self {
        Self {
            channel: Arc::new(RecordingChannel::new(local_identifier)),
            trust: Arc::new(StaticTrustOracle::new()),
            keystore: Arc::new(MemoryKeystore::new("bG9jYWwtY2VydGlmaWNhdGU=")),
            usage: Arc::new(CountingUsageReporter::default()),
            updates: Arc::new(RecordingNotifier::new()),
        }
    }

    /// Bundle for the engine; deferred reports run on the tokio runtime
    pub fn bundle(&self) -> Collaborators {
        Collaborators {
            channel: self.channel.clone(),
            trust: self.trust.clone(),
            keystore: self.keystore.clone(),
            usage: self.usage.clone(),
            scheduler: None,
            updates: Some(self.updates.clone()),
        }
    }

    pub fn bundle_with_scheduler(&self, scheduler: Arc<dyn DeferredScheduler>) -> Collaborators {
        Collaborators {
            scheduler: Some(scheduler),
            ..self.bundle()
        }
    }
}
