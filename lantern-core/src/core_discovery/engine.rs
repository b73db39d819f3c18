/*
    DiscoveryEngine - façade over the discovery, trust and rotation core

    Lifecycle:

        connect(config, collaborators)
            ├─ credentials present?          no ─► Initialization error
            ├─ channel.login(.., marker)     err ─► Initialization error
            └─ classifier built from the identifier login returned
        start()
            ├─ presence: available, then directed to the hub
            ├─ initial info report
            └─ replay roster presences through the presence reactor
        handle_event(InboundEvent)           (any task, any time)
            ├─ Presence            ─► PresenceReactor
            ├─ Typed               ─► TypedMessageDispatcher
            ├─ Plain from hub      ─► servers / update_time / update
            └─ SubscriptionRequest ─► accepted from the hub chat domain only
        shutdown()                           pending reports are dropped

    Admission of an announced candidate (hub servers list):

        classify ─► Self            ─► discard
                 ─► ServerManaged   ─┐
                 ─► GeneralDirect   ─┴► member? skip : probe ─► ok  ─► admit
                                                              └► err ─► ERROR to hub,
                                                                        drop stale entry
                 ─► TrustedPeer     ─► trusted pool   ─► INFO_REQUEST on first admit
                 ─► AnonymousPeer   ─► anonymous pool ─► INFO_REQUEST on first admit

    Consumers draw from the pools through the produced surface and report
    failures back through notify_*.
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::cert_exchange::CertificateExchange;
use super::classifier::{CategoryKind, Classification, Classifier};
use super::collaborators::{Collaborators, DeferredScheduler, MessagingChannel, OutboundPresence, UpdateNotifier};
use super::dispatcher::{DispatchOutcome, TypedMessageDispatcher};
use super::errors::{ClassificationError, DiscoveryError, DiscoveryResult};
use super::events::{InboundEvent, PlainMessage};
use super::hub::{HubAddress, HubMessage};
use super::identifier::{DirectEndpoint, PeerUri};
use super::message::{MessageType, OutboundMessage, PROP_MESSAGE};
use super::metrics;
use super::pool::PoolLease;
use super::presence::{PresenceOutcome, PresenceReactor};
use super::prober::{LivenessProber, TcpProber};
use super::registry::{DirectKind, PeerKind, PoolSizes, ProxyRegistry};
use super::report::{InfoReporter, ReportScheduler, TokioScheduler};
use super::secret_keys::SecretKeyCache;
use crate::config::Config;
use crate::shutdown::ShutdownCoordinator;

/// Result of feeding one announced candidate through admission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionOutcome {
    SelfIdentity,
    Rejected(ClassificationError),
    AlreadyMember(CategoryKind),
    Admitted(CategoryKind),
    ProbeFailed { address: String, reason: String },
}

/// Result of a hub control message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubOutcome {
    pub admissions: Vec<AdmissionOutcome>,
    /// `Some(true)` scheduled, `Some(false)` debounced, `None` no delay given
    pub report_scheduled: Option<bool>,
    pub update_forwarded: bool,
}

/// What `handle_event` did with an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Presence(PresenceOutcome),
    Typed(DispatchOutcome),
    Hub(HubOutcome),
    /// Hub message whose body could not be used
    MalformedHubMessage,
    /// Plain message from someone other than the hub
    Ignored,
    Subscription { accepted: bool },
}

pub struct DiscoveryEngine {
    classifier: Classifier,
    registry: Arc<ProxyRegistry>,
    hub: HubAddress,
    channel: Arc<dyn MessagingChannel>,
    prober: Arc<dyn LivenessProber>,
    exchange: Arc<CertificateExchange>,
    dispatcher: TypedMessageDispatcher,
    presence: PresenceReactor,
    reporter: Arc<InfoReporter>,
    reports: ReportScheduler,
    updates: Option<Arc<dyn UpdateNotifier>>,
    update_forwarded: AtomicBool,
    secrets: SecretKeyCache,
    shutdown: ShutdownCoordinator,
}

impl DiscoveryEngine {
    /// Log in and build an engine probing with [`TcpProber`]
    pub async fn connect(config: &Config, collaborators: Collaborators) -> DiscoveryResult<Arc<Self>> {
        let prober = Arc::new(TcpProber::new(config.discovery.probe_timeout));
        Self::connect_with_prober(config, collaborators, prober).await
    }

    pub async fn connect_with_prober(
        config: &Config,
        collaborators: Collaborators,
        prober: Arc<dyn LivenessProber>,
    ) -> DiscoveryResult<Arc<Self>> {
        config
            .account
            .require_credentials()
            .map_err(|e| DiscoveryError::Initialization(e.to_string()))?;

        let discovery = &config.discovery;
        let marker = config.account.resource_marker();
        let login = collaborators
            .channel
            .login(&config.account.username, &config.account.password, marker);
        let self_identifier = match tokio::time::timeout(discovery.reply_timeout, login).await {
            Ok(Ok(id)) => id,
            Ok(Err(e)) => return Err(DiscoveryError::Initialization(format!("login failed: {}", e))),
            Err(_) => {
                return Err(DiscoveryError::Initialization(format!(
                    "login timed out after {:?}",
                    discovery.reply_timeout
                )))
            }
        };
        info!(identifier = %self_identifier, marker, "Logged in");

        if config.metrics.enabled {
            metrics::init_metrics();
        }

        let classifier = Classifier::new(
            self_identifier.as_str(),
            discovery.cloud_markers.clone(),
            discovery.server_managed_port,
        );
        let hub = HubAddress::new(discovery.hub_identifier.as_str(), discovery.hub_chat_domain.as_str());
        let registry = Arc::new(ProxyRegistry::new());
        let shutdown = ShutdownCoordinator::default();

        let exchange = Arc::new(CertificateExchange::new(
            collaborators.channel.clone(),
            collaborators.keystore.clone(),
            discovery.local_tag.as_str(),
        ));
        let dispatcher = TypedMessageDispatcher::new(registry.clone(), exchange.clone());
        let presence = PresenceReactor::new(
            registry.clone(),
            exchange.clone(),
            collaborators.trust.clone(),
            hub.clone(),
            classifier.self_identifier(),
            &discovery.peer_marker,
        );

        let reporter = Arc::new(InfoReporter::new(
            collaborators.channel.clone(),
            collaborators.usage.clone(),
            discovery.hub_identifier.as_str(),
            config.account.country_code.as_str(),
            discovery.version.as_str(),
        ));
        let scheduler: Arc<dyn DeferredScheduler> = match collaborators.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(TokioScheduler::new(shutdown.subscribe())),
        };
        let reports = ReportScheduler::new(reporter.clone(), scheduler, discovery.report_debounce);

        Ok(Arc::new(Self {
            classifier,
            registry,
            hub,
            channel: collaborators.channel,
            prober,
            exchange,
            dispatcher,
            presence,
            reporter,
            reports,
            updates: collaborators.updates,
            update_forwarded: AtomicBool::new(false),
            secrets: SecretKeyCache::new(),
            shutdown,
        }))
    }

    pub fn self_identifier(&self) -> &str {
        self.classifier.self_identifier()
    }

    /// Announce ourselves, report once and pick up peers already online
    pub async fn start(&self) -> DiscoveryResult<()> {
        self.channel.send_presence(OutboundPresence::Available).await?;
        self.channel
            .send_presence(OutboundPresence::AvailableTo(self.hub.identifier().to_string()))
            .await?;

        if let Err(e) = self.reporter.send_report().await {
            warn!(error = %e, "Initial info report failed");
        }

        let roster = self.channel.roster_presences().await?;
        debug!(entries = roster.len(), "Replaying roster presences");
        for presence in roster {
            self.presence.react(&presence).await;
        }
        Ok(())
    }

    pub async fn handle_event(&self, event: InboundEvent) -> EventOutcome {
        match event {
            InboundEvent::Presence(presence) => EventOutcome::Presence(self.presence.react(&presence).await),
            InboundEvent::Typed(message) => EventOutcome::Typed(self.dispatcher.dispatch(&message).await),
            InboundEvent::Plain(message) => self.handle_plain(message).await,
            InboundEvent::SubscriptionRequest { from } => self.handle_subscription(from).await,
        }
    }

    async fn handle_plain(&self, message: PlainMessage) -> EventOutcome {
        if !self.hub.is_hub(&message.from) {
            debug!(from = %message.from, "Ignoring plain message");
            return EventOutcome::Ignored;
        }

        let body = message.body.unwrap_or_default();
        match HubMessage::parse(&body) {
            Ok(hub_message) => EventOutcome::Hub(self.handle_hub_message(hub_message).await),
            Err(e) => {
                warn!(error = %e, body = %body, "Could not parse hub message");
                EventOutcome::MalformedHubMessage
            }
        }
    }

    async fn handle_hub_message(&self, message: HubMessage) -> HubOutcome {
        info!(servers = message.servers.len(), "Hub message");

        // Debounce drops only the scheduling request; servers are admitted regardless
        let report_scheduled = message.report_after.map(|delay| self.reports.request(delay));

        let mut admissions = Vec::with_capacity(message.servers.len());
        for server in &message.servers {
            admissions.push(self.admit_candidate(server).await);
        }

        let update_forwarded = match message.update {
            Some(update) => self.forward_update(update),
            None => false,
        };

        HubOutcome {
            admissions,
            report_scheduled,
            update_forwarded,
        }
    }

    // The update notice is shown once per process
    fn forward_update(&self, update: std::collections::BTreeMap<String, String>) -> bool {
        let Some(notifier) = &self.updates else {
            return false;
        };
        if self.update_forwarded.swap(true, Ordering::SeqCst) {
            debug!("Update notice already shown");
            return false;
        }
        info!(?update, "Forwarding update notice");
        notifier.notify_update(update);
        true
    }

    async fn handle_subscription(&self, from: String) -> EventOutcome {
        if !self.hub.may_subscribe(&from) {
            debug!(from = %from, "Ignoring subscription request");
            return EventOutcome::Subscription { accepted: false };
        }

        info!(from = %from, "Accepting subscription request");
        if let Err(e) = self
            .channel
            .send_presence(OutboundPresence::Subscribed { to: from })
            .await
        {
            error!(error = %e, "Could not answer subscription request");
        }
        EventOutcome::Subscription { accepted: true }
    }

    /// Classify one announced identifier and admit it to the matching pool
    pub async fn admit_candidate(&self, raw: &str) -> AdmissionOutcome {
        let classification = match self.classifier.classify(raw) {
            Ok(classification) => classification,
            Err(e) => {
                warn!(candidate = raw, error = %e, "Discarding candidate");
                metrics::candidate_rejected();
                return AdmissionOutcome::Rejected(e);
            }
        };
        let kind = classification.kind();

        match classification {
            Classification::SelfIdentity => {
                debug!(candidate = raw, "Not adding ourselves as a proxy");
                AdmissionOutcome::SelfIdentity
            }
            Classification::ServerManaged(endpoint) => {
                self.admit_direct(DirectKind::ServerManaged, kind, endpoint).await
            }
            Classification::GeneralDirect(endpoint) => self.admit_direct(DirectKind::General, kind, endpoint).await,
            Classification::TrustedPeer(peer) => self.admit_peer(PeerKind::Trusted, kind, peer).await,
            Classification::AnonymousPeer(peer) => self.admit_peer(PeerKind::Anonymous, kind, peer).await,
        }
    }

    async fn admit_direct(&self, pool: DirectKind, kind: CategoryKind, endpoint: DirectEndpoint) -> AdmissionOutcome {
        if self.registry.direct(pool).contains(&endpoint) {
            debug!(%endpoint, pool = kind.as_str(), "Proxy already known");
            return AdmissionOutcome::AlreadyMember(kind);
        }

        match self.prober.probe(&endpoint).await {
            Ok(()) => {
                metrics::probe_succeeded();
                if self.registry.admit_direct(pool, endpoint.clone()) {
                    info!(%endpoint, pool = kind.as_str(), "Admitted proxy");
                    AdmissionOutcome::Admitted(kind)
                } else {
                    // Lost a race with a concurrent admission of the same key
                    AdmissionOutcome::AlreadyMember(kind)
                }
            }
            Err(e) => {
                metrics::probe_failed();
                error!(%endpoint, error = %e, "Could not connect to proxy");
                self.send_error_diagnostic(&endpoint, &e.reason()).await;
                self.registry.remove_direct(pool, &endpoint, "probe_failed");
                AdmissionOutcome::ProbeFailed {
                    address: endpoint.address(),
                    reason: e.reason(),
                }
            }
        }
    }

    async fn admit_peer(&self, pool: PeerKind, kind: CategoryKind, peer: PeerUri) -> AdmissionOutcome {
        if !self.registry.admit_peer(pool, peer.clone()) {
            debug!(%peer, pool = kind.as_str(), "Peer proxy already known");
            return AdmissionOutcome::AlreadyMember(kind);
        }

        info!(%peer, pool = kind.as_str(), "Admitted peer proxy");
        if let Err(e) = self.exchange.request(&peer).await {
            warn!(%peer, error = %e, "Could not send INFO request");
        }
        AdmissionOutcome::Admitted(kind)
    }

    async fn send_error_diagnostic(&self, endpoint: &DirectEndpoint, reason: &str) {
        let message = OutboundMessage::typed(self.hub.identifier(), MessageType::Error).with_property(
            PROP_MESSAGE,
            format!("Error: {} with host: {}", reason, endpoint.address()),
        );
        if let Err(e) = self.channel.send(message).await {
            warn!(error = %e, "Could not send error diagnostic to hub");
        }
    }

    pub fn general_proxy(&self) -> Option<DirectEndpoint> {
        self.registry.direct(DirectKind::General).next()
    }

    pub fn server_managed_proxy(&self) -> Option<DirectEndpoint> {
        self.registry.direct(DirectKind::ServerManaged).next()
    }

    pub fn trusted_peer_proxy(&self) -> Option<PeerUri> {
        self.registry.peers(PeerKind::Trusted).next()
    }

    pub fn anonymous_peer_proxy(&self) -> Option<PeerUri> {
        self.registry.peers(PeerKind::Anonymous).next()
    }

    /// Exclusive variant of [`general_proxy`](Self::general_proxy)
    pub fn checkout_general_proxy(&self) -> Option<PoolLease<DirectEndpoint>> {
        self.registry.direct(DirectKind::General).checkout()
    }

    /// Exclusive variant of [`trusted_peer_proxy`](Self::trusted_peer_proxy)
    pub fn checkout_trusted_peer_proxy(&self) -> Option<PoolLease<PeerUri>> {
        self.registry.peers(PeerKind::Trusted).checkout()
    }

    /// A direct proxy at `host:port` could not be reached
    pub fn notify_probe_failed(&self, host: &str, port: u16) -> usize {
        let removed = self.registry.remove_direct_address(host, port, "unreachable");
        info!(host, port, removed = removed.len(), "Proxy reported unreachable");
        removed.len()
    }

    /// A peer proxy could not be reached
    pub fn notify_peer_unreachable(&self, identifier: &str) -> usize {
        self.remove_peer(identifier, "unreachable")
    }

    /// A peer proxy misbehaved
    pub fn notify_peer_error(&self, identifier: &str) -> usize {
        self.remove_peer(identifier, "peer_error")
    }

    fn remove_peer(&self, identifier: &str, reason: &'static str) -> usize {
        match PeerUri::parse(identifier) {
            Ok(peer) => self.registry.remove_peer(&peer, reason),
            Err(e) => {
                warn!(identifier, error = %e, "Cannot remove malformed peer identifier");
                0
            }
        }
    }

    /// Shared secret for `identifier`, generated on first use
    pub fn secret_key(&self, identifier: &str) -> String {
        self.secrets.get_or_create(identifier)
    }

    pub fn pool_sizes(&self) -> PoolSizes {
        self.registry.sizes()
    }

    pub fn registry(&self) -> &ProxyRegistry {
        &self.registry
    }

    /// Stop accepting deferred work and drop pending reports
    pub fn shutdown(&self) {
        self.shutdown.shutdown_immediately();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_shutting_down()
    }
}
