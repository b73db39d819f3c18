//! Test fixtures
//!
//! Well-known identifiers, hub message bodies and a builder wiring a
//! `DiscoveryEngine` to in-memory collaborators.

use serde_json::json;
use std::sync::Arc;

use crate::config::Config;
use crate::core_discovery::memory::{MemoryCollaborators, StaticProber};
use crate::core_discovery::{DeferredScheduler, DiscoveryEngine, DiscoveryResult, InboundEvent, PlainMessage};

/// Our own full identifier
pub const SELF_ID: &str = "bob@example.com/-lan-2";
/// A proxy-capable peer
pub const ALICE: &str = "alice@example.com/-lan-1";
/// Another proxy-capable peer
pub const CAROL: &str = "carol@example.org/-lan-3";
/// Hub identifier (default configuration)
pub const HUB: &str = "lantern-controller@appspot.com";
/// Hub chat session identifier
pub const HUB_CHAT: &str = "lantern-controller@lantern-controller.appspotchat.com";

/// Default configuration with credentials filled in
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.account.username = "bob@example.com".to_string();
    config.account.password = "hunter2".to_string();
    config.account.country_code = "US".to_string();
    config
}

/// JSON body of a hub control message
pub fn hub_body(servers: &[&str], update_time_ms: Option<u64>) -> String {
    let mut body = json!({ "servers": servers });
    if let Some(ms) = update_time_ms {
        body["update_time"] = json!(ms);
    }
    body.to_string()
}

/// A hub control message as an inbound event
pub fn hub_event(servers: &[&str], update_time_ms: Option<u64>) -> InboundEvent {
    InboundEvent::Plain(PlainMessage {
        from: HUB.to_string(),
        body: Some(hub_body(servers, update_time_ms)),
    })
}

/// Builder for an engine over in-memory collaborators
pub struct TestEngineBuilder {
    config: Config,
    self_identifier: String,
    reachable: Vec<(String, u16)>,
    trusted: Vec<String>,
    scheduler: Option<Arc<dyn DeferredScheduler>>,
}

impl Default for TestEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEngineBuilder {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            self_identifier: SELF_ID.to_string(),
            reachable: Vec::new(),
            trusted: Vec::new(),
            scheduler: None,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_self_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.self_identifier = identifier.into();
        self
    }

    /// Let probes of `host:port` succeed
    pub fn reachable(mut self, host: &str, port: u16) -> Self {
        self.reachable.push((host.to_string(), port));
        self
    }

    /// Have the trust oracle vouch for `identifier`
    pub fn trusted(mut self, identifier: &str) -> Self {
        self.trusted.push(identifier.to_string());
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn DeferredScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub async fn build(self) -> DiscoveryResult<TestEngine> {
        let memory = MemoryCollaborators::new(&self.self_identifier);
        for id in &self.trusted {
            memory.trust.trust(id);
        }

        let prober = Arc::new(StaticProber::new());
        for (host, port) in &self.reachable {
            prober.allow(host, *port);
        }

        let collaborators = match self.scheduler {
            Some(scheduler) => memory.bundle_with_scheduler(scheduler),
            None => memory.bundle(),
        };
        let engine = DiscoveryEngine::connect_with_prober(&self.config, collaborators, prober.clone()).await?;

        Ok(TestEngine {
            engine,
            memory,
            prober,
        })
    }
}

/// An engine together with typed handles on its collaborators
pub struct TestEngine {
    pub engine: Arc<DiscoveryEngine>,
    pub memory: MemoryCollaborators,
    pub prober: Arc<StaticProber>,
}
