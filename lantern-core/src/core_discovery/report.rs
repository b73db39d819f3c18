/*
    Info reports to the hub

    InfoReporter     builds the JSON status report from the usage collaborator
                     and sends it to the hub as a plain message. Usage state is
                     marked reported only after the channel accepted it.

    ReportScheduler  turns the hub's `update_time` into a one-shot deferred
                     send, with a debounce window:

        t=0     request(5s)   ─► scheduled  (fires at t=5s)
        t=3s    request(5s)   ─► dropped    (3s < debounce)
        t=12s   request(5s)   ─► scheduled  (fires at t=17s)

    TokioScheduler   the production DeferredScheduler: a spawned sleep that
                     loses the race against shutdown.
*/

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};

use super::collaborators::{DeferredScheduler, DeferredTask, MessagingChannel, UsageReporter};
use super::errors::DiscoveryResult;
use super::message::OutboundMessage;
use super::metrics;
use crate::shutdown::ShutdownListener;

/// Status report payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoReport {
    pub country_code: String,
    pub bytes_proxied: u64,
    pub direct_bytes: u64,
    pub requests_proxied: u64,
    pub direct_requests: u64,
    pub whitelist_additions: Vec<String>,
    pub whitelist_removals: Vec<String>,
    pub version: String,
}

pub struct InfoReporter {
    channel: Arc<dyn MessagingChannel>,
    usage: Arc<dyn UsageReporter>,
    hub_identifier: String,
    country_code: String,
    version: String,
}

impl InfoReporter {
    pub fn new(
        channel: Arc<dyn MessagingChannel>,
        usage: Arc<dyn UsageReporter>,
        hub_identifier: impl Into<String>,
        country_code: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            usage,
            hub_identifier: hub_identifier.into(),
            country_code: country_code.into(),
            version: version.into(),
        }
    }

    pub fn build(&self) -> InfoReport {
        let usage = self.usage.snapshot();
        InfoReport {
            country_code: self.country_code.clone(),
            bytes_proxied: usage.bytes_proxied,
            direct_bytes: usage.direct_bytes,
            requests_proxied: usage.requests_proxied,
            direct_requests: usage.direct_requests,
            whitelist_additions: usage.whitelist_additions,
            whitelist_removals: usage.whitelist_removals,
            version: self.version.clone(),
        }
    }

    /// Send one report. On failure the usage state is left untouched so the
    /// next report carries it again.
    pub async fn send_report(&self) -> DiscoveryResult<()> {
        let body = serde_json::to_string(&self.build())?;
        debug!(to = %self.hub_identifier, bytes = body.len(), "Sending info report");

        match self
            .channel
            .send(OutboundMessage::plain(&self.hub_identifier, body))
            .await
        {
            Ok(()) => {
                self.usage.mark_reported();
                metrics::report_sent(true);
                info!("Info report sent");
                Ok(())
            }
            Err(e) => {
                metrics::report_sent(false);
                error!(error = %e, "Could not send info report");
                Err(e.into())
            }
        }
    }
}

/// Debounced one-shot scheduling of info reports
pub struct ReportScheduler {
    reporter: Arc<InfoReporter>,
    scheduler: Arc<dyn DeferredScheduler>,
    debounce: Duration,
    last_scheduled: Mutex<Option<Instant>>,
}

impl ReportScheduler {
    pub fn new(reporter: Arc<InfoReporter>, scheduler: Arc<dyn DeferredScheduler>, debounce: Duration) -> Self {
        Self {
            reporter,
            scheduler,
            debounce,
            last_scheduled: Mutex::new(None),
        }
    }

    /// Schedule a report after `delay`. Returns `false` when the request fell
    /// inside the debounce window and was dropped.
    pub fn request(&self, delay: Duration) -> bool {
        {
            let mut last = self.last_scheduled.lock().unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            if let Some(previous) = *last {
                let elapsed = now.saturating_duration_since(previous);
                if elapsed < self.debounce {
                    debug!(elapsed_ms = elapsed.as_millis() as u64, "Not scheduling info report");
                    metrics::report_schedule(false);
                    return false;
                }
            }
            *last = Some(now);
        }

        info!(delay_ms = delay.as_millis() as u64, "Scheduling info report");
        metrics::report_schedule(true);

        let reporter = Arc::clone(&self.reporter);
        self.scheduler.schedule_once(
            delay,
            Box::pin(async move {
                // Failure already logged; the next hub message reschedules
                let _ = reporter.send_report().await;
            }),
        );
        true
    }
}

/// Runs deferred tasks on the tokio runtime until shutdown
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    shutdown: ShutdownListener,
}

impl TokioScheduler {
    pub fn new(shutdown: ShutdownListener) -> Self {
        Self { shutdown }
    }
}

impl DeferredScheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: DeferredTask) {
        if self.shutdown.is_shutdown() {
            debug!("Shutting down, dropping deferred task");
            return;
        }

        // Deadline fixed now, not when the task is first polled
        let deadline = Instant::now() + delay;
        let mut shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => task.await,
                _ = shutdown.wait() => debug!("Deferred task cancelled by shutdown"),
            }
        });
    }
}
