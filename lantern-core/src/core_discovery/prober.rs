/*
    LivenessProber - can we open a TCP connection to this endpoint?

    Gates admission of directly dialed endpoints (general and server-managed
    pools). Peer proxies are never probed; they are reached through the
    peer-to-peer transport instead.

    The probe stream lives only inside `probe()`; it is dropped, and the socket
    closed, on every return path including timeout.
*/

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::errors::ProbeError;
use super::identifier::DirectEndpoint;

#[async_trait]
pub trait LivenessProber: Send + Sync {
    async fn probe(&self, endpoint: &DirectEndpoint) -> Result<(), ProbeError>;
}

/// Probes by opening (and immediately dropping) a TCP connection
#[derive(Debug, Clone)]
pub struct TcpProber {
    timeout: Duration,
}

impl TcpProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[async_trait]
impl LivenessProber for TcpProber {
    async fn probe(&self, endpoint: &DirectEndpoint) -> Result<(), ProbeError> {
        let address = endpoint.address();
        trace!(%address, timeout_ms = self.timeout.as_millis() as u64, "Probing endpoint");

        let connect = TcpStream::connect((endpoint.host(), endpoint.port()));
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(stream)) => {
                debug!(%address, peer = ?stream.peer_addr().ok(), "Probe connected");
                drop(stream);
                Ok(())
            }
            Ok(Err(source)) => Err(ProbeError::Connect { address, source }),
            Err(_) => Err(ProbeError::Timeout {
                address,
                timeout_ms: self.timeout.as_millis(),
            }),
        }
    }
}
