//! TCP reachability check against the managed process.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time;
use tracing::debug;

/// Answers "is the managed process accepting connections right now?"
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// One bounded probe. Any failure means unreachable.
    async fn is_reachable(&self) -> bool;
}

/// Probes by opening (and immediately dropping) a TCP connection.
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Probe `address` (`host:port`) with a connect timeout.
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

#[async_trait]
impl LivenessProbe for TcpProbe {
    async fn is_reachable(&self) -> bool {
        match time::timeout(self.timeout, TcpStream::connect(self.address.as_str())).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!(address = %self.address, error = %e, "liveness probe refused");
                false
            }
            Err(_) => {
                debug!(address = %self.address, "liveness probe timed out");
                false
            }
        }
    }
}
