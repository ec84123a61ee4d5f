//! Reachability probe: resolve, TCP connect, then ICMP fallback.

use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use crate::config::ProbeConfig;

pub mod icmp;
pub mod resolve;
pub mod tcp_connect;

pub use icmp::{IcmpReachability, Reachability};
pub use resolve::HostResolver;

/// Strategy that established reachability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    Tcp,
    Icmp,
}

/// Why a probe failed. None of these are retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// DNS resolution failed.
    #[error("host not found: {0}")]
    HostNotFound(String),

    /// TCP connect and the reachability fallback both failed.
    #[error("host unreachable")]
    Unreachable,

    /// Anything else that went wrong while probing.
    #[error("error: {0}")]
    Unexpected(String),
}

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable { elapsed: Duration, method: ProbeMethod },
    Failed(ProbeError),
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable { .. })
    }

    /// Milliseconds from probe start, DNS included. `None` on failure.
    pub fn elapsed_ms(&self) -> Option<u64> {
        match self {
            ProbeOutcome::Reachable { elapsed, .. } => Some(elapsed.as_millis() as u64),
            ProbeOutcome::Failed(_) => None,
        }
    }

    pub fn method(&self) -> Option<ProbeMethod> {
        match self {
            ProbeOutcome::Reachable { method, .. } => Some(*method),
            ProbeOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ProbeError> {
        match self {
            ProbeOutcome::Reachable { .. } => None,
            ProbeOutcome::Failed(e) => Some(e),
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.error().map(ToString::to_string)
    }

    pub fn report(&self) -> OutcomeReport {
        OutcomeReport {
            success: self.is_success(),
            elapsed_ms: self.elapsed_ms(),
            method: self.method(),
            error: self.error_message(),
        }
    }
}

/// Flat, serializable view of a [`ProbeOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutcomeReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<ProbeMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Render a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Runs probes. Holds no per-probe state, so one instance serves any
/// number of concurrent probes.
#[derive(Clone)]
pub struct Prober {
    resolver: HostResolver,
    reachability: Arc<dyn Reachability>,
}

impl Prober {
    pub fn new(resolver: HostResolver, reachability: Arc<dyn Reachability>) -> Self {
        Self { resolver, reachability }
    }

    /// System resolver with ICMP fallback.
    pub fn system() -> Self {
        Self::new(HostResolver::from_system_conf(), Arc::new(IcmpReachability))
    }

    /// Probe `host`. Every failure, a panic included, comes back as
    /// [`ProbeOutcome::Failed`].
    pub async fn probe(&self, host: &str, config: &ProbeConfig) -> ProbeOutcome {
        let start = Instant::now();
        let result = AssertUnwindSafe(self.run(host, config, start))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(ProbeError::Unexpected(panic_message(payload.as_ref()))));

        match result {
            Ok(outcome) => {
                tracing::info!(
                    host = %host,
                    elapsed_ms = outcome.elapsed_ms(),
                    method = ?outcome.method(),
                    "probe succeeded"
                );
                outcome
            }
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "probe failed");
                ProbeOutcome::Failed(e)
            }
        }
    }

    async fn run(
        &self,
        host: &str,
        config: &ProbeConfig,
        start: Instant,
    ) -> Result<ProbeOutcome, ProbeError> {
        let limit = config.timeout();

        let ip = self.resolver.resolve(host, limit).await.map_err(|e| {
            tracing::debug!(host = %host, error = %e, "resolution failed");
            ProbeError::HostNotFound(host.to_string())
        })?;

        let addr = SocketAddr::new(ip, config.port);
        match tcp_connect::probe_tcp(addr, limit).await {
            Ok(()) => {
                return Ok(ProbeOutcome::Reachable {
                    elapsed: start.elapsed(),
                    method: ProbeMethod::Tcp,
                });
            }
            Err(e) => {
                tracing::debug!(
                    host = %host,
                    addr = %addr,
                    error = %e,
                    "tcp connect failed, trying reachability check"
                );
            }
        }

        // The fallback gets its own bound in case an implementation ignores `limit`.
        let check = self.reachability.is_reachable(ip, limit);
        let reachable = match tokio::time::timeout(limit, check).await {
            Ok(checked) => checked.map_err(|e| ProbeError::Unexpected(e.to_string()))?,
            Err(_) => false,
        };

        if reachable {
            Ok(ProbeOutcome::Reachable {
                elapsed: start.elapsed(),
                method: ProbeMethod::Icmp,
            })
        } else {
            Err(ProbeError::Unreachable)
        }
    }
}

impl std::fmt::Debug for Prober {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prober")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}
