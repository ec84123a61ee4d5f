use std::io;
use std::net::IpAddr;
use std::time::Duration;
use async_trait::async_trait;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence, SurgeError};
use tokio::time::timeout;

/// Network-layer reachability check used when the TCP connect fails.
///
/// `Ok(false)` means the host did not answer in time. `Err` means the check
/// itself could not run (no permission for an ICMP socket, for instance).
#[async_trait]
pub trait Reachability: Send + Sync {
    async fn is_reachable(&self, ip: IpAddr, limit: Duration) -> io::Result<bool>;
}

/// ICMP echo through surge-ping.
#[derive(Debug, Clone, Default)]
pub struct IcmpReachability;

#[async_trait]
impl Reachability for IcmpReachability {
    async fn is_reachable(&self, ip: IpAddr, limit: Duration) -> io::Result<bool> {
        let client = match ip {
            IpAddr::V4(_) => Client::new(&Config::default())?,
            IpAddr::V6(_) => Client::new(&Config::builder().kind(ICMP::V6).build())?,
        };

        let process_id = std::process::id() as u16;
        let payload = process_id.to_be_bytes();

        let mut pinger = client.pinger(ip, PingIdentifier(process_id)).await;
        pinger.timeout(limit);

        match timeout(limit, pinger.ping(PingSequence(0), &payload)).await {
            Ok(Ok((_packet, rtt))) => {
                let rtt_ms = rtt.as_secs_f64() * 1000.0;
                tracing::debug!(ip = %ip, rtt_ms, "icmp echo answered");
                Ok(true)
            }
            Ok(Err(SurgeError::IOError(e))) if e.kind() == io::ErrorKind::PermissionDenied => {
                Err(e)
            }
            Ok(Err(e)) => {
                tracing::debug!(ip = %ip, error = %e, "icmp echo failed");
                Ok(false)
            }
            Err(_) => {
                let timeout_ms = limit.as_millis() as u64;
                tracing::debug!(ip = %ip, timeout_ms, "icmp echo timed out");
                Ok(false)
            }
        }
    }
}
