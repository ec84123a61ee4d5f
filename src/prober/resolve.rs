use std::net::IpAddr;
use std::time::Duration;
use anyhow::Result;
use tokio::time::timeout;
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::system_conf::read_system_conf;

/// Name resolution for probe targets.
///
/// Wraps a trust-dns resolver built from the system configuration
/// (`/etc/resolv.conf`, hosts file), falling back to the library defaults
/// when the system configuration can't be read.
#[derive(Clone)]
pub struct HostResolver {
    inner: TokioAsyncResolver,
}

impl HostResolver {
    pub fn from_system_conf() -> Self {
        let (config, opts) = match read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read system resolver config, using defaults");
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        Self::new(config, opts)
    }

    pub fn new(config: ResolverConfig, mut opts: ResolverOpts) -> Self {
        // The caller bounds the whole lookup; retries would only stretch it.
        opts.attempts = 1;
        Self {
            inner: TokioAsyncResolver::tokio(config, opts),
        }
    }

    /// Resolve `host` to its first address, bounded by `limit`.
    pub async fn resolve(&self, host: &str, limit: Duration) -> Result<IpAddr> {
        // No hostname or address literal contains whitespace.
        if host.is_empty() || host.chars().any(char::is_whitespace) {
            return Err(anyhow::anyhow!("Invalid hostname: {:?}", host));
        }

        // First try to parse as IP address
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }

        let lookup = timeout(limit, self.inner.lookup_ip(host))
            .await
            .map_err(|_| anyhow::anyhow!("lookup of {} timed out after {:?}", host, limit))??;

        lookup
            .iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Could not resolve hostname: {}", host))
    }
}

impl std::fmt::Debug for HostResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    const LIMIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_resolve_ipv4_literal() {
        let resolver = HostResolver::from_system_conf();
        let ip = resolver.resolve("127.0.0.1", LIMIT).await.unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn test_resolve_ipv6_literal() {
        let resolver = HostResolver::from_system_conf();
        let ip = resolver.resolve("::1", LIMIT).await.unwrap();
        assert_eq!(ip, IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn test_resolve_padded_literal_fails() {
        let resolver = HostResolver::from_system_conf();
        assert!(resolver.resolve(" 127.0.0.1 ", LIMIT).await.is_err());
        assert!(resolver.resolve("127.0.0.1\n", LIMIT).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_empty_host() {
        let resolver = HostResolver::from_system_conf();
        assert!(resolver.resolve("", LIMIT).await.is_err());
        assert!(resolver.resolve("   ", LIMIT).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_reserved_tld_fails() {
        let resolver = HostResolver::from_system_conf();
        assert!(resolver.resolve("no-such-host.invalid", LIMIT).await.is_err());
    }
}
