// # System DNS Lookup
//
// This crate provides the DnsLookup used in production.
//
// ## Architecture
//
// Hostnames are resolved through the operating system resolver via
// `tokio::net::lookup_host`, so `/etc/hosts`, search domains and the
// configured nameservers all apply. A and AAAA answers come back together;
// splitting by family happens in the core resolver.
//
// ## Failure Model
//
// A resolver error or a timeout is returned as `Error::Resolution`. The
// lookup is single-shot; there is no retry here.

use std::net::IpAddr;
use std::time::Duration;

use prefix_sync_core::traits::DnsLookup;
use prefix_sync_core::{Error, Result};
use tracing::debug;

/// Default time allowed for one lookup
pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 10;

/// DnsLookup backed by the OS resolver
#[derive(Debug, Clone)]
pub struct SystemDnsLookup {
    /// Upper bound on one lookup
    timeout: Duration,
}

impl SystemDnsLookup {
    /// Create a lookup with the default timeout
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_LOOKUP_TIMEOUT_SECS))
    }

    /// Create a lookup with a custom timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemDnsLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DnsLookup for SystemDnsLookup {
    async fn lookup(&self, hostname: &str) -> Result<Vec<String>> {
        debug!("Resolving {} via system resolver", hostname);

        let resolved = tokio::time::timeout(self.timeout, tokio::net::lookup_host((hostname, 0)))
            .await
            .map_err(|_| {
                Error::resolution(format!(
                    "Lookup of {} timed out after {:?}",
                    hostname, self.timeout
                ))
            })?
            .map_err(|e| Error::resolution(format!("Failed to resolve {}: {}", hostname, e)))?;

        // The resolver repeats an address once per socket type
        let mut seen: Vec<IpAddr> = Vec::new();
        for addr in resolved {
            let ip = addr.ip();
            if !seen.contains(&ip) {
                seen.push(ip);
            }
        }

        debug!("{} resolved to {} address(es)", hostname, seen.len());
        Ok(seen.into_iter().map(|ip| ip.to_string()).collect())
    }

    fn lookup_name(&self) -> &'static str {
        "system"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_literal_address_resolves_to_itself() {
        let lookup = SystemDnsLookup::new();
        let answers = lookup.lookup("192.0.2.10").await.unwrap();
        assert_eq!(answers, vec!["192.0.2.10".to_string()]);
    }

    #[tokio::test]
    async fn test_ipv6_literal_is_normalized() {
        let lookup = SystemDnsLookup::new();
        let answers = lookup.lookup("2001:0db8:0000::0001").await.unwrap();
        assert_eq!(answers, vec!["2001:db8::1".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_hostname_is_resolution_error() {
        let lookup = SystemDnsLookup::with_timeout(Duration::from_secs(5));
        let err = lookup.lookup("no such host.invalid").await.unwrap_err();
        assert!(matches!(err, Error::Resolution(_)), "got {:?}", err);
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(
            SystemDnsLookup::default().timeout(),
            Duration::from_secs(DEFAULT_LOOKUP_TIMEOUT_SECS)
        );
        assert_eq!(SystemDnsLookup::new().lookup_name(), "system");
    }
}
