//! Address resolution
//!
//! Turns the raw answers of a [`DnsLookup`] into two deduplicated, normalized
//! address lists, one per family. Malformed answers are dropped with a
//! warning; the call only fails when the lookup fails or nothing usable is
//! left.

use std::collections::HashSet;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::family::AddressFamily;
use crate::traits::DnsLookup;

/// Addresses published for a hostname, split by family
///
/// Both lists keep first-seen order and hold normalized text
/// (`"1.2.3.4"`, `"2001:db8::1"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAddresses {
    /// IPv4 addresses
    pub ipv4: Vec<String>,
    /// IPv6 addresses
    pub ipv6: Vec<String>,
}

impl ResolvedAddresses {
    /// Addresses of one family
    pub fn for_family(&self, family: AddressFamily) -> &[String] {
        match family {
            AddressFamily::V4 => &self.ipv4,
            AddressFamily::V6 => &self.ipv6,
        }
    }

    /// Total number of addresses across both families
    pub fn len(&self) -> usize {
        self.ipv4.len() + self.ipv6.len()
    }

    /// Whether neither family has an address
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }
}

/// Resolve `hostname` once and split the answers by family
///
/// # Errors
///
/// - [`Error::Resolution`] if the lookup fails or yields no valid address
pub async fn resolve_addresses(
    lookup: &dyn DnsLookup,
    hostname: &str,
) -> Result<ResolvedAddresses> {
    info!("Querying DNS records for {} via {}", hostname, lookup.lookup_name());

    let answers = lookup.lookup(hostname).await.map_err(|e| match e {
        Error::Resolution(_) => e,
        other => Error::resolution(format!("DNS resolution failed for {}: {}", hostname, other)),
    })?;

    let resolved = split_by_family(&answers);

    info!(
        "DNS query returned {} IPv4 and {} IPv6 addresses",
        resolved.ipv4.len(),
        resolved.ipv6.len()
    );

    if resolved.is_empty() {
        return Err(Error::resolution(format!(
            "No IP addresses found in DNS response for {}",
            hostname
        )));
    }

    Ok(resolved)
}

/// Validate, normalize and deduplicate raw answers
pub fn split_by_family(answers: &[String]) -> ResolvedAddresses {
    let mut seen: HashSet<IpAddr> = HashSet::new();
    let mut resolved = ResolvedAddresses::default();

    for raw in answers {
        let ip: IpAddr = match raw.trim().parse() {
            Ok(ip) => ip,
            Err(_) => {
                warn!("Invalid IP address from DNS: {}", raw);
                continue;
            }
        };

        if !seen.insert(ip) {
            continue;
        }

        match ip {
            IpAddr::V4(v4) => {
                debug!("Found IPv4: {}", v4);
                resolved.ipv4.push(v4.to_string());
            }
            IpAddr::V6(v6) => {
                debug!("Found IPv6: {}", v6);
                resolved.ipv6.push(v6.to_string());
            }
        }
    }

    resolved
}
