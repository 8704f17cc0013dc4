//! Address family tag shared by addresses, CIDR blocks and prefix lists

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// IP address family (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AddressFamily {
    /// IPv4
    #[serde(rename = "IPv4", alias = "ipv4", alias = "4")]
    V4,
    /// IPv6
    #[serde(rename = "IPv6", alias = "ipv6", alias = "6")]
    V6,
}

impl AddressFamily {
    /// Family of a parsed address
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    /// Prefix length of a single-host network (/32 or /128)
    pub fn host_prefix_len(self) -> u8 {
        match self {
            AddressFamily::V4 => 32,
            AddressFamily::V6 => 128,
        }
    }

    /// The address-family string the provider API expects
    pub fn provider_tag(self) -> &'static str {
        match self {
            AddressFamily::V4 => "IPv4",
            AddressFamily::V6 => "IPv6",
        }
    }

    /// Numeric version (4 or 6)
    pub fn version(self) -> u8 {
        match self {
            AddressFamily::V4 => 4,
            AddressFamily::V6 => 6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.provider_tag())
    }
}

impl FromStr for AddressFamily {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ipv4" | "v4" | "4" => Ok(AddressFamily::V4),
            "ipv6" | "v6" | "6" => Ok(AddressFamily::V6),
            other => Err(crate::Error::invalid_input(format!(
                "Unknown address family: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_parsing() {
        assert_eq!("IPv4".parse::<AddressFamily>().unwrap(), AddressFamily::V4);
        assert_eq!("6".parse::<AddressFamily>().unwrap(), AddressFamily::V6);
        assert!("ipx".parse::<AddressFamily>().is_err());
    }

    #[test]
    fn test_family_of_address() {
        assert_eq!(AddressFamily::of(&"10.0.0.1".parse().unwrap()), AddressFamily::V4);
        assert_eq!(AddressFamily::of(&"2001:db8::1".parse().unwrap()), AddressFamily::V6);
        assert_eq!(AddressFamily::V6.host_prefix_len(), 128);
        assert_eq!(AddressFamily::V4.to_string(), "IPv4");
    }
}
