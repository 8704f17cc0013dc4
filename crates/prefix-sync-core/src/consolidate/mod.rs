//! CIDR consolidation
//!
//! Collapses a set of host addresses of one family into the fewest CIDR
//! blocks whose union is exactly that set. Blocks never cover an address
//! that was not in the input, so `.1 .2 .3` becomes `.1/32` and `.2/31`,
//! not `.0/30`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::family::AddressFamily;

/// Consolidate address strings of one family into CIDR blocks
///
/// Strings that do not parse as an address of `family` are logged and
/// skipped. The result is sorted and independent of input order and
/// duplicates.
///
/// # Errors
///
/// - [`Error::InvalidInput`] if no input string parses
pub fn consolidate(addresses: &[String], family: AddressFamily) -> Result<Vec<IpNet>> {
    info!("Consolidating {} {} addresses", addresses.len(), family);

    let blocks = match family {
        AddressFamily::V4 => {
            let hosts: Vec<Ipv4Net> = parse_hosts::<Ipv4Addr>(addresses, family)
                .into_iter()
                .map(Ipv4Net::from)
                .collect();
            if hosts.is_empty() {
                return Err(no_valid_addresses(addresses.len(), family));
            }
            Ipv4Net::aggregate(&hosts).into_iter().map(IpNet::V4).collect::<Vec<_>>()
        }
        AddressFamily::V6 => {
            let hosts: Vec<Ipv6Net> = parse_hosts::<Ipv6Addr>(addresses, family)
                .into_iter()
                .map(Ipv6Net::from)
                .collect();
            if hosts.is_empty() {
                return Err(no_valid_addresses(addresses.len(), family));
            }
            Ipv6Net::aggregate(&hosts).into_iter().map(IpNet::V6).collect::<Vec<_>>()
        }
    };

    info!(
        "Consolidated {} {} addresses into {} CIDR blocks",
        addresses.len(),
        family,
        blocks.len()
    );
    if blocks.len() < addresses.len() {
        info!(
            "Consolidation saved {} prefix list entries",
            addresses.len() - blocks.len()
        );
    }

    Ok(blocks)
}

/// Consolidate and render blocks in canonical `network/len` notation
pub fn consolidate_to_strings(addresses: &[String], family: AddressFamily) -> Result<Vec<String>> {
    Ok(consolidate(addresses, family)?
        .iter()
        .map(ToString::to_string)
        .collect())
}

/// Number of host addresses covered by a set of blocks
///
/// Saturates at `u128::MAX` for `::/0`.
pub fn host_count(blocks: &[IpNet]) -> u128 {
    blocks
        .iter()
        .map(|net| {
            let shift = u32::from(net.max_prefix_len() - net.prefix_len());
            1u128.checked_shl(shift).unwrap_or(u128::MAX)
        })
        .fold(0u128, |acc, n| acc.saturating_add(n))
}

fn parse_hosts<A>(addresses: &[String], family: AddressFamily) -> Vec<A>
where
    A: std::str::FromStr,
{
    addresses
        .iter()
        .filter_map(|raw| match raw.trim().parse::<A>() {
            Ok(addr) => Some(addr),
            Err(_) => {
                warn!("Failed to parse {} address: {}", family, raw);
                None
            }
        })
        .collect()
}

fn no_valid_addresses(count: usize, family: AddressFamily) -> Error {
    Error::invalid_input(format!(
        "None of the {} supplied {} addresses could be parsed",
        count, family
    ))
}

/// Whether `ip` is covered by any of `blocks`
pub fn covers(blocks: &[IpNet], ip: IpAddr) -> bool {
    blocks.iter().any(|net| net.contains(&ip))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_contiguous_addresses_use_exact_coverage() {
        let input = strings(&["203.0.113.1", "203.0.113.2", "203.0.113.3"]);
        let blocks = consolidate_to_strings(&input, AddressFamily::V4).unwrap();
        assert_eq!(blocks, vec!["203.0.113.1/32", "203.0.113.2/31"]);
    }

    #[test]
    fn test_full_aligned_range_collapses() {
        let input = strings(&["10.0.0.0", "10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        let blocks = consolidate_to_strings(&input, AddressFamily::V4).unwrap();
        assert_eq!(blocks, vec!["10.0.0.0/30"]);
    }

    #[test]
    fn test_single_address_gets_host_prefix() {
        let v4 = consolidate_to_strings(&strings(&["198.51.100.9"]), AddressFamily::V4).unwrap();
        assert_eq!(v4, vec!["198.51.100.9/32"]);

        let v6 = consolidate_to_strings(&strings(&["2001:db8::9"]), AddressFamily::V6).unwrap();
        assert_eq!(v6, vec!["2001:db8::9/128"]);
    }

    #[test]
    fn test_ipv6_pair_merges() {
        let input = strings(&["2001:db8::", "2001:db8::1"]);
        let blocks = consolidate_to_strings(&input, AddressFamily::V6).unwrap();
        assert_eq!(blocks, vec!["2001:db8::/127"]);
    }

    #[test]
    fn test_parse_failures_are_skipped() {
        let input = strings(&["bogus", "192.0.2.1", "2001:db8::1"]);
        let blocks = consolidate_to_strings(&input, AddressFamily::V4).unwrap();
        assert_eq!(blocks, vec!["192.0.2.1/32"]);
    }

    #[test]
    fn test_no_parseable_address_is_an_error() {
        let input = strings(&["bogus"]);
        assert!(matches!(
            consolidate(&input, AddressFamily::V4),
            Err(Error::InvalidInput(_))
        ));
        assert!(consolidate(&[], AddressFamily::V6).is_err());
    }

    #[test]
    fn test_host_count() {
        let blocks: Vec<IpNet> = vec!["10.0.0.0/30".parse().unwrap(), "10.0.1.1/32".parse().unwrap()];
        assert_eq!(host_count(&blocks), 5);
        assert_eq!(host_count(&["::/0".parse().unwrap()]), u128::MAX);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use ipnet::Ipv4AddrRange;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    /// Addresses clustered in a /24 so that merges actually happen
    fn clustered_v4() -> impl Strategy<Value = Vec<Ipv4Addr>> {
        prop::collection::vec(0u8..=255, 1..64)
            .prop_map(|octets| octets.into_iter().map(|d| Ipv4Addr::new(192, 0, 2, d)).collect())
    }

    fn clustered_v6() -> impl Strategy<Value = Vec<Ipv6Addr>> {
        prop::collection::vec(0u16..=63, 1..48).prop_map(|tails| {
            tails
                .into_iter()
                .map(|t| Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, t))
                .collect()
        })
    }

    proptest! {
        /// The union of blocks equals the input set, host for host
        #[test]
        fn prop_exact_coverage_v4(addrs in clustered_v4()) {
            let input: Vec<String> = addrs.iter().map(ToString::to_string).collect();
            let blocks = consolidate(&input, AddressFamily::V4).unwrap();

            let expected: BTreeSet<Ipv4Addr> = addrs.iter().copied().collect();
            let covered: BTreeSet<Ipv4Addr> = blocks
                .iter()
                .flat_map(|net| match net {
                    IpNet::V4(v4) => Ipv4AddrRange::new(v4.network(), v4.broadcast()),
                    IpNet::V6(_) => unreachable!(),
                })
                .collect();

            prop_assert_eq!(covered, expected.clone());
            prop_assert!(blocks.len() <= expected.len());
        }

        #[test]
        fn prop_exact_coverage_v6(addrs in clustered_v6()) {
            let input: Vec<String> = addrs.iter().map(ToString::to_string).collect();
            let blocks = consolidate(&input, AddressFamily::V6).unwrap();

            let expected: BTreeSet<Ipv6Addr> = addrs.iter().copied().collect();
            prop_assert_eq!(host_count(&blocks), expected.len() as u128);
            for addr in &expected {
                prop_assert!(covers(&blocks, IpAddr::V6(*addr)));
            }
        }

        /// Order and duplicates do not change the output
        #[test]
        fn prop_order_and_duplicate_invariant(addrs in clustered_v4(), seed in any::<u64>()) {
            let input: Vec<String> = addrs.iter().map(ToString::to_string).collect();

            let mut shuffled = input.clone();
            shuffled.extend(input.iter().take(5).cloned());
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
            shuffled.reverse();

            prop_assert_eq!(
                consolidate(&input, AddressFamily::V4).unwrap(),
                consolidate(&shuffled, AddressFamily::V4).unwrap()
            );
        }

        /// No two output blocks overlap
        #[test]
        fn prop_blocks_disjoint(addrs in clustered_v4()) {
            let input: Vec<String> = addrs.iter().map(ToString::to_string).collect();
            let blocks = consolidate(&input, AddressFamily::V4).unwrap();
            for (i, a) in blocks.iter().enumerate() {
                for b in blocks.iter().skip(i + 1) {
                    prop_assert!(!a.contains(b) && !b.contains(a));
                }
            }
        }
    }
}
