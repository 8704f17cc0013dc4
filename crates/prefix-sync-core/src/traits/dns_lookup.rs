// # DNS Lookup Trait
//
// Defines the interface for turning a hostname into raw address strings.
//
// ## Implementations
//
// - System resolver: `prefix-sync-dns` crate
// - Scripted lookups in tests and demos
//
// ## Usage
//
// ```rust,ignore
// use prefix_sync_core::DnsLookup;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let lookup = /* DnsLookup implementation */;
//
//     let raw = lookup.lookup("ip.uptimerobot.com").await?;
//     println!("{} raw answers", raw.len());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for hostname lookup implementations
///
/// A lookup is a black box: given a hostname it returns every A/AAAA answer
/// as text, or fails. Validation, deduplication and family splitting happen
/// in [`crate::resolver::resolve_addresses`], not here.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Query the platform resolver or a DNS server
/// - ✅ Return answers in whatever textual form the resolver produced
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (the whole invocation is single-shot)
/// - ❌ Filter answers by family (owned by the resolver component)
#[async_trait]
pub trait DnsLookup: Send + Sync {
    /// Look up all addresses published for `hostname`
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<String>)`: Raw answers, possibly duplicated or malformed
    /// - `Err(Error::Resolution)`: NXDOMAIN, timeout, unreachable resolver
    async fn lookup(&self, hostname: &str) -> Result<Vec<String>, crate::Error>;

    /// Get the lookup name (for logging/debugging)
    fn lookup_name(&self) -> &'static str;
}
