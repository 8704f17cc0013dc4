// # prefix-sync-core
//
// Core library for keeping managed prefix lists in sync with the addresses a
// hostname publishes in DNS.
//
// ## Architecture Overview
//
// - **DnsLookup**: Trait for resolving a hostname to raw address strings
// - **PrefixListProvider**: Trait for the remote managed-prefix-list store
// - **resolver**: Validates, deduplicates and splits answers by family
// - **consolidate**: Collapses addresses into the fewest exact CIDR blocks
// - **PrefixListReconciler**: Creates or diffs a named list against the desired blocks
// - **SyncEngine**: Orchestrates resolve → consolidate → reconcile per family
//
// ## Design Principles
//
// 1. **Injected Collaborators**: Lookup and provider are passed in, never global
// 2. **Stateless Runs**: The remote list is the only state between runs
// 3. **Idempotency**: An unchanged address set produces no remote mutation
// 4. **Single-Shot**: No retries except the bounded readiness poll after creation

pub mod config;
pub mod consolidate;
pub mod engine;
pub mod error;
pub mod family;
pub mod provider;
pub mod reconciler;
pub mod resolver;
pub mod response;
pub mod traits;

// Re-export core types for convenience
pub use config::{FailurePolicy, PrefixListTarget, ReconcilerConfig, SyncConfig};
pub use engine::{FamilyReport, SyncEngine, SyncEvent, SyncSummary};
pub use error::{Error, Result};
pub use family::AddressFamily;
pub use provider::MemoryPrefixListProvider;
pub use reconciler::{EntryDiff, PrefixListReconciler, ReconcileOutcome};
pub use resolver::ResolvedAddresses;
pub use response::InvocationResponse;
pub use traits::{DnsLookup, PrefixListProvider};
