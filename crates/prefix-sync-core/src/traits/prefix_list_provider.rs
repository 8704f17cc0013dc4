// # Prefix List Provider Trait
//
// Defines the interface to the remote managed-prefix-list store.
//
// ## Implementations
//
// - EC2 managed prefix lists: `prefix-sync-provider-ec2` crate
// - In-memory: [`crate::provider::MemoryPrefixListProvider`]
//
// ## Usage
//
// ```rust,ignore
// use prefix_sync_core::PrefixListProvider;
// use prefix_sync_core::traits::ModifyPrefixList;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* PrefixListProvider implementation */;
//
//     let pl = provider.describe_prefix_list("pl-0123").await?;
//     provider.modify_prefix_list(&ModifyPrefixList {
//         prefix_list_id: pl.id.clone(),
//         expected_version: pl.version,
//         add: vec![],
//         remove: vec!["203.0.113.7/32".parse()?],
//     }).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::family::AddressFamily;

/// Lifecycle state of a managed prefix list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrefixListState {
    CreateInProgress,
    CreateComplete,
    CreateFailed,
    ModifyInProgress,
    ModifyComplete,
    ModifyFailed,
    RestoreInProgress,
    RestoreComplete,
    RestoreFailed,
    DeleteInProgress,
    DeleteComplete,
    DeleteFailed,
}

impl PrefixListState {
    /// Parse the provider's state string (e.g. "create-complete")
    pub fn from_provider(value: &str) -> Option<Self> {
        let state = match value {
            "create-in-progress" => Self::CreateInProgress,
            "create-complete" => Self::CreateComplete,
            "create-failed" => Self::CreateFailed,
            "modify-in-progress" => Self::ModifyInProgress,
            "modify-complete" => Self::ModifyComplete,
            "modify-failed" => Self::ModifyFailed,
            "restore-in-progress" => Self::RestoreInProgress,
            "restore-complete" => Self::RestoreComplete,
            "restore-failed" => Self::RestoreFailed,
            "delete-in-progress" => Self::DeleteInProgress,
            "delete-complete" => Self::DeleteComplete,
            "delete-failed" => Self::DeleteFailed,
            _ => return None,
        };
        Some(state)
    }

    /// The provider's state string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateInProgress => "create-in-progress",
            Self::CreateComplete => "create-complete",
            Self::CreateFailed => "create-failed",
            Self::ModifyInProgress => "modify-in-progress",
            Self::ModifyComplete => "modify-complete",
            Self::ModifyFailed => "modify-failed",
            Self::RestoreInProgress => "restore-in-progress",
            Self::RestoreComplete => "restore-complete",
            Self::RestoreFailed => "restore-failed",
            Self::DeleteInProgress => "delete-in-progress",
            Self::DeleteComplete => "delete-complete",
            Self::DeleteFailed => "delete-failed",
        }
    }

    /// Whether the list accepts a conditional modify
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            Self::CreateComplete | Self::ModifyComplete | Self::RestoreComplete
        )
    }

    /// Whether the list is between two stable states
    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            Self::CreateInProgress
                | Self::ModifyInProgress
                | Self::RestoreInProgress
                | Self::DeleteInProgress
        )
    }
}

impl fmt::Display for PrefixListState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored entry: a CIDR block plus an optional description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixListEntry {
    /// The CIDR block
    pub cidr: IpNet,
    /// Free-text description (never compared during reconciliation)
    pub description: Option<String>,
}

impl PrefixListEntry {
    /// Create an entry with a description
    pub fn new(cidr: IpNet, description: impl Into<String>) -> Self {
        Self {
            cidr,
            description: Some(description.into()),
        }
    }
}

/// Metadata about a managed prefix list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixListSummary {
    /// Opaque identifier assigned at creation
    pub id: String,
    /// Human-assigned name
    pub name: String,
    /// Version counter owned by the provider
    pub version: u64,
    /// Address family
    pub family: AddressFamily,
    /// Lifecycle state
    pub state: PrefixListState,
    /// Capacity
    pub max_entries: u32,
}

/// Request to create a prefix list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePrefixList {
    /// Name of the new list
    pub name: String,
    /// Address family
    pub family: AddressFamily,
    /// Capacity to reserve
    pub max_entries: u32,
    /// Entries submitted at creation time
    pub entries: Vec<PrefixListEntry>,
    /// Resource tags
    pub tags: BTreeMap<String, String>,
}

/// Request to add and remove entries, conditioned on a version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyPrefixList {
    /// Target list
    pub prefix_list_id: String,
    /// Version the change is conditioned on
    pub expected_version: u64,
    /// Entries to add
    pub add: Vec<PrefixListEntry>,
    /// CIDRs to remove
    pub remove: Vec<IpNet>,
}

/// One page of entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPage {
    /// Entries on this page
    pub entries: Vec<PrefixListEntry>,
    /// Continuation token, `None` on the last page
    pub next_token: Option<String>,
}

/// Trait for managed-prefix-list provider implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform API calls to the provider's endpoints only
/// - ✅ Translate provider errors into [`crate::Error`]
///
/// ## Forbidden Capabilities
/// - ❌ Retry, back off or sleep (the readiness poll is owned by the reconciler)
/// - ❌ Decide what to add or remove (owned by the reconciler)
/// - ❌ Cache lists or entries between calls
///
/// Implementations must report a stale `expected_version` as
/// [`crate::Error::VersionConflict`] so callers can tell it apart from
/// transport failures.
#[async_trait]
pub trait PrefixListProvider: Send + Sync {
    /// List every prefix list visible to the account
    ///
    /// Provider-side pagination of the listing is followed internally.
    async fn list_prefix_lists(&self) -> Result<Vec<PrefixListSummary>, crate::Error>;

    /// Create a prefix list
    ///
    /// # Returns
    ///
    /// The new list's metadata; `state` is usually transitional.
    async fn create_prefix_list(
        &self,
        request: &CreatePrefixList,
    ) -> Result<PrefixListSummary, crate::Error>;

    /// Describe a single prefix list by id
    async fn describe_prefix_list(
        &self,
        prefix_list_id: &str,
    ) -> Result<PrefixListSummary, crate::Error>;

    /// Fetch one page of entries
    ///
    /// # Parameters
    ///
    /// - `prefix_list_id`: The list to read
    /// - `next_token`: Continuation token from the previous page, if any
    async fn list_entries(
        &self,
        prefix_list_id: &str,
        next_token: Option<&str>,
    ) -> Result<EntryPage, crate::Error>;

    /// Add and remove entries in one versioned call
    ///
    /// # Returns
    ///
    /// - `Ok(u64)`: The version after the change
    /// - `Err(Error::VersionConflict)`: `expected_version` is stale
    async fn modify_prefix_list(&self, request: &ModifyPrefixList) -> Result<u64, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
