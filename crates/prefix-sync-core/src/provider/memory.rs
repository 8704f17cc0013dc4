// # Memory Prefix List Provider
//
// In-memory implementation of PrefixListProvider.
//
// ## Purpose
//
// Behaves like the remote store closely enough to exercise the reconciler:
// optimistic versioning, paginated entry reads, a create-time entry ceiling,
// a capacity limit, and a transitional state after creation that clears
// after a configurable number of describe calls.
//
// ## When to Use
//
// - Contract tests
// - Embedding and demos
// - Dry runs against a synthetic starting state

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use ipnet::IpNet;
use tokio::sync::RwLock;

use crate::Error;
use crate::family::AddressFamily;
use crate::traits::prefix_list_provider::{
    CreatePrefixList, EntryPage, ModifyPrefixList, PrefixListEntry, PrefixListProvider,
    PrefixListState, PrefixListSummary,
};

/// Most entries accepted by a single create call
pub const CREATE_ENTRY_LIMIT: usize = 100;

/// Entries returned per page by default
pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
struct StoredPrefixList {
    summary: PrefixListSummary,
    entries: BTreeMap<IpNet, Option<String>>,
    tags: BTreeMap<String, String>,
    describes_until_ready: usize,
}

#[derive(Debug, Default)]
struct Inner {
    lists: BTreeMap<String, StoredPrefixList>,
    next_id: u64,
    modifications: Vec<ModifyPrefixList>,
    creations: Vec<CreatePrefixList>,
}

/// In-memory prefix list provider
///
/// Clones share the same underlying store, so a test can keep one handle for
/// assertions while the engine owns another.
///
/// # Example
///
/// ```rust,no_run
/// use prefix_sync_core::provider::MemoryPrefixListProvider;
/// use prefix_sync_core::traits::PrefixListProvider;
/// use prefix_sync_core::AddressFamily;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let provider = MemoryPrefixListProvider::new();
///     let id = provider
///         .seed("uptimerobot4", AddressFamily::V4, 120, &["192.0.2.1/32".parse()?])
///         .await;
///
///     let page = provider.list_entries(&id, None).await?;
///     assert_eq!(page.entries.len(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryPrefixListProvider {
    inner: Arc<RwLock<Inner>>,
    page_size: usize,
    create_entry_limit: usize,
    describes_until_ready: usize,
    list_calls: Arc<AtomicUsize>,
    describe_calls: Arc<AtomicUsize>,
    fail_listing: Arc<AtomicBool>,
    conflict_next_modify: Arc<AtomicBool>,
}

impl MemoryPrefixListProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            page_size: DEFAULT_PAGE_SIZE,
            create_entry_limit: CREATE_ENTRY_LIMIT,
            describes_until_ready: 0,
            list_calls: Arc::new(AtomicUsize::new(0)),
            describe_calls: Arc::new(AtomicUsize::new(0)),
            fail_listing: Arc::new(AtomicBool::new(false)),
            conflict_next_modify: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set how many entries `list_entries` returns per page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Keep new lists in `create-in-progress` for this many describe calls
    pub fn with_creation_delay(mut self, describes: usize) -> Self {
        self.describes_until_ready = describes;
        self
    }

    /// Insert a ready list directly, bypassing the create call
    ///
    /// Returns the id of the seeded list.
    pub async fn seed(
        &self,
        name: &str,
        family: AddressFamily,
        max_entries: u32,
        cidrs: &[IpNet],
    ) -> String {
        let mut guard = self.inner.write().await;
        guard.next_id += 1;
        let id = format!("pl-{:017x}", guard.next_id);
        let stored = StoredPrefixList {
            summary: PrefixListSummary {
                id: id.clone(),
                name: name.to_string(),
                version: 1,
                family,
                state: PrefixListState::CreateComplete,
                max_entries,
            },
            entries: cidrs.iter().map(|c| (*c, None)).collect(),
            tags: BTreeMap::new(),
            describes_until_ready: 0,
        };
        guard.lists.insert(id.clone(), stored);
        id
    }

    /// Make `list_prefix_lists` fail until reset
    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Simulate another writer bumping the version right before the next modify
    pub fn inject_concurrent_write(&self) {
        self.conflict_next_modify.store(true, Ordering::SeqCst);
    }

    /// Current CIDRs of a list
    pub async fn cidrs(&self, prefix_list_id: &str) -> Option<BTreeSet<IpNet>> {
        let guard = self.inner.read().await;
        guard
            .lists
            .get(prefix_list_id)
            .map(|pl| pl.entries.keys().copied().collect())
    }

    /// Tags attached to a list
    pub async fn tags(&self, prefix_list_id: &str) -> Option<BTreeMap<String, String>> {
        let guard = self.inner.read().await;
        guard.lists.get(prefix_list_id).map(|pl| pl.tags.clone())
    }

    /// Summary of a list by name
    pub async fn find_by_name(&self, name: &str) -> Option<PrefixListSummary> {
        let guard = self.inner.read().await;
        guard
            .lists
            .values()
            .find(|pl| pl.summary.name == name)
            .map(|pl| pl.summary.clone())
    }

    /// Every accepted modify request, in order
    pub async fn modifications(&self) -> Vec<ModifyPrefixList> {
        self.inner.read().await.modifications.clone()
    }

    /// Every accepted create request, in order
    pub async fn creations(&self) -> Vec<CreatePrefixList> {
        self.inner.read().await.creations.clone()
    }

    /// Number of `list_prefix_lists` calls
    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `describe_prefix_list` calls
    pub fn describe_call_count(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }
}

impl Default for MemoryPrefixListProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrefixListProvider for MemoryPrefixListProvider {
    async fn list_prefix_lists(&self) -> Result<Vec<PrefixListSummary>, Error> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Error::provider("memory", "listing unavailable"));
        }
        let guard = self.inner.read().await;
        Ok(guard.lists.values().map(|pl| pl.summary.clone()).collect())
    }

    async fn create_prefix_list(
        &self,
        request: &CreatePrefixList,
    ) -> Result<PrefixListSummary, Error> {
        if request.entries.len() > self.create_entry_limit {
            return Err(Error::provider(
                "memory",
                format!(
                    "Create accepts at most {} entries, got {}",
                    self.create_entry_limit,
                    request.entries.len()
                ),
            ));
        }
        if request.entries.len() > request.max_entries as usize {
            return Err(Error::provider(
                "memory",
                format!(
                    "{} entries exceed max entries {}",
                    request.entries.len(),
                    request.max_entries
                ),
            ));
        }
        check_family(&request.entries, request.family)?;

        let mut guard = self.inner.write().await;
        if guard.lists.values().any(|pl| pl.summary.name == request.name) {
            return Err(Error::provider(
                "memory",
                format!("Prefix list {} already exists", request.name),
            ));
        }

        guard.next_id += 1;
        let id = format!("pl-{:017x}", guard.next_id);
        let state = if self.describes_until_ready == 0 {
            PrefixListState::CreateComplete
        } else {
            PrefixListState::CreateInProgress
        };

        let summary = PrefixListSummary {
            id: id.clone(),
            name: request.name.clone(),
            version: 1,
            family: request.family,
            state,
            max_entries: request.max_entries,
        };
        let stored = StoredPrefixList {
            summary: summary.clone(),
            entries: request
                .entries
                .iter()
                .map(|e| (e.cidr, e.description.clone()))
                .collect(),
            tags: request.tags.clone(),
            describes_until_ready: self.describes_until_ready,
        };
        guard.lists.insert(id, stored);
        guard.creations.push(request.clone());

        Ok(summary)
    }

    async fn describe_prefix_list(&self, prefix_list_id: &str) -> Result<PrefixListSummary, Error> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.inner.write().await;
        let pl = guard
            .lists
            .get_mut(prefix_list_id)
            .ok_or_else(|| Error::not_found(prefix_list_id.to_string()))?;

        if pl.summary.state.is_transitional() {
            if pl.describes_until_ready <= 1 {
                pl.describes_until_ready = 0;
                pl.summary.state = PrefixListState::CreateComplete;
            } else {
                pl.describes_until_ready -= 1;
            }
        }

        Ok(pl.summary.clone())
    }

    async fn list_entries(
        &self,
        prefix_list_id: &str,
        next_token: Option<&str>,
    ) -> Result<EntryPage, Error> {
        let offset = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| Error::invalid_input(format!("Invalid next token: {}", token)))?,
            None => 0,
        };

        let guard = self.inner.read().await;
        let pl = guard
            .lists
            .get(prefix_list_id)
            .ok_or_else(|| Error::not_found(prefix_list_id.to_string()))?;

        let entries: Vec<PrefixListEntry> = pl
            .entries
            .iter()
            .skip(offset)
            .take(self.page_size)
            .map(|(cidr, description)| PrefixListEntry {
                cidr: *cidr,
                description: description.clone(),
            })
            .collect();

        let end = offset + entries.len();
        let next_token = (end < pl.entries.len()).then(|| end.to_string());

        Ok(EntryPage { entries, next_token })
    }

    async fn modify_prefix_list(&self, request: &ModifyPrefixList) -> Result<u64, Error> {
        let mut guard = self.inner.write().await;
        let pl = guard
            .lists
            .get_mut(&request.prefix_list_id)
            .ok_or_else(|| Error::not_found(request.prefix_list_id.clone()))?;

        if self.conflict_next_modify.swap(false, Ordering::SeqCst) {
            pl.summary.version += 1;
        }

        if !pl.summary.state.is_ready() {
            return Err(Error::provider(
                "memory",
                format!(
                    "Prefix list {} is {} and cannot be modified",
                    request.prefix_list_id, pl.summary.state
                ),
            ));
        }
        if request.expected_version != pl.summary.version {
            return Err(Error::version_conflict(
                request.prefix_list_id.clone(),
                request.expected_version,
            ));
        }
        check_family(&request.add, pl.summary.family)?;

        for cidr in &request.remove {
            if !pl.entries.contains_key(cidr) {
                return Err(Error::provider(
                    "memory",
                    format!("Cannot remove {}: not in {}", cidr, request.prefix_list_id),
                ));
            }
        }

        let mut next = pl.entries.clone();
        for cidr in &request.remove {
            next.remove(cidr);
        }
        for entry in &request.add {
            next.insert(entry.cidr, entry.description.clone());
        }
        if next.len() > pl.summary.max_entries as usize {
            return Err(Error::provider(
                "memory",
                format!(
                    "{} entries exceed max entries {} of {}",
                    next.len(),
                    pl.summary.max_entries,
                    request.prefix_list_id
                ),
            ));
        }

        pl.entries = next;
        pl.summary.version += 1;
        pl.summary.state = PrefixListState::ModifyComplete;
        let version = pl.summary.version;
        guard.modifications.push(request.clone());

        Ok(version)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

fn check_family(entries: &[PrefixListEntry], family: AddressFamily) -> Result<(), Error> {
    match entries.iter().find(|e| AddressFamily::of(&e.cidr.addr()) != family) {
        Some(entry) => Err(Error::invalid_input(format!(
            "{} does not belong to an {} prefix list",
            entry.cidr, family
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(cidr: &str) -> PrefixListEntry {
        PrefixListEntry::new(cidr.parse().unwrap(), "test")
    }

    fn create_request(name: &str, entries: Vec<PrefixListEntry>) -> CreatePrefixList {
        CreatePrefixList {
            name: name.to_string(),
            family: AddressFamily::V4,
            max_entries: 10,
            entries,
            tags: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_create_then_paginate() {
        let provider = MemoryPrefixListProvider::new().with_page_size(2);
        let created = provider
            .create_prefix_list(&create_request(
                "list",
                vec![entry("10.0.0.1/32"), entry("10.0.0.2/32"), entry("10.0.0.3/32")],
            ))
            .await
            .unwrap();

        let first = provider.list_entries(&created.id, None).await.unwrap();
        assert_eq!(first.entries.len(), 2);
        let token = first.next_token.unwrap();

        let second = provider.list_entries(&created.id, Some(&token)).await.unwrap();
        assert_eq!(second.entries.len(), 1);
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn test_stale_version_rejected() {
        let provider = MemoryPrefixListProvider::new();
        let id = provider.seed("list", AddressFamily::V4, 10, &[]).await;

        let err = provider
            .modify_prefix_list(&ModifyPrefixList {
                prefix_list_id: id,
                expected_version: 7,
                add: vec![entry("10.0.0.1/32")],
                remove: vec![],
            })
            .await
            .unwrap_err();
        assert!(err.is_version_conflict());
    }

    #[tokio::test]
    async fn test_creation_delay_clears_after_describes() {
        let provider = MemoryPrefixListProvider::new().with_creation_delay(2);
        let created = provider
            .create_prefix_list(&create_request("list", vec![entry("10.0.0.1/32")]))
            .await
            .unwrap();
        assert_eq!(created.state, PrefixListState::CreateInProgress);

        let first = provider.describe_prefix_list(&created.id).await.unwrap();
        assert!(!first.state.is_ready());
        let second = provider.describe_prefix_list(&created.id).await.unwrap();
        assert!(second.state.is_ready());
    }

    #[tokio::test]
    async fn test_create_entry_limit_enforced() {
        let provider = MemoryPrefixListProvider::new();
        let mut request = create_request("list", Vec::new());
        request.max_entries = 200;
        request.entries = (0..=CREATE_ENTRY_LIMIT as u32)
            .map(|i| entry(&format!("10.0.{}.{}/32", i / 256, i % 256)))
            .collect();

        assert!(provider.create_prefix_list(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_family_rejected() {
        let provider = MemoryPrefixListProvider::new();
        let id = provider.seed("list", AddressFamily::V4, 10, &[]).await;

        let err = provider
            .modify_prefix_list(&ModifyPrefixList {
                prefix_list_id: id,
                expected_version: 1,
                add: vec![entry("2001:db8::1/128")],
                remove: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
