//! Prefix list reconciliation
//!
//! The reconciler converges one named prefix list onto a desired CIDR set.
//!
//! ## State Machine
//!
//! ```text
//! ABSENT ──create──▶ CREATING ──(overflow?)──▶ AWAITING_READY ──append──▶ READY
//!    │                   └──────────(no overflow)──────────────────────────▲
//!    └──locate──▶ PRESENT ──diff + one versioned modify (or no-op)─────────┘
//! ```
//!
//! ## Concurrency
//!
//! The version used for a modify is read in its own call just before the
//! modify. A writer that sneaks in between makes the provider reject the
//! call with [`Error::VersionConflict`]; that is surfaced, never retried.

use std::collections::{BTreeMap, BTreeSet};

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{PrefixListTarget, ReconcilerConfig};
use crate::error::{Error, Result};
use crate::traits::{
    CreatePrefixList, ModifyPrefixList, PrefixListEntry, PrefixListProvider, PrefixListSummary,
};

/// Entries to add and remove so that `current` becomes `desired`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryDiff {
    /// In desired, not in current
    pub add: Vec<IpNet>,
    /// In current, not in desired
    pub remove: Vec<IpNet>,
}

impl EntryDiff {
    /// Compute the set difference in both directions
    ///
    /// Only CIDR values are compared; descriptions play no part.
    pub fn between(current: &BTreeSet<IpNet>, desired: &BTreeSet<IpNet>) -> Self {
        Self {
            add: desired.difference(current).copied().collect(),
            remove: current.difference(desired).copied().collect(),
        }
    }

    /// Whether nothing needs to change
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// What a reconciliation did to the remote list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The list did not exist and was created
    Created {
        /// Id assigned by the provider
        prefix_list_id: String,
        /// Entries submitted with the create call
        initial_entries: usize,
        /// Entries appended afterwards
        appended_entries: usize,
    },
    /// The list existed and one modify was applied
    Updated {
        /// List id
        prefix_list_id: String,
        /// Added CIDRs
        added: Vec<IpNet>,
        /// Removed CIDRs
        removed: Vec<IpNet>,
        /// Version reported after the modify
        new_version: u64,
    },
    /// The list already held exactly the desired entries
    Unchanged {
        /// List id
        prefix_list_id: String,
        /// Entry count
        entries: usize,
    },
}

impl ReconcileOutcome {
    /// Id of the reconciled list
    pub fn prefix_list_id(&self) -> &str {
        match self {
            ReconcileOutcome::Created { prefix_list_id, .. }
            | ReconcileOutcome::Updated { prefix_list_id, .. }
            | ReconcileOutcome::Unchanged { prefix_list_id, .. } => prefix_list_id,
        }
    }
}

/// Reconciles named prefix lists against a provider
///
/// The provider is borrowed, never owned, so the same reconciliation logic
/// runs against the EC2 provider in production and the in-memory provider in
/// tests.
pub struct PrefixListReconciler<'a> {
    provider: &'a dyn PrefixListProvider,
    config: &'a ReconcilerConfig,
    source_hostname: String,
    entry_description: String,
}

impl<'a> PrefixListReconciler<'a> {
    /// Create a reconciler
    ///
    /// # Parameters
    ///
    /// - `provider`: Remote prefix-list store
    /// - `config`: Batch limit, headroom, readiness poll settings
    /// - `source_hostname`: Hostname the entries came from (used in tags)
    /// - `entry_description`: Description attached to every added entry
    pub fn new(
        provider: &'a dyn PrefixListProvider,
        config: &'a ReconcilerConfig,
        source_hostname: impl Into<String>,
        entry_description: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            config,
            source_hostname: source_hostname.into(),
            entry_description: entry_description.into(),
        }
    }

    /// Create or update `target` so it holds exactly `desired`
    pub async fn reconcile(
        &self,
        target: &PrefixListTarget,
        desired: &[IpNet],
    ) -> Result<ReconcileOutcome> {
        info!("Managing prefix list: {} ({})", target.name, target.family);

        let outcome = match self.locate(&target.name).await {
            Some(existing) => {
                info!("Found existing prefix list {} (ID: {})", target.name, existing.id);
                if existing.family != target.family {
                    return Err(Error::invalid_input(format!(
                        "Prefix list {} holds {} entries, expected {}",
                        target.name, existing.family, target.family
                    )));
                }
                self.update(&existing.id, desired).await
            }
            None => {
                info!("Creating new prefix list: {}", target.name);
                self.create(target, desired).await
            }
        };

        if let Err(e) = &outcome {
            error!("Error managing prefix list {}: {}", target.name, e);
        }
        outcome
    }

    /// Find a prefix list by exact name
    ///
    /// A transport failure is logged and reported as "not found". Callers
    /// must expect a create attempt after a transient listing failure.
    pub async fn locate(&self, name: &str) -> Option<PrefixListSummary> {
        debug!("Searching for prefix list: {}", name);

        match self.provider.list_prefix_lists().await {
            Ok(lists) => {
                let found = lists.into_iter().find(|pl| pl.name == name);
                match &found {
                    Some(pl) => debug!("Found prefix list {}: {}", name, pl.id),
                    None => debug!("Prefix list {} not found", name),
                }
                found
            }
            Err(e) => {
                error!("Error finding prefix list {}: {}", name, e);
                None
            }
        }
    }

    /// Create `target` holding `desired`
    ///
    /// At most `create_batch_limit` entries go into the create call. The rest
    /// are appended with one conditional modify once the list has left its
    /// transitional state, or once the readiness poll gives up.
    pub async fn create(
        &self,
        target: &PrefixListTarget,
        desired: &[IpNet],
    ) -> Result<ReconcileOutcome> {
        let desired = dedup_preserving_order(desired);
        info!("Creating prefix list {} with {} entries", target.name, desired.len());

        let split = desired.len().min(self.config.create_batch_limit);
        let (initial, overflow) = desired.split_at(split);

        let max_entries = self.config.creation_capacity(desired.len());
        if (max_entries as usize) < desired.len() {
            warn!(
                "Prefix list {} needs {} entries but capacity is capped at {}",
                target.name,
                desired.len(),
                max_entries
            );
        }

        let request = CreatePrefixList {
            name: target.name.clone(),
            family: target.family,
            max_entries,
            entries: self.entries_for(initial),
            tags: self.tags_for(target),
        };

        let created = self.provider.create_prefix_list(&request).await?;
        info!("Successfully created prefix list {} with ID: {}", target.name, created.id);

        if !overflow.is_empty() {
            info!("Adding {} additional entries", overflow.len());

            let version = match self.wait_until_ready(&created.id).await {
                Some(ready) => ready.version,
                None => created.version,
            };

            let new_version = self
                .provider
                .modify_prefix_list(&ModifyPrefixList {
                    prefix_list_id: created.id.clone(),
                    expected_version: version,
                    add: self.entries_for(overflow),
                    remove: Vec::new(),
                })
                .await?;
            debug!("Overflow entries appended, new version: {}", new_version);
        }

        info!(
            "Created prefix list {} (ID: {}) with {} entries",
            target.name,
            created.id,
            desired.len()
        );

        Ok(ReconcileOutcome::Created {
            prefix_list_id: created.id,
            initial_entries: initial.len(),
            appended_entries: overflow.len(),
        })
    }

    /// Poll until the list is ready, bounded by the configured attempts
    ///
    /// Returns the ready description, or `None` when the poll was exhausted.
    /// Exhaustion is logged, not raised; the caller proceeds optimistically.
    pub async fn wait_until_ready(&self, prefix_list_id: &str) -> Option<PrefixListSummary> {
        let interval = self.config.ready_poll_interval();

        for attempt in 1..=self.config.ready_poll_attempts {
            match self.provider.describe_prefix_list(prefix_list_id).await {
                Ok(pl) if pl.state.is_ready() => {
                    debug!("Prefix list {} ready after {} poll(s)", prefix_list_id, attempt);
                    return Some(pl);
                }
                Ok(pl) => {
                    debug!("Prefix list {} is {}, waiting", prefix_list_id, pl.state);
                }
                Err(e) => {
                    debug!("Readiness poll {} for {} failed: {}", attempt, prefix_list_id, e);
                }
            }
            tokio::time::sleep(interval).await;
        }

        warn!(
            "Prefix list {} not ready after {} polls, proceeding anyway",
            prefix_list_id, self.config.ready_poll_attempts
        );
        None
    }

    /// Read every entry of a list, following continuation tokens
    pub async fn current_entries(&self, prefix_list_id: &str) -> Result<BTreeSet<IpNet>> {
        let mut current = BTreeSet::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = self
                .provider
                .list_entries(prefix_list_id, next_token.as_deref())
                .await?;
            current.extend(page.entries.into_iter().map(|entry| entry.cidr));

            match page.next_token {
                Some(token) if next_token.as_deref() == Some(token.as_str()) => {
                    return Err(Error::provider(
                        self.provider.provider_name(),
                        format!("Entry pagination for {} repeated token {}", prefix_list_id, token),
                    ));
                }
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        Ok(current)
    }

    /// Converge an existing list onto `desired` with at most one modify
    pub async fn update(&self, prefix_list_id: &str, desired: &[IpNet]) -> Result<ReconcileOutcome> {
        info!("Updating prefix list {}", prefix_list_id);

        let current = self.current_entries(prefix_list_id).await?;
        let desired: BTreeSet<IpNet> = desired.iter().copied().collect();
        let diff = EntryDiff::between(&current, &desired);

        info!(
            "Current entries: {}, New entries: {}",
            current.len(),
            desired.len()
        );
        info!("To add: {}, To remove: {}", diff.add.len(), diff.remove.len());

        if diff.is_empty() {
            info!("No changes needed for prefix list");
            return Ok(ReconcileOutcome::Unchanged {
                prefix_list_id: prefix_list_id.to_string(),
                entries: current.len(),
            });
        }

        if !diff.add.is_empty() {
            debug!("Adding entries: {:?}", diff.add);
        }
        if !diff.remove.is_empty() {
            debug!("Removing entries: {:?}", diff.remove);
        }

        let described = self.provider.describe_prefix_list(prefix_list_id).await?;
        info!("Current prefix list version: {}", described.version);

        if desired.len() > described.max_entries as usize {
            warn!(
                "Prefix list {} holds at most {} entries but {} are desired",
                prefix_list_id,
                described.max_entries,
                desired.len()
            );
        }

        let new_version = self
            .provider
            .modify_prefix_list(&ModifyPrefixList {
                prefix_list_id: prefix_list_id.to_string(),
                expected_version: described.version,
                add: self.entries_for(&diff.add),
                remove: diff.remove.clone(),
            })
            .await?;

        info!("Prefix list modification initiated. New version: {}", new_version);
        info!("Successfully updated prefix list {}", prefix_list_id);

        Ok(ReconcileOutcome::Updated {
            prefix_list_id: prefix_list_id.to_string(),
            added: diff.add,
            removed: diff.remove,
            new_version,
        })
    }

    fn entries_for(&self, cidrs: &[IpNet]) -> Vec<PrefixListEntry> {
        cidrs
            .iter()
            .map(|cidr| PrefixListEntry::new(*cidr, self.entry_description.clone()))
            .collect()
    }

    fn tags_for(&self, target: &PrefixListTarget) -> BTreeMap<String, String> {
        let mut tags = self.config.extra_tags.clone();
        tags.insert("Name".to_string(), target.name.clone());
        tags.insert("SourceUrl".to_string(), self.source_hostname.clone());
        tags.insert("ManagedBy".to_string(), self.config.managed_by.clone());
        if !target.description.is_empty() {
            tags.insert("Description".to_string(), target.description.clone());
        }
        tags
    }
}

fn dedup_preserving_order(cidrs: &[IpNet]) -> Vec<IpNet> {
    let mut seen = BTreeSet::new();
    cidrs.iter().copied().filter(|c| seen.insert(*c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nets(values: &[&str]) -> BTreeSet<IpNet> {
        values.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_diff_add_and_remove() {
        let current = nets(&["10.0.0.1/32", "10.0.0.2/32", "10.0.0.3/32"]);
        let desired = nets(&["10.0.0.2/32", "10.0.0.3/32", "10.0.0.4/32"]);

        let diff = EntryDiff::between(&current, &desired);
        assert_eq!(diff.add, vec!["10.0.0.4/32".parse::<IpNet>().unwrap()]);
        assert_eq!(diff.remove, vec!["10.0.0.1/32".parse::<IpNet>().unwrap()]);
    }

    #[test]
    fn test_diff_equal_sets_is_empty() {
        let current = nets(&["2001:db8::/127", "10.0.0.0/30"]);
        assert!(EntryDiff::between(&current, &current.clone()).is_empty());
    }

    #[test]
    fn test_dedup_preserving_order() {
        let input: Vec<IpNet> = ["10.0.0.9/32", "10.0.0.1/32", "10.0.0.9/32"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let deduped = dedup_preserving_order(&input);
        assert_eq!(deduped, input[..2].to_vec());
    }
}
