//! Core sync engine
//!
//! The SyncEngine is responsible for:
//! - Resolving the source hostname once via DnsLookup
//! - Consolidating each family's addresses into CIDR blocks
//! - Reconciling each family's prefix list via PrefixListProvider
//! - Aggregating per-family results into one summary
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  DnsLookup  │─── raw answers ───┐
//! └─────────────┘                   │
//!                                   ▼
//!                          ┌──────────────┐
//!                          │  SyncEngine  │
//!                          └──────────────┘
//!                                   │  per family, sequentially
//!         ┌─────────────────────────┼─────────────────────────┐
//!         │                         │                         │
//!         ▼                         ▼                         ▼
//! ┌──────────────┐        ┌──────────────────┐        ┌─────────────┐
//! │ consolidate  │        │ PrefixList-      │        │   Events    │
//! │ (CIDR math)  │        │ Reconciler       │        │  (notify)   │
//! └──────────────┘        └──────────────────┘        └─────────────┘
//! ```
//!
//! ## Failure Policy
//!
//! A resolution failure ends the run. A family failure ends the run under
//! [`FailurePolicy::FailFast`]; under [`FailurePolicy::CollectAll`] the
//! remaining families still run and every failure is reported together.
//! Mutations already committed for an earlier family are not rolled back.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{FailurePolicy, PrefixListTarget, SyncConfig};
use crate::consolidate::consolidate;
use crate::error::{Error, Result};
use crate::family::AddressFamily;
use crate::reconciler::{PrefixListReconciler, ReconcileOutcome};
use crate::resolver::resolve_addresses;
use crate::response::InvocationResponse;
use crate::traits::{DnsLookup, PrefixListProvider};

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Run started
    Started {
        hostname: String,
        targets: usize,
    },

    /// DNS answers split by family
    Resolved {
        ipv4_addresses: usize,
        ipv6_addresses: usize,
    },

    /// A family had no addresses and was skipped
    FamilySkipped {
        family: AddressFamily,
        prefix_list_name: String,
    },

    /// A family's addresses were collapsed into blocks
    Consolidated {
        family: AddressFamily,
        addresses: usize,
        cidrs: usize,
    },

    /// A prefix list was created
    PrefixListCreated {
        prefix_list_name: String,
        prefix_list_id: String,
        entries: usize,
    },

    /// A prefix list was modified
    PrefixListUpdated {
        prefix_list_name: String,
        prefix_list_id: String,
        added: usize,
        removed: usize,
    },

    /// A prefix list already matched
    PrefixListUnchanged {
        prefix_list_name: String,
        prefix_list_id: String,
    },

    /// A family failed
    FamilyFailed {
        family: AddressFamily,
        prefix_list_name: String,
        error: String,
    },

    /// Run finished
    Finished {
        success: bool,
    },
}

/// Result of syncing one family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyReport {
    /// Address family
    pub family: AddressFamily,
    /// Prefix list that was reconciled
    pub prefix_list_name: String,
    /// Addresses resolved for this family
    pub addresses: usize,
    /// Consolidated blocks
    pub cidrs: Vec<IpNet>,
    /// What happened remotely
    pub outcome: ReconcileOutcome,
}

/// Result of a full run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Hostname that was resolved
    pub hostname: String,
    /// IPv4 addresses resolved
    pub total_ipv4_addresses: usize,
    /// IPv6 addresses resolved
    pub total_ipv6_addresses: usize,
    /// Families that were reconciled, in processing order
    pub families: Vec<FamilyReport>,
}

impl SyncSummary {
    /// Blocks written for `family`, zero when the family was skipped
    pub fn cidr_count(&self, family: AddressFamily) -> usize {
        self.report(family).map_or(0, |r| r.cidrs.len())
    }

    /// Report for `family`, if it was reconciled
    pub fn report(&self, family: AddressFamily) -> Option<&FamilyReport> {
        self.families.iter().find(|r| r.family == family)
    }
}

/// Core sync engine
///
/// The engine runs one resolve → consolidate → reconcile pass per call to
/// [`SyncEngine::run_once`]. Families are processed one after another on the
/// calling task; nothing is spawned and nothing is kept between runs.
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Call [`SyncEngine::run_once()`] or [`SyncEngine::invoke()`]
/// 3. Drain the event receiver if you care about progress events
pub struct SyncEngine {
    /// Hostname lookup
    lookup: Box<dyn DnsLookup>,

    /// Remote prefix-list store
    provider: Box<dyn PrefixListProvider>,

    /// Configuration
    config: SyncConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Create a new sync engine
    ///
    /// # Parameters
    ///
    /// - `lookup`: DNS lookup implementation
    /// - `provider`: Prefix list provider implementation
    /// - `config`: Sync configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        lookup: Box<dyn DnsLookup>,
        provider: Box<dyn PrefixListProvider>,
        config: SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            lookup,
            provider,
            config,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// The configuration this engine runs with
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Handle one trigger and produce the structured response
    ///
    /// The trigger payload is opaque; it is only logged.
    pub async fn invoke(&self, trigger: &serde_json::Value) -> InvocationResponse {
        debug!("Invocation trigger: {}", trigger);
        info!("Starting prefix list update process for {}", self.config.hostname);

        let result = self.run_once().await;
        match &result {
            Ok(_) => info!("Successfully completed prefix list update"),
            Err(e) => error!("Failed to update prefix lists: {}", e),
        }

        InvocationResponse::from_result(&result)
    }

    /// Run one full sync pass
    pub async fn run_once(&self) -> Result<SyncSummary> {
        self.emit_event(SyncEvent::Started {
            hostname: self.config.hostname.clone(),
            targets: self.config.targets.len(),
        });

        let result = self.run_internal().await;

        self.emit_event(SyncEvent::Finished {
            success: result.is_ok(),
        });
        result
    }

    async fn run_internal(&self) -> Result<SyncSummary> {
        let resolved = resolve_addresses(self.lookup.as_ref(), &self.config.hostname).await?;

        info!(
            "Fetched {} IPv4 and {} IPv6 addresses",
            resolved.ipv4.len(),
            resolved.ipv6.len()
        );
        self.emit_event(SyncEvent::Resolved {
            ipv4_addresses: resolved.ipv4.len(),
            ipv6_addresses: resolved.ipv6.len(),
        });

        let mut summary = SyncSummary {
            hostname: self.config.hostname.clone(),
            total_ipv4_addresses: resolved.ipv4.len(),
            total_ipv6_addresses: resolved.ipv6.len(),
            families: Vec::new(),
        };

        let description = self.config.entry_description();
        let reconciler = PrefixListReconciler::new(
            self.provider.as_ref(),
            &self.config.reconciler,
            self.config.hostname.clone(),
            description,
        );

        let mut failures = Vec::new();

        for target in &self.config.targets {
            let addresses = resolved.for_family(target.family);
            if addresses.is_empty() {
                warn!("No {} addresses found", target.family);
                self.emit_event(SyncEvent::FamilySkipped {
                    family: target.family,
                    prefix_list_name: target.name.clone(),
                });
                continue;
            }

            match self.sync_family(&reconciler, target, addresses).await {
                Ok(report) => summary.families.push(report),
                Err(e) => {
                    self.emit_event(SyncEvent::FamilyFailed {
                        family: target.family,
                        prefix_list_name: target.name.clone(),
                        error: e.to_string(),
                    });

                    match self.config.failure_policy {
                        FailurePolicy::FailFast => return Err(e),
                        FailurePolicy::CollectAll => {
                            error!("{} failed, continuing with remaining prefix lists: {}", target.name, e);
                            failures.push(format!("{}: {}", target.name, e));
                        }
                    }
                }
            }
        }

        if !failures.is_empty() {
            return Err(Error::Aggregate(failures));
        }

        Ok(summary)
    }

    /// Consolidate and reconcile one family
    async fn sync_family(
        &self,
        reconciler: &PrefixListReconciler<'_>,
        target: &PrefixListTarget,
        addresses: &[String],
    ) -> Result<FamilyReport> {
        info!("Processing {} {} addresses", addresses.len(), target.family);

        let cidrs = consolidate(addresses, target.family)?;
        info!("Consolidated to {} {} CIDR blocks", cidrs.len(), target.family);
        self.emit_event(SyncEvent::Consolidated {
            family: target.family,
            addresses: addresses.len(),
            cidrs: cidrs.len(),
        });

        let outcome = reconciler.reconcile(target, &cidrs).await?;

        match &outcome {
            ReconcileOutcome::Created { prefix_list_id, .. } => {
                self.emit_event(SyncEvent::PrefixListCreated {
                    prefix_list_name: target.name.clone(),
                    prefix_list_id: prefix_list_id.clone(),
                    entries: cidrs.len(),
                });
            }
            ReconcileOutcome::Updated {
                prefix_list_id,
                added,
                removed,
                ..
            } => {
                self.emit_event(SyncEvent::PrefixListUpdated {
                    prefix_list_name: target.name.clone(),
                    prefix_list_id: prefix_list_id.clone(),
                    added: added.len(),
                    removed: removed.len(),
                });
            }
            ReconcileOutcome::Unchanged { prefix_list_id, .. } => {
                self.emit_event(SyncEvent::PrefixListUnchanged {
                    prefix_list_name: target.name.clone(),
                    prefix_list_id: prefix_list_id.clone(),
                });
            }
        }

        Ok(FamilyReport {
            family: target.family,
            prefix_list_name: target.name.clone(),
            addresses: addresses.len(),
            cidrs,
            outcome,
        })
    }

    /// Emit an engine event
    fn emit_event(&self, event: SyncEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let summary = SyncSummary {
            hostname: "ip.example.com".to_string(),
            total_ipv4_addresses: 3,
            total_ipv6_addresses: 0,
            families: vec![FamilyReport {
                family: AddressFamily::V4,
                prefix_list_name: "list4".to_string(),
                addresses: 3,
                cidrs: vec!["203.0.113.1/32".parse().unwrap(), "203.0.113.2/31".parse().unwrap()],
                outcome: ReconcileOutcome::Unchanged {
                    prefix_list_id: "pl-1".to_string(),
                    entries: 2,
                },
            }],
        };

        assert_eq!(summary.cidr_count(AddressFamily::V4), 2);
        assert_eq!(summary.cidr_count(AddressFamily::V6), 0);
        assert!(summary.report(AddressFamily::V6).is_none());
    }

    #[test]
    fn test_event_clone_eq() {
        let event = SyncEvent::FamilySkipped {
            family: AddressFamily::V6,
            prefix_list_name: "uptimerobot6".to_string(),
        };
        assert_eq!(event.clone(), event);
    }
}
