//! Configuration types for the prefix-list sync system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use crate::family::AddressFamily;

/// Hostname whose A/AAAA records list the monitoring addresses
pub const DEFAULT_HOSTNAME: &str = "ip.uptimerobot.com";

/// Name of the IPv4 prefix list
pub const DEFAULT_IPV4_LIST_NAME: &str = "uptimerobot4";

/// Name of the IPv6 prefix list
pub const DEFAULT_IPV6_LIST_NAME: &str = "uptimerobot6";

/// Main sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Hostname to resolve
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Prefix lists to keep in sync, at most one per family
    #[serde(default = "default_targets")]
    pub targets: Vec<PrefixListTarget>,

    /// Reconciler settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// What to do when one family fails
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SyncConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            hostname: default_hostname(),
            targets: default_targets(),
            reconciler: ReconcilerConfig::default(),
            failure_policy: FailurePolicy::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Set the hostname
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Replace the reconciler settings
    pub fn with_reconciler(mut self, reconciler: ReconcilerConfig) -> Self {
        self.reconciler = reconciler;
        self
    }

    /// Description attached to every entry this system adds
    pub fn entry_description(&self) -> String {
        self.reconciler
            .entry_description
            .clone()
            .unwrap_or_else(|| format!("UptimeRobot monitoring address returned from {}", self.hostname))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.hostname.trim().is_empty() {
            return Err(crate::Error::config("Hostname cannot be empty"));
        }

        if self.targets.is_empty() {
            return Err(crate::Error::config("No prefix lists configured"));
        }

        let mut names = HashSet::new();
        let mut families = HashSet::new();
        for target in &self.targets {
            target.validate()?;
            if !names.insert(target.name.as_str()) {
                return Err(crate::Error::config(format!(
                    "Prefix list {} is configured twice",
                    target.name
                )));
            }
            if !families.insert(target.family) {
                return Err(crate::Error::config(format!(
                    "More than one prefix list configured for {}",
                    target.family
                )));
            }
        }

        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        self.reconciler.validate()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// One named prefix list and the family it holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixListTarget {
    /// Prefix list name (unique per account and region)
    pub name: String,

    /// Address family stored in the list
    pub family: AddressFamily,

    /// Human-readable purpose, attached as a tag on creation
    pub description: String,
}

impl PrefixListTarget {
    /// Create a new target
    pub fn new(
        name: impl Into<String>,
        family: AddressFamily,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            family,
            description: description.into(),
        }
    }

    /// Validate the target
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::config("Prefix list name cannot be empty"));
        }
        if self.name.len() > 255 {
            return Err(crate::Error::config(format!(
                "Prefix list name too long: {} chars (max 255)",
                self.name.len()
            )));
        }
        Ok(())
    }
}

/// How failures in one family affect the rest of the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failing family
    #[default]
    FailFast,
    /// Process every family, then report all failures together
    CollectAll,
}

impl std::str::FromStr for FailurePolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-fast" | "fail_fast" | "failfast" => Ok(FailurePolicy::FailFast),
            "collect-all" | "collect_all" | "collectall" => Ok(FailurePolicy::CollectAll),
            other => Err(crate::Error::config(format!(
                "Unknown failure policy '{}'. Valid policies: fail-fast, collect-all",
                other
            ))),
        }
    }
}

/// Reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Upper bound on the capacity requested at creation
    #[serde(default = "default_max_entries")]
    pub max_entries: u32,

    /// Most entries the provider accepts in a create call
    #[serde(default = "default_create_batch_limit")]
    pub create_batch_limit: usize,

    /// Spare capacity reserved beyond the initial entry count
    #[serde(default = "default_capacity_headroom")]
    pub capacity_headroom: u32,

    /// Describe calls made while waiting for a new list to become ready
    #[serde(default = "default_ready_poll_attempts")]
    pub ready_poll_attempts: u32,

    /// Delay between readiness polls (in milliseconds)
    #[serde(default = "default_ready_poll_interval_ms")]
    pub ready_poll_interval_ms: u64,

    /// Override for the description attached to added entries
    #[serde(default)]
    pub entry_description: Option<String>,

    /// Value of the `ManagedBy` tag on created lists
    #[serde(default = "default_managed_by")]
    pub managed_by: String,

    /// Additional tags to attach to created lists
    #[serde(default)]
    pub extra_tags: BTreeMap<String, String>,
}

impl ReconcilerConfig {
    /// Delay between readiness polls
    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    /// Capacity to request for a list created with `desired` entries
    pub fn creation_capacity(&self, desired: usize) -> u32 {
        let wanted = u32::try_from(desired)
            .unwrap_or(u32::MAX)
            .saturating_add(self.capacity_headroom);
        wanted.min(self.max_entries)
    }

    /// Validate the reconciler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_entries == 0 {
            return Err(crate::Error::config("max_entries must be > 0"));
        }
        if self.create_batch_limit == 0 {
            return Err(crate::Error::config("create_batch_limit must be > 0"));
        }
        if self.ready_poll_attempts == 0 {
            return Err(crate::Error::config("ready_poll_attempts must be > 0"));
        }
        Ok(())
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            create_batch_limit: default_create_batch_limit(),
            capacity_headroom: default_capacity_headroom(),
            ready_poll_attempts: default_ready_poll_attempts(),
            ready_poll_interval_ms: default_ready_poll_interval_ms(),
            entry_description: None,
            managed_by: default_managed_by(),
            extra_tags: BTreeMap::new(),
        }
    }
}

fn default_hostname() -> String {
    DEFAULT_HOSTNAME.to_string()
}

fn default_targets() -> Vec<PrefixListTarget> {
    vec![
        PrefixListTarget::new(
            DEFAULT_IPV4_LIST_NAME,
            AddressFamily::V4,
            "UptimeRobot IPv4 monitoring addresses",
        ),
        PrefixListTarget::new(
            DEFAULT_IPV6_LIST_NAME,
            AddressFamily::V6,
            "UptimeRobot IPv6 monitoring addresses",
        ),
    ]
}

fn default_event_channel_capacity() -> usize {
    100
}

fn default_max_entries() -> u32 {
    120
}

fn default_create_batch_limit() -> usize {
    100
}

fn default_capacity_headroom() -> u32 {
    20
}

fn default_ready_poll_attempts() -> u32 {
    30
}

fn default_ready_poll_interval_ms() -> u64 {
    2000
}

fn default_managed_by() -> String {
    "prefix-sync".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.hostname, "ip.uptimerobot.com");
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.reconciler.max_entries, 120);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert_eq!(
            config.entry_description(),
            "UptimeRobot monitoring address returned from ip.uptimerobot.com"
        );
    }

    #[test]
    fn test_creation_capacity_is_capped() {
        let reconciler = ReconcilerConfig::default();
        assert_eq!(reconciler.creation_capacity(10), 30);
        assert_eq!(reconciler.creation_capacity(100), 120);
        assert_eq!(reconciler.creation_capacity(150), 120);
    }

    #[test]
    fn test_duplicate_family_rejected() {
        let mut config = SyncConfig::default();
        config.targets[1].family = AddressFamily::V4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut config = SyncConfig::default();
        config.targets[1].name = config.targets[0].name.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = SyncConfig::default();
        config.reconciler.create_batch_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: SyncConfig = serde_json::from_str(
            r#"{"hostname": "ip.example.net", "failure_policy": "collect-all",
                "reconciler": {"max_entries": 60}}"#,
        )
        .unwrap();
        assert_eq!(config.hostname, "ip.example.net");
        assert_eq!(config.failure_policy, FailurePolicy::CollectAll);
        assert_eq!(config.reconciler.max_entries, 60);
        assert_eq!(config.reconciler.create_batch_limit, 100);
        assert_eq!(config.targets[1].family, AddressFamily::V6);
    }

    #[test]
    fn test_failure_policy_parsing() {
        assert_eq!("collect-all".parse::<FailurePolicy>().unwrap(), FailurePolicy::CollectAll);
        assert_eq!("FAIL-FAST".parse::<FailurePolicy>().unwrap(), FailurePolicy::FailFast);
        assert!("sometimes".parse::<FailurePolicy>().is_err());
    }
}
