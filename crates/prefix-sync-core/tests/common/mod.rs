//! Test doubles and common utilities for contract tests
//!
//! The remote store is played by `MemoryPrefixListProvider`; this module adds
//! a scripted DNS lookup and a few builders.

#![allow(dead_code)]

use ipnet::IpNet;
use prefix_sync_core::config::{ReconcilerConfig, SyncConfig};
use prefix_sync_core::error::{Error, Result};
use prefix_sync_core::traits::DnsLookup;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A DnsLookup that returns a fixed answer and counts calls
pub struct ScriptedLookup {
    answers: std::result::Result<Vec<String>, String>,
    call_count: Arc<AtomicUsize>,
}

impl ScriptedLookup {
    /// Lookup that returns `answers`
    pub fn answering(answers: &[&str]) -> Self {
        Self {
            answers: Ok(answers.iter().map(|s| s.to_string()).collect()),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Lookup that always fails with a resolution error
    pub fn failing(message: &str) -> Self {
        Self {
            answers: Err(message.to_string()),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the number of times lookup() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Create a new ScriptedLookup that shares its counter with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            answers: other.answers.clone(),
            call_count: Arc::clone(&other.call_count),
        }
    }
}

#[async_trait::async_trait]
impl DnsLookup for ScriptedLookup {
    async fn lookup(&self, hostname: &str) -> Result<Vec<String>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        match &self.answers {
            Ok(answers) => Ok(answers.clone()),
            Err(message) => Err(Error::resolution(format!("{}: {}", hostname, message))),
        }
    }

    fn lookup_name(&self) -> &'static str {
        "scripted"
    }
}

/// Parse CIDR strings
pub fn nets(values: &[&str]) -> Vec<IpNet> {
    values.iter().map(|s| s.parse().expect("valid CIDR")).collect()
}

/// `count` host blocks that cannot merge with each other
pub fn sparse_v4_blocks(count: usize) -> Vec<IpNet> {
    (0..count)
        .map(|i| {
            let n = i * 2;
            format!("10.{}.{}.{}/32", n / 65536, (n / 256) % 256, n % 256)
                .parse()
                .expect("valid CIDR")
        })
        .collect()
}

/// Reconciler settings with a fast readiness poll
pub fn fast_reconciler_config() -> ReconcilerConfig {
    ReconcilerConfig {
        ready_poll_attempts: 5,
        ready_poll_interval_ms: 1,
        ..ReconcilerConfig::default()
    }
}

/// Default sync configuration with a fast readiness poll
pub fn minimal_config() -> SyncConfig {
    SyncConfig::default().with_reconciler(fast_reconciler_config())
}
