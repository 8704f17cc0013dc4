//! Contract Test: Creation and Overflow
//!
//! This test verifies how a missing prefix list is created.
//!
//! Constraints verified:
//! - A create call carries at most the batch limit of entries
//! - Overflow is appended with exactly one modify after the list is ready
//! - The readiness poll is bounded; exhaustion does not hide the modify error
//! - Capacity is the entry count plus headroom, capped at max_entries
//! - Created lists are tagged with their name, source and owner

mod common;

use std::collections::BTreeSet;

use common::*;
use prefix_sync_core::config::{PrefixListTarget, ReconcilerConfig};
use prefix_sync_core::{AddressFamily, Error, MemoryPrefixListProvider, PrefixListReconciler, ReconcileOutcome};

fn v4_target() -> PrefixListTarget {
    PrefixListTarget::new("uptimerobot4", AddressFamily::V4, "IPv4 monitoring addresses")
}

fn roomy_config() -> ReconcilerConfig {
    ReconcilerConfig {
        max_entries: 200,
        ..fast_reconciler_config()
    }
}

#[tokio::test]
async fn overflow_is_appended_with_one_modify() {
    let provider = MemoryPrefixListProvider::new();
    let config = roomy_config();
    let desired = sparse_v4_blocks(150);

    let reconciler = PrefixListReconciler::new(&provider, &config, "ip.example.com", "monitoring");
    let outcome = reconciler.reconcile(&v4_target(), &desired).await.unwrap();

    let creations = provider.creations().await;
    assert_eq!(creations.len(), 1);
    assert_eq!(creations[0].entries.len(), 100);
    assert_eq!(creations[0].max_entries, 170);

    let modifications = provider.modifications().await;
    assert_eq!(modifications.len(), 1, "Overflow must go out in one modify");
    assert_eq!(modifications[0].add.len(), 50);
    assert!(modifications[0].remove.is_empty());

    assert_eq!(
        outcome,
        ReconcileOutcome::Created {
            prefix_list_id: outcome.prefix_list_id().to_string(),
            initial_entries: 100,
            appended_entries: 50,
        }
    );

    let stored = provider.cidrs(outcome.prefix_list_id()).await.unwrap();
    assert_eq!(stored, desired.into_iter().collect::<BTreeSet<_>>());
}

#[tokio::test]
async fn small_sets_need_no_modify() {
    let provider = MemoryPrefixListProvider::new();
    let config = fast_reconciler_config();

    let reconciler = PrefixListReconciler::new(&provider, &config, "ip.example.com", "monitoring");
    let outcome = reconciler
        .reconcile(&v4_target(), &sparse_v4_blocks(3))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        ReconcileOutcome::Created { initial_entries: 3, appended_entries: 0, .. }
    ));
    assert!(provider.modifications().await.is_empty());
    assert_eq!(provider.describe_call_count(), 0, "No readiness poll without overflow");
    assert_eq!(provider.creations().await[0].max_entries, 23);
}

#[tokio::test]
async fn creation_delay_is_waited_out() {
    let provider = MemoryPrefixListProvider::new().with_creation_delay(3);
    let config = roomy_config();

    let reconciler = PrefixListReconciler::new(&provider, &config, "ip.example.com", "monitoring");
    let outcome = reconciler
        .reconcile(&v4_target(), &sparse_v4_blocks(120))
        .await
        .expect("overflow append succeeds once the list is ready");

    assert_eq!(provider.describe_call_count(), 3);
    assert_eq!(provider.modifications().await.len(), 1);
    assert_eq!(provider.cidrs(outcome.prefix_list_id()).await.unwrap().len(), 120);
}

#[tokio::test]
async fn poll_exhaustion_surfaces_the_modify_error() {
    let provider = MemoryPrefixListProvider::new().with_creation_delay(1000);
    let config = roomy_config();

    let reconciler = PrefixListReconciler::new(&provider, &config, "ip.example.com", "monitoring");
    let err = reconciler
        .reconcile(&v4_target(), &sparse_v4_blocks(101))
        .await
        .unwrap_err();

    assert_eq!(provider.describe_call_count(), config.ready_poll_attempts as usize);
    assert!(matches!(err, Error::ProviderTransport { .. }), "got {:?}", err);

    // The created list keeps its initial batch
    let list = provider.find_by_name("uptimerobot4").await.unwrap();
    assert_eq!(provider.cidrs(&list.id).await.unwrap().len(), 100);
}

#[tokio::test]
async fn capacity_is_capped_at_max_entries() {
    let provider = MemoryPrefixListProvider::new();
    let config = ReconcilerConfig {
        max_entries: 60,
        ..fast_reconciler_config()
    };

    let reconciler = PrefixListReconciler::new(&provider, &config, "ip.example.com", "monitoring");
    reconciler
        .reconcile(&v4_target(), &sparse_v4_blocks(50))
        .await
        .unwrap();

    assert_eq!(provider.creations().await[0].max_entries, 60);
}

#[tokio::test]
async fn created_list_is_tagged() {
    let provider = MemoryPrefixListProvider::new();
    let mut config = fast_reconciler_config();
    config.extra_tags.insert("Team".to_string(), "network".to_string());

    let reconciler = PrefixListReconciler::new(&provider, &config, "ip.example.com", "monitoring");
    let outcome = reconciler
        .reconcile(&v4_target(), &nets(&["192.0.2.1/32"]))
        .await
        .unwrap();

    let tags = provider.tags(outcome.prefix_list_id()).await.unwrap();
    assert_eq!(tags.get("Name").map(String::as_str), Some("uptimerobot4"));
    assert_eq!(tags.get("SourceUrl").map(String::as_str), Some("ip.example.com"));
    assert_eq!(tags.get("ManagedBy").map(String::as_str), Some("prefix-sync"));
    assert_eq!(tags.get("Team").map(String::as_str), Some("network"));
}

#[tokio::test]
async fn duplicate_blocks_are_submitted_once() {
    let provider = MemoryPrefixListProvider::new();
    let config = fast_reconciler_config();

    let reconciler = PrefixListReconciler::new(&provider, &config, "ip.example.com", "monitoring");
    reconciler
        .reconcile(&v4_target(), &nets(&["192.0.2.1/32", "192.0.2.1/32", "192.0.2.8/30"]))
        .await
        .unwrap();

    assert_eq!(provider.creations().await[0].entries.len(), 2);
}
