//! Minimal embedding example for prefix-sync-core
//!
//! This example runs the sync engine as a library against a fixed DNS answer
//! and the in-memory prefix list store. Two runs are made: the first creates
//! both lists, the second changes one address and applies a single modify.

use std::sync::{Arc, Mutex};

use prefix_sync_core::traits::DnsLookup;
use prefix_sync_core::{MemoryPrefixListProvider, Result, SyncConfig, SyncEngine};

/// DNS lookup returning whatever the application last set
struct EmbeddedLookup {
    answers: Arc<Mutex<Vec<String>>>,
}

impl EmbeddedLookup {
    fn new(answers: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            answers: Arc::clone(answers),
        }
    }
}

#[async_trait::async_trait]
impl DnsLookup for EmbeddedLookup {
    async fn lookup(&self, hostname: &str) -> Result<Vec<String>> {
        println!("[Embedded] Resolving {}", hostname);
        Ok(self.answers.lock().unwrap().clone())
    }

    fn lookup_name(&self) -> &'static str {
        "embedded"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    println!("=== Embedded prefix-sync-core Example ===\n");

    let answers = Arc::new(Mutex::new(
        ["216.144.250.150", "216.144.250.151", "69.162.124.226", "2607:ff68:107::3"]
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>(),
    ));
    let store = MemoryPrefixListProvider::new();

    // First run: both lists are created
    println!("1. First run...");
    let (engine, mut event_rx) = SyncEngine::new(
        Box::new(EmbeddedLookup::new(&answers)),
        Box::new(store.clone()),
        SyncConfig::new().with_hostname("ip.uptimerobot.com"),
    )?;

    let response = engine.invoke(&serde_json::json!({ "source": "embedded" })).await;
    println!("   {}", response.to_json()?);
    while let Ok(event) = event_rx.try_recv() {
        println!("   [Event] {:?}", event);
    }

    // Second run: one address moved
    println!("\n2. Second run with one address replaced...");
    *answers.lock().unwrap() = vec![
        "216.144.250.150".to_string(),
        "216.144.250.151".to_string(),
        "69.162.124.227".to_string(),
        "2607:ff68:107::3".to_string(),
    ];

    let (engine, mut event_rx) = SyncEngine::new(
        Box::new(EmbeddedLookup::new(&answers)),
        Box::new(store.clone()),
        SyncConfig::new(),
    )?;
    let response = engine.invoke(&serde_json::Value::Null).await;
    println!("   {}", response.to_json()?);
    while let Ok(event) = event_rx.try_recv() {
        println!("   [Event] {:?}", event);
    }

    println!("\n3. Store contents:");
    for name in ["uptimerobot4", "uptimerobot6"] {
        if let Some(list) = store.find_by_name(name).await {
            let cidrs = store.cidrs(&list.id).await.unwrap_or_default();
            println!("   {} (v{}): {:?}", name, list.version, cidrs);
        }
    }
    println!("   Modify calls: {}", store.modifications().await.len());

    println!("\n=== Embedding Successful ===");
    println!("Key Points:");
    println!("- Collaborators are injected, nothing is global");
    println!("- The store is the only state carried between runs");
    println!("- The second run applies one modify for the changed address");

    Ok(())
}
