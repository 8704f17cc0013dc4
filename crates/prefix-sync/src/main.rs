// # prefix-sync - one-shot prefix list sync
//
// This binary is a THIN integration layer:
// - DO NOT add resolution, consolidation or reconciliation logic here
// - All sync logic lives in prefix-sync-core
// - Configuration is via environment variables ONLY
//
// The binary is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the system DNS lookup and the EC2 provider into the engine
// 4. Running one invocation and printing its response as JSON
//
// ## Configuration
//
// - `PREFIX_SYNC_HOSTNAME`: Hostname to resolve (default: ip.uptimerobot.com)
// - `MAX_ENTRIES_PER_SECURITY_GROUP`: Capacity cap for created lists (default: 120)
// - `PREFIX_SYNC_FAILURE_POLICY`: fail-fast (default) or collect-all
// - `PREFIX_SYNC_MODE`: live (default) or dry-run
// - `PREFIX_SYNC_LOG_LEVEL`: trace, debug, info (default), warn, error
//
// AWS region and credentials come from the standard AWS environment.
//
// ## Example
//
// ```bash
// export AWS_REGION=eu-west-1
// export MAX_ENTRIES_PER_SECURITY_GROUP=200
// export PREFIX_SYNC_MODE=dry-run
//
// prefix-sync
// ```

use anyhow::Result;
use prefix_sync_core::config::{DEFAULT_HOSTNAME, ReconcilerConfig, SyncConfig};
use prefix_sync_core::{FailurePolicy, SyncEngine};
use prefix_sync_dns::SystemDnsLookup;
use std::env;
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Default capacity cap for created prefix lists
const DEFAULT_MAX_ENTRIES: u32 = 120;

/// Exit codes for different termination scenarios
///
/// - 0: The invocation returned status 200
/// - 1: Configuration or startup error
/// - 2: The invocation returned status 500
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncExitCode {
    /// Sync completed
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Sync failed
    SyncFailed = 2,
}

impl From<SyncExitCode> for ExitCode {
    fn from(code: SyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Whether mutations are performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    Live,
    DryRun,
}

/// Application configuration
#[derive(Debug)]
struct Config {
    hostname: String,
    max_entries: String,
    failure_policy: String,
    mode: String,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            hostname: get("PREFIX_SYNC_HOSTNAME").unwrap_or_else(|| DEFAULT_HOSTNAME.to_string()),
            max_entries: get("MAX_ENTRIES_PER_SECURITY_GROUP")
                .unwrap_or_else(|| DEFAULT_MAX_ENTRIES.to_string()),
            failure_policy: get("PREFIX_SYNC_FAILURE_POLICY").unwrap_or_else(|| "fail-fast".to_string()),
            mode: get("PREFIX_SYNC_MODE").unwrap_or_else(|| "live".to_string()),
            log_level: get("PREFIX_SYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.validate_hostname()?;
        self.parsed_max_entries()?;
        self.parsed_failure_policy()?;
        self.run_mode()?;
        self.log_level()?;
        Ok(())
    }

    /// Basic RFC 1035 hostname check
    fn validate_hostname(&self) -> Result<()> {
        let hostname = self.hostname.trim();
        if hostname.is_empty() {
            anyhow::bail!("PREFIX_SYNC_HOSTNAME cannot be empty");
        }

        if hostname.len() > 253 {
            anyhow::bail!(
                "PREFIX_SYNC_HOSTNAME too long: {} chars (max 253). Got: {}",
                hostname.len(),
                hostname
            );
        }

        for label in hostname.trim_end_matches('.').split('.') {
            if label.is_empty() || label.len() > 63 {
                anyhow::bail!("PREFIX_SYNC_HOSTNAME has an invalid label: '{}'", hostname);
            }

            if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                || label.starts_with('-')
                || label.ends_with('-')
            {
                anyhow::bail!(
                    "PREFIX_SYNC_HOSTNAME label '{}' is invalid. \
                    Valid: alphanumeric and inner hyphens only.",
                    label
                );
            }
        }

        Ok(())
    }

    fn parsed_max_entries(&self) -> Result<u32> {
        let value: u32 = self.max_entries.trim().parse().map_err(|_| {
            anyhow::anyhow!(
                "MAX_ENTRIES_PER_SECURITY_GROUP must be a positive integer. Got: {}",
                self.max_entries
            )
        })?;

        if value == 0 {
            anyhow::bail!("MAX_ENTRIES_PER_SECURITY_GROUP must be at least 1");
        }
        Ok(value)
    }

    fn parsed_failure_policy(&self) -> Result<FailurePolicy> {
        Ok(self.failure_policy.parse::<FailurePolicy>()?)
    }

    fn run_mode(&self) -> Result<RunMode> {
        match self.mode.trim().to_lowercase().as_str() {
            "live" => Ok(RunMode::Live),
            "dry-run" | "dry_run" | "dryrun" => Ok(RunMode::DryRun),
            _ => anyhow::bail!(
                "PREFIX_SYNC_MODE '{}' is not valid. Valid modes: live, dry-run",
                self.mode
            ),
        }
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.trim().to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "PREFIX_SYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    /// Build the engine configuration
    fn sync_config(&self) -> Result<SyncConfig> {
        let reconciler = ReconcilerConfig {
            max_entries: self.parsed_max_entries()?,
            ..ReconcilerConfig::default()
        };

        let config = SyncConfig::new()
            .with_hostname(self.hostname.trim())
            .with_failure_policy(self.parsed_failure_policy()?)
            .with_reconciler(reconciler);
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    // Load and validate configuration from environment
    let config = Config::from_env();
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return SyncExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = config.log_level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SyncExitCode::ConfigError.into();
    }

    info!("Starting prefix-sync");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SyncExitCode::ConfigError.into();
        }
    };

    let result = rt.block_on(async {
        match run_once(config).await {
            Ok(code) => code,
            Err(e) => {
                error!("Startup error: {}", e);
                SyncExitCode::ConfigError
            }
        }
    });

    result.into()
}

/// Wire collaborators, run one invocation and print its response
async fn run_once(config: Config) -> Result<SyncExitCode> {
    let sync_config = config.sync_config()?;
    let mode = config.run_mode()?;

    info!("Hostname: {}", sync_config.hostname);
    info!("Max entries per prefix list: {}", sync_config.reconciler.max_entries);
    info!("Failure policy: {:?}", sync_config.failure_policy);
    info!("Mode: {:?}", mode);

    let lookup = Box::new(SystemDnsLookup::new());

    #[cfg(feature = "ec2")]
    let provider = Box::new(
        prefix_sync_provider_ec2::Ec2PrefixListProvider::from_env(mode == RunMode::DryRun).await,
    );

    #[cfg(not(feature = "ec2"))]
    let provider = {
        warn!("Built without the ec2 feature, syncing against an in-memory store");
        Box::new(prefix_sync_core::MemoryPrefixListProvider::new())
    };

    let (engine, _events) = SyncEngine::new(lookup, provider, sync_config)?;

    let response = engine.invoke(&serde_json::Value::Null).await;
    println!("{}", response.to_json()?);

    if response.is_success() {
        info!("Sync finished");
        Ok(SyncExitCode::Success)
    } else {
        warn!("Sync finished with status {}", response.status_code);
        Ok(SyncExitCode::SyncFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert!(config.validate().is_ok());

        let sync = config.sync_config().unwrap();
        assert_eq!(sync.hostname, DEFAULT_HOSTNAME);
        assert_eq!(sync.reconciler.max_entries, DEFAULT_MAX_ENTRIES);
        assert_eq!(sync.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.run_mode().unwrap(), RunMode::Live);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("MAX_ENTRIES_PER_SECURITY_GROUP", "200"),
            ("PREFIX_SYNC_HOSTNAME", "ip.example.com"),
            ("PREFIX_SYNC_FAILURE_POLICY", "collect-all"),
            ("PREFIX_SYNC_MODE", "dry-run"),
            ("PREFIX_SYNC_LOG_LEVEL", "DEBUG"),
        ]);

        let sync = config.sync_config().unwrap();
        assert_eq!(sync.reconciler.max_entries, 200);
        assert_eq!(sync.hostname, "ip.example.com");
        assert_eq!(sync.failure_policy, FailurePolicy::CollectAll);
        assert_eq!(config.run_mode().unwrap(), RunMode::DryRun);
        assert_eq!(config.log_level().unwrap(), Level::DEBUG);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config_from(&[("MAX_ENTRIES_PER_SECURITY_GROUP", "0")]).validate().is_err());
        assert!(config_from(&[("MAX_ENTRIES_PER_SECURITY_GROUP", "many")]).validate().is_err());
        assert!(config_from(&[("PREFIX_SYNC_MODE", "yolo")]).validate().is_err());
        assert!(config_from(&[("PREFIX_SYNC_LOG_LEVEL", "loud")]).validate().is_err());
        assert!(config_from(&[("PREFIX_SYNC_FAILURE_POLICY", "retry")]).validate().is_err());
        assert!(config_from(&[("PREFIX_SYNC_HOSTNAME", "bad_host.example.com")]).validate().is_err());
        assert!(config_from(&[("PREFIX_SYNC_HOSTNAME", "")]).validate().is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(SyncExitCode::Success as u8, 0);
        assert_eq!(SyncExitCode::ConfigError as u8, 1);
        assert_eq!(SyncExitCode::SyncFailed as u8, 2);
    }
}
