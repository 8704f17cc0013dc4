// # EC2 Managed Prefix List Provider
//
// This crate provides the PrefixListProvider backed by the EC2 managed
// prefix list API.
//
// ## Scope
//
// - One SDK call per trait method (plus continuation pages when listing)
// - Full error propagation to the reconciler
// - Stale-version rejections mapped to `Error::VersionConflict`
// - Dry-run mode for safe testing
// - NO retry logic (the reconciler owns the one bounded readiness poll)
// - NO caching of remote state between calls
// - NO background tasks
//
// ## Trust Level: Untrusted (Remote Provider)
//
// **Allowed Capabilities**:
// - Call the EC2 API for the configured account and region only
// - Parse provider-specific responses into core types
//
// **Forbidden Capabilities**:
// - Spawn tasks or threads
// - Retry or sleep
// - Decide what to add or remove (owned by PrefixListReconciler)
//
// ## Security Requirements
//
// - Credentials come from the default AWS provider chain, never from
//   this crate's configuration
// - Credentials NEVER appear in logs or Debug output
//
// ## API Reference
//
// - DescribeManagedPrefixLists
// - CreateManagedPrefixList
// - GetManagedPrefixListEntries
// - ModifyManagedPrefixList

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types as ec2;
use ipnet::IpNet;
use prefix_sync_core::traits::{
    CreatePrefixList, EntryPage, ModifyPrefixList, PrefixListEntry, PrefixListProvider,
    PrefixListState, PrefixListSummary,
};
use prefix_sync_core::{AddressFamily, Error, Result};

/// Name reported in errors and logs
const PROVIDER_NAME: &str = "ec2";

/// Error code EC2 returns when `CurrentVersion` is stale
const VERSION_MISMATCH_CODE: &str = "PrefixListVersionMismatch";

/// Page size requested from the describe and entry calls
const PAGE_SIZE: i32 = 100;

/// Id prefix of lists synthesized in dry-run mode
const DRY_RUN_ID_PREFIX: &str = "pl-dryrun-";

/// A list "created" in dry-run mode
#[derive(Debug, Clone)]
struct DryRunList {
    summary: PrefixListSummary,
    entries: Vec<PrefixListEntry>,
}

/// EC2 managed prefix list provider
///
/// # Trust Level: Untrusted
///
/// This provider is isolated, stateless and single-shot. Waiting for a new
/// list to become ready is the reconciler's job.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all describe and get calls against the real account
/// - Log the intended create and modify payloads
/// - **NOT** create or modify anything
///
/// Lists "created" in dry-run mode are answered locally for the rest of the
/// run so an overflow append can be logged too.
///
/// # Security
///
/// The Debug implementation shows only the region and mode.
pub struct Ec2PrefixListProvider {
    /// EC2 API client
    client: Client,

    /// Region the client is bound to, for logging
    region: Option<String>,

    /// Dry-run mode: if true, perform reads but skip create and modify
    dry_run: bool,

    /// Lists synthesized by dry-run creates
    dry_run_lists: Mutex<BTreeMap<String, DryRunList>>,
}

// Custom Debug implementation that never touches the client or credentials
impl std::fmt::Debug for Ec2PrefixListProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ec2PrefixListProvider")
            .field("client", &"<REDACTED>")
            .field("region", &self.region)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Ec2PrefixListProvider {
    /// Create a provider around an existing client
    ///
    /// # Parameters
    ///
    /// - `client`: EC2 client for the target account and region
    /// - `dry_run`: If true, perform reads but skip create and modify
    pub fn new(client: Client, dry_run: bool) -> Self {
        let region = client.config().region().map(|r| r.to_string());
        Self {
            client,
            region,
            dry_run,
            dry_run_lists: Mutex::new(BTreeMap::new()),
        }
    }

    /// Create a provider in live mode
    pub fn new_live(client: Client) -> Self {
        Self::new(client, false)
    }

    /// Create a provider in dry-run mode
    pub fn new_dry_run(client: Client) -> Self {
        Self::new(client, true)
    }

    /// Create a provider from the default AWS configuration chain
    ///
    /// Region and credentials come from the environment, shared config
    /// files or instance metadata, in the SDK's usual order.
    pub async fn from_env(dry_run: bool) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        if dry_run {
            tracing::warn!("EC2 provider running in DRY-RUN mode - no changes will be made");
        }
        Self::new(Client::new(&sdk_config), dry_run)
    }

    /// Whether this provider skips mutations
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn dry_run_lists(&self) -> MutexGuard<'_, BTreeMap<String, DryRunList>> {
        // A panic while holding the lock leaves the map usable
        self.dry_run_lists
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn dry_run_list(&self, prefix_list_id: &str) -> Option<DryRunList> {
        if !prefix_list_id.starts_with(DRY_RUN_ID_PREFIX) {
            return None;
        }
        self.dry_run_lists().get(prefix_list_id).cloned()
    }
}

#[async_trait]
impl PrefixListProvider for Ec2PrefixListProvider {
    /// List every managed prefix list visible to the account
    ///
    /// # API Call
    ///
    /// `DescribeManagedPrefixLists`, following `NextToken` until exhausted.
    async fn list_prefix_lists(&self) -> Result<Vec<PrefixListSummary>> {
        let mut summaries = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .describe_managed_prefix_lists()
                .max_results(PAGE_SIZE)
                .set_next_token(next_token.clone())
                .send()
                .await
                .map_err(|e| sdk_error("DescribeManagedPrefixLists", e))?;

            for pl in output.prefix_lists() {
                match summary_from_sdk(pl) {
                    Ok(summary) => summaries.push(summary),
                    Err(e) => tracing::debug!("Skipping unreadable prefix list: {}", e),
                }
            }

            match output.next_token() {
                Some(token) if !token.is_empty() && next_token.as_deref() != Some(token) => {
                    next_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        summaries.extend(self.dry_run_lists().values().map(|l| l.summary.clone()));

        tracing::debug!("Listed {} prefix list(s)", summaries.len());
        Ok(summaries)
    }

    /// Create a prefix list with its initial entries and tags
    ///
    /// # API Call
    ///
    /// `CreateManagedPrefixList` (skipped in dry-run mode)
    async fn create_prefix_list(&self, request: &CreatePrefixList) -> Result<PrefixListSummary> {
        tracing::info!(
            "{} prefix list {} ({}, max {} entries, {} initial) [mode: {}]",
            if self.dry_run { "Would create" } else { "Creating" },
            request.name,
            request.family,
            request.max_entries,
            request.entries.len(),
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        let entries = add_entries(&request.entries)?;

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send CreateManagedPrefixList with payload: {}",
                serde_json::json!({
                    "PrefixListName": request.name,
                    "AddressFamily": request.family.provider_tag(),
                    "MaxEntries": request.max_entries,
                    "Entries": request.entries.iter().map(|e| e.cidr.to_string()).collect::<Vec<_>>(),
                    "Tags": request.tags,
                })
            );

            let summary = PrefixListSummary {
                id: format!("{}{}", DRY_RUN_ID_PREFIX, request.name),
                name: request.name.clone(),
                version: 1,
                family: request.family,
                state: PrefixListState::CreateComplete,
                max_entries: request.max_entries,
            };
            self.dry_run_lists().insert(
                summary.id.clone(),
                DryRunList {
                    summary: summary.clone(),
                    entries: request.entries.clone(),
                },
            );
            return Ok(summary);
        }

        let max_entries = i32::try_from(request.max_entries).map_err(|_| {
            Error::invalid_input(format!("max_entries {} out of range", request.max_entries))
        })?;

        let output = self
            .client
            .create_managed_prefix_list()
            .prefix_list_name(&request.name)
            .address_family(request.family.provider_tag())
            .max_entries(max_entries)
            .set_entries(Some(entries))
            .tag_specifications(tag_specification(&request.tags))
            .send()
            .await
            .map_err(|e| sdk_error("CreateManagedPrefixList", e))?;

        let created = output.prefix_list().ok_or_else(|| {
            Error::provider(PROVIDER_NAME, "CreateManagedPrefixList returned no prefix list")
        })?;

        let summary = summary_from_sdk(created)?;
        tracing::info!("Prefix list created: {} ({})", summary.name, summary.id);
        Ok(summary)
    }

    /// Describe one prefix list by id
    ///
    /// # API Call
    ///
    /// `DescribeManagedPrefixLists` with `PrefixListIds=[id]`
    async fn describe_prefix_list(&self, prefix_list_id: &str) -> Result<PrefixListSummary> {
        if let Some(list) = self.dry_run_list(prefix_list_id) {
            return Ok(list.summary);
        }

        let output = self
            .client
            .describe_managed_prefix_lists()
            .prefix_list_ids(prefix_list_id)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeManagedPrefixLists", e))?;

        let pl = output
            .prefix_lists()
            .first()
            .ok_or_else(|| Error::not_found(prefix_list_id.to_string()))?;

        summary_from_sdk(pl)
    }

    /// Read one page of entries
    ///
    /// # API Call
    ///
    /// `GetManagedPrefixListEntries`
    async fn list_entries(
        &self,
        prefix_list_id: &str,
        next_token: Option<&str>,
    ) -> Result<EntryPage> {
        if let Some(list) = self.dry_run_list(prefix_list_id) {
            return Ok(EntryPage {
                entries: list.entries,
                next_token: None,
            });
        }

        let output = self
            .client
            .get_managed_prefix_list_entries()
            .prefix_list_id(prefix_list_id)
            .max_results(PAGE_SIZE)
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| sdk_error("GetManagedPrefixListEntries", e))?;

        let entries = output
            .entries()
            .iter()
            .map(entry_from_sdk)
            .collect::<Result<Vec<_>>>()?;

        Ok(EntryPage {
            entries,
            next_token: output
                .next_token()
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        })
    }

    /// Apply adds and removes conditioned on the expected version
    ///
    /// # API Call
    ///
    /// `ModifyManagedPrefixList` with `CurrentVersion` (skipped in dry-run mode)
    async fn modify_prefix_list(&self, request: &ModifyPrefixList) -> Result<u64> {
        tracing::info!(
            "{} prefix list {} at version {}: +{} -{} [mode: {}]",
            if self.dry_run { "Would modify" } else { "Modifying" },
            request.prefix_list_id,
            request.expected_version,
            request.add.len(),
            request.remove.len(),
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        let add = add_entries(&request.add)?;
        let remove = remove_entries(&request.remove)?;

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send ModifyManagedPrefixList with payload: {}",
                serde_json::json!({
                    "PrefixListId": request.prefix_list_id,
                    "CurrentVersion": request.expected_version,
                    "AddEntries": request.add.iter().map(|e| e.cidr.to_string()).collect::<Vec<_>>(),
                    "RemoveEntries": request.remove.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
                })
            );

            let mut lists = self.dry_run_lists();
            if let Some(list) = lists.get_mut(&request.prefix_list_id) {
                list.entries.retain(|e| !request.remove.contains(&e.cidr));
                list.entries.extend(request.add.iter().cloned());
                list.summary.version += 1;
                return Ok(list.summary.version);
            }
            return Ok(request.expected_version + 1);
        }

        let current_version = i64::try_from(request.expected_version).map_err(|_| {
            Error::invalid_input(format!("Version {} out of range", request.expected_version))
        })?;

        let mut call = self
            .client
            .modify_managed_prefix_list()
            .prefix_list_id(&request.prefix_list_id)
            .current_version(current_version);
        if !add.is_empty() {
            call = call.set_add_entries(Some(add));
        }
        if !remove.is_empty() {
            call = call.set_remove_entries(Some(remove));
        }

        let output = call.send().await.map_err(|e| {
            if is_version_mismatch(e.as_service_error().and_then(|se| se.code())) {
                Error::version_conflict(request.prefix_list_id.clone(), request.expected_version)
            } else {
                sdk_error("ModifyManagedPrefixList", e)
            }
        })?;

        let new_version = output
            .prefix_list()
            .and_then(|pl| pl.version())
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(request.expected_version + 1);

        tracing::info!(
            "Prefix list {} modification accepted, version {}",
            request.prefix_list_id,
            new_version
        );
        Ok(new_version)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Map an SDK failure to a transport error with the full error chain
fn sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> Error
where
    E: std::error::Error + ProvideErrorMetadata + 'static,
    R: std::fmt::Debug + 'static,
{
    let code = err
        .as_service_error()
        .and_then(|se| se.code())
        .map(str::to_string);
    let detail = DisplayErrorContext(&err).to_string();

    match code {
        Some(code) => Error::provider(PROVIDER_NAME, format!("{} failed ({}): {}", operation, code, detail)),
        None => Error::provider(PROVIDER_NAME, format!("{} failed: {}", operation, detail)),
    }
}

/// Whether an error code reports a stale `CurrentVersion`
fn is_version_mismatch(code: Option<&str>) -> bool {
    code == Some(VERSION_MISMATCH_CODE)
}

/// Convert an SDK prefix list description
fn summary_from_sdk(pl: &ec2::ManagedPrefixList) -> Result<PrefixListSummary> {
    let id = pl
        .prefix_list_id()
        .ok_or_else(|| Error::provider(PROVIDER_NAME, "Prefix list without id"))?;

    let family: AddressFamily = pl
        .address_family()
        .ok_or_else(|| Error::provider(PROVIDER_NAME, format!("Prefix list {} without address family", id)))?
        .parse()?;

    let state = pl
        .state()
        .and_then(|s| PrefixListState::from_provider(s.as_str()))
        .ok_or_else(|| {
            Error::provider(
                PROVIDER_NAME,
                format!("Prefix list {} has unknown state {:?}", id, pl.state()),
            )
        })?;

    Ok(PrefixListSummary {
        id: id.to_string(),
        name: pl.prefix_list_name().unwrap_or_default().to_string(),
        version: pl.version().and_then(|v| u64::try_from(v).ok()).unwrap_or(0),
        family,
        state,
        max_entries: pl.max_entries().and_then(|m| u32::try_from(m).ok()).unwrap_or(0),
    })
}

/// Convert an SDK entry
fn entry_from_sdk(entry: &ec2::PrefixListEntry) -> Result<PrefixListEntry> {
    let raw = entry
        .cidr()
        .ok_or_else(|| Error::provider(PROVIDER_NAME, "Prefix list entry without CIDR"))?;
    let cidr: IpNet = raw
        .parse()
        .map_err(|e| Error::parse(format!("Invalid CIDR {} in prefix list: {}", raw, e)))?;

    Ok(PrefixListEntry {
        cidr,
        description: entry.description().map(str::to_string),
    })
}

fn add_entries(entries: &[PrefixListEntry]) -> Result<Vec<ec2::AddPrefixListEntry>> {
    entries
        .iter()
        .map(|e| {
            ec2::AddPrefixListEntry::builder()
                .cidr(e.cidr.to_string())
                .set_description(e.description.clone())
                .build()
                .map_err(|err| Error::invalid_input(format!("Invalid entry {}: {}", e.cidr, err)))
        })
        .collect()
}

fn remove_entries(cidrs: &[IpNet]) -> Result<Vec<ec2::RemovePrefixListEntry>> {
    cidrs
        .iter()
        .map(|cidr| {
            ec2::RemovePrefixListEntry::builder()
                .cidr(cidr.to_string())
                .build()
                .map_err(|err| Error::invalid_input(format!("Invalid entry {}: {}", cidr, err)))
        })
        .collect()
}

fn tag_specification(tags: &BTreeMap<String, String>) -> ec2::TagSpecification {
    let tags = tags
        .iter()
        .map(|(key, value)| ec2::Tag::builder().key(key).value(value).build())
        .collect();

    ec2::TagSpecification::builder()
        .resource_type(ec2::ResourceType::PrefixList)
        .set_tags(Some(tags))
        .build()
}
