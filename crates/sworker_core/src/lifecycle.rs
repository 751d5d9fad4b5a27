//! Install and activate steps of a worker version.

use std::fmt;

use serde::Serialize;
use sworker_cache::{CacheStorage, Partition, RequestKey};
use sworker_config::PartitionNames;
use sworker_http::{FetchRequest, Fetcher};
use tracing::{debug, error, info, warn};

use crate::settings::WorkerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Created, install not started yet.
    Parsed,
    Installing,
    /// Installed and waiting to activate.
    Installed,
    Activating,
    /// Controls pages and intercepts fetches.
    Active,
    /// Replaced by a newer version.
    Redundant,
}

impl WorkerState {
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, WorkerState::Active)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub cached: Vec<String>,
    pub failed: Vec<AssetFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetFailure {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    pub claimed: bool,
}

/// Fetch every static asset into the static partition.
///
/// Each asset is fetched and stored on its own; failures are collected in
/// the report and never abort the rest.
pub async fn populate_static<S, F>(settings: &WorkerSettings, storage: &S, fetcher: &F) -> InstallReport
where
    S: CacheStorage,
    F: Fetcher,
{
    let mut report = InstallReport::default();
    let partition_name = settings.names.static_name();

    let partition = match storage.open(partition_name).await {
        Ok(p) => p,
        Err(err) => {
            error!(
                target: "sworker::lifecycle",
                partition = %partition_name,
                error = %err,
                "Cannot open static partition; install continues uncached"
            );
            report.failed = settings
                .static_assets
                .iter()
                .map(|url| AssetFailure {
                    url: url.clone(),
                    reason: err.to_string(),
                })
                .collect();
            return report;
        }
    };

    for url in &settings.static_assets {
        let request = FetchRequest::get(url.as_str());
        let result = match fetcher.fetch(&request).await {
            Ok(response) if response.is_ok() => partition
                .put(RequestKey::from_request(&request), response)
                .await
                .map_err(|e| e.to_string()),
            Ok(response) => Err(format!("status {}", response.status())),
            Err(err) => Err(err.to_string()),
        };

        match result {
            Ok(()) => {
                debug!(target: "sworker::lifecycle", %url, "Static asset cached");
                report.cached.push(url.clone());
            }
            Err(reason) => {
                warn!(target: "sworker::lifecycle", %url, %reason, "Static asset not cached");
                report.failed.push(AssetFailure {
                    url: url.clone(),
                    reason,
                });
            }
        }
    }

    info!(
        target: "sworker::lifecycle",
        partition = %partition_name,
        cached = report.cached.len(),
        failed = report.failed.len(),
        "Static assets populated"
    );
    report
}

/// Delete every partition that is not on the allow-list.
pub async fn evict_unknown_partitions<S: CacheStorage>(
    names: &PartitionNames,
    storage: &S,
) -> Vec<String> {
    let existing = match storage.names().await {
        Ok(existing) => existing,
        Err(err) => {
            error!(target: "sworker::lifecycle", error = %err, "Cannot list partitions; nothing evicted");
            return Vec::new();
        }
    };

    let mut deleted = Vec::new();
    for name in existing.into_iter().filter(|n| !names.is_allowed(n)) {
        match storage.remove(&name).await {
            Ok(true) => {
                info!(target: "sworker::lifecycle", partition = %name, "Deleted stale partition");
                deleted.push(name);
            }
            Ok(false) => {}
            Err(err) => warn!(
                target: "sworker::lifecycle",
                partition = %name,
                error = %err,
                "Could not delete stale partition"
            ),
        }
    }
    deleted
}
