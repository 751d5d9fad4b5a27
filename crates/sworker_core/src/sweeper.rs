//! Eviction of expired CDN entries and the schedule that paces it.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use sworker_cache::{CacheStorage, FreshnessPolicy, Partition};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub evicted: usize,
    pub failed: usize,
}

/// Walks one partition and deletes every entry the policy calls stale.
/// Best-effort: a failed read or delete is logged and the walk goes on.
pub struct Sweeper<S> {
    storage: S,
    partition: String,
    policy: FreshnessPolicy,
    clock: Arc<dyn Clock>,
}

impl<S: CacheStorage> Sweeper<S> {
    pub fn new(
        storage: S,
        partition: impl Into<String>,
        policy: FreshnessPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            partition: partition.into(),
            policy,
            clock,
        }
    }

    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let partition = match self.storage.open(&self.partition).await {
            Ok(p) => p,
            Err(err) => {
                error!(target: "sworker::sweeper", partition = %self.partition, error = %err, "Cannot open partition");
                return report;
            }
        };
        let keys = match partition.keys().await {
            Ok(keys) => keys,
            Err(err) => {
                error!(target: "sworker::sweeper", partition = %self.partition, error = %err, "Cannot list entries");
                return report;
            }
        };

        let now = self.clock.now_millis();
        for key in keys {
            report.scanned += 1;

            let entry = match partition.get(&key).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(err) => {
                    warn!(target: "sworker::sweeper", key = %key, error = %err, "Cannot read entry");
                    report.failed += 1;
                    continue;
                }
            };
            if self.policy.is_fresh_entry(&entry, now) {
                continue;
            }

            match partition.delete(&key).await {
                Ok(_) => {
                    debug!(target: "sworker::sweeper", key = %key, "Evicted expired entry");
                    report.evicted += 1;
                }
                Err(err) => {
                    warn!(target: "sworker::sweeper", key = %key, error = %err, "Cannot evict entry");
                    report.failed += 1;
                }
            }
        }

        info!(
            target: "sworker::sweeper",
            partition = %self.partition,
            scanned = report.scanned,
            evicted = report.evicted,
            failed = report.failed,
            "Cache sweep finished"
        );
        report
    }
}

/// Allows the cleanup trigger at most once per minimum interval.
#[derive(Debug)]
pub struct CleanupSchedule {
    min_interval_millis: u64,
    last_run: Mutex<Option<u64>>,
}

impl CleanupSchedule {
    pub fn new(min_interval_millis: u64) -> Self {
        Self {
            min_interval_millis,
            last_run: Mutex::new(None),
        }
    }

    /// True (and the run is recorded) when the interval has elapsed since
    /// the last recorded run, or when nothing ran yet.
    pub fn try_claim(&self, now_millis: u64) -> bool {
        let mut last = self.last_run.lock().unwrap_or_else(PoisonError::into_inner);
        let due = match *last {
            Some(prev) => now_millis.saturating_sub(prev) >= self.min_interval_millis,
            None => true,
        };
        if due {
            *last = Some(now_millis);
        }
        due
    }

    pub fn last_run(&self) -> Option<u64> {
        *self.last_run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
