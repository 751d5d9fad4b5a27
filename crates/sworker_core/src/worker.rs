use std::sync::{Arc, PoisonError, RwLock};

use anyhow::bail;
use sworker_cache::CacheStorage;
use sworker_config::SworkerConfig;
use sworker_http::Fetcher;
use tracing::{info, warn};

use crate::{
    clock::{Clock, SystemClock},
    interceptor::{FetchEvent, Interception, Interceptor},
    lifecycle::{self, ActivateReport, InstallReport, WorkerState},
    settings::WorkerSettings,
    sweeper::{SweepReport, Sweeper},
};

/// One worker version: its configuration, its view of the partition store
/// and its lifecycle state.
pub struct Worker<S, F> {
    settings: Arc<WorkerSettings>,
    storage: S,
    fetcher: F,
    clock: Arc<dyn Clock>,
    state: RwLock<WorkerState>,
    interceptor: Arc<Interceptor<S, F>>,
    sweeper: Sweeper<S>,
}

impl<S, F> Worker<S, F>
where
    S: CacheStorage + Clone + 'static,
    F: Fetcher + Clone + 'static,
{
    pub fn new(settings: WorkerSettings, storage: S, fetcher: F, clock: Arc<dyn Clock>) -> Self {
        let settings = Arc::new(settings);
        let interceptor = Arc::new(Interceptor::new(
            settings.clone(),
            storage.clone(),
            fetcher.clone(),
            clock.clone(),
        ));
        let sweeper = Sweeper::new(
            storage.clone(),
            settings.names.cdn_name(),
            settings.policy,
            clock.clone(),
        );

        Self {
            settings,
            storage,
            fetcher,
            clock,
            state: RwLock::new(WorkerState::Parsed),
            interceptor,
            sweeper,
        }
    }

    pub fn from_config(cfg: &SworkerConfig, storage: S, fetcher: F) -> Self {
        Self::new(
            WorkerSettings::from_config(cfg),
            storage,
            fetcher,
            Arc::new(SystemClock),
        )
    }

    pub fn version(&self) -> &str {
        &self.settings.version
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: WorkerState) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let prev = *state;
        if prev != next {
            info!(
                target: "sworker::lifecycle",
                version = %self.settings.version,
                from = %prev,
                to = %next,
                "Worker state change"
            );
            *state = next;
        }
    }

    pub(crate) fn mark_redundant(&self) {
        self.set_state(WorkerState::Redundant);
    }

    /// Populate the static partition. Always completes; per-asset failures
    /// are in the report.
    ///
    /// Running it again on an installed or active worker refreshes the
    /// entries without changing state.
    pub async fn install(&self) -> InstallReport {
        let first_run = match self.state() {
            WorkerState::Parsed => {
                self.set_state(WorkerState::Installing);
                true
            }
            WorkerState::Redundant => {
                warn!(target: "sworker::lifecycle", version = %self.settings.version, "Install on redundant worker ignored");
                return InstallReport::default();
            }
            _ => false,
        };

        let report = lifecycle::populate_static(&self.settings, &self.storage, &self.fetcher).await;

        if first_run {
            self.set_state(WorkerState::Installed);
        }
        report
    }

    /// Evict partitions outside the allow-list, then take control.
    pub async fn activate(&self) -> anyhow::Result<ActivateReport> {
        match self.state() {
            WorkerState::Installed => self.set_state(WorkerState::Activating),
            WorkerState::Active => {}
            other => bail!(
                "worker {} cannot activate from state {}",
                self.settings.version,
                other
            ),
        }

        let deleted = lifecycle::evict_unknown_partitions(&self.settings.names, &self.storage).await;
        self.set_state(WorkerState::Active);

        info!(
            target: "sworker::lifecycle",
            version = %self.settings.version,
            deleted = deleted.len(),
            "Worker activated and claimed clients"
        );
        Ok(ActivateReport {
            deleted,
            claimed: true,
        })
    }

    /// Only an active worker intercepts; otherwise the request passes through.
    pub async fn intercept(&self, event: FetchEvent) -> Option<Interception> {
        if !self.state().can_intercept_fetch() {
            return None;
        }
        self.interceptor.handle(event).await
    }

    pub async fn sweep(&self) -> SweepReport {
        self.sweeper.sweep().await
    }
}
