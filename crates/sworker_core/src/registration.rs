//! Holder of the active and waiting worker versions.
//!
//! A version that finishes install while another one is active waits until
//! the page sends `SKIP_WAITING` (or the config auto-skips). Pages learn about
//! transitions through [`ClientEvent`]s.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use serde::Serialize;
use sworker_cache::CacheStorage;
use sworker_http::Fetcher;
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tracing::{debug, info};

use crate::{
    dispatch::{CACHE_CLEANUP, ClientMessage, WorkerEvent, WorkerOutcome},
    interceptor::{FetchEvent, Interception},
    lifecycle::{ActivateReport, InstallReport, WorkerState},
    sweeper::{CleanupSchedule, SweepReport},
    worker::Worker,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;
/// Events kept for polling pages; older ones are dropped.
const EVENT_LOG_CAPACITY: usize = 256;

/// Lifecycle notifications for controlled pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientEvent {
    UpdateFound { version: String },
    Installed { version: String },
    ControllerChange { version: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionStatus {
    pub version: String,
    pub state: WorkerState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationStatus {
    pub scope: String,
    pub active: Option<VersionStatus>,
    pub waiting: Option<VersionStatus>,
}

/// Bounded event history addressed by absolute index.
#[derive(Debug, Default)]
struct EventLog {
    /// Absolute index of `events[0]`.
    first: usize,
    events: VecDeque<ClientEvent>,
}

impl EventLog {
    fn push(&mut self, event: ClientEvent) {
        if self.events.len() == EVENT_LOG_CAPACITY {
            self.events.pop_front();
            self.first += 1;
        }
        self.events.push_back(event);
    }

    /// A cursor older than the retained window gets everything still kept.
    fn since(&self, since: usize) -> Vec<ClientEvent> {
        let skip = since.saturating_sub(self.first);
        self.events.iter().skip(skip).cloned().collect()
    }
}

struct Slots<S, F> {
    active: Option<Arc<Worker<S, F>>>,
    waiting: Option<Arc<Worker<S, F>>>,
}

pub struct Registration<S, F> {
    scope: String,
    slots: RwLock<Slots<S, F>>,
    /// Serialises install and activation so two versions never swap at once.
    transition: AsyncMutex<()>,
    events: Mutex<EventLog>,
    notifier: broadcast::Sender<ClientEvent>,
}

impl<S, F> Registration<S, F>
where
    S: CacheStorage + Clone + 'static,
    F: Fetcher + Clone + 'static,
{
    pub fn new(scope: impl Into<String>) -> Self {
        let (notifier, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            scope: scope.into(),
            slots: RwLock::new(Slots {
                active: None,
                waiting: None,
            }),
            transition: AsyncMutex::new(()),
            events: Mutex::new(EventLog::default()),
            notifier,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn active(&self) -> Option<Arc<Worker<S, F>>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .clone()
    }

    pub fn waiting(&self) -> Option<Arc<Worker<S, F>>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .waiting
            .clone()
    }

    /// Install `worker`. With no active version it activates right away;
    /// otherwise it waits.
    pub async fn install(&self, worker: Worker<S, F>) -> anyhow::Result<InstallReport> {
        let worker = Arc::new(worker);
        let _transition = self.transition.lock().await;

        let replacing = self.active().is_some();
        if replacing {
            self.emit(ClientEvent::UpdateFound {
                version: worker.version().to_string(),
            });
        }

        let report = worker.install().await;

        if !replacing {
            self.promote(worker).await?;
            return Ok(report);
        }

        let displaced = self
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .waiting
            .replace(worker.clone());
        if let Some(old) = displaced {
            old.mark_redundant();
        }
        self.emit(ClientEvent::Installed {
            version: worker.version().to_string(),
        });

        if worker.settings().auto_skip_waiting {
            self.promote_waiting().await?;
        }
        Ok(report)
    }

    /// Deliver a page message to the waiting version.
    pub async fn post_message(
        &self,
        message: ClientMessage,
    ) -> anyhow::Result<Option<ActivateReport>> {
        let Some(waiting) = self.waiting() else {
            debug!(target: "sworker::registration", ?message, "No waiting worker; message dropped");
            return Ok(None);
        };

        match waiting.dispatch(WorkerEvent::Message(message)).await {
            WorkerOutcome::SkipWaiting => self.skip_waiting().await,
            _ => Ok(None),
        }
    }

    /// Activate the waiting version now, if there is one.
    pub async fn skip_waiting(&self) -> anyhow::Result<Option<ActivateReport>> {
        let _transition = self.transition.lock().await;
        self.promote_waiting().await
    }

    /// Route a fetch to the active version; `None` means pass through.
    pub async fn fetch(&self, event: FetchEvent) -> Option<Interception> {
        let active = self.active()?;
        active.intercept(event).await
    }

    /// Deliver an event to the active version; `None` without one.
    pub async fn dispatch(&self, event: WorkerEvent) -> Option<WorkerOutcome> {
        let active = self.active()?;
        Some(active.dispatch(event).await)
    }

    /// Deliver `cache-cleanup` when the schedule says it is due.
    pub async fn cleanup_if_due(
        &self,
        schedule: &CleanupSchedule,
        now_millis: u64,
    ) -> Option<SweepReport> {
        if !schedule.try_claim(now_millis) {
            return None;
        }
        match self.dispatch(WorkerEvent::Sync(CACHE_CLEANUP.into())).await? {
            WorkerOutcome::Swept(report) => Some(report),
            _ => None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.notifier.subscribe()
    }

    /// Events emitted since absolute index `since` (0 = all still kept).
    pub fn events_since(&self, since: usize) -> Vec<ClientEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .since(since)
    }

    pub fn status(&self) -> RegistrationStatus {
        let describe = |w: &Arc<Worker<S, F>>| VersionStatus {
            version: w.version().to_string(),
            state: w.state(),
        };
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        RegistrationStatus {
            scope: self.scope.clone(),
            active: slots.active.as_ref().map(describe),
            waiting: slots.waiting.as_ref().map(describe),
        }
    }

    async fn promote_waiting(&self) -> anyhow::Result<Option<ActivateReport>> {
        let waiting = self
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .waiting
            .take();
        match waiting {
            Some(worker) => self.promote(worker).await.map(Some),
            None => Ok(None),
        }
    }

    /// Activate `worker`, then make it the controller.
    async fn promote(&self, worker: Arc<Worker<S, F>>) -> anyhow::Result<ActivateReport> {
        let report = match worker.activate().await {
            Ok(report) => report,
            Err(err) => {
                worker.mark_redundant();
                return Err(err);
            }
        };

        let previous = self
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .replace(worker.clone());
        if let Some(previous) = previous {
            previous.mark_redundant();
        }

        self.emit(ClientEvent::ControllerChange {
            version: worker.version().to_string(),
        });
        Ok(report)
    }

    fn emit(&self, event: ClientEvent) {
        info!(target: "sworker::registration", event = ?event, "Client event");
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        // No subscribers is fine; the log keeps the event for polling pages.
        let _ = self.notifier.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        settings::WorkerSettings,
        testing::{DAY_MILLIS, SCOPE, ScriptedFetcher, test_config},
    };
    use sworker_cache::MemoryStorage;
    use sworker_http::FetchRequest;

    type TestWorker = Worker<MemoryStorage, Arc<ScriptedFetcher>>;

    struct Env {
        storage: MemoryStorage,
        fetcher: Arc<ScriptedFetcher>,
        clock: Arc<ManualClock>,
    }

    impl Env {
        fn new() -> Self {
            Self {
                storage: MemoryStorage::new(),
                fetcher: Arc::new(ScriptedFetcher::with_bundle()),
                clock: Arc::new(ManualClock::new(0)),
            }
        }

        fn worker(&self, version: &str, auto_skip: bool) -> TestWorker {
            let mut cfg = test_config();
            cfg.worker.auto_skip_waiting = auto_skip;
            Worker::new(
                WorkerSettings::for_version(&cfg, version),
                self.storage.clone(),
                self.fetcher.clone(),
                self.clock.clone(),
            )
        }
    }

    fn registration() -> Registration<MemoryStorage, Arc<ScriptedFetcher>> {
        Registration::new(SCOPE)
    }

    #[tokio::test]
    async fn first_version_activates_immediately() {
        let env = Env::new();
        let reg = registration();

        reg.install(env.worker("1.0.0", false)).await.expect("install");

        let status = reg.status();
        assert_eq!(
            status.active,
            Some(VersionStatus {
                version: "1.0.0".into(),
                state: WorkerState::Active
            })
        );
        assert_eq!(status.waiting, None);
        assert_eq!(
            reg.events_since(0),
            vec![ClientEvent::ControllerChange {
                version: "1.0.0".into()
            }]
        );
    }

    #[tokio::test]
    async fn update_waits_for_skip_waiting_message() {
        let env = Env::new();
        let reg = registration();
        reg.install(env.worker("1.0.0", false)).await.expect("v1");
        let v1 = reg.active().expect("v1 active");

        reg.install(env.worker("1.1.0", false)).await.expect("v2");
        assert_eq!(reg.active().expect("active").version(), "1.0.0");
        assert_eq!(reg.waiting().expect("waiting").state(), WorkerState::Installed);
        assert_eq!(
            reg.events_since(1),
            vec![
                ClientEvent::UpdateFound {
                    version: "1.1.0".into()
                },
                ClientEvent::Installed {
                    version: "1.1.0".into()
                },
            ]
        );

        let report = reg
            .post_message(ClientMessage::SkipWaiting)
            .await
            .expect("skip waiting")
            .expect("activated");
        assert_eq!(report.deleted, vec!["static-v1.0.0".to_string()]);
        assert_eq!(reg.active().expect("active").version(), "1.1.0");
        assert!(reg.waiting().is_none());
        assert_eq!(v1.state(), WorkerState::Redundant);
        assert_eq!(
            reg.events_since(3),
            vec![ClientEvent::ControllerChange {
                version: "1.1.0".into()
            }]
        );
    }

    #[tokio::test]
    async fn auto_skip_waiting_activates_update_at_once() {
        let env = Env::new();
        let reg = registration();
        reg.install(env.worker("1.0.0", false)).await.expect("v1");
        reg.install(env.worker("1.1.0", true)).await.expect("v2");

        assert_eq!(reg.active().expect("active").version(), "1.1.0");
        assert!(reg.waiting().is_none());
    }

    #[tokio::test]
    async fn messages_without_waiting_worker_do_nothing() {
        let env = Env::new();
        let reg = registration();
        reg.install(env.worker("1.0.0", false)).await.expect("v1");

        let result = reg.post_message(ClientMessage::SkipWaiting).await.expect("message");
        assert!(result.is_none());
        assert_eq!(reg.active().expect("active").version(), "1.0.0");
    }

    #[tokio::test]
    async fn no_active_version_means_pass_through() {
        let reg = registration();
        let event = FetchEvent::new(FetchRequest::get(format!("{SCOPE}index.html")));
        assert!(reg.fetch(event).await.is_none());
        assert!(reg.dispatch(WorkerEvent::Sync(CACHE_CLEANUP.into())).await.is_none());
    }

    #[tokio::test]
    async fn subscribers_see_controller_change() {
        let env = Env::new();
        let reg = registration();
        let mut events = reg.subscribe();

        reg.install(env.worker("1.0.0", false)).await.expect("v1");
        assert_eq!(
            events.recv().await.expect("event"),
            ClientEvent::ControllerChange {
                version: "1.0.0".into()
            }
        );
    }

    #[tokio::test]
    async fn cleanup_runs_once_per_interval() {
        let env = Env::new();
        let reg = registration();
        reg.install(env.worker("1.0.0", false)).await.expect("v1");
        let schedule = CleanupSchedule::new(DAY_MILLIS);

        assert!(reg.cleanup_if_due(&schedule, DAY_MILLIS).await.is_some());
        assert!(reg.cleanup_if_due(&schedule, DAY_MILLIS + 1).await.is_none());
        assert!(reg.cleanup_if_due(&schedule, 2 * DAY_MILLIS).await.is_some());
    }

    #[test]
    fn event_log_keeps_only_the_newest_events() {
        let reg: Registration<MemoryStorage, Arc<ScriptedFetcher>> = Registration::new(SCOPE);
        let total = EVENT_LOG_CAPACITY + 44;
        for n in 0..total {
            reg.emit(ClientEvent::Installed {
                version: n.to_string(),
            });
        }

        let kept = reg.events_since(0);
        assert_eq!(kept.len(), EVENT_LOG_CAPACITY);
        assert_eq!(
            kept[0],
            ClientEvent::Installed {
                version: "44".into()
            }
        );
        assert_eq!(
            reg.events_since(total - 1),
            vec![ClientEvent::Installed {
                version: (total - 1).to_string()
            }]
        );
        assert!(reg.events_since(total).is_empty());
    }

    #[test]
    fn client_events_serialize_with_dom_names() {
        let json = serde_json::to_value(ClientEvent::ControllerChange {
            version: "1.0.0".into(),
        })
        .expect("serialize");
        assert_eq!(json["type"], "controllerchange");
        let json = serde_json::to_value(ClientEvent::UpdateFound {
            version: "1.0.0".into(),
        })
        .expect("serialize");
        assert_eq!(json["type"], "updatefound");
    }
}
