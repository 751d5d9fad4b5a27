//! Event table: every platform event a worker version receives goes through
//! [`Worker::dispatch`].

use serde::Deserialize;
use sworker_cache::CacheStorage;
use sworker_http::Fetcher;
use tracing::{debug, error, info, warn};

use crate::{
    interceptor::{FetchEvent, Interception},
    lifecycle::{ActivateReport, InstallReport},
    notify::{Notification, click_target},
    sweeper::SweepReport,
    worker::Worker,
};

/// Reserved for data sync; currently a no-op.
pub const BACKGROUND_SYNC: &str = "background-sync";
/// Runs the CDN sweeper.
pub const CACHE_CLEANUP: &str = "cache-cleanup";

/// Structured message posted by a page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    SkipWaiting,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(FetchEvent),
    Message(ClientMessage),
    Sync(String),
    Push(Option<String>),
    NotificationClick(String),
    Error(String),
}

impl WorkerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerEvent::Install => "install",
            WorkerEvent::Activate => "activate",
            WorkerEvent::Fetch(_) => "fetch",
            WorkerEvent::Message(_) => "message",
            WorkerEvent::Sync(_) => "sync",
            WorkerEvent::Push(_) => "push",
            WorkerEvent::NotificationClick(_) => "notificationclick",
            WorkerEvent::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub enum WorkerOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Rejected(String),
    Responded(Interception),
    /// Fetch not intercepted.
    PassThrough,
    /// The page asked this version to stop waiting.
    SkipWaiting,
    Swept(SweepReport),
    Ignored,
    Notify(Notification),
    OpenWindow(Option<String>),
}

impl<S, F> Worker<S, F>
where
    S: CacheStorage + Clone + 'static,
    F: Fetcher + Clone + 'static,
{
    pub async fn dispatch(&self, event: WorkerEvent) -> WorkerOutcome {
        debug!(target: "sworker::dispatch", version = %self.version(), kind = event.kind(), "Dispatching event");

        match event {
            WorkerEvent::Install => WorkerOutcome::Installed(self.install().await),
            WorkerEvent::Activate => match self.activate().await {
                Ok(report) => WorkerOutcome::Activated(report),
                Err(err) => WorkerOutcome::Rejected(err.to_string()),
            },
            WorkerEvent::Fetch(fetch) => match self.intercept(fetch).await {
                Some(interception) => WorkerOutcome::Responded(interception),
                None => WorkerOutcome::PassThrough,
            },
            WorkerEvent::Message(ClientMessage::SkipWaiting) => WorkerOutcome::SkipWaiting,
            WorkerEvent::Message(ClientMessage::Unknown) => {
                debug!(target: "sworker::dispatch", "Unknown client message ignored");
                WorkerOutcome::Ignored
            }
            WorkerEvent::Sync(tag) => self.on_sync(&tag).await,
            WorkerEvent::Push(payload) => {
                info!(target: "sworker::dispatch", "Push message received");
                WorkerOutcome::Notify(Notification::for_push(
                    &self.settings().notification,
                    payload.as_deref(),
                    self.clock().now_millis(),
                ))
            }
            WorkerEvent::NotificationClick(action) => {
                info!(target: "sworker::dispatch", %action, "Notification clicked");
                let target = click_target(&action, &self.settings().open_url);
                WorkerOutcome::OpenWindow(target.map(str::to_string))
            }
            WorkerEvent::Error(message) => {
                error!(target: "sworker::dispatch", version = %self.version(), error = %message, "Worker error reported");
                WorkerOutcome::Ignored
            }
        }
    }

    async fn on_sync(&self, tag: &str) -> WorkerOutcome {
        match tag {
            CACHE_CLEANUP => WorkerOutcome::Swept(self.sweep().await),
            BACKGROUND_SYNC => {
                debug!(target: "sworker::dispatch", %tag, "Background sync has no work yet");
                WorkerOutcome::Ignored
            }
            other => {
                warn!(target: "sworker::dispatch", tag = %other, "Unknown sync tag ignored");
                WorkerOutcome::Ignored
            }
        }
    }
}
