//! Offline caching worker.
//!
//! A [`Worker`] is one version of the worker: it classifies every request,
//! answers it from the right cache partition or the network, and handles
//! the install/activate lifecycle, cache sweeps, push messages and
//! notification clicks through a single [`Worker::dispatch`] table. A
//! [`Registration`] holds the active and waiting versions, and the
//! [`gateway::Gateway`] serves the whole thing over HTTP.

pub mod classify;
pub mod clock;
pub mod dispatch;
pub mod gateway;
pub mod interceptor;
pub mod lifecycle;
pub mod notify;
pub mod registration;
pub mod settings;
pub mod sweeper;
pub mod worker;

#[cfg(test)]
mod testing;

pub use classify::{CdnAssets, RequestClass, SkipReason, classify};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatch::{BACKGROUND_SYNC, CACHE_CLEANUP, ClientMessage, WorkerEvent, WorkerOutcome};
pub use interceptor::{FetchEvent, Interception, Interceptor, Outcome};
pub use lifecycle::{ActivateReport, AssetFailure, InstallReport, WorkerState};
pub use notify::Notification;
pub use registration::{ClientEvent, Registration, RegistrationStatus, VersionStatus};
pub use settings::WorkerSettings;
pub use sweeper::{CleanupSchedule, SweepReport, Sweeper};
pub use worker::Worker;
