//! Fetch interception: classifies each request, runs the matching retrieval
//! strategy and guarantees a response for every intercepted request.

use std::{fmt, sync::Arc};

use http::StatusCode;
use sworker_cache::{CacheStorage, FreshnessPolicy, Partition, RequestKey, StoreError, stamp};
use sworker_http::{FetchRequest, FetchResponse, Fetcher, responses};
use tracing::{debug, error, warn};

use crate::{
    classify::{RequestClass, classify},
    clock::Clock,
    settings::WorkerSettings,
};

/// A request reaching the worker, plus what is known about the page that
/// issued it.
#[derive(Debug, Clone)]
pub struct FetchEvent {
    pub request: FetchRequest,
    /// The issuing document was opened from the local filesystem.
    pub from_local_file: bool,
}

impl FetchEvent {
    pub fn new(request: FetchRequest) -> Self {
        Self {
            request,
            from_local_file: false,
        }
    }

    pub fn from_local_file(mut self, from_local_file: bool) -> Self {
        self.from_local_file = from_local_file;
        self
    }
}

/// How an intercepted request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Straight from the network.
    ServedFresh,
    /// CDN network attempt failed; the cached copy was served.
    ServedStale { expired: bool },
    /// CDN asset neither reachable nor cached (404).
    ServedNone,
    /// Cache hit, no network involved.
    ServedCached,
    /// Navigation failed offline; the cached fallback document was served.
    ServedFallback,
    /// Network failed and nothing was cached (503).
    ServedError,
    /// The strategy failed; a direct network retry answered.
    Recovered,
    /// The strategy and the retry both failed (500).
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Outcome::ServedFresh => "served-fresh",
            Outcome::ServedStale { expired: false } => "served-stale",
            Outcome::ServedStale { expired: true } => "served-expired",
            Outcome::ServedNone => "served-none",
            Outcome::ServedCached => "served-cached",
            Outcome::ServedFallback => "served-fallback",
            Outcome::ServedError => "served-error",
            Outcome::Recovered => "recovered",
            Outcome::Failed => "failed",
        };
        f.write_str(tag)
    }
}

#[derive(Debug, Clone)]
pub struct Interception {
    pub response: FetchResponse,
    pub outcome: Outcome,
}

impl Interception {
    fn new(response: FetchResponse, outcome: Outcome) -> Self {
        Self { response, outcome }
    }
}

#[derive(Debug, Clone, Copy)]
enum Strategy {
    NetworkFirst,
    CacheFirst,
}

pub struct Interceptor<S, F> {
    settings: Arc<WorkerSettings>,
    storage: S,
    fetcher: F,
    clock: Arc<dyn Clock>,
}

impl<S, F> Interceptor<S, F>
where
    S: CacheStorage + 'static,
    F: Fetcher + 'static,
{
    pub fn new(settings: Arc<WorkerSettings>, storage: S, fetcher: F, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            storage,
            fetcher,
            clock,
        }
    }

    /// `None` means the request is not intercepted and must go out unmodified.
    pub async fn handle(self: &Arc<Self>, event: FetchEvent) -> Option<Interception> {
        let strategy = match classify(&event.request, &self.settings.cdn, event.from_local_file) {
            RequestClass::Cdn => Strategy::NetworkFirst,
            RequestClass::CacheFirst => Strategy::CacheFirst,
            RequestClass::Skip(reason) => {
                debug!(
                    target: "sworker::interceptor",
                    method = %event.request.method(),
                    url = %event.request.url(),
                    %reason,
                    "Request not intercepted"
                );
                return None;
            }
        };

        let interception = self.guarded(event.request, strategy).await;
        debug!(
            target: "sworker::interceptor",
            status = interception.response.status().as_u16(),
            outcome = %interception.outcome,
            "Request answered"
        );
        Some(interception)
    }

    /// Runs the strategy on its own task so both errors and panics end up
    /// here instead of unwinding through the caller.
    async fn guarded(self: &Arc<Self>, request: FetchRequest, strategy: Strategy) -> Interception {
        let this = Arc::clone(self);
        let req = request.clone();
        let task = tokio::spawn(async move { this.run(&req, strategy).await });

        let failure = match task.await {
            Ok(Ok(interception)) => return interception,
            Ok(Err(err)) => format!("{err:#}"),
            Err(join_err) => join_err.to_string(),
        };

        warn!(
            target: "sworker::interceptor",
            url = %request.url(),
            error = %failure,
            "Strategy failed; retrying network directly"
        );

        match self.fetcher.fetch(&request).await {
            Ok(response) => Interception::new(response, Outcome::Recovered),
            Err(err) => {
                error!(
                    target: "sworker::interceptor",
                    url = %request.url(),
                    error = %err,
                    "Network retry failed; answering 500"
                );
                Interception::new(responses::internal_error(), Outcome::Failed)
            }
        }
    }

    async fn run(&self, request: &FetchRequest, strategy: Strategy) -> anyhow::Result<Interception> {
        match strategy {
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::CacheFirst => self.cache_first(request).await,
        }
    }

    /// CDN assets: network, then any cached copy, then a 404 sentinel.
    async fn network_first(&self, request: &FetchRequest) -> anyhow::Result<Interception> {
        let key = RequestKey::from_request(request);
        let partition = self.settings.names.cdn_name();

        match self.fetcher.fetch(request).await {
            Ok(response) if response.is_ok() && FreshnessPolicy::is_cacheable(request.method()) => {
                let stamped = stamp(&response, self.clock.now_millis());
                match self.put_into(partition, key.clone(), stamped).await {
                    Ok(()) => debug!(target: "sworker::interceptor", key = %key, "CDN entry refreshed"),
                    Err(err) => warn!(
                        target: "sworker::interceptor",
                        key = %key,
                        error = %err,
                        "Could not store CDN entry"
                    ),
                }
                return Ok(Interception::new(response, Outcome::ServedFresh));
            }
            Ok(response) => debug!(
                target: "sworker::interceptor",
                key = %key,
                status = response.status().as_u16(),
                "CDN answered with a non-ok status; trying cache"
            ),
            Err(err) => debug!(
                target: "sworker::interceptor",
                key = %key,
                error = %err,
                "CDN fetch failed; trying cache"
            ),
        }

        let cached = self.get_from(partition, &key).await.unwrap_or_else(|err| {
            warn!(target: "sworker::interceptor", key = %key, error = %err, "CDN cache read failed");
            None
        });

        match cached {
            Some(entry) => {
                let expired = !self
                    .settings
                    .policy
                    .is_fresh_entry(&entry, self.clock.now_millis());
                debug!(target: "sworker::interceptor", key = %key, expired, "Serving cached CDN entry");
                Ok(Interception::new(entry, Outcome::ServedStale { expired }))
            }
            None => Ok(Interception::new(responses::cdn_unavailable(), Outcome::ServedNone)),
        }
    }

    /// Static assets and every other GET: cache, then network.
    async fn cache_first(&self, request: &FetchRequest) -> anyhow::Result<Interception> {
        let key = RequestKey::from_request(request);

        let hit = self.storage.lookup(&key).await.unwrap_or_else(|err| {
            warn!(target: "sworker::interceptor", key = %key, error = %err, "Cache lookup failed; treating as miss");
            None
        });
        if let Some(response) = hit {
            return Ok(Interception::new(response, Outcome::ServedCached));
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.status() == StatusCode::OK
                    && FreshnessPolicy::is_cacheable(request.method())
                {
                    let partition = self.settings.names.dynamic_name();
                    if let Err(err) = self.put_into(partition, key.clone(), response.clone()).await {
                        warn!(
                            target: "sworker::interceptor",
                            key = %key,
                            error = %err,
                            "Could not store dynamic entry"
                        );
                    }
                }
                Ok(Interception::new(response, Outcome::ServedFresh))
            }
            Err(err) => {
                warn!(target: "sworker::interceptor", key = %key, error = %err, "Network request failed");
                if request.accepts_html()
                    && let Some(fallback) = self.navigation_fallback().await
                {
                    return Ok(Interception::new(fallback, Outcome::ServedFallback));
                }
                Ok(Interception::new(responses::network_error(), Outcome::ServedError))
            }
        }
    }

    async fn navigation_fallback(&self) -> Option<FetchResponse> {
        let url = self.settings.navigation_fallback.as_deref()?;
        match self.storage.lookup(&RequestKey::get(url)).await {
            Ok(found) => found,
            Err(err) => {
                warn!(target: "sworker::interceptor", url, error = %err, "Fallback lookup failed");
                None
            }
        }
    }

    async fn get_from(
        &self,
        partition: &str,
        key: &RequestKey,
    ) -> Result<Option<FetchResponse>, StoreError> {
        self.storage.open(partition).await?.get(key).await
    }

    async fn put_into(
        &self,
        partition: &str,
        key: RequestKey,
        response: FetchResponse,
    ) -> Result<(), StoreError> {
        self.storage.open(partition).await?.put(key, response).await
    }
}
