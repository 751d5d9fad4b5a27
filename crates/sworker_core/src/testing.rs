//! Test doubles: a scripted network, a storage that always fails and one
//! that refuses to delete a single entry.

use std::{
    collections::{HashMap, HashSet},
    io,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use sworker_cache::{
    CacheStorage, MemoryPartition, MemoryStorage, Partition, RequestKey, StoreError,
};
use sworker_config::SworkerConfig;
use sworker_http::{FetchError, FetchRequest, FetchResponse, Fetcher, responses};

pub(crate) const SCOPE: &str = "http://127.0.0.1:8080/";
pub(crate) const CDN_LIB: &str = "https://cdn.example/lib.js";

pub(crate) const DAY_MILLIS: u64 = 24 * 60 * 60 * 1000;

/// Small config: two static assets and one CDN asset.
pub(crate) fn test_config() -> SworkerConfig {
    let mut cfg = SworkerConfig::default();
    cfg.worker.scope = SCOPE.into();
    cfg.assets.static_assets = vec!["./".into(), "index.html".into()];
    cfg.assets.cdn_assets = vec![CDN_LIB.into()];
    cfg
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedFetcher {
    routes: Mutex<HashMap<String, FetchResponse>>,
    panics: Mutex<HashSet<String>>,
    offline: AtomicBool,
    calls: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fetcher that already knows the test bundle and the CDN asset.
    pub(crate) fn with_bundle() -> Self {
        let fetcher = Self::new();
        fetcher.serve(SCOPE, FetchResponse::ok("text/html", "<html>root</html>"));
        fetcher.serve(
            &format!("{SCOPE}index.html"),
            FetchResponse::ok("text/html", "<html>index</html>"),
        );
        fetcher.serve(CDN_LIB, FetchResponse::ok("text/javascript", "lib()"));
        fetcher
    }

    pub(crate) fn serve(&self, url: &str, response: FetchResponse) {
        self.routes
            .lock()
            .expect("routes")
            .insert(url.to_string(), response);
    }

    /// Panic on the next fetch of `url` only.
    pub(crate) fn panic_once(&self, url: &str) {
        self.panics.lock().expect("panics").insert(url.to_string());
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn calls_for(&self, url: &str) -> usize {
        self.log
            .lock()
            .expect("log")
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .expect("log")
            .push(request.url().to_string());

        let should_panic = self.panics.lock().expect("panics").remove(request.url());
        if should_panic {
            panic!("scripted panic for {}", request.url());
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Offline);
        }

        let routed = self.routes.lock().expect("routes").get(request.url()).cloned();
        Ok(routed.unwrap_or_else(responses::not_found))
    }
}

fn broken() -> StoreError {
    StoreError::Io(io::Error::other("storage unavailable"))
}

#[derive(Debug, Clone, Default)]
pub(crate) struct BrokenStorage;

#[derive(Debug, Clone, Default)]
pub(crate) struct BrokenPartition;

impl Partition for BrokenPartition {
    fn name(&self) -> &str {
        "broken"
    }

    async fn get(&self, _key: &RequestKey) -> Result<Option<FetchResponse>, StoreError> {
        Err(broken())
    }

    async fn put(&self, _key: RequestKey, _response: FetchResponse) -> Result<(), StoreError> {
        Err(broken())
    }

    async fn delete(&self, _key: &RequestKey) -> Result<bool, StoreError> {
        Err(broken())
    }

    async fn keys(&self) -> Result<Vec<RequestKey>, StoreError> {
        Err(broken())
    }
}

impl CacheStorage for BrokenStorage {
    type Partition = BrokenPartition;

    async fn open(&self, _name: &str) -> Result<BrokenPartition, StoreError> {
        Err(broken())
    }

    async fn names(&self) -> Result<Vec<String>, StoreError> {
        Err(broken())
    }

    async fn remove(&self, _name: &str) -> Result<bool, StoreError> {
        Err(broken())
    }

    async fn lookup(&self, _key: &RequestKey) -> Result<Option<FetchResponse>, StoreError> {
        Err(broken())
    }
}

/// Memory storage whose partitions fail to delete one chosen URL.
#[derive(Debug, Clone)]
pub(crate) struct StickyStorage {
    inner: MemoryStorage,
    sticky_url: String,
}

impl StickyStorage {
    pub(crate) fn new(inner: MemoryStorage, sticky_url: &str) -> Self {
        Self {
            inner,
            sticky_url: sticky_url.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StickyPartition {
    inner: MemoryPartition,
    sticky_url: String,
}

impl Partition for StickyPartition {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get(&self, key: &RequestKey) -> Result<Option<FetchResponse>, StoreError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: RequestKey, response: FetchResponse) -> Result<(), StoreError> {
        self.inner.put(key, response).await
    }

    async fn delete(&self, key: &RequestKey) -> Result<bool, StoreError> {
        if key.url() == self.sticky_url {
            return Err(broken());
        }
        self.inner.delete(key).await
    }

    async fn keys(&self) -> Result<Vec<RequestKey>, StoreError> {
        self.inner.keys().await
    }
}

impl CacheStorage for StickyStorage {
    type Partition = StickyPartition;

    async fn open(&self, name: &str) -> Result<StickyPartition, StoreError> {
        Ok(StickyPartition {
            inner: self.inner.open(name).await?,
            sticky_url: self.sticky_url.clone(),
        })
    }

    async fn names(&self) -> Result<Vec<String>, StoreError> {
        self.inner.names().await
    }

    async fn remove(&self, name: &str) -> Result<bool, StoreError> {
        self.inner.remove(name).await
    }

    async fn lookup(&self, key: &RequestKey) -> Result<Option<FetchResponse>, StoreError> {
        self.inner.lookup(key).await
    }
}
