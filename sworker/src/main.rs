use std::sync::Arc;

use anyhow::{Context, bail};
use sworker_cache::{CacheStorage, DiskStorage, MemoryStorage};
use sworker_config::{StorageKind, SworkerConfig};
use sworker_core::{Clock, Registration, SystemClock, Worker, WorkerSettings, gateway::Gateway};
use sworker_http::{AppNetwork, OriginFetcher, RemoteFetcher};
use tracing::{info, warn};
use utils::init_tracing;

const DEFAULT_CONFIG_FILE: &str = "sworker.toml";
const DEFAULT_CACHE_DIR: &str = "./.sworker-cache";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_file = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

    let cfg = SworkerConfig::from_file_or_default(&config_file);
    init_tracing(cfg.global().log_level());

    let report = cfg.validate();
    for warning in report.warnings() {
        warn!(target: "sworker::config", "{warning}");
    }
    if report.has_errors() {
        bail!("invalid configuration in '{config_file}':\n{}", report.format());
    }
    cfg.print();

    let network = AppNetwork::new(
        OriginFetcher::new(cfg.worker().scope(), cfg.server().bundle_root()),
        RemoteFetcher::new().context("building remote HTTP client")?,
    );

    let limit = cfg.cache().max_entry_bytes();
    match cfg.cache().storage() {
        StorageKind::Memory => run(cfg, MemoryStorage::with_max_entry_bytes(limit), network).await,
        StorageKind::Disk => {
            let dir = cfg.cache().dir().unwrap_or(DEFAULT_CACHE_DIR).to_string();
            info!(target: "sworker::cache", dir = %dir, "Using disk cache storage");
            run(cfg, DiskStorage::with_max_entry_bytes(dir, limit), network).await
        }
    }
}

/// Install the configured version into a fresh registration and serve it.
async fn run<S>(cfg: SworkerConfig, storage: S, network: AppNetwork) -> anyhow::Result<()>
where
    S: CacheStorage + Clone + 'static,
{
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registration = Arc::new(Registration::new(cfg.worker().scope()));

    let worker = Worker::new(
        WorkerSettings::from_config(&cfg),
        storage,
        network.clone(),
        clock.clone(),
    );
    let report = registration
        .install(worker)
        .await
        .context("installing worker")?;

    info!(
        target: "sworker::lifecycle",
        version = %cfg.worker().version(),
        cached = report.cached.len(),
        failed = report.failed.len(),
        "Worker installed"
    );
    for failure in &report.failed {
        warn!(
            target: "sworker::lifecycle",
            url = %failure.url,
            reason = %failure.reason,
            "Static asset not precached"
        );
    }

    Gateway::new(&cfg, registration, network, clock).run().await
}
