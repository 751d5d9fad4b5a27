use std::time::Duration;

use sworker_cache::FreshnessPolicy;
use sworker_config::{NotificationConfig, PartitionNames, SworkerConfig};

use crate::classify::CdnAssets;

/// Everything one worker version needs to know, resolved once from config.
///
/// Static paths and the navigation fallback are stored as absolute URLs.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub version: String,
    pub scope: String,
    pub names: PartitionNames,
    pub static_assets: Vec<String>,
    pub cdn: CdnAssets,
    pub navigation_fallback: Option<String>,
    pub policy: FreshnessPolicy,
    pub auto_skip_waiting: bool,
    pub notification: NotificationConfig,
    pub open_url: String,
}

impl WorkerSettings {
    pub fn from_config(cfg: &SworkerConfig) -> Self {
        let worker = cfg.worker();
        let assets = cfg.assets();

        Self {
            version: worker.version().to_string(),
            scope: worker.scope().to_string(),
            names: cfg.partition_names(),
            static_assets: assets
                .static_assets()
                .iter()
                .map(|path| worker.resolve(path))
                .collect(),
            cdn: CdnAssets::new(assets.cdn_assets().iter().cloned()),
            navigation_fallback: assets.navigation_fallback().map(|path| worker.resolve(path)),
            policy: FreshnessPolicy::new(Duration::from_secs(cfg.cache().expiry_secs())),
            auto_skip_waiting: worker.auto_skip_waiting(),
            notification: cfg.notification().clone(),
            open_url: worker.resolve(cfg.notification().open_url()),
        }
    }

    /// Same configuration under another version label.
    pub fn for_version(cfg: &SworkerConfig, version: &str) -> Self {
        let mut cfg = cfg.clone();
        cfg.worker.version = version.to_string();
        Self::from_config(&cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_assets_resolve_against_scope() {
        let settings = WorkerSettings::from_config(&SworkerConfig::default());
        assert_eq!(settings.static_assets[0], "http://127.0.0.1:8080/");
        assert_eq!(settings.static_assets[1], "http://127.0.0.1:8080/index.html");
        assert_eq!(
            settings.navigation_fallback.as_deref(),
            Some("http://127.0.0.1:8080/index.html")
        );
        assert_eq!(settings.open_url, "http://127.0.0.1:8080/");
        assert_eq!(settings.cdn.len(), 7);
    }

    #[test]
    fn version_label_drives_partition_names() {
        let settings = WorkerSettings::for_version(&SworkerConfig::default(), "1.1.0");
        assert_eq!(settings.version, "1.1.0");
        assert_eq!(settings.names.cdn_name(), "cdn-v1.1.0");
    }
}
