use std::{collections::HashSet, net::SocketAddr, path::Path};

use crate::{StorageKind, SworkerConfig};

/// Validation output for a loaded worker configuration.
#[derive(Debug, Default)]
pub struct ConfigReport {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ConfigReport {
    /// Returns true when at least one error was found.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the collected warning messages.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Returns the collected error messages.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Render warnings and errors into a readable, multi-line string.
    pub fn format(&self) -> String {
        let mut out = String::new();
        if !self.errors.is_empty() {
            out.push_str("Errors:\n");
            for err in &self.errors {
                out.push_str("  - ");
                out.push_str(err);
                out.push('\n');
            }
        }
        if !self.warnings.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Warnings:\n");
            for warn in &self.warnings {
                out.push_str("  - ");
                out.push_str(warn);
                out.push('\n');
            }
        }
        out
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Validate a worker configuration and return a report of issues.
pub fn validate(cfg: &SworkerConfig) -> ConfigReport {
    let mut report = ConfigReport::default();

    validate_worker(cfg, &mut report);
    validate_cache(cfg, &mut report);
    validate_assets(cfg, &mut report);
    validate_server(cfg, &mut report);

    report
}

fn is_http_url(raw: &str) -> bool {
    let rest = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.starts_with('/'))
}

fn validate_worker(cfg: &SworkerConfig, report: &mut ConfigReport) {
    if cfg.worker.version.trim().is_empty() {
        report.error("worker.version is empty; partition names need a version suffix");
    }

    let scope = cfg.worker.scope.as_str();
    if !is_http_url(scope) {
        report.error(format!(
            "worker.scope '{scope}' must be an absolute http(s) URL"
        ));
    } else if !scope.ends_with('/') {
        report.error(format!("worker.scope '{scope}' must end with '/'"));
    }
}

fn validate_cache(cfg: &SworkerConfig, report: &mut ConfigReport) {
    if cfg.cache.expiry_secs == 0 {
        report.error("cache.expiry_secs is 0; every CDN entry would be stale");
    }

    if cfg.cache.storage == StorageKind::Disk {
        match cfg.cache.dir.as_deref() {
            None => report.error("cache.storage is 'disk' but cache.dir is not set"),
            Some(dir) => {
                let path = Path::new(dir);
                if path.exists() && !path.is_dir() {
                    report.error(format!(
                        "cache.dir '{dir}' exists but is not a directory"
                    ));
                } else if !path.exists() {
                    report.warn(format!(
                        "cache.dir '{dir}' does not exist; it will be created at runtime"
                    ));
                }
            }
        }
    }

    let names = cfg.partition_names();
    let current = [names.static_name(), names.dynamic_name(), names.cdn_name()];
    let unique: HashSet<&str> = current.iter().copied().collect();
    if unique.len() != current.len() {
        report.error(format!(
            "cache partition names must be distinct, got {current:?}"
        ));
    }

    for retained in &cfg.cache.retained_partitions {
        if current.contains(&retained.as_str()) {
            report.warn(format!(
                "cache.retained_partitions entry '{retained}' is already a current partition"
            ));
        }
        if retained.trim().is_empty() {
            report.error("cache.retained_partitions contains an empty name");
        }
    }
}

fn validate_assets(cfg: &SworkerConfig, report: &mut ConfigReport) {
    if cfg.assets.static_assets.is_empty() {
        report.warn("assets.static is empty; nothing will be available offline after install");
    }

    for (idx, path) in cfg.assets.static_assets.iter().enumerate() {
        if path.trim().is_empty() {
            report.error(format!("assets.static entry at index {idx} is empty"));
        } else if path.contains("://") {
            report.error(format!(
                "assets.static entry '{path}' must be relative to the worker scope"
            ));
        }
    }

    let mut seen = HashSet::new();
    for url in &cfg.assets.cdn_assets {
        if !is_http_url(url) {
            report.error(format!("assets.cdn entry '{url}' is not an absolute http(s) URL"));
        }
        if !seen.insert(url.as_str()) {
            report.warn(format!("assets.cdn entry '{url}' is listed twice"));
        }
    }
}

fn validate_server(cfg: &SworkerConfig, report: &mut ConfigReport) {
    if cfg.server.listen.parse::<SocketAddr>().is_err() {
        report.error(format!(
            "server.listen '{listen}' is not a socket address",
            listen = cfg.server.listen
        ));
    }

    if !Path::new(&cfg.server.bundle_root).is_dir() {
        report.warn(format!(
            "server.bundle_root '{root}' does not exist; same-origin requests will 404",
            root = cfg.server.bundle_root
        ));
    }
}
