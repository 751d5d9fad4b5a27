use serde::Deserialize;

// =======================================================
// WORKER CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker version; suffixes every partition name.
    pub version: String,
    /// Absolute base URL of the application, ending with `/`.
    pub scope: String,
    /// Activate right after install even when an older version controls pages.
    pub auto_skip_waiting: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            version: "1.0.0".into(),
            scope: "http://127.0.0.1:8080/".into(),
            auto_skip_waiting: false,
        }
    }
}

impl WorkerConfig {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn auto_skip_waiting(&self) -> bool {
        self.auto_skip_waiting
    }

    /// Resolve a bundle-relative path (`./`, `index.html`, `libs/x.js`)
    /// against the scope. Absolute URLs are returned untouched.
    pub fn resolve(&self, path: &str) -> String {
        if path.contains("://") {
            return path.to_string();
        }
        let rel = path.trim_start_matches("./").trim_start_matches('/');
        if self.scope.ends_with('/') {
            format!("{}{}", self.scope, rel)
        } else {
            format!("{}/{}", self.scope, rel)
        }
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &WorkerConfig) {
        if self.version.trim().is_empty() {
            self.version = defaults.version.clone();
        }
        if self.scope.trim().is_empty() {
            self.scope = defaults.scope.clone();
        }
    }
}
