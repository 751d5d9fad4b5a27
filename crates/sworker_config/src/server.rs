use serde::Deserialize;

// =======================================================
// SERVER (GATEWAY) CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    /// Directory holding the application bundle (the origin).
    pub bundle_root: String,
    /// How often the cleanup timer wakes up.
    pub cleanup_check_secs: u64,
    /// Minimum spacing between two `cache-cleanup` triggers.
    pub cleanup_min_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".into(),
            bundle_root: "./public".into(),
            cleanup_check_secs: 60 * 60,
            cleanup_min_interval_secs: 24 * 60 * 60,
        }
    }
}

impl ServerConfig {
    pub fn listen(&self) -> &str {
        &self.listen
    }

    pub fn bundle_root(&self) -> &str {
        &self.bundle_root
    }

    pub fn cleanup_check_secs(&self) -> u64 {
        self.cleanup_check_secs
    }

    pub fn cleanup_min_interval_secs(&self) -> u64 {
        self.cleanup_min_interval_secs
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &ServerConfig) {
        if self.listen.trim().is_empty() {
            self.listen = defaults.listen.clone();
        }
        if self.bundle_root.trim().is_empty() {
            self.bundle_root = defaults.bundle_root.clone();
        }
        if self.cleanup_check_secs == 0 {
            self.cleanup_check_secs = defaults.cleanup_check_secs;
        }
    }
}
