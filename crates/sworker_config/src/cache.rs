use serde::Deserialize;

/// Default CDN expiry window: 7 days.
pub const DEFAULT_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

// =======================================================
// STORAGE KIND (enum tipado)
// =======================================================
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageKind {
    #[default]
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "disk")]
    Disk,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::Memory => write!(f, "memory"),
            StorageKind::Disk => write!(f, "disk"),
        }
    }
}

// =======================================================
// CACHE CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub storage: StorageKind,
    /// Root directory for the disk backend.
    pub dir: Option<String>,
    /// CDN freshness window in seconds.
    pub expiry_secs: u64,
    /// Largest response body a partition accepts.
    pub max_entry_bytes: u64,
    pub static_prefix: String,
    pub dynamic_prefix: String,
    pub cdn_prefix: String,
    /// Extra partition names that survive activation.
    pub retained_partitions: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            storage: StorageKind::Memory,
            dir: None,
            expiry_secs: DEFAULT_EXPIRY_SECS,
            max_entry_bytes: 10 * 1024 * 1024,
            static_prefix: "static".into(),
            dynamic_prefix: "dynamic".into(),
            cdn_prefix: "cdn".into(),
            retained_partitions: Vec::new(),
        }
    }
}

impl CacheConfig {
    pub fn storage(&self) -> StorageKind {
        self.storage
    }

    pub fn dir(&self) -> Option<&str> {
        self.dir.as_deref()
    }

    pub fn expiry_secs(&self) -> u64 {
        self.expiry_secs
    }

    pub fn max_entry_bytes(&self) -> u64 {
        self.max_entry_bytes
    }

    /// Build the versioned partition record for `version`.
    pub fn partition_names(&self, version: &str) -> PartitionNames {
        PartitionNames {
            static_name: format!("{}-v{}", self.static_prefix, version),
            dynamic_name: format!("{}-v{}", self.dynamic_prefix, version),
            cdn_name: format!("{}-v{}", self.cdn_prefix, version),
            retained: self.retained_partitions.clone(),
        }
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &CacheConfig) {
        if self.max_entry_bytes == 0 {
            self.max_entry_bytes = defaults.max_entry_bytes;
        }
        if self.static_prefix.trim().is_empty() {
            self.static_prefix = defaults.static_prefix.clone();
        }
        if self.dynamic_prefix.trim().is_empty() {
            self.dynamic_prefix = defaults.dynamic_prefix.clone();
        }
        if self.cdn_prefix.trim().is_empty() {
            self.cdn_prefix = defaults.cdn_prefix.clone();
        }
        if self.storage == StorageKind::Disk && self.dir.is_none() {
            self.dir = Some("./.sworker-cache".into());
        }
    }
}

// =======================================================
// PARTITION NAMES (versioned allow-list)
// =======================================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionNames {
    pub static_name: String,
    pub dynamic_name: String,
    pub cdn_name: String,
    pub retained: Vec<String>,
}

impl PartitionNames {
    pub fn static_name(&self) -> &str {
        &self.static_name
    }

    pub fn dynamic_name(&self) -> &str {
        &self.dynamic_name
    }

    pub fn cdn_name(&self) -> &str {
        &self.cdn_name
    }

    /// Every name an activation keeps.
    pub fn allow_list(&self) -> Vec<&str> {
        let mut names = vec![
            self.static_name.as_str(),
            self.dynamic_name.as_str(),
            self.cdn_name.as_str(),
        ];
        names.extend(self.retained.iter().map(String::as_str));
        names
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.allow_list().contains(&name)
    }
}
