use serde::Deserialize;

mod assets;
mod cache;
mod global;
mod notification;
mod server;
mod validation;
mod worker;

pub use assets::AssetsConfig;
pub use cache::{CacheConfig, DEFAULT_EXPIRY_SECS, PartitionNames, StorageKind};
pub use global::GlobalConfig;
pub use notification::NotificationConfig;
pub use server::ServerConfig;
pub use validation::{ConfigReport, validate};
pub use worker::WorkerConfig;

// =======================================================
// SWORKER CONFIG (main config)
// =======================================================
#[derive(Debug, Clone, Deserialize)]
pub struct SworkerConfig {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub assets: AssetsConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub notification: NotificationConfig,
}

impl Default for SworkerConfig {
    fn default() -> Self {
        let mut cfg = Self {
            global: GlobalConfig::default(),
            worker: WorkerConfig::default(),
            cache: CacheConfig::default(),
            assets: AssetsConfig::default(),
            server: ServerConfig::default(),
            notification: NotificationConfig::default(),
        };
        cfg.apply_defaults();
        cfg
    }
}

impl SworkerConfig {
    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    pub fn worker(&self) -> &WorkerConfig {
        &self.worker
    }

    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    pub fn assets(&self) -> &AssetsConfig {
        &self.assets
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    pub fn notification(&self) -> &NotificationConfig {
        &self.notification
    }

    /// Partition names for the configured worker version.
    pub fn partition_names(&self) -> PartitionNames {
        self.cache.partition_names(&self.worker.version)
    }

    pub fn from_file(file_name: &str) -> Result<Self, config::ConfigError> {
        let built = config::Config::builder()
            .add_source(config::File::new(file_name, config::FileFormat::Toml).required(false))
            .build()?;

        let mut cfg: SworkerConfig = built.try_deserialize()?;

        cfg.apply_defaults();
        Ok(cfg)
    }

    pub fn from_file_or_default(file_name: &str) -> Self {
        match Self::from_file(file_name) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Error reading config '{file_name}': {e}");
                eprintln!("Using default config (in-memory)...");
                SworkerConfig::default()
            }
        }
    }

    /// Run validation over the loaded values.
    pub fn validate(&self) -> ConfigReport {
        validate(self)
    }

    fn apply_defaults(&mut self) {
        self.global.apply_defaults_from(&GlobalConfig::default());
        self.worker.apply_defaults_from(&WorkerConfig::default());
        self.cache.apply_defaults_from(&CacheConfig::default());
        self.server.apply_defaults_from(&ServerConfig::default());

        if !self.worker.scope.ends_with('/') && !self.worker.scope.is_empty() {
            self.worker.scope.push('/');
        }
    }

    pub fn print(&self) {
        println!("================ SWORKER CONFIG ================");

        println!("\n[global]");
        println!("  log_level            = {}", self.global.log_level);

        println!("\n[worker]");
        println!("  version              = {}", self.worker.version);
        println!("  scope                = {}", self.worker.scope);
        println!("  auto_skip_waiting    = {}", self.worker.auto_skip_waiting);

        let names = self.partition_names();
        println!("\n[cache]");
        println!("  storage              = {}", self.cache.storage);
        println!("  dir                  = {:?}", self.cache.dir);
        println!("  expiry_secs          = {}", self.cache.expiry_secs);
        println!("  max_entry_bytes      = {}", self.cache.max_entry_bytes);
        println!("  partitions           = {:?}", names.allow_list());

        println!("\n[assets]");
        println!("  static               = {} entries", self.assets.static_assets.len());
        println!("  cdn                  = {} entries", self.assets.cdn_assets.len());
        println!("  navigation_fallback  = {:?}", self.assets.navigation_fallback);

        println!("\n[server]");
        println!("  listen               = {}", self.server.listen);
        println!("  bundle_root          = {}", self.server.bundle_root);
        println!("  cleanup_check_secs   = {}", self.server.cleanup_check_secs);
        println!(
            "  cleanup_min_interval_secs = {}",
            self.server.cleanup_min_interval_secs
        );

        println!("================================================");
    }
}
