use serde::Deserialize;

/// Paths bundled with the application, relative to the worker scope.
const DEFAULT_STATIC_ASSETS: &[&str] = &[
    "./",
    "index.html",
    "manifest.json",
    "libs/bootstrap.min.css",
    "libs/bootstrap.bundle.min.js",
    "libs/bootstrap-icons.css",
    "libs/vue.global.prod.js",
    "libs/crypto-js.min.js",
    "libs/jsQR.js",
    "libs/kjua.min.js",
    "libs/fonts/bootstrap-icons.woff",
    "libs/fonts/bootstrap-icons.woff2",
];

/// Third-party URLs eligible for the CDN strategy.
const DEFAULT_CDN_ASSETS: &[&str] = &[
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/css/bootstrap.min.css",
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/js/bootstrap.bundle.min.js",
    "https://cdn.jsdelivr.net/npm/bootstrap-icons@1.11.3/font/bootstrap-icons.css",
    "https://cdn.jsdelivr.net/npm/vue@3.4.21/dist/vue.global.prod.js",
    "https://cdn.jsdelivr.net/npm/crypto-js@4.1.1/crypto-js.min.js",
    "https://cdn.jsdelivr.net/npm/jsqr@1.4.0/dist/jsQR.js",
    "https://cdn.jsdelivr.net/npm/kjua@0.1.1/dist/kjua.min.js",
];

// =======================================================
// ASSETS CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Ordered list of bundle paths pre-cached at install.
    #[serde(rename = "static")]
    pub static_assets: Vec<String>,
    /// Exact-match CDN URLs.
    #[serde(rename = "cdn")]
    pub cdn_assets: Vec<String>,
    /// Document served to HTML navigations when the network is gone.
    pub navigation_fallback: Option<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            static_assets: DEFAULT_STATIC_ASSETS.iter().map(|s| s.to_string()).collect(),
            cdn_assets: DEFAULT_CDN_ASSETS.iter().map(|s| s.to_string()).collect(),
            navigation_fallback: Some("index.html".into()),
        }
    }
}

impl AssetsConfig {
    pub fn static_assets(&self) -> &[String] {
        &self.static_assets
    }

    pub fn cdn_assets(&self) -> &[String] {
        &self.cdn_assets
    }

    pub fn navigation_fallback(&self) -> Option<&str> {
        self.navigation_fallback.as_deref()
    }
}
