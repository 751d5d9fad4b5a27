use serde::Deserialize;

// =======================================================
// NOTIFICATION CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub title: String,
    /// Body used when a push arrives without payload.
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub explore_title: String,
    pub close_title: String,
    /// Document opened by the `explore` action, relative to scope.
    pub open_url: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: "TOTP Token Manager".into(),
            body: "TOTP Token Manager notification".into(),
            icon: "icons/icon.svg".into(),
            badge: "icons/icon.svg".into(),
            vibrate: vec![100, 50, 100],
            explore_title: "View details".into(),
            close_title: "Close".into(),
            open_url: "./".into(),
        }
    }
}

impl NotificationConfig {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn badge(&self) -> &str {
        &self.badge
    }

    pub fn open_url(&self) -> &str {
        &self.open_url
    }
}
