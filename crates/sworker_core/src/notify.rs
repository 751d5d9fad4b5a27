use serde::Serialize;
use sworker_config::NotificationConfig;

pub const ACTION_EXPLORE: &str = "explore";
pub const ACTION_CLOSE: &str = "close";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub date_of_arrival: u64,
    pub primary_key: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

/// Notification shown for a push message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    /// Build from config; a missing or empty payload uses the default body.
    pub fn for_push(cfg: &NotificationConfig, payload: Option<&str>, now_millis: u64) -> Self {
        let body = payload
            .filter(|text| !text.is_empty())
            .unwrap_or(cfg.body())
            .to_string();

        let action = |name: &str, title: &str| NotificationAction {
            action: name.to_string(),
            title: title.to_string(),
            icon: cfg.icon().to_string(),
        };

        Self {
            title: cfg.title().to_string(),
            body,
            icon: cfg.icon().to_string(),
            badge: cfg.badge().to_string(),
            vibrate: cfg.vibrate.clone(),
            data: NotificationData {
                date_of_arrival: now_millis,
                primary_key: 1,
            },
            actions: vec![
                action(ACTION_EXPLORE, &cfg.explore_title),
                action(ACTION_CLOSE, &cfg.close_title),
            ],
        }
    }
}

/// Window to open for a notification click, if any. Only `explore` opens
/// one; every other action just closes the notification.
pub fn click_target<'a>(action: &str, open_url: &'a str) -> Option<&'a str> {
    (action == ACTION_EXPLORE).then_some(open_url)
}
