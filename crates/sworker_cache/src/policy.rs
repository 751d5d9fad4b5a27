use std::time::Duration;

use http::Method;
use sworker_http::FetchResponse;

use crate::entry::stored_at;

/// `(now - stored) < window`; no timestamp means stale.
///
/// A timestamp from the future counts as age zero.
pub fn is_fresh(stored_at_millis: Option<u64>, now_millis: u64, window_millis: u64) -> bool {
    match stored_at_millis {
        Some(stored) => now_millis.saturating_sub(stored) < window_millis,
        None => false,
    }
}

/// Expiry rule shared by the CDN strategy and the sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    window_millis: u64,
}

impl FreshnessPolicy {
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    pub fn new(window: Duration) -> Self {
        Self {
            window_millis: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn window_millis(&self) -> u64 {
        self.window_millis
    }

    pub fn is_fresh(&self, stored_at_millis: Option<u64>, now_millis: u64) -> bool {
        is_fresh(stored_at_millis, now_millis, self.window_millis)
    }

    pub fn is_fresh_entry(&self, response: &FetchResponse, now_millis: u64) -> bool {
        self.is_fresh(stored_at(response), now_millis)
    }

    /// Only GET responses ever enter a partition.
    pub fn is_cacheable(method: &Method) -> bool {
        *method == Method::GET
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}
