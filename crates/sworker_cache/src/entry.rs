//! Timestamp annotation carried by CDN entries.

use http::{HeaderName, HeaderValue};
use sworker_http::FetchResponse;

/// Header holding the epoch-millisecond store time of a CDN entry.
pub const TIMESTAMP_HEADER: &str = "sw-cache-time";

/// Copy of `response` carrying exactly one timestamp header set to `now_millis`.
pub fn stamp(response: &FetchResponse, now_millis: u64) -> FetchResponse {
    let mut stamped = response.clone();
    stamped.headers_mut().insert(
        HeaderName::from_static(TIMESTAMP_HEADER),
        HeaderValue::from(now_millis),
    );
    stamped
}

/// Store time of an entry; absent or unparsable headers yield `None`.
pub fn stored_at(response: &FetchResponse) -> Option<u64> {
    response
        .headers()
        .get(TIMESTAMP_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamping_replaces_previous_timestamp() {
        let resp = FetchResponse::ok("text/javascript", "let a;");
        let once = stamp(&resp, 1_000);
        let twice = stamp(&once, 2_000);
        assert_eq!(twice.headers().get_all(TIMESTAMP_HEADER).iter().count(), 1);
        assert_eq!(stored_at(&twice), Some(2_000));
        assert_eq!(twice.body(), resp.body());
    }

    #[test]
    fn unstamped_or_garbage_has_no_timestamp() {
        let mut resp = FetchResponse::ok("text/css", "a{}");
        assert_eq!(stored_at(&resp), None);
        resp.headers_mut()
            .insert(TIMESTAMP_HEADER, HeaderValue::from_static("yesterday"));
        assert_eq!(stored_at(&resp), None);
    }
}
