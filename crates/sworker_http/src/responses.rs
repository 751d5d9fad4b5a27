//! Synthetic responses the worker hands back when it cannot produce a real
//! one. Status codes tell the page which degraded state it is in.

use std::time::SystemTime;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode, header};
use httpdate::fmt_http_date;

use crate::FetchResponse;

/// Generic helper for a plain-text synthetic response.
pub fn text_response(status: StatusCode, body: &'static str) -> FetchResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    if let Ok(date) = HeaderValue::from_str(&fmt_http_date(SystemTime::now())) {
        headers.insert(header::DATE, date);
    }
    FetchResponse::new(status, headers, Bytes::from_static(body.as_bytes()))
}

/// CDN resource neither reachable nor cached; the page should load its
/// bundled copy.
pub fn cdn_unavailable() -> FetchResponse {
    text_response(StatusCode::NOT_FOUND, "CDN Unavailable")
}

/// Network failed and nothing usable was cached.
pub fn network_error() -> FetchResponse {
    text_response(StatusCode::SERVICE_UNAVAILABLE, "Network Error")
}

/// Last resort when request handling itself blew up.
pub fn internal_error() -> FetchResponse {
    text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Worker Error")
}

pub fn not_found() -> FetchResponse {
    text_response(StatusCode::NOT_FOUND, "404 Not Found\n")
}

pub fn bad_request() -> FetchResponse {
    text_response(StatusCode::BAD_REQUEST, "400 Bad Request\n")
}

pub fn method_not_allowed() -> FetchResponse {
    text_response(StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_states_use_distinct_statuses() {
        assert_eq!(cdn_unavailable().status(), StatusCode::NOT_FOUND);
        assert_eq!(cdn_unavailable().body().as_ref(), b"CDN Unavailable");
        assert_eq!(network_error().status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(internal_error().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn synthetic_responses_are_plain_text_with_date() {
        let resp = network_error();
        assert_eq!(
            resp.header_str("content-type"),
            Some("text/plain; charset=utf-8")
        );
        assert!(resp.headers().contains_key(header::DATE));
    }
}
