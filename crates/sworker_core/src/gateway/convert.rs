//! Translation between hyper messages and worker snapshots.

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use http_body_util::Full;
use hyper::Response;
use serde::Serialize;
use sworker_http::{FetchResponse, responses};

/// Connection-scoped headers that never cross the gateway.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.contains(&name)
}

/// `scheme://authority` part of the scope.
pub(crate) fn origin_of(scope: &str) -> &str {
    let Some(start) = scope.find("://") else {
        return scope.trim_end_matches('/');
    };
    let after = start + 3;
    match scope[after..].find('/') {
        Some(slash) => &scope[..after + slash],
        None => scope,
    }
}

/// Absolute URL of an incoming request. Origin-form targets resolve against
/// the scope's origin; absolute-form targets are used as-is.
pub(crate) fn request_url(uri: &Uri, scope: &str) -> String {
    if uri.scheme().is_some() {
        return uri.to_string();
    }
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("{}{}", origin_of(scope), path)
}

/// The page was opened from disk: `Origin: null` or a `file:` referer.
pub(crate) fn is_local_file_page(headers: &HeaderMap) -> bool {
    let origin_null = headers
        .get(header::ORIGIN)
        .is_some_and(|v| v.as_bytes() == b"null");
    let file_referer = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().starts_with("file:"));
    origin_null || file_referer
}

/// Request headers worth forwarding to the network.
pub(crate) fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let n = name.as_str();
        if is_hop_by_hop(n) || n == "host" || n == "content-length" {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

pub(crate) fn into_hyper(response: FetchResponse) -> Response<Full<Bytes>> {
    let (status, headers, body) = response.into_parts();

    let mut out = Response::new(Full::new(body));
    *out.status_mut() = status;
    let out_headers = out.headers_mut();
    for (name, value) in &headers {
        let n = name.as_str();
        if is_hop_by_hop(n) || n == "content-length" {
            continue;
        }
        out_headers.append(name.clone(), value.clone());
    }
    out
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, value: &T) -> FetchResponse {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut headers = HeaderMap::new();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            FetchResponse::new(status, headers, body)
        }
        Err(_) => responses::internal_error(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_is_scheme_and_authority() {
        assert_eq!(origin_of("http://127.0.0.1:8080/"), "http://127.0.0.1:8080");
        assert_eq!(origin_of("https://app.test/totp/"), "https://app.test");
        assert_eq!(origin_of("https://app.test"), "https://app.test");
    }

    #[test]
    fn origin_form_targets_resolve_against_scope_origin() {
        let uri: Uri = "/totp/index.html?v=1".parse().expect("uri");
        assert_eq!(
            request_url(&uri, "https://app.test/totp/"),
            "https://app.test/totp/index.html?v=1"
        );

        let absolute: Uri = "https://cdn.example/lib.js".parse().expect("uri");
        assert_eq!(
            request_url(&absolute, "https://app.test/"),
            "https://cdn.example/lib.js"
        );
    }

    #[test]
    fn local_file_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_local_file_page(&headers));

        headers.insert(header::ORIGIN, HeaderValue::from_static("null"));
        assert!(is_local_file_page(&headers));

        let mut headers = HeaderMap::new();
        headers.insert(
            header::REFERER,
            HeaderValue::from_static("file:///home/me/totp/index.html"),
        );
        assert!(is_local_file_page(&headers));
    }

    #[test]
    fn hop_by_hop_headers_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::HOST, HeaderValue::from_static("127.0.0.1:8080"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html"));

        let forwarded = forwardable_headers(&headers);
        assert_eq!(forwarded.len(), 1);
        assert!(forwarded.contains_key(header::ACCEPT));

        let mut upstream = FetchResponse::ok("text/css", "a{}");
        upstream
            .headers_mut()
            .insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        let converted = into_hyper(upstream);
        assert_eq!(converted.status(), StatusCode::OK);
        assert!(!converted.headers().contains_key(header::TRANSFER_ENCODING));
        assert!(converted.headers().contains_key(header::CONTENT_TYPE));
    }
}
