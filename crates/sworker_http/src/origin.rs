//! Serves the application bundle from a local directory, standing in for
//! the application's own origin server.

use std::path::PathBuf;

use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use mime_guess::mime;
use tokio::fs as tokio_fs;
use tracing::debug;

use crate::{FetchError, FetchRequest, FetchResponse, Fetcher, responses};

#[derive(Debug, Clone)]
pub struct OriginFetcher {
    scope: String,
    root: PathBuf,
    index: String,
}

impl OriginFetcher {
    pub fn new(scope: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            scope: scope.into(),
            root: root.into(),
            index: "index.html".into(),
        }
    }

    /// True when `url` lives under this origin's scope.
    pub fn serves(&self, url: &str) -> bool {
        url.starts_with(&self.scope)
    }

    /// Map a scoped URL to a path relative to the bundle root.
    fn resolve_relative_path(&self, url: &str) -> Option<String> {
        let tail = url.strip_prefix(&self.scope)?;
        let tail = strip_query(tail);

        if !is_safe_request_path(tail) {
            return None;
        }

        if tail.is_empty() || tail.ends_with('/') {
            Some(format!("{}{}", tail, self.index))
        } else {
            Some(tail.to_string())
        }
    }
}

impl Fetcher for OriginFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        if *request.method() != Method::GET && *request.method() != Method::HEAD {
            return Ok(responses::method_not_allowed());
        }

        let Some(rel) = self.resolve_relative_path(request.url()) else {
            return Ok(responses::not_found());
        };
        let path = self.root.join(&rel);

        let body = match tokio_fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(target: "sworker::origin", path = %path.display(), "Bundle file not found");
                return Ok(responses::not_found());
            }
            Err(e) => return Err(FetchError::Io(e)),
        };

        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&content_type_for_path(&rel)) {
            headers.insert(header::CONTENT_TYPE, value);
        }

        debug!(
            target: "sworker::origin",
            path = %path.display(),
            bytes = body.len(),
            "Served bundle file"
        );

        let body = if *request.method() == Method::HEAD {
            Vec::new()
        } else {
            body
        };
        Ok(FetchResponse::new(StatusCode::OK, headers, body))
    }
}

fn content_type_for_path(path: &str) -> String {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() == mime::TEXT {
        format!("{}; charset=utf-8", mime.essence_str())
    } else {
        mime.essence_str().to_string()
    }
}

fn strip_query(path: &str) -> &str {
    let path = path.split('#').next().unwrap_or(path);
    path.split('?').next().unwrap_or(path)
}

fn is_safe_request_path(path: &str) -> bool {
    let decoded = decode_path_for_check(path);
    if decoded.starts_with('/') || decoded.contains("//") || decoded.contains('\\') {
        return false;
    }
    !decoded.split('/').any(|segment| segment == "..")
}

fn decode_path_for_check(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(h1), Some(h2)) = (from_hex(bytes[i + 1]), from_hex(bytes[i + 2])) {
                let value = (h1 << 4) | h2;
                match value {
                    b'.' | b'/' | b'\\' => out.push(value as char),
                    _ => {
                        out.push('%');
                        out.push(bytes[i + 1] as char);
                        out.push(bytes[i + 2] as char);
                    }
                }
                i += 3;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn from_hex(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
