//! Request classification: decides which retrieval strategy, if any, owns a
//! request. Pure; no I/O.

use std::{collections::HashSet, fmt};

use sworker_cache::FreshnessPolicy;
use sworker_http::FetchRequest;

/// URL schemes the worker never intercepts.
const EXCLUDED_SCHEMES: &[&str] = &["chrome-extension:", "data:"];

/// Exact-match set of third-party URLs handled network-first.
#[derive(Debug, Clone, Default)]
pub struct CdnAssets {
    urls: HashSet<String>,
}

impl CdnAssets {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }

    /// Exact string match. No prefix or pattern matching.
    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NonGet,
    ExcludedScheme,
    /// CDN asset requested by a page opened from the filesystem; the page's
    /// own local fallback must run.
    LocalFileCdn,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NonGet => write!(f, "non-get"),
            SkipReason::ExcludedScheme => write!(f, "excluded-scheme"),
            SkipReason::LocalFileCdn => write!(f, "local-file-cdn"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Static bundle asset or any other GET: cache-first.
    CacheFirst,
    /// Listed CDN asset: network-first with stale fallback.
    Cdn,
    /// Not intercepted; the request goes out untouched.
    Skip(SkipReason),
}

/// Checks run in order: method, scheme, CDN membership.
pub fn classify(request: &FetchRequest, cdn: &CdnAssets, from_local_file: bool) -> RequestClass {
    if !FreshnessPolicy::is_cacheable(request.method()) {
        return RequestClass::Skip(SkipReason::NonGet);
    }

    if let Some(scheme) = request.scheme()
        && EXCLUDED_SCHEMES.contains(&scheme.as_str())
    {
        return RequestClass::Skip(SkipReason::ExcludedScheme);
    }

    if cdn.contains(request.url()) {
        if from_local_file {
            return RequestClass::Skip(SkipReason::LocalFileCdn);
        }
        return RequestClass::Cdn;
    }

    RequestClass::CacheFirst
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    const LIB: &str = "https://cdn.example/lib.js";

    fn cdn() -> CdnAssets {
        CdnAssets::new([LIB])
    }

    #[test]
    fn non_get_and_excluded_schemes_are_skipped() {
        let post = FetchRequest::new(Method::POST, "https://app.test/api");
        assert_eq!(
            classify(&post, &cdn(), false),
            RequestClass::Skip(SkipReason::NonGet)
        );

        for url in ["chrome-extension://abc/x.js", "data:text/plain,hi", "DATA:,x"] {
            assert_eq!(
                classify(&FetchRequest::get(url), &cdn(), false),
                RequestClass::Skip(SkipReason::ExcludedScheme),
                "{url}"
            );
        }
    }

    #[test]
    fn method_is_checked_before_cdn_membership() {
        let put = FetchRequest::new(Method::PUT, LIB);
        assert_eq!(
            classify(&put, &cdn(), false),
            RequestClass::Skip(SkipReason::NonGet)
        );
    }

    #[test]
    fn cdn_membership_is_exact() {
        assert_eq!(classify(&FetchRequest::get(LIB), &cdn(), false), RequestClass::Cdn);
        assert_eq!(
            classify(&FetchRequest::get("https://cdn.example/lib.js?v=2"), &cdn(), false),
            RequestClass::CacheFirst
        );
        assert_eq!(
            classify(&FetchRequest::get("https://cdn.example/"), &cdn(), false),
            RequestClass::CacheFirst
        );
    }

    #[test]
    fn local_file_pages_skip_cdn_only() {
        assert_eq!(
            classify(&FetchRequest::get(LIB), &cdn(), true),
            RequestClass::Skip(SkipReason::LocalFileCdn)
        );
        assert_eq!(
            classify(&FetchRequest::get("https://app.test/index.html"), &cdn(), true),
            RequestClass::CacheFirst
        );
    }
}
