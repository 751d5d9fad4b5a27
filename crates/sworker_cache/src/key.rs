use std::fmt;

use http::Method;
use sworker_http::FetchRequest;

/// Request identity inside a partition: method + absolute URL.
#[derive(Hash, Eq, PartialEq, Debug, Clone)]
pub struct RequestKey {
    method: Method,
    url: String,
}

impl RequestKey {
    /// Fragments never reach the network, so they are not part of the key.
    pub fn new(method: Method, url: &str) -> Self {
        let url = url.split('#').next().unwrap_or(url);
        Self {
            method,
            url: url.to_string(),
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn from_request(request: &FetchRequest) -> Self {
        Self::new(request.method().clone(), request.url())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}
