use reqwest::Client;
use tracing::debug;

use crate::{FetchError, FetchRequest, FetchResponse, Fetcher};

/// Network fetcher for everything outside the application origin.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
///
/// No request timeout is configured: a hung request only holds up its own
/// response.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: Client,
}

impl RemoteFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }
}

impl Fetcher for RemoteFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        match request.scheme().as_deref() {
            Some("http:") | Some("https:") => {}
            _ => return Err(FetchError::UnsupportedScheme(request.url().to_string())),
        }

        let response = self
            .client
            .request(request.method().clone(), request.url())
            .headers(request.headers().clone())
            .body(request.body().clone())
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        debug!(
            target: "sworker::network",
            url = %request.url(),
            status = status.as_u16(),
            bytes = body.len(),
            "Remote fetch completed"
        );

        Ok(FetchResponse::new(status, headers, body))
    }
}
