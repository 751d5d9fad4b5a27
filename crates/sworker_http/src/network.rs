use crate::{FetchError, FetchRequest, FetchResponse, Fetcher, OriginFetcher, RemoteFetcher};

/// Routes scoped URLs to the bundle origin and everything else to the
/// remote network.
#[derive(Debug, Clone)]
pub struct AppNetwork {
    origin: OriginFetcher,
    remote: RemoteFetcher,
}

impl AppNetwork {
    pub fn new(origin: OriginFetcher, remote: RemoteFetcher) -> Self {
        Self { origin, remote }
    }
}

impl Fetcher for AppNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        if self.origin.serves(request.url()) {
            self.origin.fetch(request).await
        } else {
            self.remote.fetch(request).await
        }
    }
}
