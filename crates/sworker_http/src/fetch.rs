use std::{future::Future, sync::Arc};

use thiserror::Error;

use crate::{FetchRequest, FetchResponse};

/// Failure to obtain any response from the network.
///
/// A response with a non-2xx status is *not* an error; it comes back as
/// `Ok` like a browser `fetch`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported scheme for {0}")]
    UnsupportedScheme(String),

    #[error("network is offline")]
    Offline,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// The network seam of the worker.
pub trait Fetcher: Send + Sync {
    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<FetchResponse, FetchError>> + Send;
}

impl<T: Fetcher> Fetcher for Arc<T> {
    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<FetchResponse, FetchError>> + Send {
        (**self).fetch(request)
    }
}
