use std::future::Future;

use sworker_http::FetchResponse;
use thiserror::Error;

use crate::RequestKey;

/// Storage-layer failure. Callers on the request path treat every variant
/// as a cache miss.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt cache metadata: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("entry of {size} bytes exceeds the {limit} byte limit of partition '{partition}'")]
    QuotaExceeded {
        partition: String,
        size: u64,
        limit: u64,
    },

    #[error("corrupt cache entry: {0}")]
    Malformed(String),

    #[error("partition '{0}' no longer exists")]
    UnknownPartition(String),

    #[error("invalid partition name: {0:?}")]
    InvalidName(String),

    #[error("cache storage lock poisoned")]
    Poisoned,
}

/// One named partition: a key → response snapshot map.
pub trait Partition: Send + Sync {
    fn name(&self) -> &str;

    /// Stored response for `key`, if any.
    fn get(
        &self,
        key: &RequestKey,
    ) -> impl Future<Output = Result<Option<FetchResponse>, StoreError>> + Send;

    /// Store `response`, replacing any previous entry for `key`.
    fn put(
        &self,
        key: RequestKey,
        response: FetchResponse,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove the entry; `Ok(false)` when nothing was stored.
    fn delete(&self, key: &RequestKey) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn keys(&self) -> impl Future<Output = Result<Vec<RequestKey>, StoreError>> + Send;
}

/// The set of partitions known to the worker.
pub trait CacheStorage: Send + Sync {
    type Partition: Partition + Clone + 'static;

    /// Open `name`, creating it when absent.
    fn open(&self, name: &str) -> impl Future<Output = Result<Self::Partition, StoreError>> + Send;

    /// Partition names in creation order.
    fn names(&self) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Delete a whole partition; `Ok(false)` when it did not exist.
    fn remove(&self, name: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Search every partition in creation order; first hit wins.
    fn lookup(
        &self,
        key: &RequestKey,
    ) -> impl Future<Output = Result<Option<FetchResponse>, StoreError>> + Send;
}

pub(crate) fn check_partition_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.trim().is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name == "."
        || name.contains("..");
    if invalid {
        Err(StoreError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

pub(crate) fn check_entry_size(
    partition: &str,
    response: &FetchResponse,
    limit: Option<u64>,
) -> Result<(), StoreError> {
    let Some(limit) = limit else {
        return Ok(());
    };
    let size = response.body().len() as u64;
    if size > limit {
        return Err(StoreError::QuotaExceeded {
            partition: partition.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}
