//! In-memory partitions. Lost on restart; used by tests and ephemeral runs.

use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use sworker_http::FetchResponse;
use tracing::debug;

use crate::store::{check_entry_size, check_partition_name};
use crate::{CacheStorage, Partition, RequestKey, StoreError};

#[derive(Debug, Clone)]
pub struct MemoryPartition {
    name: Arc<str>,
    entries: Arc<DashMap<RequestKey, FetchResponse>>,
    max_entry_bytes: Option<u64>,
}

impl MemoryPartition {
    fn new(name: &str, max_entry_bytes: Option<u64>) -> Self {
        Self {
            name: Arc::from(name),
            entries: Arc::new(DashMap::new()),
            max_entry_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Partition for MemoryPartition {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &RequestKey) -> Result<Option<FetchResponse>, StoreError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: RequestKey, response: FetchResponse) -> Result<(), StoreError> {
        check_entry_size(&self.name, &response, self.max_entry_bytes)?;
        debug!(target: "sworker::cache", partition = %self.name, key = %key, layer = "memory", "Stored entry");
        self.entries.insert(key, response);
        Ok(())
    }

    async fn delete(&self, key: &RequestKey) -> Result<bool, StoreError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<RequestKey>, StoreError> {
        Ok(self.entries.iter().map(|entry| entry.key().clone()).collect())
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    partitions: RwLock<Vec<MemoryPartition>>,
    max_entry_bytes: Option<u64>,
}

/// Partition set held in process memory, in creation order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<MemoryInner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject bodies larger than `limit` bytes on every partition.
    pub fn with_max_entry_bytes(limit: u64) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                partitions: RwLock::new(Vec::new()),
                max_entry_bytes: Some(limit),
            }),
        }
    }

    fn find(&self, name: &str) -> Result<Option<MemoryPartition>, StoreError> {
        let partitions = self.inner.partitions.read().map_err(|_| StoreError::Poisoned)?;
        Ok(partitions.iter().find(|p| &*p.name == name).cloned())
    }
}

impl CacheStorage for MemoryStorage {
    type Partition = MemoryPartition;

    async fn open(&self, name: &str) -> Result<MemoryPartition, StoreError> {
        check_partition_name(name)?;
        if let Some(existing) = self.find(name)? {
            return Ok(existing);
        }

        let mut partitions = self.inner.partitions.write().map_err(|_| StoreError::Poisoned)?;
        // Another open may have won the race between the read and write locks.
        if let Some(existing) = partitions.iter().find(|p| &*p.name == name) {
            return Ok(existing.clone());
        }
        let partition = MemoryPartition::new(name, self.inner.max_entry_bytes);
        partitions.push(partition.clone());
        debug!(target: "sworker::cache", partition = %name, layer = "memory", "Created partition");
        Ok(partition)
    }

    async fn names(&self) -> Result<Vec<String>, StoreError> {
        let partitions = self.inner.partitions.read().map_err(|_| StoreError::Poisoned)?;
        Ok(partitions.iter().map(|p| p.name.to_string()).collect())
    }

    async fn remove(&self, name: &str) -> Result<bool, StoreError> {
        let mut partitions = self.inner.partitions.write().map_err(|_| StoreError::Poisoned)?;
        let before = partitions.len();
        partitions.retain(|p| &*p.name != name);
        Ok(partitions.len() != before)
    }

    async fn lookup(&self, key: &RequestKey) -> Result<Option<FetchResponse>, StoreError> {
        let partitions = self.inner.partitions.read().map_err(|_| StoreError::Poisoned)?;
        for partition in partitions.iter() {
            if let Some(entry) = partition.entries.get(key) {
                return Ok(Some(entry.value().clone()));
            }
        }
        Ok(None)
    }
}
