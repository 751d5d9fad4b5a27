//! Named cache partitions for the offline worker.
//!
//! A [`CacheStorage`] owns any number of named [`Partition`]s, each mapping a
//! [`RequestKey`] to a full response snapshot. Two backends exist:
//! [`MemoryStorage`] and the durable [`DiskStorage`].

pub mod disk;
pub mod entry;
pub mod key;
pub mod memory;
pub mod policy;
pub mod store;

pub use disk::{DiskPartition, DiskStorage};
pub use entry::{TIMESTAMP_HEADER, stamp, stored_at};
pub use key::RequestKey;
pub use memory::{MemoryPartition, MemoryStorage};
pub use policy::{FreshnessPolicy, is_fresh};
pub use store::{CacheStorage, Partition, StoreError};
