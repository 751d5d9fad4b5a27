//! Durable partitions on the local filesystem.
//!
//! Layout under the storage root:
//!
//! ```text
//! partitions.json             ordered partition names
//! <partition>/<hash>.entry    u32 BE meta length, meta JSON, body bytes
//! ```
//!
//! An entry is one file, written to a uniquely named temp file and renamed
//! into place. Readers see either the old entry or the new one, and of two
//! racing writers the last rename wins.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};
use sworker_http::FetchResponse;
use tokio::{
    fs,
    io::{AsyncReadExt, BufReader},
    sync::RwLock,
};
use tracing::{debug, warn};

use crate::store::{check_entry_size, check_partition_name};
use crate::{CacheStorage, Partition, RequestKey, StoreError};

const INDEX_FILE: &str = "partitions.json";
const ENTRY_EXT: &str = "entry";

/// Upper bound on the metadata block; anything larger is a corrupt file.
const MAX_META_BYTES: u32 = 1 << 20;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct StoredMeta {
    method: String,
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
}

impl StoredMeta {
    fn new(key: &RequestKey, response: &FetchResponse) -> Self {
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        Self {
            method: key.method().as_str().to_string(),
            url: key.url().to_string(),
            status: response.status().as_u16(),
            headers,
        }
    }

    fn key(&self) -> Option<RequestKey> {
        let method = Method::from_bytes(self.method.as_bytes()).ok()?;
        Some(RequestKey::new(method, &self.url))
    }

    fn into_response(self, body: Bytes) -> Option<FetchResponse> {
        let status = StatusCode::from_u16(self.status).ok()?;
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) else {
                continue;
            };
            headers.append(name, value);
        }
        Some(FetchResponse::new(status, headers, body))
    }
}

/// 64-bit FNV-1a. Filenames must not change between builds, so no
/// `DefaultHasher` here.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn entry_file_name(key: &RequestKey) -> String {
    format!("{:016x}.{ENTRY_EXT}", fnv1a(key.to_string().as_bytes()))
}

fn encode_entry(meta: &[u8], body: &[u8]) -> Result<Bytes, StoreError> {
    let meta_len = u32::try_from(meta.len())
        .ok()
        .filter(|len| *len <= MAX_META_BYTES)
        .ok_or_else(|| StoreError::Malformed(format!("metadata of {} bytes", meta.len())))?;
    let mut buf = BytesMut::with_capacity(4 + meta.len() + body.len());
    buf.put_u32(meta_len);
    buf.put_slice(meta);
    buf.put_slice(body);
    Ok(buf.freeze())
}

fn decode_entry(mut raw: Bytes) -> Result<(StoredMeta, Bytes), StoreError> {
    if raw.remaining() < 4 {
        return Err(StoreError::Malformed("missing length prefix".into()));
    }
    let meta_len = raw.get_u32();
    if meta_len > MAX_META_BYTES || raw.remaining() < meta_len as usize {
        return Err(StoreError::Malformed(format!(
            "metadata length {meta_len} with {} bytes left",
            raw.remaining()
        )));
    }
    let meta = raw.split_to(meta_len as usize);
    Ok((serde_json::from_slice(&meta)?, raw))
}

/// Write through a temp file unique to this call, then rename over `path`.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.{seq}.tmp", std::process::id()));
    let tmp = PathBuf::from(tmp);

    if let Err(err) = fs::write(&tmp, contents).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(err.into());
    }
    if let Err(err) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(err.into());
    }
    Ok(())
}

/// Only the metadata block; `keys` has no use for the body.
async fn read_meta(path: &Path) -> Result<StoredMeta, StoreError> {
    let mut reader = BufReader::new(fs::File::open(path).await?);
    let meta_len = reader.read_u32().await?;
    if meta_len > MAX_META_BYTES {
        return Err(StoreError::Malformed(format!("metadata length {meta_len}")));
    }
    let mut meta = vec![0; meta_len as usize];
    reader.read_exact(&mut meta).await?;
    Ok(serde_json::from_slice(&meta)?)
}

#[derive(Debug)]
struct DiskInner {
    root: PathBuf,
    /// Shared by entry writes, exclusive for index changes, so a write
    /// never lands in a partition that is being removed.
    index_lock: RwLock<()>,
    max_entry_bytes: Option<u64>,
}

impl DiskInner {
    async fn read_index(&self) -> Result<Vec<String>, StoreError> {
        match fs::read(self.root.join(INDEX_FILE)).await {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_index(&self, names: &[String]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).await?;
        let raw = serde_json::to_vec_pretty(names)?;
        write_atomic(&self.root.join(INDEX_FILE), &raw).await
    }
}

#[derive(Debug, Clone)]
pub struct DiskPartition {
    name: Arc<str>,
    dir: PathBuf,
    storage: Arc<DiskInner>,
}

impl DiskPartition {
    fn entry_path(&self, key: &RequestKey) -> PathBuf {
        self.dir.join(entry_file_name(key))
    }
}

impl Partition for DiskPartition {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &RequestKey) -> Result<Option<FetchResponse>, StoreError> {
        let raw = match fs::read(self.entry_path(key)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let (meta, body) = decode_entry(Bytes::from(raw))?;
        if meta.key().as_ref() != Some(key) {
            // Hash collision with a different request.
            return Ok(None);
        }

        debug!(target: "sworker::cache", partition = %self.name, key = %key, layer = "disk", "Cache hit");
        Ok(meta.into_response(body))
    }

    async fn put(&self, key: RequestKey, response: FetchResponse) -> Result<(), StoreError> {
        check_entry_size(&self.name, &response, self.storage.max_entry_bytes)?;
        let meta = serde_json::to_vec(&StoredMeta::new(&key, &response))?;
        let entry = encode_entry(&meta, response.body())?;

        let _guard = self.storage.index_lock.read().await;
        let names = self.storage.read_index().await?;
        if !names.iter().any(|n| n.as_str() == &*self.name) {
            return Err(StoreError::UnknownPartition(self.name.to_string()));
        }
        fs::create_dir_all(&self.dir).await?;
        write_atomic(&self.entry_path(&key), &entry).await?;

        debug!(
            target: "sworker::cache",
            partition = %self.name,
            key = %key,
            bytes = response.body().len(),
            layer = "disk",
            "Stored entry"
        );
        Ok(())
    }

    async fn delete(&self, key: &RequestKey) -> Result<bool, StoreError> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<RequestKey>, StoreError> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            match read_meta(&path).await {
                Ok(meta) => {
                    if let Some(key) = meta.key() {
                        keys.push(key);
                    }
                }
                // Deleted between the listing and the read.
                Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(
                        target: "sworker::cache",
                        partition = %self.name,
                        path = %path.display(),
                        error = %err,
                        "Skipping unreadable cache entry"
                    );
                }
            }
        }
        Ok(keys)
    }
}

/// Partition set persisted under a root directory.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    inner: Arc<DiskInner>,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::build(root.into(), None)
    }

    pub fn with_max_entry_bytes(root: impl Into<PathBuf>, limit: u64) -> Self {
        Self::build(root.into(), Some(limit))
    }

    fn build(root: PathBuf, max_entry_bytes: Option<u64>) -> Self {
        Self {
            inner: Arc::new(DiskInner {
                root,
                index_lock: RwLock::new(()),
                max_entry_bytes,
            }),
        }
    }

    fn partition(&self, name: &str) -> DiskPartition {
        DiskPartition {
            name: Arc::from(name),
            dir: self.inner.root.join(name),
            storage: Arc::clone(&self.inner),
        }
    }
}

impl CacheStorage for DiskStorage {
    type Partition = DiskPartition;

    async fn open(&self, name: &str) -> Result<DiskPartition, StoreError> {
        check_partition_name(name)?;
        let _guard = self.inner.index_lock.write().await;

        let mut names = self.inner.read_index().await?;
        let partition = self.partition(name);
        if !names.iter().any(|n| n == name) {
            fs::create_dir_all(&partition.dir).await?;
            names.push(name.to_string());
            self.inner.write_index(&names).await?;
            debug!(target: "sworker::cache", partition = %name, layer = "disk", "Created partition");
        }
        Ok(partition)
    }

    async fn names(&self) -> Result<Vec<String>, StoreError> {
        let _guard = self.inner.index_lock.read().await;
        self.inner.read_index().await
    }

    async fn remove(&self, name: &str) -> Result<bool, StoreError> {
        check_partition_name(name)?;
        let _guard = self.inner.index_lock.write().await;

        let mut names = self.inner.read_index().await?;
        let before = names.len();
        names.retain(|n| n != name);
        if names.len() == before {
            return Ok(false);
        }

        // Index first: a crash in between leaves an orphan directory, never
        // an indexed partition with missing files.
        self.inner.write_index(&names).await?;
        match fs::remove_dir_all(self.inner.root.join(name)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(true)
    }

    async fn lookup(&self, key: &RequestKey) -> Result<Option<FetchResponse>, StoreError> {
        let names = self.names().await?;
        for name in names {
            if let Some(hit) = self.partition(&name).get(key).await? {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sworker-disk-{}-{}", std::process::id(), name))
    }

    #[tokio::test]
    async fn entries_survive_a_new_storage_handle() {
        let dir = storage_dir("persist");
        let _ = fs::remove_dir_all(&dir).await;

        let key = RequestKey::get("https://cdn.test/lib.js");
        let mut resp = FetchResponse::ok("text/javascript", "lib()");
        resp.headers_mut()
            .insert("sw-cache-time", HeaderValue::from_static("1700000000000"));
        {
            let storage = DiskStorage::new(dir.clone());
            let cdn = storage.open("cdn-v1.0.0").await.expect("open");
            cdn.put(key.clone(), resp.clone()).await.expect("put");
        }

        let reopened = DiskStorage::new(dir.clone());
        assert_eq!(
            reopened.names().await.expect("names"),
            vec!["cdn-v1.0.0".to_string()]
        );
        let cdn = reopened.open("cdn-v1.0.0").await.expect("reopen");
        let stored = cdn.get(&key).await.expect("get").expect("present");
        assert_eq!(stored, resp);
        assert_eq!(cdn.keys().await.expect("keys"), vec![key]);

        let _ = fs::remove_dir_all(&dir).await;
    }

    #[test]
    fn entry_file_names_are_fixed_across_builds() {
        assert_eq!(fnv1a(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a(b"a"), 0xaf63dc4c8601ec8c);
        assert_eq!(
            entry_file_name(&RequestKey::get("https://cdn.test/lib.js")),
            "c513b519b951b042.entry"
        );
    }

    #[tokio::test]
    async fn remove_deletes_directory_and_index_entry() {
        let dir = storage_dir("remove");
        let _ = fs::remove_dir_all(&dir).await;

        let storage = DiskStorage::new(dir.clone());
        storage.open("static-v1.0.0").await.expect("open static");
        let legacy = storage.open("legacy-v0.9.0").await.expect("open legacy");
        legacy
            .put(RequestKey::get("https://app.test/old.js"), FetchResponse::ok("text/javascript", "old"))
            .await
            .expect("put");

        assert!(storage.remove("legacy-v0.9.0").await.expect("remove"));
        assert_eq!(
            storage.names().await.expect("names"),
            vec!["static-v1.0.0".to_string()]
        );
        assert!(!dir.join("legacy-v0.9.0").exists());

        let _ = fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn put_into_removed_partition_is_refused() {
        let dir = storage_dir("stale-handle");
        let _ = fs::remove_dir_all(&dir).await;

        let storage = DiskStorage::new(dir.clone());
        let legacy = storage.open("legacy-v0.9.0").await.expect("open");
        assert!(storage.remove("legacy-v0.9.0").await.expect("remove"));

        let err = legacy
            .put(RequestKey::get("https://app.test/old.js"), FetchResponse::ok("text/javascript", "old"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownPartition(ref name) if name == "legacy-v0.9.0"));
        assert!(!dir.join("legacy-v0.9.0").exists());
        assert!(storage.names().await.expect("names").is_empty());

        let _ = fs::remove_dir_all(&dir).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_writers_never_tear_an_entry() {
        let dir = storage_dir("race");
        let _ = fs::remove_dir_all(&dir).await;

        let storage = DiskStorage::new(dir.clone());
        let dynamic = storage.open("dynamic-v1.0.0").await.expect("open");
        let key = RequestKey::get("https://app.test/hot.css");

        for round in 0..25 {
            let mut writers = Vec::new();
            for writer in 0..4 {
                let dynamic = dynamic.clone();
                let key = key.clone();
                writers.push(tokio::spawn(async move {
                    let tag = format!("w{writer}-r{round}");
                    let mut resp = FetchResponse::ok("text/css", format!("{tag}:{}", "x".repeat(4096)));
                    resp.headers_mut()
                        .insert("x-writer", HeaderValue::from_str(&tag).expect("header"));
                    dynamic.put(key, resp).await
                }));
            }
            for writer in writers {
                writer.await.expect("join").expect("put");
            }

            let stored = dynamic.get(&key).await.expect("get").expect("present");
            let tag = stored
                .headers()
                .get("x-writer")
                .and_then(|v| v.to_str().ok())
                .expect("writer header")
                .to_string();
            assert!(stored.body().starts_with(format!("{tag}:").as_bytes()));
        }

        let mut leftovers = fs::read_dir(dir.join("dynamic-v1.0.0")).await.expect("read dir");
        let mut files = Vec::new();
        while let Some(entry) = leftovers.next_entry().await.expect("entry") {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(files, vec![entry_file_name(&key)]);

        let _ = fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn truncated_entry_is_reported_as_malformed() {
        let dir = storage_dir("truncated");
        let _ = fs::remove_dir_all(&dir).await;

        let storage = DiskStorage::new(dir.clone());
        let dynamic = storage.open("dynamic-v1.0.0").await.expect("open");
        let key = RequestKey::get("https://app.test/a.css");
        fs::write(dynamic.entry_path(&key), [0, 0, 0x10, 0, b'{']).await.expect("write");

        assert!(matches!(dynamic.get(&key).await, Err(StoreError::Malformed(_))));
        assert!(dynamic.keys().await.expect("keys").is_empty());

        let _ = fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn delete_and_quota() {
        let dir = storage_dir("quota");
        let _ = fs::remove_dir_all(&dir).await;

        let storage = DiskStorage::with_max_entry_bytes(dir.clone(), 8);
        let dynamic = storage.open("dynamic-v1.0.0").await.expect("open");
        let key = RequestKey::get("https://app.test/a.css");

        dynamic.put(key.clone(), FetchResponse::ok("text/css", "a{}")).await.expect("put");
        assert!(dynamic.delete(&key).await.expect("delete"));
        assert!(!dynamic.delete(&key).await.expect("delete again"));

        let err = dynamic
            .put(key, FetchResponse::ok("text/css", "body{color:red}"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { .. }));

        let _ = fs::remove_dir_all(&dir).await;
    }
}
