//! In-memory storage backend for testing.

use super::{BlobInfoStream, key_has_prefix};
use crate::error::{ErrorKind, Result};
use crate::{Blob, BlobInfo, BlobStore, sniff, validate_key};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use time::UtcDateTime;
use tokio::sync::RwLock;

/// In-memory storage backend for testing.
///
/// Blobs are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Individual keys
/// can be marked as undeletable to simulate a blob store outage part way
/// through a cascading delete.
///
/// # Examples
///
/// ```
/// use folio_storage::backend::MockBackend;
/// use folio_storage::BlobStore;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_blobs([("cover", b"GIF89a...")]);
/// assert!(backend.exists("cover").await?);
///
/// backend.write("notes", b"data...").await?;
/// assert!(backend.exists("notes").await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<String, (UtcDateTime, Vec<u8>)>>,
    undeletable: RwLock<HashSet<String>>,
    deletes: AtomicU64,
}

impl MockBackend {
    /// Create a mock backend pre-populated with blobs.
    ///
    /// Panics if any key fails validation. If test setup is wrong, then the
    /// test should not pass.
    pub fn with_blobs(blobs: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = UtcDateTime::now();
        for (key, data) in blobs {
            let key = key.into();
            let Ok(validated) = validate_key(&key) else {
                panic!("MockBackend::with_blobs: invalid key {key}");
            };
            map.insert(validated, (now, data.into()));
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            undeletable: RwLock::new(HashSet::new()),
            deletes: AtomicU64::new(0),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every subsequent delete of `key` fail with a backend error.
    pub async fn fail_deletes_for(&self, key: impl Into<String>) {
        self.undeletable.write().await.insert(key.into());
    }

    /// Snapshot of all stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.storage.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of successful deletes performed so far.
    pub fn delete_count(&self) -> u64 {
        self.deletes.load(Ordering::SeqCst)
    }

    fn info(key: &str, data: &[u8], inserted: UtcDateTime) -> BlobInfo {
        BlobInfo::new(key, data.len() as u64, inserted.into(), sniff::content_type(data))
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let blobs: [(&str, &[u8]); 0] = [];
        Self::with_blobs(blobs)
    }
}

#[async_trait]
impl BlobStore for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> BlobInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_key).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // Snapshot under the read lock, then drop it before yielding.
            let entries: Vec<BlobInfo> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .filter(|(key, _)| match &validated_prefix {
                        Some(pfx) => key_has_prefix(key, pfx),
                        None => true,
                    })
                    .map(|(key, (inserted, data))| Self::info(key, data, *inserted))
                    .collect()
            };
            for info in entries {
                yield Ok(info);
            }
        })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let key = validate_key(key)?;
        Ok(self.storage.read().await.contains_key(&key))
    }

    async fn read(&self, key: &str) -> Result<Blob> {
        let key = validate_key(key)?;
        let (_inserted, data) =
            self.storage.read().await.get(&key).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key)))?;
        Ok(Blob::new(data))
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let key = validate_key(key)?;
        self.storage.write().await.insert(key, (UtcDateTime::now(), data.to_vec()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = validate_key(key)?;
        if self.undeletable.read().await.contains(&key) {
            exn::bail!(ErrorKind::BackendError(format!("simulated delete failure for {key}")));
        }
        self.storage.write().await.remove(&key).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key)))?;
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stat(&self, key: &str) -> Result<BlobInfo> {
        let key = validate_key(key)?;
        let guard = self.storage.read().await;
        let (inserted, data) = guard.get(&key).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.clone())))?;
        Ok(Self::info(&key, data, *inserted))
    }
}
