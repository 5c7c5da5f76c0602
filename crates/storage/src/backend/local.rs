//! Local filesystem storage backend.
//!
//! Blobs are stored as plain files under a configured directory and accessed
//! via `tokio::fs` for async I/O. A blob key maps directly onto a relative
//! path below the root.

use crate::backend::{BlobInfoStream, key_has_prefix};
use crate::error::{ErrorKind, Result};
use crate::sniff::{self, SNIFF_LEN};
use crate::{Blob, BlobInfo, BlobStore, validate_key};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::{Metadata, create_dir_all as sync_create_dir};
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};
use tokio::io::AsyncReadExt;

enum WalkEntry {
    File(BlobInfo),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem storage backend.
///
/// # Examples
///
/// ```no_run
/// use folio_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("media", "/var/lib/folio/media")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory for blobs
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
            }
        } else {
            // Non-async: happens once at startup and isn't worth making the
            // constructor async for.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root.display().to_string()))?;
        }
        Ok(Self { name: name.into(), root })
    }

    /// Validate a key and join it with the root directory.
    fn absolute_path(&self, key: &str) -> Result<(String, PathBuf)> {
        let validated = validate_key(key)?;
        let path = validated.split('/').fold(self.root.clone(), |acc, part| acc.join(part));
        Ok((validated, path))
    }

    /// Convert an absolute path back to a normalized key.
    fn relative_key(&self, absolute: &Path) -> Result<String> {
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{:?}` is not within root `{:?}`", absolute, self.root))
        })?;
        let parts = relative
            .components()
            .map(|c| {
                c.as_os_str()
                    .to_str()
                    .ok_or_else(|| exn::Exn::from(ErrorKind::InvalidKey(relative.display().to_string())))
            })
            .collect::<Result<Vec<_>>>()?;
        validate_key(parts.join("/"))
    }

    async fn sniff(path: &Path, key: &str) -> Result<&'static str> {
        let file = fs::File::open(path).await.map_err(|e| Self::map_io_error(e, key))?;
        let mut head = Vec::with_capacity(SNIFF_LEN);
        file.take(SNIFF_LEN as u64).read_to_end(&mut head).await.map_err(ErrorKind::Io)?;
        Ok(sniff::content_type(&head))
    }

    async fn info(path: &Path, key: String, metadata: Metadata) -> Result<BlobInfo> {
        let modified = metadata.modified().map_err(ErrorKind::Io)?.into();
        let content_type = Self::sniff(path, &key).await?;
        Ok(BlobInfo::new(key, metadata.len(), modified, content_type))
    }

    fn map_io_error(e: std::io::Error, key: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(key.to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(key.to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Keeps the `?` operator usable for the body of the listing stream,
    /// which can only yield errors.
    async fn process_entry(&self, entry: DirEntry, prefix: Option<&str>) -> Result<WalkEntry> {
        let path = entry.path();
        let display = path.display().to_string();
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &display))?;
        if metadata.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if !metadata.is_file() {
            // Most likely a broken symlink.
            return Ok(WalkEntry::Skip);
        }
        let key = self.relative_key(&path)?;
        if let Some(pfx) = prefix
            && !key_has_prefix(&key, pfx)
        {
            return Ok(WalkEntry::Skip);
        }
        Ok(WalkEntry::File(Self::info(&path, key, metadata).await?))
    }
}

#[async_trait]
impl BlobStore for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> BlobInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_key).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };
        let mut stack = vec![self.root.clone()];

        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current.display().to_string())));
                        continue 'dirs;
                    }
                };

                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => {
                            yield Err(exn::Exn::from(Self::map_io_error(e, &current.display().to_string())));
                            continue 'entries;
                        },
                    };
                    match self.process_entry(entry, validated_prefix.as_deref()).await {
                        Ok(WalkEntry::File(f)) => yield Ok(f),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let (_, path) = self.absolute_path(key)?;
        Ok(fs::try_exists(&path).await.map_err(ErrorKind::Io)?)
    }

    async fn read(&self, key: &str) -> Result<Blob> {
        let (key, path) = self.absolute_path(key)?;
        let bytes = fs::read(&path).await.map_err(|e| Self::map_io_error(e, &key))?;
        Ok(Blob::new(bytes))
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let (key, path) = self.absolute_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, &key))?;
        }
        Ok(fs::write(&path, data).await.map_err(|e| Self::map_io_error(e, &key))?)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let (key, path) = self.absolute_path(key)?;
        Ok(fs::remove_file(&path).await.map_err(|e| Self::map_io_error(e, &key))?)
    }

    async fn stat(&self, key: &str) -> Result<BlobInfo> {
        let (key, path) = self.absolute_path(key)?;
        let metadata = fs::metadata(&path).await.map_err(|e| Self::map_io_error(e, &key))?;
        Self::info(&path, key, metadata).await
    }
}
