//! Blob store trait and implementations.
//!
//! This module defines the `BlobStore` trait, which provides a unified
//! interface for media blob operations across different backends (local
//! filesystem, in-memory for tests).

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::models::{Blob, BlobInfo};
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;

pub(crate) type BlobInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<BlobInfo>> + Send + 'a>>;

/// Unified interface for blob storage backends.
///
/// The relational store only ever remembers a blob's key; everything else
/// (bytes, size, detected type) lives here.
///
/// # Key Handling
/// All keys are relative to the storage root and must be validated using
/// [`validate_key`](crate::validate_key) before use. Implementations should
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use folio_storage::{BlobStore, error::Result};
///
/// async fn size_of_blob(backend: &dyn BlobStore, key: &str) -> Result<u64> {
///     if backend.exists(key).await? {
///         Ok(backend.stat(key).await?.size)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// List all blobs matching an optional key prefix.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<BlobInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream blob metadata matching an optional key prefix.
    ///
    /// Prefix matching is component-based: the prefix `media/a` matches
    /// `media/a/x` but not `media/ab`.
    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> BlobInfoStream<'a>;

    /// Check if a blob exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Read a blob in full, along with its sniffed content type and size.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the blob
    /// does not exist.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use folio_storage::{BlobStore, error::Result};
    /// # async fn example(backend: &dyn BlobStore) -> Result<()> {
    /// let blob = backend.read("8f14e45f-ceea-467f-a0e6-7c6f5d3b7c27").await?;
    /// println!("{} ({} bytes)", blob.content_type, blob.size);
    /// # Ok(())
    /// # }
    /// ```
    async fn read(&self, key: &str) -> Result<Blob>;

    /// Write blob contents.
    ///
    /// Creates a new blob or overwrites an existing blob with the same key.
    async fn write(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Delete a blob.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the blob
    /// does not exist.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Get blob metadata without reading the full contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the blob
    /// does not exist.
    async fn stat(&self, key: &str) -> Result<BlobInfo>;
}

/// Component-based prefix match on normalized keys.
pub(crate) fn key_has_prefix(key: &str, prefix: &str) -> bool {
    key == prefix || key.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("media/a/x", "media/a", true)]
    #[case("media/a", "media/a", true)]
    #[case("media/ab", "media/a", false)]
    #[case("other/a/x", "media/a", false)]
    fn test_key_has_prefix(#[case] key: &str, #[case] prefix: &str, #[case] expected: bool) {
        assert_eq!(key_has_prefix(key, prefix), expected);
    }
}
