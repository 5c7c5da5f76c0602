//! Storage models.

use time::OffsetDateTime;

/// Blob metadata returned by storage backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    /// Normalized key relative to the storage root
    pub key: String,
    /// Blob size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
    /// MIME type detected from the leading bytes of the blob
    pub content_type: &'static str,
}
impl BlobInfo {
    pub fn new(key: impl Into<String>, size: u64, modified: OffsetDateTime, content_type: &'static str) -> Self {
        Self {
            key: key.into(),
            size,
            modified,
            content_type,
        }
    }
}

/// A fully read blob along with the metadata a caller needs to serve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub size: u64,
}
impl Blob {
    pub fn new(bytes: Vec<u8>) -> Self {
        let content_type = crate::sniff::content_type(&bytes);
        let size = bytes.len() as u64;
        Self { bytes, content_type, size }
    }
}
