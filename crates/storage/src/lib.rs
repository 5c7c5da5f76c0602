//! Blob storage for uploaded media.
//!
//! Blobs are addressed by opaque string keys (the `file_key` column of the
//! store). Keys are never derived from content, so two identical uploads
//! produce two independent blobs.

pub mod backend;
pub mod error;
mod key;
mod models;
pub mod sniff;

pub use crate::backend::BlobStore;
pub use crate::key::validate as validate_key;
pub use crate::models::{Blob, BlobInfo};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn BlobStore + Send + Sync>;
