//! Configuration sections.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Relational store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("folio.sqlite"), max_connections: 5 }
    }
}

/// Blob store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory blobs are written under. Relative paths are resolved
    /// against the working directory.
    pub root: PathBuf,
    /// Prepended to a blob key to build its public URL.
    pub url_prefix: String,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self { root: PathBuf::from("./media"), url_prefix: String::new() }
    }
}
impl StorageConfig {
    /// The storage root as an absolute path.
    pub fn absolute_root(&self) -> std::io::Result<PathBuf> {
        std::path::absolute(&self.root)
    }
}

/// Language pair and tag delimiters used by the translation cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// `auto` lets the engine detect the source language.
    pub source_language: String,
    pub target_language: String,
    /// Separates tags in the article as saved by the author.
    pub tag_delimiter: String,
    /// Separates tags in the cached translation.
    pub translated_tag_delimiter: String,
}
impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_language: "auto".to_string(),
            target_language: "en".to_string(),
            tag_delimiter: ",".to_string(),
            translated_tag_delimiter: ";".to_string(),
        }
    }
}

/// Background side-effect workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Jobs waiting beyond this are dropped.
    pub queue_size: usize,
    /// Jobs running at once.
    pub concurrency: usize,
}
impl Default for DispatchConfig {
    fn default() -> Self {
        Self { queue_size: 256, concurrency: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    pub default_page_size: u64,
    pub max_page_size: u64,
}
impl Default for ListingConfig {
    fn default() -> Self {
        Self { default_page_size: 10, max_page_size: 100 }
    }
}
