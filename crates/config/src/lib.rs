//! Layered configuration for folio.
//!
//! Layers are merged in order, later layers winning:
//! 1. built-in defaults,
//! 2. `config.toml` in the platform configuration directory,
//! 3. an explicit file (TOML, YAML or JSON, chosen by extension),
//! 4. `FOLIO_*` environment variables, with `__` separating nested keys
//!    (`FOLIO_LISTING__MAX_PAGE_SIZE=50`).

pub mod error;
mod sections;

pub use crate::sections::{DatabaseConfig, DispatchConfig, ListingConfig, StorageConfig, TranslationConfig};
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const ENV_PREFIX: &str = "FOLIO_";

/// Largest `listing.max_page_size` the services accept.
pub const PAGE_SIZE_LIMIT: u64 = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub translation: TranslationConfig,
    pub dispatch: DispatchConfig,
    pub listing: ListingConfig,
}

impl Config {
    /// Load and validate configuration from every layer.
    ///
    /// An explicit `path` that does not exist is an error; a missing
    /// platform configuration file is not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_layers(Self::user_config_file(), path)
    }

    /// Location of the per-user configuration file, if the platform has one.
    pub fn user_config_file() -> Option<PathBuf> {
        ProjectDirs::from("", "", "folio").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn load_layers(user_file: Option<PathBuf>, explicit: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(user_file) = user_file.filter(|p| p.is_file()) {
            debug!(path = %user_file.display(), "merging user configuration");
            figment = figment.merge(Toml::file(user_file));
        }
        if let Some(path) = explicit {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
            }
            debug!(path = %path.display(), "merging configuration file");
            figment = match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                other => exn::bail!(ErrorKind::UnsupportedFormat(other.unwrap_or_default().to_string())),
            };
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        let config: Self = figment.extract().or_raise(|| ErrorKind::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the services cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| exn::Exn::from(ErrorKind::Invalid(reason.to_string()));
        if self.database.max_connections == 0 {
            return Err(invalid("database.max_connections must be at least 1"));
        }
        if self.dispatch.concurrency == 0 {
            return Err(invalid("dispatch.concurrency must be at least 1"));
        }
        if self.dispatch.queue_size == 0 {
            return Err(invalid("dispatch.queue_size must be at least 1"));
        }
        if self.listing.default_page_size == 0 {
            return Err(invalid("listing.default_page_size must be at least 1"));
        }
        if self.listing.max_page_size > PAGE_SIZE_LIMIT {
            return Err(invalid("listing.max_page_size exceeds the page size limit"));
        }
        if self.listing.default_page_size > self.listing.max_page_size {
            return Err(invalid("listing.default_page_size exceeds listing.max_page_size"));
        }
        if self.translation.target_language.trim().is_empty() {
            return Err(invalid("translation.target_language is empty"));
        }
        if self.translation.tag_delimiter.is_empty() || self.translation.translated_tag_delimiter.is_empty() {
            return Err(invalid("tag delimiters must not be empty"));
        }
        Ok(())
    }
}
