//! SQLite store gateway for the publishing backend.
//!
//! This crate owns the relational side of the system: articles (with their
//! cached translation columns), uploaded media metadata, share analytics and
//! captioning bookkeeping. Blob bytes live elsewhere; a file row only
//! remembers its blob key.
//!
//! # Architecture
//! - [`Database`] owns the pool and runs the embedded migrations.
//! - [`Repository`] exposes one method per query, each loaded from
//!   `queries/*.sql`.
//! - [`Transaction`] wraps multi-statement work, chiefly the cascading
//!   article delete.

mod db;
pub mod error;
mod models;
mod records;
mod repo;

pub use crate::db::{DEFAULT_MAX_CONNECTIONS, Database};
pub use crate::records::{
    Article, ArticleEntry, MediaFile, NewArticle, NewMediaFile, ShareEvent, Subtitle, TranslatedContent, User,
    VideoTask,
};
pub use crate::repo::{MediaRef, Repository, Transaction};
