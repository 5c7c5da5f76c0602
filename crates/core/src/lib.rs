//! Publishing backend core.
//!
//! # Architecture
//! - [`Cursor`] encodes listing positions for the wire.
//! - [`TranslationCache`] translates articles lazily and persists the result.
//! - [`Paginator`] pages through articles and media, newest first.
//! - [`Lifecycle`] deletes articles together with the media they own.
//! - [`Dispatcher`] runs share recording and captioning kickoff in the
//!   background.
//! - [`Community`] builds all of the above from a [`Config`] and is the
//!   value request handlers hold on to.
//!
//! External collaborators are reached through the [`Translator`],
//! [`CaptionScheduler`] and [`BlobStore`](folio_storage::BlobStore) traits.

mod cursor;
pub mod dispatch;
pub mod error;
mod lifecycle;
mod media;
mod paginate;
mod service;
pub mod translate;

pub use crate::cursor::Cursor;
pub use crate::dispatch::{CaptionScheduler, CaptionSchedulerHandle, DispatchStats, Dispatcher, Job, TaskHandle};
pub use crate::lifecycle::Lifecycle;
pub use crate::media::{MediaState, needs_captioning};
pub use crate::paginate::{Owned, Page, Paginator};
pub use crate::service::Community;
pub use crate::translate::{
    FieldOutcome, FieldOutcomes, Source, Translated, TranslationCache, Translator, TranslatorHandle,
};
pub use folio_config::Config;
