//! Translation engine contract and the read-through translation cache.

mod cache;
pub mod markdown;

pub use self::cache::{FieldOutcome, FieldOutcomes, Source, Translated, TranslationCache};
use self::markdown::Segment;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// External translation engine.
///
/// Language tags are passed through untouched; `"auto"` as the source asks
/// the engine to detect it.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate_plain(&self, text: &str, from: &str, to: &str) -> Result<String>;

    /// Translate several texts in one request.
    ///
    /// Implementations must return one entry per input, in order.
    async fn translate_batch(&self, texts: &[String], from: &str, to: &str) -> Result<Vec<String>>;

    /// Translate markdown without disturbing its structure.
    ///
    /// The default implementation sends only the prose segments found by
    /// [`markdown::segment`] through a single
    /// [`translate_batch`](Self::translate_batch) call. Code, URLs and
    /// block markers are never sent.
    async fn translate_markup(&self, text: &str, from: &str, to: &str) -> Result<String> {
        let segments = markdown::segment(text);
        let prose: Vec<String> = segments.iter().filter_map(Segment::prose).map(str::to_string).collect();
        if prose.is_empty() {
            return Ok(text.to_string());
        }
        let translated = self.translate_batch(&prose, from, to).await?;
        if translated.len() != prose.len() {
            exn::bail!(ErrorKind::Translation);
        }
        Ok(markdown::reassemble(&segments, translated))
    }
}

pub type TranslatorHandle = Arc<dyn Translator>;
