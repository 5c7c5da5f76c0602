//! Read-through cache over the translated columns of an article.
//!
//! The first read of an article translates it and persists the result; every
//! later read is served from the store without calling the engine. Two
//! concurrent misses for the same article are not serialised: both translate
//! and the last write wins.

use super::TranslatorHandle;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use folio_config::TranslationConfig;
use folio_store::{Article, Repository, TranslatedContent};
use tracing::{debug, instrument, warn};

/// What happened to one translated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    Translated,
    /// The source was empty, so there was nothing to send.
    NotNeeded,
    /// The engine failed; the untranslated source is used instead.
    FellBack(String),
}
impl FieldOutcome {
    pub fn fell_back(&self) -> bool {
        matches!(self, Self::FellBack(_))
    }

    fn cached(text: &str) -> Self {
        if text.is_empty() { Self::NotNeeded } else { Self::Translated }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOutcomes {
    pub title: FieldOutcome,
    pub tags: FieldOutcome,
    pub summary: FieldOutcome,
    pub content: FieldOutcome,
}
impl FieldOutcomes {
    fn cached(content: &TranslatedContent) -> Self {
        Self {
            title: FieldOutcome::cached(&content.title),
            tags: FieldOutcome::cached(&content.tags),
            summary: FieldOutcome::cached(&content.summary),
            content: FieldOutcome::cached(&content.content),
        }
    }

    /// No field fell back to its source text.
    pub fn is_complete(&self) -> bool {
        self.iter().all(|(_, outcome)| !outcome.fell_back())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldOutcome)> {
        [("title", &self.title), ("tags", &self.tags), ("abstract", &self.summary), ("content", &self.content)]
            .into_iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Served from the persisted translation.
    Cache,
    /// Translated during this call.
    Fresh,
}

/// A translated article along with how each field was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translated {
    pub id: i64,
    pub content: TranslatedContent,
    pub source: Source,
    pub outcomes: FieldOutcomes,
}
impl Translated {
    pub fn is_complete(&self) -> bool {
        self.outcomes.is_complete()
    }
}

pub struct TranslationCache {
    repo: Repository,
    translator: TranslatorHandle,
    settings: TranslationConfig,
}

impl TranslationCache {
    pub fn new(repo: Repository, translator: TranslatorHandle, settings: TranslationConfig) -> Self {
        Self { repo, translator, settings }
    }

    /// Get the translated article, translating and caching it on a miss.
    ///
    /// A translation where any field fell back is returned but not cached,
    /// so the next read tries again. Failing to persist a complete
    /// translation is logged and does not fail the call.
    #[instrument(skip(self))]
    pub async fn get_translated(&self, id: i64) -> Result<Translated> {
        let cached = self.repo.get_translation(id).await.or_raise(|| ErrorKind::Store)?;
        match cached {
            None => exn::bail!(ErrorKind::NotFound(format!("article {id}"))),
            Some(Some(content)) => {
                debug!("translation cache hit");
                let outcomes = FieldOutcomes::cached(&content);
                return Ok(Translated { id, content, source: Source::Cache, outcomes });
            },
            Some(None) => debug!("translation cache miss"),
        }

        let article = self
            .repo
            .get_article(id)
            .await
            .or_raise(|| ErrorKind::Store)?
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(format!("article {id}"))))?;
        let (content, outcomes) = self.translate(&article).await;

        if outcomes.is_complete() {
            match self.repo.save_translation(id, &content).await {
                Ok(true) => debug!("translation cached"),
                Ok(false) => debug!("article deleted before translation was cached"),
                Err(e) => warn!(error = ?e, "failed to cache translation"),
            }
        } else {
            for (field, outcome) in outcomes.iter() {
                if let FieldOutcome::FellBack(reason) = outcome {
                    warn!(field, reason = %reason, "field fell back to source text");
                }
            }
        }
        Ok(Translated { id, content, source: Source::Fresh, outcomes })
    }

    async fn translate(&self, article: &Article) -> (TranslatedContent, FieldOutcomes) {
        let entry = &article.entry;
        let (title, summary, tags, content) = tokio::join!(
            self.plain(&entry.title),
            self.plain(&entry.summary),
            self.tags(&entry.tags),
            self.markup(&article.content),
        );
        let outcomes = FieldOutcomes { title: title.1, tags: tags.1, summary: summary.1, content: content.1 };
        let translated = TranslatedContent { title: title.0, tags: tags.0, summary: summary.0, content: content.0 };
        (translated, outcomes)
    }

    async fn plain(&self, text: &str) -> (String, FieldOutcome) {
        if text.trim().is_empty() {
            return (text.to_string(), FieldOutcome::NotNeeded);
        }
        let (from, to) = self.languages();
        match self.translator.translate_plain(text, from, to).await {
            Ok(translated) => (translated, FieldOutcome::Translated),
            Err(e) => (text.to_string(), FieldOutcome::FellBack((*e).to_string())),
        }
    }

    async fn markup(&self, text: &str) -> (String, FieldOutcome) {
        if text.trim().is_empty() {
            return (text.to_string(), FieldOutcome::NotNeeded);
        }
        let (from, to) = self.languages();
        match self.translator.translate_markup(text, from, to).await {
            Ok(translated) => (translated, FieldOutcome::Translated),
            Err(e) => (text.to_string(), FieldOutcome::FellBack((*e).to_string())),
        }
    }

    /// Translate a delimited tag list, keeping one output tag per input tag.
    ///
    /// Empty entries keep their position and are never sent to the engine.
    async fn tags(&self, tags: &str) -> (String, FieldOutcome) {
        let joiner = self.settings.translated_tag_delimiter.as_str();
        let source = split_tags(tags, &self.settings.tag_delimiter);
        let wanted: Vec<String> = source.iter().filter(|t| !t.is_empty()).map(|t| t.to_string()).collect();
        if wanted.is_empty() {
            return (source.join(joiner), FieldOutcome::NotNeeded);
        }
        let (from, to) = self.languages();
        let translated = match self.translator.translate_batch(&wanted, from, to).await {
            Ok(translated) => translated,
            Err(e) => return (tags.to_string(), FieldOutcome::FellBack((*e).to_string())),
        };
        if translated.len() != wanted.len() {
            let reason = format!("engine returned {} tags for {}", translated.len(), wanted.len());
            return (tags.to_string(), FieldOutcome::FellBack(reason));
        }
        (rejoin(&source, translated, joiner), FieldOutcome::Translated)
    }

    fn languages(&self) -> (&str, &str) {
        (&self.settings.source_language, &self.settings.target_language)
    }
}

fn split_tags<'a>(tags: &'a str, delimiter: &str) -> Vec<&'a str> {
    tags.split(delimiter).map(str::trim).collect()
}

/// Put translated tags back into the non-empty slots of `source`.
fn rejoin(source: &[&str], translated: Vec<String>, joiner: &str) -> String {
    let mut translated = translated.into_iter();
    source
        .iter()
        .map(|original| {
            if original.is_empty() {
                return String::new();
            }
            let tag = translated.next().map(|tag| clean_tag(&tag, joiner)).unwrap_or_default();
            if tag.is_empty() { clean_tag(original, joiner) } else { tag }
        })
        .collect::<Vec<_>>()
        .join(joiner)
}

/// Remove the join delimiter from a tag so re-splitting cannot change the
/// tag count.
fn clean_tag(tag: &str, joiner: &str) -> String {
    tag.replace(joiner, " ").trim().to_string()
}
