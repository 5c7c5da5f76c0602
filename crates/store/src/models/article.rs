use super::timestamp;
use crate::error::Error;
use crate::records::{Article, ArticleEntry, TranslatedContent};

#[derive(sqlx::FromRow)]
pub(crate) struct EntryRow {
    id: i64,
    title: String,
    user_id: String,
    cover: String,
    tags: String,
    #[sqlx(rename = "abstract")]
    summary: String,
    ctime: i64,
    mtime: i64,
}
impl TryFrom<EntryRow> for ArticleEntry {
    type Error = Error;
    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            user_id: row.user_id,
            cover: row.cover,
            tags: row.tags,
            summary: row.summary,
            created: timestamp(row.ctime, "article ctime")?,
            modified: timestamp(row.mtime, "article mtime")?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TranslationRow {
    trans_content: Option<String>,
    trans_title: Option<String>,
    trans_tags: Option<String>,
    trans_abstract: Option<String>,
}
impl TranslationRow {
    /// The persisted translation, if one was written.
    ///
    /// NULL columns mean the article was never translated (or was re-saved
    /// since). An empty translated body only counts when the source body is
    /// empty too.
    pub(crate) fn into_cached(self, source_is_empty: bool) -> Option<TranslatedContent> {
        let content = self.trans_content?;
        if content.is_empty() && !source_is_empty {
            return None;
        }
        Some(TranslatedContent {
            title: self.trans_title.unwrap_or_default(),
            tags: self.trans_tags.unwrap_or_default(),
            summary: self.trans_abstract.unwrap_or_default(),
            content,
        })
    }
}

/// Translation columns plus just enough of the source to judge them.
#[derive(sqlx::FromRow)]
pub(crate) struct CachedTranslationRow {
    #[sqlx(flatten)]
    translation: TranslationRow,
    source_is_empty: bool,
}
impl CachedTranslationRow {
    pub(crate) fn into_cached(self) -> Option<TranslatedContent> {
        self.translation.into_cached(self.source_is_empty)
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ArticleRow {
    #[sqlx(flatten)]
    entry: EntryRow,
    content: String,
    trans: bool,
    html_id: Option<i64>,
    #[sqlx(flatten)]
    translation: TranslationRow,
}
impl TryFrom<ArticleRow> for Article {
    type Error = Error;
    fn try_from(row: ArticleRow) -> Result<Self, Self::Error> {
        let translation = row.translation.into_cached(row.content.is_empty());
        Ok(Self {
            entry: row.entry.try_into()?,
            content: row.content,
            has_translation: row.trans,
            html_id: row.html_id,
            translation,
        })
    }
}
