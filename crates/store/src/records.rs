//! Domain records handed across the store boundary.
//!
//! These are what callers of [`Repository`](crate::Repository) see; the
//! `sqlx` row types they are converted from stay private to the crate.

use time::UtcDateTime;

/// Local mirror of an identity provider profile, used to hydrate listings.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub avatar: String,
}

/// The listing projection of an article (no body, no translation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleEntry {
    pub id: i64,
    pub title: String,
    pub user_id: String,
    pub cover: String,
    /// Delimited tag list, exactly as the author saved it.
    pub tags: String,
    pub summary: String,
    pub created: UtcDateTime,
    pub modified: UtcDateTime,
}

/// A full article row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub entry: ArticleEntry,
    pub content: String,
    /// Author opted in to serving a translation.
    pub has_translation: bool,
    /// File holding the rendered HTML body, if one was uploaded.
    pub html_id: Option<i64>,
    /// Present only when a non-empty translated body has been cached.
    pub translation: Option<TranslatedContent>,
}

/// The four cached translation columns of an article.
///
/// Absent columns read back as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslatedContent {
    pub title: String,
    pub tags: String,
    pub summary: String,
    pub content: String,
}

/// Author-supplied fields for creating or re-saving an article.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewArticle {
    pub title: String,
    pub cover: String,
    pub tags: String,
    pub summary: String,
    pub content: String,
    pub has_translation: bool,
}

/// Metadata of an uploaded media blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub id: i64,
    /// Opaque blob store key.
    pub key: String,
    /// Sniffed MIME type.
    pub format: String,
    pub user_id: String,
    pub size: u64,
    pub created: UtcDateTime,
    pub modified: UtcDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMediaFile {
    pub key: String,
    pub format: String,
    pub user_id: String,
    pub size: u64,
}

/// An append-only share analytics event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareEvent {
    pub platform: String,
    pub user_id: String,
    pub ip: String,
    pub article_id: String,
}
impl ShareEvent {
    /// Key identifying repeat shares of one article from one address to
    /// one platform. Not enforced unique.
    pub fn index_key(&self) -> String {
        format!("{}{}{}", self.ip, self.platform, self.article_id)
    }
}

/// A caption track attached to a video.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Subtitle {
    pub video_id: i64,
    pub subtitle_id: i64,
    pub user_id: String,
    pub language: String,
}

/// Bookkeeping for an external captioning job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTask {
    pub resource_id: i64,
    pub task_id: String,
    /// Set once the job has produced captions.
    pub output: Option<String>,
    pub created: UtcDateTime,
    pub updated: UtcDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_index_key() {
        let event = ShareEvent {
            platform: "twitter".to_string(),
            user_id: "u1".to_string(),
            ip: "10.0.0.1".to_string(),
            article_id: "42".to_string(),
        };
        assert_eq!(event.index_key(), "10.0.0.1twitter42");
    }
}
