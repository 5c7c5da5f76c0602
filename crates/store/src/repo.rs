//! Repository for every table in the publishing store.
//!
//! Articles own media (through `html_id` and the `article_media` join), and
//! the cascading delete has to see both at once, so a single repository
//! covers the whole schema rather than one per table.

use crate::Database;
use crate::error::{ErrorKind, Result, write_error};
use crate::models::{ArticleRow, CachedTranslationRow, EntryRow, FileRow, MediaRefRow, VideoTaskRow};
use crate::records::{
    Article, ArticleEntry, MediaFile, NewArticle, NewMediaFile, ShareEvent, Subtitle, TranslatedContent, User,
    VideoTask,
};
use exn::ResultExt;
use sqlx::{Sqlite, SqlitePool};
use time::UtcDateTime;
use tracing::{debug, instrument};

/// A media row owned by an article, with the blob key needed to remove it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub id: i64,
    pub key: String,
}
impl From<MediaRefRow> for MediaRef {
    fn from(row: MediaRefRow) -> Self {
        Self { id: row.id, key: row.file_key }
    }
}

/// Build a `LIKE` pattern matching `needle` anywhere, escaping wildcards.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn to_i64(value: u64, what: &'static str) -> Result<i64> {
    i64::try_from(value).or_raise(|| ErrorKind::InvalidData(what))
}

fn now() -> i64 {
    UtcDateTime::now().unix_timestamp()
}

/// Repository over the publishing store.
///
/// Cheap to clone; every clone shares the same pool.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a transaction for multi-statement work such as the cascading
    /// article delete.
    pub async fn begin(&self) -> Result<Transaction> {
        let tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        Ok(Transaction { tx })
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn upsert_user(&self, user: &User) -> Result<()> {
        sqlx::query(include_str!("../queries/upsert_user.sql"))
            .bind(&user.id)
            .bind(&user.name)
            .bind(&user.avatar)
            .bind(now())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        sqlx::query_as(include_str!("../queries/get_user.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    // =========================================================================
    // Articles
    // =========================================================================

    /// Insert a new article owned by `user_id` and return its id.
    pub async fn insert_article(&self, user_id: &str, article: &NewArticle) -> Result<i64> {
        let ts = now();
        let result = sqlx::query(include_str!("../queries/insert_article.sql"))
            .bind(&article.title)
            .bind(user_id)
            .bind(&article.cover)
            .bind(&article.tags)
            .bind(&article.summary)
            .bind(&article.content)
            .bind(article.has_translation)
            .bind(ts)
            .bind(ts)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(result.last_insert_rowid())
    }

    /// Re-save an article owned by `user_id`.
    ///
    /// Clears the cached translation in the same statement. Returns the
    /// number of rows changed: zero when the article is missing or owned by
    /// someone else.
    pub async fn update_article(&self, id: i64, user_id: &str, article: &NewArticle) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/update_article.sql"))
            .bind(&article.title)
            .bind(&article.cover)
            .bind(&article.tags)
            .bind(&article.summary)
            .bind(&article.content)
            .bind(article.has_translation)
            .bind(now())
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(result.rows_affected())
    }

    pub async fn get_article(&self, id: i64) -> Result<Option<Article>> {
        let row: Option<ArticleRow> = sqlx::query_as(include_str!("../queries/get_article.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Article::try_from).transpose()
    }

    /// Read the four cached translation columns.
    ///
    /// The outer `None` means the article does not exist; the inner one
    /// means it has no cached translation yet.
    pub async fn get_translation(&self, id: i64) -> Result<Option<Option<TranslatedContent>>> {
        let row: Option<CachedTranslationRow> = sqlx::query_as(include_str!("../queries/get_translation.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.map(CachedTranslationRow::into_cached))
    }

    /// Write all four translation columns in one statement.
    ///
    /// Returns `false` if the article vanished in the meantime.
    #[instrument(skip(self, translated))]
    pub async fn save_translation(&self, id: i64, translated: &TranslatedContent) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/save_translation.sql"))
            .bind(&translated.content)
            .bind(&translated.title)
            .bind(&translated.tags)
            .bind(&translated.summary)
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn article_owner(&self, id: i64) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(include_str!("../queries/article_owner.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.map(|(owner,)| owner))
    }

    pub async fn can_edit(&self, user_id: &str, id: i64) -> Result<bool> {
        let (allowed,): (bool,) = sqlx::query_as(include_str!("../queries/can_edit.sql"))
            .bind(id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(allowed)
    }

    /// List articles newest first whose title contains `title_filter`.
    ///
    /// An empty filter matches every article.
    pub async fn list_articles(&self, offset: u64, limit: u64, title_filter: &str) -> Result<Vec<ArticleEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(include_str!("../queries/list_articles.sql"))
            .bind(contains_pattern(title_filter))
            .bind(to_i64(limit, "limit")?)
            .bind(to_i64(offset, "offset")?)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        debug!(offset, limit, rows = rows.len(), "listed articles");
        rows.into_iter().map(ArticleEntry::try_from).collect()
    }

    pub async fn list_articles_by_user(&self, user_id: &str) -> Result<Vec<ArticleEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(include_str!("../queries/list_articles_by_user.sql"))
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(ArticleEntry::try_from).collect()
    }

    /// Point an article at an uploaded HTML body.
    ///
    /// With no `article_id` a fresh article is created. Otherwise the owned
    /// article is updated (invalidating its cached translation). Returns the
    /// article id, or `None` if there was no such article owned by `user_id`.
    pub async fn set_html(
        &self,
        user_id: &str,
        article_id: Option<i64>,
        html_id: i64,
        markdown: &str,
    ) -> Result<Option<i64>> {
        let ts = now();
        match article_id {
            None => {
                let result = sqlx::query(include_str!("../queries/insert_html_article.sql"))
                    .bind(user_id)
                    .bind(html_id)
                    .bind(markdown)
                    .bind(ts)
                    .bind(ts)
                    .execute(&self.pool)
                    .await
                    .map_err(write_error)?;
                Ok(Some(result.last_insert_rowid()))
            },
            Some(id) => {
                let result = sqlx::query(include_str!("../queries/update_html_article.sql"))
                    .bind(markdown)
                    .bind(html_id)
                    .bind(ts)
                    .bind(id)
                    .bind(user_id)
                    .execute(&self.pool)
                    .await
                    .map_err(write_error)?;
                Ok((result.rows_affected() == 1).then_some(id))
            },
        }
    }

    /// Record that an article embeds a media file. Repeat calls are no-ops;
    /// attaching a file that another article already embeds is a
    /// [`ErrorKind::Constraint`] error.
    pub async fn attach_media(&self, article_id: i64, file_id: i64) -> Result<()> {
        sqlx::query(include_str!("../queries/attach_media.sql"))
            .bind(article_id)
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    /// The article embedding a media file, if any.
    pub async fn media_article(&self, file_id: i64) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(include_str!("../queries/media_article.sql"))
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.map(|(id,)| id))
    }

    // =========================================================================
    // Files
    // =========================================================================

    pub async fn insert_file(&self, file: &NewMediaFile) -> Result<i64> {
        let ts = now();
        let result = sqlx::query(include_str!("../queries/insert_file.sql"))
            .bind(&file.key)
            .bind(&file.format)
            .bind(to_i64(file.size, "file size")?)
            .bind(&file.user_id)
            .bind(ts)
            .bind(ts)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_file(&self, id: i64) -> Result<Option<MediaFile>> {
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_file.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(MediaFile::try_from).transpose()
    }

    /// Blob store key of a file.
    pub async fn file_key(&self, id: i64) -> Result<Option<String>> {
        Ok(self.get_file(id).await?.map(|f| f.key))
    }

    /// Sniffed MIME type of a file.
    pub async fn file_format(&self, id: i64) -> Result<Option<String>> {
        Ok(self.get_file(id).await?.map(|f| f.format))
    }

    /// Delete a file row owned by `user_id`, returning the rows removed.
    pub async fn delete_file(&self, user_id: &str, id: i64) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/delete_file.sql"))
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    /// List a user's files newest first whose format contains `format_filter`.
    pub async fn list_files(
        &self,
        user_id: &str,
        format_filter: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<MediaFile>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/list_files.sql"))
            .bind(user_id)
            .bind(contains_pattern(format_filter))
            .bind(to_i64(limit, "limit")?)
            .bind(to_i64(offset, "offset")?)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(MediaFile::try_from).collect()
    }

    // =========================================================================
    // Shares
    // =========================================================================

    pub async fn insert_share(&self, event: &ShareEvent) -> Result<i64> {
        let result = sqlx::query(include_str!("../queries/insert_share.sql"))
            .bind(&event.platform)
            .bind(&event.user_id)
            .bind(&event.ip)
            .bind(&event.article_id)
            .bind(event.index_key())
            .bind(now())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.last_insert_rowid())
    }

    /// Count share events, for one article or across all of them.
    pub async fn count_shares(&self, article_id: Option<&str>) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as(include_str!("../queries/count_shares.sql"))
            .bind(article_id)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("share count"))
    }

    // =========================================================================
    // Video tasks
    // =========================================================================

    /// Remember the captioning job started for a video, replacing any
    /// earlier job and its output.
    pub async fn insert_video_task(&self, resource_id: i64, task_id: &str) -> Result<()> {
        sqlx::query(include_str!("../queries/upsert_video_task.sql"))
            .bind(resource_id)
            .bind(task_id)
            .bind(now())
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    /// Store the captioning output. Returns `false` if no job was recorded.
    pub async fn complete_video_task(&self, resource_id: i64, output: &str) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/complete_video_task.sql"))
            .bind(output)
            .bind(now())
            .bind(resource_id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn video_task(&self, resource_id: i64) -> Result<Option<VideoTask>> {
        let row: Option<VideoTaskRow> = sqlx::query_as(include_str!("../queries/get_video_task.sql"))
            .bind(resource_id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(VideoTask::try_from).transpose()
    }

    // =========================================================================
    // Subtitles
    // =========================================================================

    /// Attach a caption track. A duplicate `(video_id, subtitle_id)` is a
    /// [`ErrorKind::Constraint`] error.
    pub async fn add_subtitle(&self, subtitle: &Subtitle) -> Result<()> {
        sqlx::query(include_str!("../queries/add_subtitle.sql"))
            .bind(subtitle.video_id)
            .bind(subtitle.subtitle_id)
            .bind(&subtitle.user_id)
            .bind(&subtitle.language)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    pub async fn list_subtitles(&self, video_id: i64) -> Result<Vec<Subtitle>> {
        sqlx::query_as(include_str!("../queries/list_subtitles.sql"))
            .bind(video_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    pub async fn delete_subtitle(&self, video_id: i64, subtitle_id: i64, user_id: &str) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/delete_subtitle.sql"))
            .bind(video_id)
            .bind(subtitle_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }
}

/// An open store transaction.
///
/// Dropping it without calling [`commit`](Self::commit) rolls back.
pub struct Transaction {
    tx: sqlx::Transaction<'static, Sqlite>,
}
impl Transaction {
    /// Every file owned by the article (its HTML body plus attached media),
    /// provided `owner` owns the article. Empty otherwise.
    pub async fn media_for_article(&mut self, article_id: i64, owner: &str) -> Result<Vec<MediaRef>> {
        let rows: Vec<MediaRefRow> = sqlx::query_as(include_str!("../queries/media_for_article.sql"))
            .bind(article_id)
            .bind(owner)
            .fetch_all(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(rows.into_iter().map(MediaRef::from).collect())
    }

    /// Delete file rows owned by `owner`, returning the number removed.
    pub async fn delete_media_rows(&mut self, owner: &str, ids: &[i64]) -> Result<u64> {
        let mut deleted = 0;
        for id in ids {
            let result = sqlx::query(include_str!("../queries/delete_file.sql"))
                .bind(id)
                .bind(owner)
                .execute(&mut *self.tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            deleted += result.rows_affected();
        }
        Ok(deleted)
    }

    /// Delete the article row filtered by id and owner, returning the rows
    /// removed.
    pub async fn delete_article(&mut self, id: i64, owner: &str) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/delete_article.sql"))
            .bind(id)
            .bind(owner)
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    pub async fn article_exists(&mut self, id: i64) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(include_str!("../queries/article_exists.sql"))
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(exists)
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.or_raise(|| ErrorKind::Database)
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.or_raise(|| ErrorKind::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    async fn repo() -> (Database, Repository) {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        (db, repo)
    }

    fn article(title: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            tags: "rust,sqlite".to_string(),
            summary: format!("About {title}"),
            content: format!("# {title}\n\nBody."),
            has_translation: true,
            ..Default::default()
        }
    }

    fn media(user_id: &str, key: &str) -> NewMediaFile {
        NewMediaFile {
            key: key.to_string(),
            format: "image/png".to_string(),
            user_id: user_id.to_string(),
            size: 16,
        }
    }

    async fn set_ctime(db: &Database, id: i64, ctime: i64) {
        sqlx::query("UPDATE article SET ctime = ? WHERE id = ?").bind(ctime).bind(id).execute(db.pool()).await.unwrap();
    }

    #[rstest]
    #[case("", "%%")]
    #[case("rust", "%rust%")]
    #[case("100%", "%100\\%%")]
    #[case("a_b\\c", "%a\\_b\\\\c%")]
    fn test_contains_pattern(#[case] needle: &str, #[case] expected: &str) {
        assert_eq!(contains_pattern(needle), expected);
    }

    #[tokio::test]
    async fn test_insert_and_get_article() {
        let (_db, repo) = repo().await;
        let id = repo.insert_article("u1", &article("First")).await.unwrap();
        let stored = repo.get_article(id).await.unwrap().unwrap();
        assert_eq!(stored.entry.title, "First");
        assert_eq!(stored.entry.user_id, "u1");
        assert_eq!(stored.entry.tags, "rust,sqlite");
        assert!(stored.has_translation);
        assert_eq!(stored.translation, None);
        assert_eq!(repo.article_owner(id).await.unwrap().as_deref(), Some("u1"));
        assert!(repo.get_article(id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_translation_roundtrip_and_invalidation() {
        let (_db, repo) = repo().await;
        let id = repo.insert_article("u1", &article("Erste")).await.unwrap();
        assert_eq!(repo.get_translation(id).await.unwrap(), Some(None));

        let translated = TranslatedContent {
            title: "First".to_string(),
            tags: "rust;sqlite".to_string(),
            summary: "About First".to_string(),
            content: "# First\n\nBody.".to_string(),
        };
        assert!(repo.save_translation(id, &translated).await.unwrap());
        assert_eq!(repo.get_translation(id).await.unwrap(), Some(Some(translated.clone())));
        assert_eq!(repo.get_article(id).await.unwrap().unwrap().translation, Some(translated));

        // Re-saving the article must drop the cached translation.
        assert_eq!(repo.update_article(id, "u1", &article("Zweite")).await.unwrap(), 1);
        assert_eq!(repo.get_translation(id).await.unwrap(), Some(None));
        assert_eq!(repo.get_translation(id + 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_body_translation_is_cached() {
        let (_db, repo) = repo().await;
        let draft = NewArticle { content: String::new(), ..article("Ohne Text") };
        let id = repo.insert_article("u1", &draft).await.unwrap();
        let translated = TranslatedContent { title: "Without text".to_string(), ..Default::default() };
        assert!(repo.save_translation(id, &translated).await.unwrap());
        assert_eq!(repo.get_translation(id).await.unwrap(), Some(Some(translated)));
    }

    #[tokio::test]
    async fn test_update_article_requires_owner() {
        let (_db, repo) = repo().await;
        let id = repo.insert_article("u1", &article("Mine")).await.unwrap();
        assert_eq!(repo.update_article(id, "u2", &article("Theirs")).await.unwrap(), 0);
        assert_eq!(repo.get_article(id).await.unwrap().unwrap().entry.title, "Mine");
        assert!(repo.can_edit("u1", id).await.unwrap());
        assert!(!repo.can_edit("u2", id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_articles_newest_first_with_filter() {
        let (db, repo) = repo().await;
        let a = repo.insert_article("u1", &article("Rust basics")).await.unwrap();
        let b = repo.insert_article("u1", &article("SQLite tips")).await.unwrap();
        let c = repo.insert_article("u2", &article("Rust async")).await.unwrap();
        set_ctime(&db, a, 100).await;
        set_ctime(&db, b, 200).await;
        set_ctime(&db, c, 300).await;

        let all: Vec<_> = repo.list_articles(0, 10, "").await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(all, vec![c, b, a]);
        let rust: Vec<_> = repo.list_articles(0, 10, "Rust").await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(rust, vec![c, a]);
        let page: Vec<_> = repo.list_articles(1, 1, "").await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(page, vec![b]);
        assert!(repo.list_articles(0, 10, "%").await.unwrap().is_empty());

        let mine: Vec<_> = repo.list_articles_by_user("u1").await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(mine, vec![b, a]);
    }

    #[tokio::test]
    async fn test_set_html() {
        let (_db, repo) = repo().await;
        let html = repo.insert_file(&media("u1", "html-key")).await.unwrap();
        let id = repo.set_html("u1", None, html, "# Imported").await.unwrap().unwrap();
        let stored = repo.get_article(id).await.unwrap().unwrap();
        assert_eq!(stored.html_id, Some(html));
        assert_eq!(stored.content, "# Imported");

        assert_eq!(repo.set_html("u2", Some(id), html, "# Hijack").await.unwrap(), None);
        assert_eq!(repo.set_html("u1", Some(id), html, "# Edited").await.unwrap(), Some(id));
        assert_eq!(repo.get_article(id).await.unwrap().unwrap().content, "# Edited");
    }

    #[tokio::test]
    async fn test_files() {
        let (_db, repo) = repo().await;
        let png = repo.insert_file(&media("u1", "a")).await.unwrap();
        let video = repo
            .insert_file(&NewMediaFile {
                format: "video/mp4".to_string(),
                ..media("u1", "b")
            })
            .await
            .unwrap();
        repo.insert_file(&media("u2", "c")).await.unwrap();

        assert_eq!(repo.file_key(png).await.unwrap().as_deref(), Some("a"));
        assert_eq!(repo.file_format(video).await.unwrap().as_deref(), Some("video/mp4"));
        assert_eq!(repo.list_files("u1", "", 0, 10).await.unwrap().len(), 2);
        let videos = repo.list_files("u1", "video", 0, 10).await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].id, video);

        assert_eq!(repo.delete_file("u2", png).await.unwrap(), 0);
        assert_eq!(repo.delete_file("u1", png).await.unwrap(), 1);
        assert!(repo.get_file(png).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_file_key_is_constraint_error() {
        let (_db, repo) = repo().await;
        repo.insert_file(&media("u1", "same")).await.unwrap();
        let err = repo.insert_file(&media("u1", "same")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Constraint));
    }

    #[tokio::test]
    async fn test_transaction_media_lookup_and_delete() {
        let (_db, repo) = repo().await;
        let html = repo.insert_file(&media("u1", "html")).await.unwrap();
        let image = repo.insert_file(&media("u1", "image")).await.unwrap();
        let id = repo.set_html("u1", None, html, "body").await.unwrap().unwrap();
        repo.attach_media(id, image).await.unwrap();
        repo.attach_media(id, image).await.unwrap();

        let mut tx = repo.begin().await.unwrap();
        assert!(tx.media_for_article(id, "u2").await.unwrap().is_empty());
        let refs = tx.media_for_article(id, "u1").await.unwrap();
        assert_eq!(refs, vec![MediaRef { id: html, key: "html".into() }, MediaRef { id: image, key: "image".into() }]);
        assert_eq!(tx.delete_media_rows("u1", &[html, image]).await.unwrap(), 2);
        assert_eq!(tx.delete_article(id, "u1").await.unwrap(), 1);
        tx.commit().await.unwrap();

        assert!(repo.get_article(id).await.unwrap().is_none());
        assert!(repo.get_file(html).await.unwrap().is_none());
        assert!(repo.get_file(image).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_media_has_a_single_article() {
        let (_db, repo) = repo().await;
        let html = repo.insert_file(&media("u1", "html")).await.unwrap();
        let image = repo.insert_file(&media("u1", "image")).await.unwrap();
        let first = repo.set_html("u1", None, html, "eins").await.unwrap().unwrap();
        let second = repo.insert_article("u1", &article("zwei")).await.unwrap();
        assert_eq!(repo.media_article(image).await.unwrap(), None);

        repo.attach_media(first, image).await.unwrap();
        repo.attach_media(first, image).await.unwrap();
        let err = repo.attach_media(second, image).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Constraint));
        assert_eq!(repo.media_article(image).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_transaction_rollback() {
        let (_db, repo) = repo().await;
        let id = repo.insert_article("u1", &article("Keep")).await.unwrap();
        let mut tx = repo.begin().await.unwrap();
        assert_eq!(tx.delete_article(id, "u2").await.unwrap(), 0);
        assert!(tx.article_exists(id).await.unwrap());
        assert_eq!(tx.delete_article(id, "u1").await.unwrap(), 1);
        assert!(!tx.article_exists(id).await.unwrap());
        tx.rollback().await.unwrap();
        assert!(repo.get_article(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_users() {
        let (_db, repo) = repo().await;
        let user = User { id: "u1".into(), name: "Ada".into(), avatar: String::new() };
        repo.upsert_user(&user).await.unwrap();
        let renamed = User { name: "Ada L.".into(), ..user };
        repo.upsert_user(&renamed).await.unwrap();
        assert_eq!(repo.get_user("u1").await.unwrap(), Some(renamed));
        assert_eq!(repo.get_user("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_shares_are_not_deduplicated() {
        let (_db, repo) = repo().await;
        let event = ShareEvent {
            platform: "mastodon".into(),
            user_id: "u1".into(),
            ip: "127.0.0.1".into(),
            article_id: "1".into(),
        };
        repo.insert_share(&event).await.unwrap();
        repo.insert_share(&event).await.unwrap();
        repo.insert_share(&ShareEvent { article_id: "2".into(), ..event }).await.unwrap();
        assert_eq!(repo.count_shares(Some("1")).await.unwrap(), 2);
        assert_eq!(repo.count_shares(None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_video_task_lifecycle() {
        let (_db, repo) = repo().await;
        let video = repo.insert_file(&media("u1", "clip")).await.unwrap();
        assert!(repo.video_task(video).await.unwrap().is_none());
        assert!(!repo.complete_video_task(video, "captions.vtt").await.unwrap());

        repo.insert_video_task(video, "task-1").await.unwrap();
        let task = repo.video_task(video).await.unwrap().unwrap();
        assert_eq!(task.task_id, "task-1");
        assert_eq!(task.output, None);

        assert!(repo.complete_video_task(video, "captions.vtt").await.unwrap());
        assert_eq!(repo.video_task(video).await.unwrap().unwrap().output.as_deref(), Some("captions.vtt"));

        // Deleting the file cascades to its task.
        repo.delete_file("u1", video).await.unwrap();
        assert!(repo.video_task(video).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subtitles() {
        let (_db, repo) = repo().await;
        let en = Subtitle { video_id: 1, subtitle_id: 10, user_id: "u1".into(), language: "en".into() };
        let de = Subtitle { subtitle_id: 11, language: "de".into(), ..en.clone() };
        repo.add_subtitle(&de).await.unwrap();
        repo.add_subtitle(&en).await.unwrap();
        let err = repo.add_subtitle(&en).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Constraint));
        assert_eq!(repo.list_subtitles(1).await.unwrap(), vec![en.clone(), de.clone()]);

        assert_eq!(repo.delete_subtitle(1, 10, "u2").await.unwrap(), 0);
        assert_eq!(repo.delete_subtitle(1, 10, "u1").await.unwrap(), 1);
        assert_eq!(repo.list_subtitles(1).await.unwrap(), vec![de]);
    }
}
