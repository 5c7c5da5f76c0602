//! The `Community` service value.
//!
//! One `Community` is built at startup and handed to whatever serves
//! requests. It owns the store and blob handles and the components built on
//! them; there is no other shared state.

use crate::cursor::Cursor;
use crate::dispatch::{CaptionSchedulerHandle, DispatchStats, Dispatcher};
use crate::error::{ErrorKind, Result, parse_id};
use crate::lifecycle::Lifecycle;
use crate::media::{self, MediaState};
use crate::paginate::{Owned, Page, Paginator};
use crate::translate::{Translated, TranslationCache, TranslatorHandle};
use exn::ResultExt;
use folio_config::Config;
use folio_storage::backend::LocalBackend;
use folio_storage::{BackendHandle, Blob};
use folio_store::error::ErrorKind as StoreErrorKind;
use folio_store::{
    Article, ArticleEntry, Database, MediaFile, NewArticle, Repository, ShareEvent, Subtitle, User,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub struct Community {
    config: Config,
    database: Database,
    repo: Repository,
    blobs: BackendHandle,
    translations: TranslationCache,
    paginator: Paginator,
    lifecycle: Lifecycle,
    dispatcher: Dispatcher,
}

impl Community {
    /// Wire the components around an already connected database and blob
    /// store. Must be called from within a tokio runtime.
    pub fn new(
        config: Config,
        database: &Database,
        blobs: BackendHandle,
        translator: TranslatorHandle,
        captions: CaptionSchedulerHandle,
    ) -> Result<Self> {
        config
            .validate()
            .or_raise(|| ErrorKind::Validation("configuration".to_string()))?;
        let repo = Repository::from(database);
        Ok(Self {
            translations: TranslationCache::new(repo.clone(), translator, config.translation.clone()),
            paginator: Paginator::new(repo.clone(), config.listing.max_page_size),
            lifecycle: Lifecycle::new(repo.clone(), Arc::clone(&blobs)),
            dispatcher: Dispatcher::spawn(repo.clone(), captions, &config.dispatch),
            database: database.clone(),
            repo,
            blobs,
            config,
        })
    }

    /// Connect to the configured database and local blob directory.
    #[instrument(skip_all, fields(database = %config.database.path.display()))]
    pub async fn open(config: Config, translator: TranslatorHandle, captions: CaptionSchedulerHandle) -> Result<Self> {
        let database = Database::connect_with(&config.database.path, config.database.max_connections)
            .await
            .or_raise(|| ErrorKind::Store)?;
        let root = config.storage.absolute_root().or_raise(|| ErrorKind::Storage)?;
        let blobs: BackendHandle = Arc::new(LocalBackend::new("local", &root).or_raise(|| ErrorKind::Storage)?);
        info!(root = %root.display(), "community opened");
        Self::new(config, &database, blobs, translator, captions)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mirror a user profile from the identity provider.
    pub async fn sync_user(&self, user: &User) -> Result<()> {
        self.repo.upsert_user(user).await.or_raise(|| ErrorKind::Store)
    }

    // =========================================================================
    // Articles
    // =========================================================================

    pub async fn article(&self, id: &str) -> Result<Article> {
        let id = parse_id(id, "article")?;
        self.repo
            .get_article(id)
            .await
            .or_raise(|| ErrorKind::Store)?
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(format!("article {id}"))))
    }

    /// Create an article, or update one `user_id` owns when `id` is given.
    ///
    /// Updating discards any cached translation.
    #[instrument(skip(self, article), fields(title = %article.title))]
    pub async fn put_article(&self, user_id: &str, id: Option<&str>, article: &NewArticle) -> Result<i64> {
        let Some(id) = id else {
            let id = self.repo.insert_article(user_id, article).await.or_raise(|| ErrorKind::Store)?;
            info!(id, "article created");
            return Ok(id);
        };
        let id = parse_id(id, "article")?;
        let rows = self.repo.update_article(id, user_id, article).await.or_raise(|| ErrorKind::Store)?;
        if rows == 0 {
            return Err(self.missing_or_foreign(id).await);
        }
        debug!(id, "article updated");
        Ok(id)
    }

    pub async fn get_translated(&self, id: &str) -> Result<Translated> {
        self.translations.get_translated(parse_id(id, "article")?).await
    }

    /// Newest articles first. `page_size` defaults to the configured size.
    pub async fn list_articles(
        &self,
        cursor: &str,
        page_size: Option<u64>,
        title_filter: &str,
    ) -> Result<Page<Owned<ArticleEntry>>> {
        let cursor: Cursor = cursor.parse()?;
        self.paginator.articles(cursor, self.page_size(page_size), title_filter).await
    }

    pub async fn articles_by_user(&self, user_id: &str) -> Result<Vec<ArticleEntry>> {
        self.repo.list_articles_by_user(user_id).await.or_raise(|| ErrorKind::Store)
    }

    pub async fn delete_article(&self, user_id: &str, id: &str) -> Result<()> {
        self.lifecycle.delete_article(user_id, parse_id(id, "article")?).await
    }

    pub async fn can_edit(&self, user_id: &str, id: &str) -> Result<bool> {
        let id = parse_id(id, "article")?;
        self.repo.can_edit(user_id, id).await.or_raise(|| ErrorKind::Store)
    }

    /// Point an article at an uploaded HTML body, creating the article when
    /// `article_id` is absent. The HTML file must belong to `user_id`.
    #[instrument(skip(self, markdown))]
    pub async fn save_html(
        &self,
        user_id: &str,
        article_id: Option<&str>,
        html_id: &str,
        markdown: &str,
    ) -> Result<i64> {
        let html_id = parse_id(html_id, "media")?;
        self.owned_media(user_id, html_id).await?;
        let article_id = article_id.map(|id| parse_id(id, "article")).transpose()?;
        match self.repo.media_article(html_id).await.or_raise(|| ErrorKind::Store)? {
            Some(owner) if Some(owner) != article_id => {
                exn::bail!(ErrorKind::Validation(format!("media {html_id} is already attached to article {owner}")))
            },
            _ => {},
        }
        let saved = self
            .repo
            .set_html(user_id, article_id, html_id, markdown)
            .await
            .or_raise(|| ErrorKind::Store)?;
        match (saved, article_id) {
            (Some(id), _) => {
                match self.repo.attach_media(id, html_id).await {
                    Ok(()) => Ok(id),
                    Err(e) if matches!(&*e, StoreErrorKind::Constraint) => Err(e).or_raise(|| {
                        ErrorKind::Validation(format!("media {html_id} is already attached to another article"))
                    }),
                    Err(e) => Err(e).or_raise(|| ErrorKind::Store),
                }
            },
            (None, Some(id)) => Err(self.missing_or_foreign(id).await),
            (None, None) => exn::bail!(ErrorKind::Store),
        }
    }

    // =========================================================================
    // Media
    // =========================================================================

    /// Store an upload and, for videos, queue it for captioning.
    ///
    /// The upload succeeds even when captioning cannot be queued; the media
    /// then stays in [`MediaState::Uploaded`].
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_media(&self, user_id: &str, bytes: &[u8]) -> Result<MediaFile> {
        let file = media::store_upload(&self.repo, &self.blobs, user_id, bytes).await?;
        if media::needs_captioning(&file) {
            self.dispatcher.schedule_captioning(file.id, user_id);
        }
        info!(id = file.id, format = %file.format, "media uploaded");
        Ok(file)
    }

    /// Public URL of a media file.
    pub async fn media_url(&self, id: &str) -> Result<String> {
        let file = self.media(id).await?;
        let prefix = self.config.storage.url_prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return Ok(file.key);
        }
        Ok(format!("{prefix}/{}", file.key))
    }

    /// Content type recorded when the media was uploaded.
    pub async fn media_type(&self, id: &str) -> Result<String> {
        Ok(self.media(id).await?.format)
    }

    pub async fn read_media(&self, id: &str) -> Result<Blob> {
        let file = self.media(id).await?;
        self.blobs.read(&file.key).await.or_raise(|| ErrorKind::Storage)
    }

    pub async fn delete_media(&self, user_id: &str, id: &str) -> Result<()> {
        self.lifecycle.delete_media(user_id, parse_id(id, "media")?).await
    }

    /// An owner's media newest first, filtered on a substring of the format.
    pub async fn list_media(
        &self,
        user_id: &str,
        cursor: &str,
        page_size: Option<u64>,
        format_filter: &str,
    ) -> Result<Page<Owned<MediaFile>>> {
        let cursor: Cursor = cursor.parse()?;
        self.paginator
            .media(user_id, cursor, self.page_size(page_size), format_filter)
            .await
    }

    pub async fn media_state(&self, id: &str) -> Result<MediaState> {
        let file = self.media(id).await?;
        let task = self.repo.video_task(file.id).await.or_raise(|| ErrorKind::Store)?;
        Ok(MediaState::from_task(task.as_ref()))
    }

    /// Record the captioning service's output for a video.
    pub async fn complete_captioning(&self, id: &str, output: &str) -> Result<()> {
        let id = parse_id(id, "media")?;
        let updated = self.repo.complete_video_task(id, output).await.or_raise(|| ErrorKind::Store)?;
        if !updated {
            exn::bail!(ErrorKind::NotFound(format!("captioning task for media {id}")));
        }
        Ok(())
    }

    /// Captions produced for a video, once the captioning task finished.
    pub async fn video_subtitle_output(&self, id: &str) -> Result<Option<String>> {
        let id = parse_id(id, "media")?;
        let task = self.repo.video_task(id).await.or_raise(|| ErrorKind::Store)?;
        Ok(task.and_then(|task| task.output))
    }

    // =========================================================================
    // Subtitles
    // =========================================================================

    /// Attach an uploaded subtitle file to a video. Both must belong to
    /// `user_id`.
    pub async fn add_subtitle(&self, user_id: &str, video_id: &str, subtitle_id: &str, language: &str) -> Result<()> {
        let video_id = parse_id(video_id, "video")?;
        let subtitle_id = parse_id(subtitle_id, "subtitle")?;
        self.owned_media(user_id, video_id).await?;
        self.owned_media(user_id, subtitle_id).await?;
        let subtitle = Subtitle {
            video_id,
            subtitle_id,
            user_id: user_id.to_string(),
            language: language.to_string(),
        };
        match self.repo.add_subtitle(&subtitle).await {
            Ok(()) => Ok(()),
            Err(e) if matches!(&*e, StoreErrorKind::Constraint) => Err(e).or_raise(|| {
                ErrorKind::Validation(format!("subtitle {subtitle_id} is already attached to video {video_id}"))
            }),
            Err(e) => Err(e).or_raise(|| ErrorKind::Store),
        }
    }

    pub async fn list_subtitles(&self, video_id: &str) -> Result<Vec<Subtitle>> {
        let video_id = parse_id(video_id, "video")?;
        self.repo.list_subtitles(video_id).await.or_raise(|| ErrorKind::Store)
    }

    pub async fn delete_subtitle(&self, user_id: &str, video_id: &str, subtitle_id: &str) -> Result<()> {
        let video_id = parse_id(video_id, "video")?;
        let subtitle_id = parse_id(subtitle_id, "subtitle")?;
        let rows = self
            .repo
            .delete_subtitle(video_id, subtitle_id, user_id)
            .await
            .or_raise(|| ErrorKind::Store)?;
        if rows == 0 {
            exn::bail!(ErrorKind::NotFound(format!("subtitle {subtitle_id} of video {video_id}")));
        }
        Ok(())
    }

    // =========================================================================
    // Background work
    // =========================================================================

    /// Count a share. Returns immediately; the outcome is never reported.
    pub fn record_share(&self, ip: &str, platform: &str, user_id: &str, article_id: &str) {
        self.dispatcher.record_share(ShareEvent {
            platform: platform.to_string(),
            user_id: user_id.to_string(),
            ip: ip.to_string(),
            article_id: article_id.to_string(),
        });
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Wait for every background job queued so far to finish.
    pub async fn wait_idle(&self) {
        self.dispatcher.wait_idle().await;
    }

    /// Finish queued background jobs, then close the database.
    pub async fn shutdown(self) -> DispatchStats {
        let stats = self.dispatcher.shutdown().await;
        self.database.close().await;
        stats
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn page_size(&self, requested: Option<u64>) -> u64 {
        requested.unwrap_or(self.config.listing.default_page_size)
    }

    async fn media(&self, id: &str) -> Result<MediaFile> {
        let id = parse_id(id, "media")?;
        self.repo
            .get_file(id)
            .await
            .or_raise(|| ErrorKind::Store)?
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(format!("media {id}"))))
    }

    async fn owned_media(&self, user_id: &str, id: i64) -> Result<MediaFile> {
        let file = self
            .repo
            .get_file(id)
            .await
            .or_raise(|| ErrorKind::Store)?
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(format!("media {id}"))))?;
        if file.user_id != user_id {
            exn::bail!(ErrorKind::PermissionDenied(format!("media {id}")));
        }
        Ok(file)
    }

    /// Explain why a write filtered on owner matched no article.
    async fn missing_or_foreign(&self, id: i64) -> crate::error::Error {
        match self.repo.article_owner(id).await {
            Ok(Some(_)) => exn::Exn::from(ErrorKind::PermissionDenied(format!("article {id}"))),
            Ok(None) => exn::Exn::from(ErrorKind::NotFound(format!("article {id}"))),
            Err(e) => e.raise(ErrorKind::Store),
        }
    }
}
