//! Cascading deletes of articles and media.
//!
//! Blobs are deleted while the store transaction is open but they are not
//! part of it: if the transaction later rolls back, the article and file
//! rows come back and the blobs stay gone. Blobs that are already missing
//! count as deleted.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use folio_storage::BackendHandle;
use folio_storage::error::ErrorKind as StorageErrorKind;
use folio_store::{Repository, Transaction};
use tracing::{debug, info, instrument, warn};

pub struct Lifecycle {
    repo: Repository,
    blobs: BackendHandle,
}

impl Lifecycle {
    pub fn new(repo: Repository, blobs: BackendHandle) -> Self {
        Self { repo, blobs }
    }

    /// Delete an article and every media file it owns.
    ///
    /// Fails with [`ErrorKind::NotFound`] if the article does not exist and
    /// [`ErrorKind::PermissionDenied`] if `owner` does not own it; in both
    /// cases nothing is touched.
    #[instrument(skip(self))]
    pub async fn delete_article(&self, owner: &str, id: i64) -> Result<()> {
        let mut tx = self.repo.begin().await.or_raise(|| ErrorKind::Store)?;
        match self.delete_within(&mut tx, owner, id).await {
            Ok(media) => {
                tx.commit().await.or_raise(|| ErrorKind::Store)?;
                info!(media, "article deleted");
                Ok(())
            },
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = ?rollback, "rollback failed");
                }
                Err(e)
            },
        }
    }

    async fn delete_within(&self, tx: &mut Transaction, owner: &str, id: i64) -> Result<usize> {
        let media = tx.media_for_article(id, owner).await.or_raise(|| ErrorKind::Store)?;
        for file in &media {
            self.delete_blob(&file.key).await?;
        }
        let ids: Vec<i64> = media.iter().map(|m| m.id).collect();
        tx.delete_media_rows(owner, &ids).await.or_raise(|| ErrorKind::Store)?;

        let deleted = tx.delete_article(id, owner).await.or_raise(|| ErrorKind::Store)?;
        if deleted != 1 {
            let exists = tx.article_exists(id).await.or_raise(|| ErrorKind::Store)?;
            if exists {
                exn::bail!(ErrorKind::PermissionDenied(format!("article {id}")));
            }
            exn::bail!(ErrorKind::NotFound(format!("article {id}")));
        }
        Ok(media.len())
    }

    /// Delete a single media file owned by `owner`: blob first, then row.
    #[instrument(skip(self))]
    pub async fn delete_media(&self, owner: &str, id: i64) -> Result<()> {
        let file = self
            .repo
            .get_file(id)
            .await
            .or_raise(|| ErrorKind::Store)?
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(format!("media {id}"))))?;
        if file.user_id != owner {
            exn::bail!(ErrorKind::PermissionDenied(format!("media {id}")));
        }
        self.delete_blob(&file.key).await?;
        let rows = self.repo.delete_file(owner, id).await.or_raise(|| ErrorKind::Store)?;
        if rows == 0 {
            warn!("media row vanished after its blob was deleted");
        }
        Ok(())
    }

    async fn delete_blob(&self, key: &str) -> Result<()> {
        match self.blobs.delete(key).await {
            Ok(()) => {
                debug!(key, backend = self.blobs.name(), "blob deleted");
                Ok(())
            },
            Err(e) if matches!(&*e, StorageErrorKind::NotFound(_)) => {
                warn!(key, "blob already missing");
                Ok(())
            },
            Err(e) => Err(e).or_raise(|| ErrorKind::Storage),
        }
    }
}
