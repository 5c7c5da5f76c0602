//! Media intake and captioning state.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use folio_storage::{BackendHandle, sniff};
use folio_store::{MediaFile, NewMediaFile, Repository, VideoTask};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Where an uploaded asset is in the captioning pipeline.
///
/// Non-video assets stay [`Uploaded`](Self::Uploaded), as do videos whose
/// captioning job could not be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaState {
    Uploaded,
    CaptioningScheduled,
    Captioned,
}
impl MediaState {
    pub fn from_task(task: Option<&VideoTask>) -> Self {
        match task {
            None => Self::Uploaded,
            Some(VideoTask { output: None, .. }) => Self::CaptioningScheduled,
            Some(VideoTask { output: Some(_), .. }) => Self::Captioned,
        }
    }
}

/// Store an upload under a fresh random key and record its metadata.
///
/// The content type and size recorded are the ones the blob store reports
/// back, not anything the uploader claimed. If the metadata cannot be
/// recorded the blob is removed again.
#[instrument(skip(repo, blobs, bytes), fields(size = bytes.len()))]
pub(crate) async fn store_upload(
    repo: &Repository,
    blobs: &BackendHandle,
    user_id: &str,
    bytes: &[u8],
) -> Result<MediaFile> {
    let key = Uuid::new_v4().to_string();
    blobs.write(&key, bytes).await.or_raise(|| ErrorKind::Storage)?;
    let info = blobs.stat(&key).await.or_raise(|| ErrorKind::Storage)?;
    let new = NewMediaFile {
        key: key.clone(),
        format: info.content_type.to_string(),
        user_id: user_id.to_string(),
        size: info.size,
    };
    let id = match repo.insert_file(&new).await {
        Ok(id) => id,
        Err(e) => {
            if let Err(cleanup) = blobs.delete(&key).await {
                warn!(key = %key, error = ?cleanup, "failed to remove orphaned blob");
            }
            return Err(e).or_raise(|| ErrorKind::Store);
        },
    };
    debug!(id, key = %key, format = info.content_type, "media stored");
    repo.get_file(id)
        .await
        .or_raise(|| ErrorKind::Store)?
        .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(format!("media {id}"))))
}

/// Whether a stored media format should be sent for captioning.
pub fn needs_captioning(file: &MediaFile) -> bool {
    sniff::is_video(&file.format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::UtcDateTime;

    fn task(output: Option<&str>) -> VideoTask {
        VideoTask {
            resource_id: 1,
            task_id: "t".to_string(),
            output: output.map(str::to_string),
            created: UtcDateTime::UNIX_EPOCH,
            updated: UtcDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_media_state() {
        assert_eq!(MediaState::from_task(None), MediaState::Uploaded);
        assert_eq!(MediaState::from_task(Some(&task(None))), MediaState::CaptioningScheduled);
        assert_eq!(MediaState::from_task(Some(&task(Some("subs.vtt")))), MediaState::Captioned);
    }
}
