mod article;
mod file;
mod video;

pub(crate) use self::article::{ArticleRow, CachedTranslationRow, EntryRow};
pub(crate) use self::file::{FileRow, MediaRefRow};
pub(crate) use self::video::VideoTaskRow;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use time::UtcDateTime;

fn timestamp(seconds: i64, what: &'static str) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp(seconds).or_raise(|| ErrorKind::InvalidData(what))
}
