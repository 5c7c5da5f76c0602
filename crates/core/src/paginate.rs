//! Offset-cursor pagination over articles and media.
//!
//! Offsets are raw row offsets into a newest-first ordering, so rows
//! inserted or deleted ahead of a cursor between calls shift what the next
//! page sees.

use crate::cursor::Cursor;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use folio_store::{ArticleEntry, MediaFile, Repository, User};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Listings fetch one row past the page, bound as a SQLite integer.
const FETCH_LIMIT: u64 = i64::MAX as u64;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Feed back to continue; [`Cursor::End`] once exhausted.
    pub next: Cursor,
    pub exhausted: bool,
}
impl<T> Page<T> {
    fn end() -> Self {
        Self { items: Vec::new(), next: Cursor::End, exhausted: true }
    }
}

/// A listed item together with its owner's profile, if one is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owned<T> {
    pub item: T,
    pub owner: Option<User>,
}

#[derive(Debug, Clone)]
pub struct Paginator {
    repo: Repository,
    max_page_size: u64,
}

impl Paginator {
    pub fn new(repo: Repository, max_page_size: u64) -> Self {
        Self { repo, max_page_size }
    }

    /// Articles newest first whose title contains `title_filter`.
    #[instrument(skip(self))]
    pub async fn articles(
        &self,
        cursor: Cursor,
        page_size: u64,
        title_filter: &str,
    ) -> Result<Page<Owned<ArticleEntry>>> {
        let Some(offset) = self.start(cursor, page_size)? else {
            return Ok(Page::end());
        };
        let rows = self
            .repo
            .list_articles(offset, page_size + 1, title_filter)
            .await
            .or_raise(|| ErrorKind::Store)?;
        let page = cut(offset, page_size, rows);
        self.hydrate(page, |entry| entry.user_id.as_str()).await
    }

    /// An owner's media newest first whose format contains `format_filter`.
    #[instrument(skip(self))]
    pub async fn media(
        &self,
        owner: &str,
        cursor: Cursor,
        page_size: u64,
        format_filter: &str,
    ) -> Result<Page<Owned<MediaFile>>> {
        let Some(offset) = self.start(cursor, page_size)? else {
            return Ok(Page::end());
        };
        let rows = self
            .repo
            .list_files(owner, format_filter, offset, page_size + 1)
            .await
            .or_raise(|| ErrorKind::Store)?;
        let page = cut(offset, page_size, rows);
        self.hydrate(page, |file| file.user_id.as_str()).await
    }

    /// Validate the request and resolve the starting offset. `None` means
    /// the listing is already exhausted and the store must not be queried.
    fn start(&self, cursor: Cursor, page_size: u64) -> Result<Option<u64>> {
        let max_page_size = self.max_page_size.min(FETCH_LIMIT - 1);
        if page_size == 0 || page_size > max_page_size {
            exn::bail!(ErrorKind::Validation(format!("page size {page_size} is outside 1..={max_page_size}")));
        }
        Ok(cursor.offset())
    }

    /// Attach owner profiles, looking each distinct owner up once per page.
    async fn hydrate<T>(&self, page: Page<T>, owner_of: impl Fn(&T) -> &str) -> Result<Page<Owned<T>>> {
        let mut owners: HashMap<String, Option<User>> = HashMap::new();
        let mut items = Vec::with_capacity(page.items.len());
        for item in page.items {
            let id = owner_of(&item).to_string();
            let owner = match owners.get(&id) {
                Some(owner) => owner.clone(),
                None => {
                    let owner = self.repo.get_user(&id).await.or_raise(|| ErrorKind::Store)?;
                    owners.insert(id, owner.clone());
                    owner
                },
            };
            items.push(Owned { item, owner });
        }
        Ok(Page { items, next: page.next, exhausted: page.exhausted })
    }
}

/// Trim a fetch of `page_size + 1` rows down to a page.
///
/// The extra row only decides whether another page exists, so a page that
/// is exactly full and also the last one still reports exhaustion.
fn cut<T>(offset: u64, page_size: u64, mut rows: Vec<T>) -> Page<T> {
    let exhausted = rows.len() as u64 <= page_size;
    rows.truncate(page_size as usize);
    let next = if exhausted { Cursor::End } else { Cursor::Offset(offset + rows.len() as u64) };
    debug!(offset, rows = rows.len(), exhausted, "page cut");
    Page { items: rows, next, exhausted }
}
