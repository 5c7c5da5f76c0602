#![allow(dead_code)]

use async_trait::async_trait;
use folio_core::error::{ErrorKind, Result};
use folio_core::{CaptionScheduler, CaptionSchedulerHandle, Community, Config, TaskHandle, Translator, TranslatorHandle};
use folio_storage::BackendHandle;
use folio_storage::backend::MockBackend;
use folio_store::{Database, NewArticle, Repository, User};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];
pub const MP4: &[u8] = b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00mp42isom";
pub const HTML: &[u8] = b"<!doctype html><html><body><p>Hallo</p></body></html>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Upper-cases everything.
    Upper,
    /// Upper-cases, but plain-text requests fail.
    FailPlain,
    /// Upper-cases and smuggles the translated-tag delimiter into every
    /// batch entry.
    InjectDelimiter,
}

pub struct FakeTranslator {
    mode: Mode,
    calls: AtomicUsize,
}
impl FakeTranslator {
    pub fn new(mode: Mode) -> Self {
        Self { mode, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate_plain(&self, text: &str, _from: &str, _to: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.mode == Mode::FailPlain {
            exn::bail!(ErrorKind::Translation);
        }
        Ok(text.to_uppercase())
    }

    async fn translate_batch(&self, texts: &[String], _from: &str, _to: &str) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| match self.mode {
                Mode::InjectDelimiter => format!("{}; extra", text.to_uppercase()),
                _ => text.to_uppercase(),
            })
            .collect())
    }
}

pub struct FakeScheduler {
    fail: AtomicBool,
    calls: AtomicUsize,
}
impl FakeScheduler {
    pub fn new() -> Self {
        Self { fail: AtomicBool::new(false), calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        let scheduler = Self::new();
        scheduler.fail.store(true, Ordering::SeqCst);
        scheduler
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptionScheduler for FakeScheduler {
    async fn schedule_captioning(&self, media_id: i64, _user_id: &str) -> Result<TaskHandle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Dispatch);
        }
        Ok(TaskHandle { task_id: format!("task-{media_id}") })
    }
}

pub struct Harness {
    pub db: Database,
    pub repo: Repository,
    pub blobs: Arc<MockBackend>,
    pub translator: Arc<FakeTranslator>,
    pub captions: Arc<FakeScheduler>,
    pub community: Community,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(Config::default(), Mode::Upper, FakeScheduler::new()).await
    }

    pub async fn with_config(config: Config) -> Self {
        Self::build(config, Mode::Upper, FakeScheduler::new()).await
    }

    pub async fn with_translator(mode: Mode) -> Self {
        Self::build(Config::default(), mode, FakeScheduler::new()).await
    }

    pub async fn with_scheduler(captions: FakeScheduler) -> Self {
        Self::build(Config::default(), Mode::Upper, captions).await
    }

    pub async fn build(config: Config, mode: Mode, captions: FakeScheduler) -> Self {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let blobs = Arc::new(MockBackend::default());
        let translator = Arc::new(FakeTranslator::new(mode));
        let captions = Arc::new(captions);
        let community = Community::new(
            config,
            &db,
            Arc::clone(&blobs) as BackendHandle,
            Arc::clone(&translator) as TranslatorHandle,
            Arc::clone(&captions) as CaptionSchedulerHandle,
        )
        .unwrap();
        Self { db, repo, blobs, translator, captions, community }
    }

    /// Create an article and return its id as it would arrive on the wire.
    pub async fn article(&self, user_id: &str, title: &str) -> String {
        let id = self.community.put_article(user_id, None, &article(title)).await.unwrap();
        id.to_string()
    }

    pub async fn user(&self, id: &str, name: &str) {
        let user = User { id: id.to_string(), name: name.to_string(), avatar: String::new() };
        self.community.sync_user(&user).await.unwrap();
    }
}

pub fn article(title: &str) -> NewArticle {
    NewArticle {
        title: title.to_string(),
        tags: "rust,sqlite,web".to_string(),
        summary: format!("about {title}"),
        content: format!("# {title}\n\nsome prose\n\n```rust\nlet x = 1;\n```\n"),
        has_translation: true,
        ..Default::default()
    }
}
