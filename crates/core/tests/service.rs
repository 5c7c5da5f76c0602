mod common;

use common::{FakeScheduler, FakeTranslator, HTML, Harness, MP4, Mode, PNG, article};
use folio_core::error::ErrorKind;
use folio_core::{Community, Config, Cursor};
use rstest::rstest;
use std::sync::Arc;

#[tokio::test]
async fn test_put_article_checks_owner() {
    let h = Harness::new().await;
    let id = h.article("alice", "Entwurf").await;

    let err = h.community.put_article("bob", Some(&id), &article("Gekapert")).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::PermissionDenied(_)));
    let err = h.community.put_article("alice", Some("999"), &article("Nirgendwo")).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::NotFound(_)));

    let updated = h.community.put_article("alice", Some(&id), &article("Fertig")).await.unwrap();
    assert_eq!(updated.to_string(), id);
    assert_eq!(h.community.article(&id).await.unwrap().entry.title, "Fertig");
}

#[tokio::test]
async fn test_can_edit() {
    let h = Harness::new().await;
    let id = h.article("alice", "Entwurf").await;
    assert!(h.community.can_edit("alice", &id).await.unwrap());
    assert!(!h.community.can_edit("bob", &id).await.unwrap());
    assert!(!h.community.can_edit("alice", "999").await.unwrap());
}

#[tokio::test]
async fn test_articles_by_user() {
    let h = Harness::new().await;
    h.article("alice", "eins").await;
    h.article("bob", "zwei").await;
    h.article("alice", "drei").await;
    let titles: Vec<String> =
        h.community.articles_by_user("alice").await.unwrap().into_iter().map(|a| a.title).collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"eins".to_string()));
    assert!(titles.contains(&"drei".to_string()));
}

#[rstest]
#[case::word("abc")]
#[case::zero("0")]
#[case::negative("-4")]
#[tokio::test]
async fn test_malformed_ids(#[case] id: &str) {
    let h = Harness::new().await;
    let err = h.community.article(id).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Validation(_)));
    let err = h.community.delete_media("alice", id).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Validation(_)));
}

#[tokio::test]
async fn test_save_html() {
    let h = Harness::new().await;
    let html = h.community.upload_media("alice", HTML).await.unwrap();
    let html_id = html.id.to_string();

    let id = h.community.save_html("alice", None, &html_id, "# Hallo").await.unwrap();
    let saved = h.community.article(&id.to_string()).await.unwrap();
    assert_eq!(saved.html_id, Some(html.id));
    assert_eq!(saved.content, "# Hallo");

    let again = h.community.save_html("alice", Some(&id.to_string()), &html_id, "# Neu").await.unwrap();
    assert_eq!(again, id);
    assert_eq!(h.community.article(&id.to_string()).await.unwrap().content, "# Neu");

    let err = h.community.save_html("bob", None, &html_id, "# Fremd").await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::PermissionDenied(_)));

    let bobs = h.community.upload_media("bob", HTML).await.unwrap();
    let err = h.community.save_html("bob", Some(&id.to_string()), &bobs.id.to_string(), "# Fremd").await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::PermissionDenied(_)));
}

#[tokio::test]
async fn test_html_body_belongs_to_one_article() {
    let h = Harness::new().await;
    let html = h.community.upload_media("alice", HTML).await.unwrap().id.to_string();
    let first = h.community.save_html("alice", None, &html, "# Eins").await.unwrap();

    let err = h.community.save_html("alice", None, &html, "# Zwei").await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Validation(_)));
    assert_eq!(h.community.articles_by_user("alice").await.unwrap().len(), 1);

    let other = h.article("alice", "Anders").await;
    let err = h.community.save_html("alice", Some(&other), &html, "# Drei").await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Validation(_)));
    assert_eq!(h.community.article(&other).await.unwrap().html_id, None);

    let again = h.community.save_html("alice", Some(&first.to_string()), &html, "# Eins neu").await.unwrap();
    assert_eq!(again, first);
}

#[tokio::test]
async fn test_media_metadata_is_sniffed() {
    let mut config = Config::default();
    config.storage.url_prefix = "https://cdn.example.com/media/".to_string();
    let h = Harness::with_config(config).await;

    let file = h.community.upload_media("alice", PNG).await.unwrap();
    let id = file.id.to_string();
    assert_eq!(file.size, PNG.len() as u64);
    assert_eq!(h.community.media_type(&id).await.unwrap(), "image/png");
    assert_eq!(h.community.media_url(&id).await.unwrap(), format!("https://cdn.example.com/media/{}", file.key));

    let blob = h.community.read_media(&id).await.unwrap();
    assert_eq!(blob.bytes, PNG);
    assert_eq!(blob.content_type, "image/png");

    let err = h.community.media_url("999").await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::NotFound(_)));
}

#[tokio::test]
async fn test_identical_uploads_get_distinct_keys() {
    let h = Harness::new().await;
    let first = h.community.upload_media("alice", PNG).await.unwrap();
    let second = h.community.upload_media("alice", PNG).await.unwrap();
    assert_ne!(first.key, second.key);
    assert_eq!(h.blobs.keys().await.len(), 2);
}

#[tokio::test]
async fn test_subtitles() {
    let h = Harness::new().await;
    let video = h.community.upload_media("alice", MP4).await.unwrap().id.to_string();
    let track = h.community.upload_media("alice", b"WEBVTT\n\n00:00.000 --> 00:01.000\nHallo\n").await.unwrap();
    let track = track.id.to_string();

    h.community.add_subtitle("alice", &video, &track, "de").await.unwrap();
    let err = h.community.add_subtitle("alice", &video, &track, "de").await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::Validation(_)));
    let err = h.community.add_subtitle("bob", &video, &track, "en").await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::PermissionDenied(_)));

    let subtitles = h.community.list_subtitles(&video).await.unwrap();
    assert_eq!(subtitles.len(), 1);
    assert_eq!(subtitles[0].language, "de");

    let err = h.community.delete_subtitle("bob", &video, &track).await.unwrap_err();
    assert!(matches!(&*err, ErrorKind::NotFound(_)));
    h.community.delete_subtitle("alice", &video, &track).await.unwrap();
    assert!(h.community.list_subtitles(&video).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejects_invalid_config() {
    let mut config = Config::default();
    config.dispatch.concurrency = 0;
    let db = folio_store::Database::connect_in_memory().await.unwrap();
    let result = Community::new(
        config,
        &db,
        Arc::new(folio_storage::backend::MockBackend::default()),
        Arc::new(FakeTranslator::new(Mode::Upper)),
        Arc::new(FakeScheduler::new()),
    );
    let Err(err) = result else { panic!("invalid configuration was accepted") };
    assert!(matches!(&*err, ErrorKind::Validation(_)));
}

#[tokio::test]
async fn test_open_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.database.path = dir.path().join("folio.sqlite");
    config.storage.root = dir.path().join("media");

    let community = Community::open(
        config,
        Arc::new(FakeTranslator::new(Mode::Upper)),
        Arc::new(FakeScheduler::new()),
    )
    .await
    .unwrap();
    let file = community.upload_media("alice", PNG).await.unwrap();
    assert!(dir.path().join("media").join(&file.key).is_file());
    assert_eq!(community.read_media(&file.id.to_string()).await.unwrap().bytes, PNG);

    let page = community.list_media("alice", &Cursor::Begin.to_string(), None, "").await.unwrap();
    assert_eq!(page.items.len(), 1);

    let stats = community.shutdown().await;
    assert_eq!(stats.pending(), 0);
}
