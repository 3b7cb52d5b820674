use chrono::{Duration, Utc};
use notion_sync_core::config::{MediaConfig, RetryPolicy};
use notion_sync_core::contract::{DownloadedMedia, MediaUpload, MockMediaHost};
use notion_sync_core::error::RemoteError;
use notion_sync_core::media::cache::MediaCache;
use notion_sync_core::media::{MediaPipeline, MediaRequest};
use notion_sync_core::retry::RetryingClient;
use tempfile::tempdir;

const SOURCE: &str = "https://s3.example.com/secure/diagram.png?X-Amz-Signature=abc";
const BASE: &str = "https://img.example.com";

fn media_config(cache_dir: &std::path::Path) -> MediaConfig {
    MediaConfig {
        cache_dir: cache_dir.to_path_buf(),
        public_base_url: BASE.to_string(),
        batch_pause_ms: 0,
        ..MediaConfig::default()
    }
}

fn instant_retry() -> RetryingClient {
    RetryingClient::new(RetryPolicy {
        base_delay_ms: 0,
        max_delay_ms: 0,
        ..RetryPolicy::default()
    })
}

fn cache_for(config: &MediaConfig) -> MediaCache {
    MediaCache::new(config.cache_dir.clone(), config.freshness(), config.retention())
}

fn png() -> DownloadedMedia {
    DownloadedMedia {
        bytes: vec![0x89, 0x50, 0x4e, 0x47],
        content_type: Some("image/png".to_string()),
    }
}

#[tokio::test]
async fn fresh_cache_entry_skips_download_and_upload() {
    let dir = tempdir().unwrap();
    let config = media_config(dir.path());
    let cache = cache_for(&config);
    cache
        .store(SOURCE, "https://img.example.com/file/cached.png", Utc::now() - Duration::hours(1))
        .unwrap();

    let mut host = MockMediaHost::new();
    host.expect_download().times(0);
    host.expect_upload().times(0);

    let retry = instant_retry();
    let pipeline = MediaPipeline::new(&host, &cache, &retry, config);
    let url = pipeline.resolve(SOURCE, "Diagram", "doc-1").await;
    assert_eq!(url, "https://img.example.com/file/cached.png");
}

#[tokio::test]
async fn stale_entry_is_relocated_again_and_refreshed() {
    let dir = tempdir().unwrap();
    let config = media_config(dir.path());
    let cache = cache_for(&config);
    cache
        .store(SOURCE, "https://img.example.com/file/old.png", Utc::now() - Duration::hours(25))
        .unwrap();

    let mut host = MockMediaHost::new();
    host.expect_download().times(1).returning(|_, _| Ok(png()));
    host.expect_upload()
        .times(1)
        .returning(|_| Ok(r#"[{"src":"/file/new.png"}]"#.to_string()));

    let retry = instant_retry();
    let pipeline = MediaPipeline::new(&host, &cache, &retry, config);
    let url = pipeline.resolve(SOURCE, "", "doc-1").await;
    assert_eq!(url, "https://img.example.com/file/new.png");
    assert_eq!(cache.lookup(SOURCE, Utc::now()).as_deref(), Some(url.as_str()));
}

#[tokio::test]
async fn successful_upload_targets_document_folder_and_is_cached() {
    let dir = tempdir().unwrap();
    let config = media_config(dir.path());
    let cache = cache_for(&config);

    let mut host = MockMediaHost::new();
    host.expect_download()
        .withf(|url, timeout| url == SOURCE && *timeout == std::time::Duration::from_secs(30))
        .times(1)
        .returning(|_, _| Ok(png()));
    host.expect_upload()
        .withf(|upload: &MediaUpload| {
            upload.folder == "notion/doc-1"
                && upload.file_name.starts_with("notion_")
                && upload.file_name.ends_with(".png")
                && upload.content_type == "image/png"
        })
        .times(1)
        .returning(|_| Ok(r#"{"url":"file/uploaded.png"}"#.to_string()));

    let retry = instant_retry();
    let pipeline = MediaPipeline::new(&host, &cache, &retry, config);
    let url = pipeline.resolve(SOURCE, "Diagram", "doc-1").await;
    assert_eq!(url, "https://img.example.com/file/uploaded.png");

    // A second resolve is served from the cache.
    let again = pipeline.resolve(SOURCE, "Diagram", "doc-1").await;
    assert_eq!(again, url);
    assert_eq!(cache.stats().count, 1);
}

#[tokio::test]
async fn rejected_upload_falls_back_to_source_url() {
    let dir = tempdir().unwrap();
    let config = media_config(dir.path());
    let cache = cache_for(&config);

    let mut host = MockMediaHost::new();
    host.expect_download().returning(|_, _| Ok(png()));
    host.expect_upload().times(1).returning(|_| {
        Err(RemoteError::Status {
            status: 401,
            body: "bad auth code".into(),
        })
    });

    let retry = instant_retry();
    let pipeline = MediaPipeline::new(&host, &cache, &retry, config);
    assert_eq!(pipeline.resolve(SOURCE, "", "doc-1").await, SOURCE);
    assert!(cache.lookup(SOURCE, Utc::now()).is_none());
}

#[tokio::test]
async fn transient_upload_failures_are_capped_by_upload_attempts() {
    let dir = tempdir().unwrap();
    let config = MediaConfig {
        upload_attempts: 3,
        ..media_config(dir.path())
    };
    let cache = cache_for(&config);

    let mut host = MockMediaHost::new();
    host.expect_download().returning(|_, _| Ok(png()));
    host.expect_upload()
        .times(3)
        .returning(|_| Err(RemoteError::network("ECONNRESET", "connection reset")));

    let retry = instant_retry();
    let pipeline = MediaPipeline::new(&host, &cache, &retry, config);
    assert_eq!(pipeline.resolve(SOURCE, "", "doc-1").await, SOURCE);
}

#[tokio::test]
async fn timed_out_download_is_retried() {
    let dir = tempdir().unwrap();
    let config = media_config(dir.path());
    let cache = cache_for(&config);

    let mut host = MockMediaHost::new();
    let mut seq = mockall::Sequence::new();
    host.expect_download()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(RemoteError::network("ETIMEDOUT", "download timed out")));
    host.expect_download()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(png()));
    host.expect_upload()
        .times(1)
        .returning(|_| Ok(r#"[{"src":"/file/a.png"}]"#.to_string()));

    let retry = instant_retry();
    let pipeline = MediaPipeline::new(&host, &cache, &retry, config);
    let url = pipeline.resolve(SOURCE, "", "doc-1").await;
    assert_eq!(url, "https://img.example.com/file/a.png");
}

#[tokio::test]
async fn missing_source_is_not_retried() {
    let dir = tempdir().unwrap();
    let config = media_config(dir.path());
    let cache = cache_for(&config);

    let mut host = MockMediaHost::new();
    host.expect_download().times(1).returning(|_, _| {
        Err(RemoteError::Status {
            status: 404,
            body: "not found".into(),
        })
    });
    host.expect_upload().times(0);

    let retry = instant_retry();
    let pipeline = MediaPipeline::new(&host, &cache, &retry, config);
    assert_eq!(pipeline.resolve(SOURCE, "", "doc-1").await, SOURCE);
}

#[tokio::test]
async fn non_image_download_is_not_uploaded() {
    let dir = tempdir().unwrap();
    let config = media_config(dir.path());
    let cache = cache_for(&config);

    let mut host = MockMediaHost::new();
    host.expect_download().returning(|_, _| {
        Ok(DownloadedMedia {
            bytes: b"<html></html>".to_vec(),
            content_type: Some("text/html; charset=utf-8".to_string()),
        })
    });
    host.expect_upload().times(0);

    let retry = instant_retry();
    let pipeline = MediaPipeline::new(&host, &cache, &retry, config);
    assert_eq!(pipeline.resolve(SOURCE, "", "doc-1").await, SOURCE);
}

#[tokio::test]
async fn unparsable_upload_response_falls_back() {
    let dir = tempdir().unwrap();
    let config = media_config(dir.path());
    let cache = cache_for(&config);

    let mut host = MockMediaHost::new();
    host.expect_download().returning(|_, _| Ok(png()));
    host.expect_upload().returning(|_| Ok(r#"{"success":true}"#.to_string()));

    let retry = instant_retry();
    let pipeline = MediaPipeline::new(&host, &cache, &retry, config);
    assert_eq!(pipeline.resolve(SOURCE, "", "doc-1").await, SOURCE);
}

#[tokio::test]
async fn batch_resolution_keeps_order_and_isolates_failures() {
    let dir = tempdir().unwrap();
    let config = MediaConfig {
        batch_size: 2,
        ..media_config(dir.path())
    };
    let cache = cache_for(&config);

    let mut host = MockMediaHost::new();
    host.expect_download().returning(|url, _| {
        if url.contains("broken") {
            Err(RemoteError::Status {
                status: 403,
                body: "expired".into(),
            })
        } else {
            Ok(png())
        }
    });
    host.expect_upload()
        .times(3)
        .returning(|upload| Ok(format!("/file/{}", upload.file_name)));

    let requests: Vec<MediaRequest> = ["a", "broken", "c", "d"]
        .iter()
        .map(|name| MediaRequest {
            source_url: format!("https://s3.example.com/{name}.png"),
            caption: String::new(),
            document_id: "doc-9".into(),
        })
        .collect();

    let retry = instant_retry();
    let pipeline = MediaPipeline::new(&host, &cache, &retry, config);
    let outcomes = pipeline.resolve_batch(&requests).await;

    assert_eq!(outcomes.len(), 4);
    for (outcome, request) in outcomes.iter().zip(&requests) {
        assert_eq!(outcome.source_url, request.source_url);
    }
    assert!(!outcomes[1].relocated);
    assert_eq!(outcomes[1].resolved_url, requests[1].source_url);
    assert!(outcomes
        .iter()
        .filter(|o| o.relocated)
        .all(|o| o.resolved_url.starts_with("https://img.example.com/file/notion_")));
}

#[test]
fn sweep_removes_only_expired_entries() {
    let dir = tempdir().unwrap();
    let cache = MediaCache::new(dir.path().to_path_buf(), Duration::hours(24), Duration::days(7));
    let now = Utc::now();
    cache.store("https://a", "https://img/a", now - Duration::days(8)).unwrap();
    cache.store("https://b", "https://img/b", now - Duration::days(2)).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a cache entry").unwrap();

    assert_eq!(cache.stats().count, 2);
    assert_eq!(cache.sweep(now).unwrap(), 1);

    let stats = cache.stats();
    assert_eq!(stats.count, 1);
    assert!(stats.size > 0);
    assert!(stats.size_formatted.ends_with(" B"));
    assert!(cache.lookup("https://b", now).is_none(), "two-day-old entry is past freshness");
}

#[test]
fn corrupt_entry_is_a_miss() {
    let dir = tempdir().unwrap();
    let cache = MediaCache::new(dir.path().to_path_buf(), Duration::hours(24), Duration::days(7));
    let key = notion_sync_core::media::cache::cache_key("https://a");
    std::fs::write(dir.path().join(format!("{key}.json")), "{ not json").unwrap();
    assert!(cache.lookup("https://a", Utc::now()).is_none());
}
