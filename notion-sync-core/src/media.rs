//! Relocates images embedded in documents onto the controlled image host.
//!
//! `resolve` = cache lookup → download (bounded, must be an image) → upload,
//! both through the retry layer → cache store. Any failure along the way degrades
//! to the original source URL so a document always renders.

pub mod cache;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::config::MediaConfig;
use crate::contract::{ImageResolver, MediaHost, MediaUpload};
use crate::error::SyncError;
use crate::retry::RetryingClient;
use cache::MediaCache;

static URL_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp|svg|bmp)(?:\?.*)?$").expect("extension pattern is valid")
});

const DEFAULT_EXTENSION: &str = ".jpg";

/// One media reference for [`MediaPipeline::resolve_batch`].
#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub source_url: String,
    pub caption: String,
    pub document_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaOutcome {
    pub source_url: String,
    pub resolved_url: String,
    pub relocated: bool,
}

pub struct MediaPipeline<'a, H: MediaHost> {
    host: &'a H,
    cache: &'a MediaCache,
    retry: RetryingClient,
    config: MediaConfig,
}

impl<'a, H: MediaHost> MediaPipeline<'a, H> {
    /// Downloads and uploads retry under `retry`'s backoff, capped at `config.upload_attempts`.
    pub fn new(host: &'a H, cache: &'a MediaCache, retry: &RetryingClient, config: MediaConfig) -> Self {
        let policy = retry.policy().clone().with_max_attempts(config.upload_attempts);
        Self {
            host,
            cache,
            retry: RetryingClient::new(policy),
            config,
        }
    }

    /// Published URL for `source_url`, or `source_url` itself when relocation fails.
    pub async fn resolve(&self, source_url: &str, caption: &str, document_id: &str) -> String {
        match self.relocate(source_url, caption, document_id).await {
            Ok(url) => url,
            Err(e) => {
                warn!(source_url, document_id, error = %e, "Media relocation failed, using original URL");
                source_url.to_string()
            }
        }
    }

    /// Resolve many references in small concurrent groups with a pause between groups.
    pub async fn resolve_batch(&self, requests: &[MediaRequest]) -> Vec<MediaOutcome> {
        info!(count = requests.len(), "Resolving media batch");
        let batch_size = self.config.batch_size.max(1);
        let mut outcomes = Vec::with_capacity(requests.len());

        for (index, chunk) in requests.chunks(batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.batch_pause()).await;
            }
            let results = join_all(chunk.iter().map(|req| async move {
                match self.relocate(&req.source_url, &req.caption, &req.document_id).await {
                    Ok(url) => MediaOutcome {
                        source_url: req.source_url.clone(),
                        resolved_url: url,
                        relocated: true,
                    },
                    Err(e) => {
                        warn!(source_url = %req.source_url, error = %e, "Batch media relocation failed");
                        MediaOutcome {
                            source_url: req.source_url.clone(),
                            resolved_url: req.source_url.clone(),
                            relocated: false,
                        }
                    }
                }
            }))
            .await;
            outcomes.extend(results);
        }

        let relocated = outcomes.iter().filter(|o| o.relocated).count();
        info!(relocated, total = outcomes.len(), "Media batch complete");
        outcomes
    }

    async fn relocate(&self, source_url: &str, caption: &str, document_id: &str) -> Result<String, SyncError> {
        let _guard = self.cache.key_lock(source_url).await;

        if let Some(cached) = self.cache.lookup(source_url, Utc::now()) {
            return Ok(cached);
        }
        info!(source_url, caption, document_id, "Relocating media");

        let media = self
            .retry
            .execute_with_retry(
                || self.host.download(source_url, self.config.download_timeout()),
                "download media",
            )
            .await?;
        let content_type = media
            .content_type
            .as_deref()
            .filter(|ct| ct.starts_with("image/"))
            .ok_or_else(|| {
                SyncError::ContentValidation(format!(
                    "not an image: {}",
                    media.content_type.as_deref().unwrap_or("missing content type")
                ))
            })?
            .to_string();
        info!(size = media.bytes.len(), content_type = %content_type, "Downloaded media");

        let upload = MediaUpload {
            file_name: synthesize_file_name(&content_type, source_url),
            content_type,
            bytes: media.bytes,
            folder: format!("{}/{}", self.config.upload_folder, document_id),
        };
        let body = self
            .retry
            .execute_with_retry(|| self.host.upload(upload.clone()), "upload media")
            .await?;
        let path = parse_upload_response(&body)?;
        let uploaded_url = absolute_url(&self.config.public_base_url, &path);

        self.cache.store(source_url, &uploaded_url, Utc::now())?;
        info!(uploaded_url = %uploaded_url, "Media relocated");
        Ok(uploaded_url)
    }
}

#[async_trait]
impl<H: MediaHost> ImageResolver for MediaPipeline<'_, H> {
    async fn resolve(&self, source_url: &str, caption: &str, document_id: &str) -> String {
        MediaPipeline::resolve(self, source_url, caption, document_id).await
    }
}

/// Extension from the content type, else from the URL, else `.jpg`.
pub fn file_extension(content_type: &str, source_url: &str) -> String {
    let mime = content_type.split(';').next().unwrap_or_default().trim().to_lowercase();
    let known = match mime.as_str() {
        "image/jpeg" | "image/jpg" => Some(".jpg"),
        "image/png" => Some(".png"),
        "image/gif" => Some(".gif"),
        "image/webp" => Some(".webp"),
        "image/svg+xml" => Some(".svg"),
        "image/bmp" => Some(".bmp"),
        _ => None,
    };
    if let Some(ext) = known {
        return ext.to_string();
    }
    URL_EXTENSION
        .captures(source_url)
        .and_then(|c| c.get(1))
        .map(|m| format!(".{}", m.as_str().to_lowercase()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

fn synthesize_file_name(content_type: &str, source_url: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("notion_{millis}_{suffix}{}", file_extension(content_type, source_url))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UploadedFile {
    src: Option<String>,
    url: Option<String>,
    path: Option<String>,
    data: Option<String>,
}

/// The response shapes the image host is known to produce.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UploadResponse {
    Many(Vec<UploadedFile>),
    One(UploadedFile),
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Extract the stored path from an upload response.
///
/// Accepted: `[{"src": ..}]` (first element; keys src, url, path, data),
/// `{"url": ..}` (keys url, path, data, src), a JSON string, or a bare
/// non-JSON path. Anything else is an [`SyncError::UploadResponseParse`].
pub fn parse_upload_response(body: &str) -> Result<String, SyncError> {
    let trimmed = body.trim();
    let path = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Err(_) => Some(trimmed.to_string()).filter(|p| !p.is_empty()),
        Ok(serde_json::Value::String(raw)) => non_empty(&Some(raw)),
        Ok(value) => match serde_json::from_value::<UploadResponse>(value) {
            Ok(UploadResponse::Many(files)) => files
                .first()
                .and_then(|f| non_empty(&f.src).or(non_empty(&f.url)).or(non_empty(&f.path)).or(non_empty(&f.data))),
            Ok(UploadResponse::One(f)) => {
                non_empty(&f.url).or(non_empty(&f.path)).or(non_empty(&f.data)).or(non_empty(&f.src))
            }
            Err(_) => None,
        },
    };
    path.ok_or_else(|| SyncError::UploadResponseParse(body.to_string()))
}

fn absolute_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_prefers_content_type_then_url() {
        assert_eq!(file_extension("image/png", "https://x/a.gif"), ".png");
        assert_eq!(file_extension("image/jpeg; charset=binary", "https://x/a"), ".jpg");
        assert_eq!(file_extension("image/x-icon", "https://x/a.WEBP?sig=1"), ".webp");
        assert_eq!(file_extension("image/x-icon", "https://x/a"), ".jpg");
    }

    #[test]
    fn upload_response_shapes() {
        assert_eq!(parse_upload_response(r#"[{"src":"/file/a.png"}]"#).unwrap(), "/file/a.png");
        assert_eq!(parse_upload_response(r#"{"data":"file/b.png","src":"x"}"#).unwrap(), "file/b.png");
        assert_eq!(parse_upload_response("/file/c.png\n").unwrap(), "/file/c.png");
        assert!(matches!(
            parse_upload_response(r#"{"ok":true}"#),
            Err(SyncError::UploadResponseParse(_))
        ));
        assert!(matches!(parse_upload_response("[]"), Err(SyncError::UploadResponseParse(_))));
        assert!(parse_upload_response("").is_err());
    }

    #[test]
    fn normalizes_to_absolute_url() {
        assert_eq!(absolute_url("https://img.example.com/", "/file/a.png"), "https://img.example.com/file/a.png");
        assert_eq!(absolute_url("https://img.example.com", "file/a.png"), "https://img.example.com/file/a.png");
        assert_eq!(absolute_url("https://img.example.com", "https://cdn.x/a.png"), "https://cdn.x/a.png");
    }

    #[test]
    fn file_names_are_unique() {
        let a = synthesize_file_name("image/png", "https://x/a");
        let b = synthesize_file_name("image/png", "https://x/a");
        assert!(a.starts_with("notion_") && a.ends_with(".png"));
        assert_ne!(a, b);
    }
}
