//! reqwest-backed [`MediaHost`]: plain image downloads plus the image host's
//! upload and folder-delete endpoints.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::contract::{DownloadedMedia, MediaHost, MediaUpload};
use crate::error::{RemoteError, SyncError};

const DOWNLOAD_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const DOWNLOAD_REFERER: &str = "https://notion.so/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoints and credential of the image host.
#[derive(Debug, Clone)]
pub struct ImageHostSettings {
    pub upload_url: String,
    pub delete_url: String,
    pub auth_code: String,
}

pub struct ImageHostClient {
    http: Client,
    settings: ImageHostSettings,
}

impl ImageHostClient {
    pub fn new(settings: ImageHostSettings) -> Result<Self, SyncError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::NetworkPermanent {
                context: "build image host http client".to_string(),
                source: e.into(),
            })?;
        info!(upload_url = %settings.upload_url, "Initialized ImageHostClient");
        Ok(Self { http, settings })
    }
}

async fn status_error(response: reqwest::Response) -> RemoteError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    RemoteError::Status { status, body }
}

#[async_trait]
impl MediaHost for ImageHostClient {
    async fn download(&self, url: &str, timeout: Duration) -> Result<DownloadedMedia, RemoteError> {
        let short: String = url.chars().take(80).collect();
        debug!(url = %short, "Downloading media");
        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .header(reqwest::header::USER_AGENT, DOWNLOAD_USER_AGENT)
            .header(reqwest::header::REFERER, DOWNLOAD_REFERER)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(DownloadedMedia { bytes, content_type })
    }

    async fn upload(&self, upload: MediaUpload) -> Result<String, RemoteError> {
        debug!(file_name = %upload.file_name, folder = %upload.folder, "Uploading media");
        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)?;
        let response = self
            .http
            .post(&self.settings.upload_url)
            .query(&[
                ("authCode", self.settings.auth_code.as_str()),
                ("uploadFolder", upload.folder.as_str()),
            ])
            .multipart(Form::new().part("file", part))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(response.text().await?)
    }

    async fn delete_folder(&self, folder: &str) -> Result<(), RemoteError> {
        let url = format!("{}{}", self.settings.delete_url, folder);
        info!(url = %url, "Deleting media folder");
        let response = self
            .http
            .get(&url)
            .query(&[("folder", "true")])
            .bearer_auth(&self.settings.auth_code)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(body = %body, "Media folder deleted");
        Ok(())
    }
}
