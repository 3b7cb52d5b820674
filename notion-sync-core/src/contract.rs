//! # contract: the seams between the pipeline and the outside world
//!
//! Every remote system the pipeline talks to is reached through one of the
//! traits below, so the orchestration, rendering and media logic can be driven
//! by real HTTP clients in production and by `mockall` mocks in tests.
//!
//! - [`ContentStore`]: the document database and its block trees.
//! - [`MediaHost`]: image download plus the upload/delete endpoints of the image host.
//! - [`ChildSource`]: how the renderer reaches a block's children.
//! - [`ImageResolver`]: how the renderer turns a source image URL into its published URL.
//!
//! Remote methods report [`RemoteError`]; retry, classification and fallback
//! policy live with the callers, not the implementors.

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde_json::Value;
use std::time::Duration;

use crate::error::{RemoteError, SyncError};
use crate::model::BlockNode;

/// Parameters of one page of the document listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    /// Records whose status matches any of these labels are returned.
    pub status_labels: Vec<String>,
    /// Date property sorted descending.
    pub sort_property: String,
    pub page_size: u32,
    pub cursor: Option<String>,
}

/// One page of raw records, as returned by both listing endpoints.
#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    pub results: Vec<Value>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseInfo {
    pub id: String,
    pub title: Option<String>,
}

/// Body and declared content type of a downloaded media file.
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// A file to place on the image host.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    /// Target folder, e.g. `notion/<document id>`.
    pub folder: String,
}

/// The remote document database.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Query the document database with the given filter, sort and cursor.
    async fn query_documents(&self, query: &DocumentQuery) -> Result<RecordPage, RemoteError>;

    /// List one page of the direct children of a block (or of a document).
    async fn list_block_children(
        &self,
        block_id: &str,
        cursor: Option<String>,
        page_size: u32,
    ) -> Result<RecordPage, RemoteError>;

    /// Retrieve the database itself; used as a connectivity check.
    async fn retrieve_database(&self) -> Result<DatabaseInfo, RemoteError>;
}

/// Image download plus the image host's upload and delete endpoints.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Download `url`, giving up after `timeout`.
    async fn download(&self, url: &str, timeout: Duration) -> Result<DownloadedMedia, RemoteError>;

    /// Upload a file and return the raw response body.
    async fn upload(&self, upload: MediaUpload) -> Result<String, RemoteError>;

    /// Remove every file stored under `folder`.
    async fn delete_folder(&self, folder: &str) -> Result<(), RemoteError>;
}

/// Lazily fetched children of a block, in source order.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ChildSource: Send + Sync {
    async fn fetch_children(&self, block_id: &str) -> Result<Vec<BlockNode>, SyncError>;
}

/// Relocates an image and returns the URL to embed. Never fails: the source
/// URL is the fallback.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ImageResolver: Send + Sync {
    async fn resolve(&self, source_url: &str, caption: &str, document_id: &str) -> String;
}
