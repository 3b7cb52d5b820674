//! High-level pipeline: list → fetch → render → write, then regenerate the site indexes.
//!
//! # Responsibilities
//! - Lists the publishable documents through the [`RetryingClient`]. Failing
//!   to reach the content store at all aborts the run.
//! - Renders every document independently. A document that cannot be fetched
//!   or written is logged, reported in [`SynchroniseReport::failed`] and left
//!   out of every index; the run carries on with the rest.
//! - Rebuilds the category indexes, the landing index and the site
//!   configuration from the documents that made it, from scratch.
//!
//! # Navigation
//! - Main entrypoint: [`synchronise`]
//! - Maintenance: [`health_check`], [`purge_document_media`], [`clean_media_cache`], [`media_cache_stats`]

use chrono::Utc;
use std::path::PathBuf;
use tracing::{error, info};

use crate::config::{MediaConfig, SyncConfig};
use crate::contract::{ContentStore, DatabaseInfo, MediaHost};
use crate::error::SyncError;
use crate::fetch::{list_documents, BlockTreeFetcher};
use crate::media::cache::{CacheStats, MediaCache};
use crate::media::MediaPipeline;
use crate::model::Document;
use crate::navigation::{build_nav, build_sidebar, ArticleMeta};
use crate::render::MarkdownRenderer;
use crate::retry::RetryingClient;
use crate::site;

/// Outcome of one run.
#[derive(Debug, Default)]
pub struct SynchroniseReport {
    /// Documents written, in listing order.
    pub documents: Vec<ArticleMeta>,
    pub failed: Vec<FailedDocument>,
    /// Index and configuration files regenerated after the documents.
    pub artifacts: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct FailedDocument {
    pub id: String,
    pub title: String,
    pub error: String,
}

fn media_cache(config: &MediaConfig) -> MediaCache {
    MediaCache::new(config.cache_dir.clone(), config.freshness(), config.retention())
}

/// Run one full synchronisation.
pub async fn synchronise<S, H>(config: &SyncConfig, store: &S, host: &H) -> Result<SynchroniseReport, SyncError>
where
    S: ContentStore,
    H: MediaHost,
{
    info!(docs_dir = %config.output.docs_dir.display(), "[SYNC] Starting synchronisation");
    let retry = RetryingClient::new(config.retry.clone());

    let documents = list_documents(store, &retry, &config.query, &config.output.default_category)
        .await
        .inspect_err(|e| error!(error = %e, "[SYNC][ERROR] Could not list documents, aborting run"))?;

    let cache = media_cache(&config.media);
    let fetcher = BlockTreeFetcher::new(store, &retry, config.fetch.clone());
    let media = MediaPipeline::new(host, &cache, &retry, config.media.clone());
    let renderer = MarkdownRenderer::new(&fetcher, &media);

    let mut report = SynchroniseReport::default();
    for doc in &documents {
        info!(document_id = %doc.id, title = %doc.title, "[SYNC] Processing document");
        match write_document(config, &fetcher, &renderer, doc).await {
            Ok(meta) => report.documents.push(meta),
            Err(e) => {
                error!(document_id = %doc.id, title = %doc.title, error = %e, "[SYNC][ERROR] Document failed, excluding from indexes");
                report.failed.push(FailedDocument {
                    id: doc.id.clone(),
                    title: doc.title.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    report.artifacts = write_indexes(config, &report.documents)?;

    info!(
        written = report.documents.len(),
        failed = report.failed.len(),
        artifacts = report.artifacts.len(),
        "[SYNC] Synchronisation complete"
    );
    Ok(report)
}

async fn write_document<S: ContentStore>(
    config: &SyncConfig,
    fetcher: &BlockTreeFetcher<'_, S>,
    renderer: &MarkdownRenderer<'_>,
    doc: &Document,
) -> Result<ArticleMeta, SyncError> {
    let blocks = fetcher.fetch_children(&doc.id).await?;
    let body = renderer.render(&blocks, &doc.id).await;
    let file = site::render_document_file(doc, &body)?;

    let path = config.output.docs_dir.join(site::document_relative_path(doc));
    site::write_file(&path, &file)?;
    info!(path = %path.display(), blocks = blocks.len(), "[SYNC] Wrote document");
    Ok(site::article_meta(doc))
}

/// Category indexes, landing index and site configuration for `articles`.
pub fn write_indexes(config: &SyncConfig, articles: &[ArticleMeta]) -> Result<Vec<PathBuf>, SyncError> {
    let docs_dir = &config.output.docs_dir;
    let mut written = Vec::new();

    for (category, members) in site::group_by_top_category(articles) {
        let path = docs_dir.join(&category).join("index.md");
        site::write_file(&path, &site::render_category_index(&category, &members))?;
        written.push(path);
    }

    let landing = docs_dir.join("index.md");
    site::write_file(
        &landing,
        &site::render_landing_index(&config.site, articles, config.output.latest_count)?,
    )?;
    written.push(landing);

    let nav = build_nav(articles);
    let sidebar = build_sidebar(articles);
    let site_config = config.output.site_config_path();
    site::write_file(&site_config, &site::render_site_config(&config.site, &nav, &sidebar)?)?;
    written.push(site_config);

    info!(count = written.len(), "[SYNC] Regenerated site indexes");
    Ok(written)
}

/// Reach the document database through the retry layer.
pub async fn health_check<S: ContentStore>(store: &S, retry: &RetryingClient) -> Result<DatabaseInfo, SyncError> {
    let info = retry
        .execute_with_retry(|| store.retrieve_database(), "retrieve document database")
        .await?;
    info!(database_id = %info.id, title = ?info.title, "Content store reachable");
    Ok(info)
}

/// Delete every media file uploaded for `document_id`.
pub async fn purge_document_media<H: MediaHost>(
    host: &H,
    retry: &RetryingClient,
    config: &MediaConfig,
    document_id: &str,
) -> Result<(), SyncError> {
    let folder = format!("{}/{}", config.upload_folder, document_id);
    retry
        .execute_with_retry(|| host.delete_folder(&folder), "delete media folder")
        .await?;
    info!(folder = %folder, "Purged document media");
    Ok(())
}

/// Remove media cache entries past the retention window.
pub fn clean_media_cache(config: &MediaConfig) -> Result<usize, SyncError> {
    media_cache(config).sweep(Utc::now())
}

pub fn media_cache_stats(config: &MediaConfig) -> CacheStats {
    media_cache(config).stats()
}
