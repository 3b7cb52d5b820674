//! Cursor-paginated retrieval of block children and of the document listing.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{FetchConfig, QueryConfig, StatusLabels};
use crate::contract::{ChildSource, ContentStore, DocumentQuery};
use crate::error::SyncError;
use crate::model::{BlockNode, Document};
use crate::retry::RetryingClient;

/// Fetches one level of a block tree at a time. Recursion is left to the caller.
pub struct BlockTreeFetcher<'a, S: ContentStore> {
    store: &'a S,
    retry: &'a RetryingClient,
    config: FetchConfig,
}

impl<'a, S: ContentStore> BlockTreeFetcher<'a, S> {
    pub fn new(store: &'a S, retry: &'a RetryingClient, config: FetchConfig) -> Self {
        Self {
            store,
            retry,
            config,
        }
    }

    /// All direct children of `block_id`, in source order.
    pub async fn fetch_children(&self, block_id: &str) -> Result<Vec<BlockNode>, SyncError> {
        let short_id: String = block_id.chars().take(8).collect();
        let context = format!("fetch block children {short_id}");
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .retry
                .execute_with_retry(
                    || {
                        self.store
                            .list_block_children(block_id, cursor.clone(), self.config.page_size)
                    },
                    &context,
                )
                .await?;
            blocks.extend(page.results.iter().map(BlockNode::from_record));
            debug!(block_id, fetched = blocks.len(), has_more = page.has_more, "Fetched block page");

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => {
                    cursor = Some(next);
                    tokio::time::sleep(self.config.page_delay()).await;
                }
                _ => break,
            }
        }
        Ok(blocks)
    }
}

#[async_trait]
impl<S: ContentStore> ChildSource for BlockTreeFetcher<'_, S> {
    async fn fetch_children(&self, block_id: &str) -> Result<Vec<BlockNode>, SyncError> {
        BlockTreeFetcher::fetch_children(self, block_id).await
    }
}

/// Lists the documents to publish: pending and published records, newest first.
///
/// Failure here is fatal for a run, so the error is returned as-is.
pub async fn list_documents<S: ContentStore>(
    store: &S,
    retry: &RetryingClient,
    config: &QueryConfig,
    default_category: &str,
) -> Result<Vec<Document>, SyncError> {
    let labels: &StatusLabels = &config.status_labels;
    let mut query = DocumentQuery {
        status_labels: vec![labels.pending.clone(), labels.published.clone()],
        sort_property: config.sort_property.clone(),
        page_size: config.page_size,
        cursor: None,
    };
    let mut documents = Vec::new();

    loop {
        let page = retry
            .execute_with_retry(|| store.query_documents(&query), "query document database")
            .await?;
        for record in &page.results {
            match Document::from_record(record, labels, default_category) {
                Ok(doc) => documents.push(doc),
                Err(e) => tracing::warn!(error = %e, "Skipping unparsable document record"),
            }
        }

        if let Some(limit) = config.max_documents {
            if documents.len() >= limit {
                documents.truncate(limit);
                break;
            }
        }
        match (page.has_more, page.next_cursor) {
            (true, Some(next)) => {
                query.cursor = Some(next);
                tokio::time::sleep(std::time::Duration::from_millis(config.page_delay_ms)).await;
            }
            _ => break,
        }
    }

    info!(count = documents.len(), "Listed documents from content store");
    Ok(documents)
}
