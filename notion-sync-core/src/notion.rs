//! reqwest-backed [`ContentStore`] talking to the Notion REST API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::contract::{ContentStore, DatabaseInfo, DocumentQuery, RecordPage};
use crate::error::{RemoteError, SyncError};

pub const NOTION_API_BASE: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2022-06-28";
const USER_AGENT: &str = concat!("notion-sync/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct NotionClient {
    http: Client,
    base_url: String,
    token: String,
    database_id: String,
}

impl NotionClient {
    pub fn new(token: &str, database_id: &str) -> Result<Self, SyncError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SyncError::NetworkPermanent {
                context: "build notion http client".to_string(),
                source: e.into(),
            })?;
        info!(database_id, "Initialized NotionClient");
        Ok(Self {
            http,
            base_url: NOTION_API_BASE.to_string(),
            token: token.to_string(),
            database_id: database_id.to_string(),
        })
    }

    /// Point the client at another API root, e.g. a local stub server.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, RemoteError> {
        let response = request
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<failed to read response body>"));
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

/// Request body of a database query page.
pub fn query_body(query: &DocumentQuery) -> Value {
    let filters: Vec<Value> = query
        .status_labels
        .iter()
        .map(|label| json!({ "property": "status", "select": { "equals": label } }))
        .collect();
    let mut body = json!({
        "filter": { "or": filters },
        "sorts": [{ "property": query.sort_property, "direction": "descending" }],
        "page_size": query.page_size,
    });
    if let Some(cursor) = &query.cursor {
        body["start_cursor"] = json!(cursor);
    }
    body
}

fn record_page(value: Value) -> Result<RecordPage, RemoteError> {
    let results = value
        .get("results")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| RemoteError::Decode("response has no results array".to_string()))?;
    Ok(RecordPage {
        results,
        has_more: value.get("has_more").and_then(Value::as_bool).unwrap_or(false),
        next_cursor: value.get("next_cursor").and_then(Value::as_str).map(str::to_string),
    })
}

#[async_trait]
impl ContentStore for NotionClient {
    async fn query_documents(&self, query: &DocumentQuery) -> Result<RecordPage, RemoteError> {
        let url = format!("{}/databases/{}/query", self.base_url, self.database_id);
        debug!(url = %url, cursor = ?query.cursor, "Querying database");
        let value = self.send(self.http.post(&url).json(&query_body(query))).await?;
        record_page(value)
    }

    async fn list_block_children(
        &self,
        block_id: &str,
        cursor: Option<String>,
        page_size: u32,
    ) -> Result<RecordPage, RemoteError> {
        let url = format!("{}/blocks/{}/children", self.base_url, block_id);
        let mut params = vec![("page_size", page_size.to_string())];
        if let Some(cursor) = cursor {
            params.push(("start_cursor", cursor));
        }
        debug!(url = %url, "Listing block children");
        let value = self.send(self.http.get(&url).query(&params)).await?;
        record_page(value)
    }

    async fn retrieve_database(&self) -> Result<DatabaseInfo, RemoteError> {
        let url = format!("{}/databases/{}", self.base_url, self.database_id);
        let value = self.send(self.http.get(&url)).await?;
        let title = value
            .get("title")
            .and_then(Value::as_array)
            .map(|runs| {
                runs.iter()
                    .filter_map(|r| r.get("plain_text").and_then(Value::as_str))
                    .collect::<String>()
            })
            .filter(|t| !t.is_empty());
        Ok(DatabaseInfo {
            id: value
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or(&self.database_id)
                .to_string(),
            title,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_body_filters_on_any_status_and_sorts_descending() {
        let body = query_body(&DocumentQuery {
            status_labels: vec!["Pending".into(), "Published".into()],
            sort_property: "date".into(),
            page_size: 10,
            cursor: Some("abc".into()),
        });
        assert_eq!(body["filter"]["or"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["filter"]["or"][1]["select"]["equals"], "Published");
        assert_eq!(body["sorts"][0]["direction"], "descending");
        assert_eq!(body["start_cursor"], "abc");
    }

    #[test]
    fn record_page_requires_results() {
        let page = record_page(json!({"results": [{"id": "1"}], "has_more": true, "next_cursor": "c"})).unwrap();
        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some("c"));
        assert!(matches!(record_page(json!({})), Err(RemoteError::Decode(_))));
    }
}
