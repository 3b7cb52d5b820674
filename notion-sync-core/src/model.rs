//! Domain model: documents listed from the content store and the typed
//! block tree that makes up their body.
//!
//! Remote records arrive as loosely-typed JSON; everything in here is parsed
//! once, up front, into closed types so the renderer can match exhaustively.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;

use crate::config::StatusLabels;
use crate::error::SyncError;
use crate::site::sanitize_file_name;

static SLUG_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\x{4e00}-\x{9fff}]+").expect("slug pattern is valid"));

const MAX_SLUG_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Draft,
    Pending,
    Published,
}

impl DocumentStatus {
    pub fn from_label(label: Option<&str>, labels: &StatusLabels) -> Self {
        match label {
            Some(l) if l == labels.pending => DocumentStatus::Pending,
            Some(l) if l == labels.published => DocumentStatus::Published,
            _ => DocumentStatus::Draft,
        }
    }
}

/// One document of the source database, parsed from its property record.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub slug: String,
    /// Never empty: records without a category get the configured default.
    pub category_path: Vec<String>,
    pub tags: Vec<String>,
    pub status: DocumentStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub index_date: Option<DateTime<Utc>>,
    pub source_url: String,
}

impl Document {
    pub fn from_record(
        record: &Value,
        labels: &StatusLabels,
        default_category: &str,
    ) -> Result<Self, SyncError> {
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SyncError::InvalidDocument("record has no id".to_string()))?
            .to_string();
        let props = record.get("properties").unwrap_or(&Value::Null);

        let title = first_plain_text(props.pointer("/title/title"))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string());
        let slug = first_plain_text(props.pointer("/slug/rich_text"))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| generate_slug(&title));
        let category_path =
            parse_category_path(first_plain_text(props.pointer("/category/rich_text")).as_deref(), default_category);

        let mut tags: Vec<String> = Vec::new();
        if let Some(options) = props.pointer("/tags/multi_select").and_then(Value::as_array) {
            for name in options.iter().filter_map(|o| o.get("name").and_then(Value::as_str)) {
                if !tags.iter().any(|t| t == name) {
                    tags.push(name.to_string());
                }
            }
        }

        let status = DocumentStatus::from_label(
            props.pointer("/status/select/name").and_then(Value::as_str),
            labels,
        );

        Ok(Document {
            title,
            slug,
            category_path,
            tags,
            status,
            created_at: parse_timestamp(props.pointer("/created_time/created_time")),
            updated_at: parse_timestamp(props.pointer("/last_edited_time/last_edited_time")),
            index_date: parse_timestamp(props.pointer("/date/date/start")),
            source_url: record
                .get("url")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            id,
        })
    }

    pub fn top_category(&self) -> &str {
        self.category_path.first().map(String::as_str).unwrap_or_default()
    }
}

fn first_plain_text(value: Option<&Value>) -> Option<String> {
    value?
        .as_array()?
        .first()?
        .get("plain_text")?
        .as_str()
        .map(str::to_string)
}

/// Splits a `a/b/c` category string; an empty path falls back to `default_category`.
///
/// Segments become directory names under the docs root, so `.` and `..` are
/// dropped and each remaining segment is made file-name safe.
pub fn parse_category_path(raw: Option<&str>, default_category: &str) -> Vec<String> {
    let path: Vec<String> = raw
        .unwrap_or_default()
        .split(['/', '\\'])
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .map(sanitize_file_name)
        .collect();
    if path.is_empty() {
        vec![default_category.to_string()]
    } else {
        path
    }
}

pub fn generate_slug(title: &str) -> String {
    let lowered = title.to_lowercase();
    let dashed = SLUG_SEPARATORS.replace_all(&lowered, "-");
    dashed.trim_matches('-').chars().take(MAX_SLUG_CHARS).collect()
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let raw = value?.as_str()?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Annotations {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub code: bool,
}

/// A run of uniformly formatted text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RichTextRun {
    pub plain_text: String,
    pub href: Option<String>,
    pub annotations: Annotations,
}

impl RichTextRun {
    pub fn plain(text: &str) -> Self {
        RichTextRun {
            plain_text: text.to_string(),
            ..Default::default()
        }
    }
}

pub type RichText = Vec<RichTextRun>;

fn rich_text(value: Option<&Value>) -> RichText {
    value
        .filter(|v| v.is_array())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateMention {
    Date(Option<String>),
    User(Option<String>),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mention {
    User { id: String, name: Option<String> },
    Page { id: String },
    Database { id: String },
    Date { start: String, end: Option<String> },
    LinkPreview { url: String },
    Template(TemplateMention),
    Unknown,
}

impl Mention {
    fn from_payload(payload: &Value) -> Self {
        let str_at = |pointer: &str| payload.pointer(pointer).and_then(Value::as_str).map(str::to_string);
        match payload.get("type").and_then(Value::as_str) {
            Some("user") => Mention::User {
                id: str_at("/user/id").unwrap_or_default(),
                name: str_at("/user/name"),
            },
            Some("page") => Mention::Page {
                id: str_at("/page/id").unwrap_or_default(),
            },
            Some("database") => Mention::Database {
                id: str_at("/database/id").unwrap_or_default(),
            },
            Some("date") => Mention::Date {
                start: str_at("/date/start").unwrap_or_default(),
                end: str_at("/date/end"),
            },
            Some("link_preview") => Mention::LinkPreview {
                url: str_at("/link_preview/url").unwrap_or_default(),
            },
            Some("template_mention") => {
                Mention::Template(match str_at("/template_mention/type").as_deref() {
                    Some("template_mention_date") => {
                        TemplateMention::Date(str_at("/template_mention/template_mention_date"))
                    }
                    Some("template_mention_user") => {
                        TemplateMention::User(str_at("/template_mention/template_mention_user"))
                    }
                    _ => TemplateMention::Unknown,
                })
            }
            _ => Mention::Unknown,
        }
    }
}

/// The closed set of block variants the renderer understands.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Paragraph { text: RichText },
    Heading { level: u8, text: RichText },
    BulletedListItem { text: RichText },
    NumberedListItem { text: RichText },
    Code { text: RichText, language: String },
    Quote { text: RichText },
    Divider,
    Table,
    TableRow { cells: Vec<RichText> },
    Callout { text: RichText, icon: Option<String> },
    Image { url: Option<String>, caption: RichText },
    Embed { url: Option<String>, caption: RichText },
    Bookmark { url: Option<String>, caption: RichText },
    LinkPreview { url: Option<String>, title: Option<String>, description: Option<String> },
    Mention { mention: Mention, plain_text: String },
    Other { type_name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockNode {
    pub id: String,
    pub has_children: bool,
    pub kind: BlockKind,
}

impl BlockNode {
    pub fn from_record(record: &Value) -> Self {
        let type_name = record.get("type").and_then(Value::as_str).unwrap_or("unsupported");
        let payload = record.get(type_name).unwrap_or(&Value::Null);
        let text = || rich_text(payload.get("rich_text"));
        let caption = || rich_text(payload.get("caption"));
        let str_at = |pointer: &str| payload.pointer(pointer).and_then(Value::as_str).map(str::to_string);

        let kind = match type_name {
            "paragraph" => BlockKind::Paragraph { text: text() },
            "heading_1" => BlockKind::Heading { level: 1, text: text() },
            "heading_2" => BlockKind::Heading { level: 2, text: text() },
            "heading_3" => BlockKind::Heading { level: 3, text: text() },
            "bulleted_list_item" => BlockKind::BulletedListItem { text: text() },
            "numbered_list_item" => BlockKind::NumberedListItem { text: text() },
            "code" => BlockKind::Code {
                text: text(),
                language: str_at("/language").unwrap_or_default(),
            },
            "quote" => BlockKind::Quote { text: text() },
            "divider" => BlockKind::Divider,
            "table" => BlockKind::Table,
            "table_row" => BlockKind::TableRow {
                cells: payload
                    .get("cells")
                    .and_then(Value::as_array)
                    .map(|cells| cells.iter().map(|c| rich_text(Some(c))).collect())
                    .unwrap_or_default(),
            },
            "callout" => BlockKind::Callout {
                text: text(),
                icon: str_at("/icon/emoji"),
            },
            "image" => BlockKind::Image {
                url: str_at("/file/url").or_else(|| str_at("/external/url")),
                caption: caption(),
            },
            "embed" => BlockKind::Embed {
                url: str_at("/url"),
                caption: caption(),
            },
            "bookmark" => BlockKind::Bookmark {
                url: str_at("/url"),
                caption: caption(),
            },
            "link_preview" => BlockKind::LinkPreview {
                url: str_at("/url"),
                title: str_at("/title"),
                description: str_at("/description"),
            },
            "mention" => BlockKind::Mention {
                mention: Mention::from_payload(payload),
                plain_text: str_at("/plain_text").unwrap_or_default(),
            },
            other => BlockKind::Other {
                type_name: other.to_string(),
            },
        };

        BlockNode {
            id: record.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
            has_children: record.get("has_children").and_then(Value::as_bool).unwrap_or(false),
            kind,
        }
    }

    /// The source-side type tag, used in logs and failure placeholders.
    pub fn type_name(&self) -> &str {
        match &self.kind {
            BlockKind::Paragraph { .. } => "paragraph",
            BlockKind::Heading { level: 1, .. } => "heading_1",
            BlockKind::Heading { level: 2, .. } => "heading_2",
            BlockKind::Heading { .. } => "heading_3",
            BlockKind::BulletedListItem { .. } => "bulleted_list_item",
            BlockKind::NumberedListItem { .. } => "numbered_list_item",
            BlockKind::Code { .. } => "code",
            BlockKind::Quote { .. } => "quote",
            BlockKind::Divider => "divider",
            BlockKind::Table => "table",
            BlockKind::TableRow { .. } => "table_row",
            BlockKind::Callout { .. } => "callout",
            BlockKind::Image { .. } => "image",
            BlockKind::Embed { .. } => "embed",
            BlockKind::Bookmark { .. } => "bookmark",
            BlockKind::LinkPreview { .. } => "link_preview",
            BlockKind::Mention { .. } => "mention",
            BlockKind::Other { type_name } => type_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page_record(category: &str) -> Value {
        json!({
            "id": "0f1e2d3c-aaaa-bbbb-cccc-111122223333",
            "url": "https://www.notion.so/Intro-0f1e2d3c",
            "properties": {
                "title": { "title": [{ "plain_text": "Hello World" }] },
                "category": { "rich_text": [{ "plain_text": category }] },
                "tags": { "multi_select": [{ "name": "rust" }, { "name": "rust" }, { "name": "sync" }] },
                "status": { "select": { "name": "Published" } },
                "created_time": { "created_time": "2024-03-01T08:30:00.000Z" },
                "date": { "date": { "start": "2024-03-02" } }
            }
        })
    }

    #[test]
    fn parses_document_properties() {
        let doc = Document::from_record(&page_record("guide/setup"), &StatusLabels::default(), "misc").unwrap();
        assert_eq!(doc.title, "Hello World");
        assert_eq!(doc.slug, "hello-world");
        assert_eq!(doc.category_path, vec!["guide", "setup"]);
        assert_eq!(doc.tags, vec!["rust", "sync"]);
        assert_eq!(doc.status, DocumentStatus::Published);
        assert!(doc.created_at.is_some());
        assert!(doc.index_date.is_some());
        assert!(doc.updated_at.is_none());
    }

    #[test]
    fn empty_category_gets_default() {
        let doc = Document::from_record(&page_record(" / "), &StatusLabels::default(), "misc").unwrap();
        assert_eq!(doc.category_path, vec!["misc"]);
        assert_eq!(parse_category_path(None, "misc"), vec!["misc"]);
    }

    #[test]
    fn category_segments_cannot_leave_docs_root() {
        assert_eq!(parse_category_path(Some("../../outside"), "misc"), vec!["outside"]);
        assert_eq!(parse_category_path(Some("./guide/../setup"), "misc"), vec!["guide", "setup"]);
        assert_eq!(parse_category_path(Some(".."), "misc"), vec!["misc"]);
        assert_eq!(parse_category_path(Some("a\\..\\b:c"), "misc"), vec!["a", "b_c"]);
    }

    #[test]
    fn record_without_id_is_rejected() {
        let err = Document::from_record(&json!({"properties": {}}), &StatusLabels::default(), "misc");
        assert!(matches!(err, Err(SyncError::InvalidDocument(_))));
    }

    #[test]
    fn slug_keeps_cjk_and_trims_dashes() {
        assert_eq!(generate_slug("  Rust: 异步 编程!  "), "rust-异步-编程");
        assert_eq!(generate_slug(&"a".repeat(80)).len(), 50);
    }

    #[test]
    fn unknown_block_types_become_other() {
        let block = BlockNode::from_record(&json!({
            "id": "b1", "type": "toggle", "has_children": true, "toggle": {}
        }));
        assert_eq!(block.kind, BlockKind::Other { type_name: "toggle".into() });
        assert!(block.has_children);
        assert_eq!(block.type_name(), "toggle");
    }
}
