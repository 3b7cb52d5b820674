//! Block tree → Markdown.
//!
//! [`MarkdownRenderer::render`] walks one level of blocks in source order and
//! recurses into children on demand through a [`ChildSource`]. A block that
//! fails to render (including failures fetching or rendering its subtree) is
//! replaced by an HTML comment naming its type; its siblings are unaffected.

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

use crate::contract::{ChildSource, ImageResolver};
use crate::error::SyncError;
use crate::model::{BlockKind, BlockNode, Mention, RichText, RichTextRun, TemplateMention};

const BULLET_INDENT: &str = "  ";
const NUMBERED_INDENT: &str = "   ";
const DEFAULT_CALLOUT_ICON: &str = "💡";

pub struct MarkdownRenderer<'a> {
    children: &'a dyn ChildSource,
    images: &'a dyn ImageResolver,
}

impl<'a> MarkdownRenderer<'a> {
    pub fn new(children: &'a dyn ChildSource, images: &'a dyn ImageResolver) -> Self {
        Self { children, images }
    }

    /// Render a sibling sequence. Never fails; broken blocks become placeholders.
    pub fn render<'b>(&'b self, blocks: &'b [BlockNode], document_id: &'b str) -> BoxFuture<'b, String> {
        async move {
            let mut markdown = String::new();
            for block in blocks {
                debug!(block_id = %block.id, block_type = block.type_name(), "Rendering block");
                match self.render_block(block, document_id).await {
                    Ok(text) => markdown.push_str(&text),
                    Err(e) => {
                        warn!(block_id = %block.id, block_type = block.type_name(), error = %e, "Block render failed, emitting placeholder");
                        markdown.push_str(&placeholder(block.type_name()));
                    }
                }
            }
            markdown
        }
        .boxed()
    }

    async fn render_block(&self, block: &BlockNode, document_id: &str) -> Result<String, SyncError> {
        let out = match &block.kind {
            BlockKind::Paragraph { text } => format!("{}\n\n", rich_text_to_markdown(text)),
            BlockKind::Heading { level, text } => {
                format!("{} {}\n\n", "#".repeat(usize::from(*level)), rich_text_to_markdown(text))
            }
            BlockKind::BulletedListItem { text } => {
                let mut out = format!("- {}\n", rich_text_to_markdown(text));
                if block.has_children {
                    out.push_str(&indent(&self.render_children(block, document_id).await?, BULLET_INDENT));
                }
                out
            }
            BlockKind::NumberedListItem { text } => {
                let mut out = format!("1. {}\n", rich_text_to_markdown(text));
                if block.has_children {
                    out.push_str(&indent(&self.render_children(block, document_id).await?, NUMBERED_INDENT));
                }
                out
            }
            BlockKind::Code { text, language } => {
                format!("```{language}\n{}\n```\n\n", rich_text_to_markdown(text))
            }
            BlockKind::Quote { text } => format!("{}\n\n", blockquote(&rich_text_to_markdown(text))),
            BlockKind::Divider => "---\n\n".to_string(),
            BlockKind::Table => self.render_table(block, document_id).await?,
            BlockKind::TableRow { cells } => format!("{}\n", table_line(&escape_cells(cells))),
            BlockKind::Callout { text, icon } => {
                let icon = icon.as_deref().unwrap_or(DEFAULT_CALLOUT_ICON);
                let mut out = format!(
                    "> {icon} **Note**\n> \n{}\n\n",
                    blockquote(&rich_text_to_markdown(text))
                );
                if block.has_children {
                    let nested = self.render_children(block, document_id).await?;
                    out.push_str(&blockquote(nested.trim_end_matches('\n')));
                    out.push_str("\n\n");
                }
                out
            }
            BlockKind::Image { url, caption } => {
                let url = required_url(block, url)?;
                let caption = rich_text_to_markdown(caption);
                let resolved = self.images.resolve(url, &caption, document_id).await;
                format!("![{caption}]({resolved})\n\n")
            }
            BlockKind::Embed { url, caption } => {
                let url = required_url(block, url)?;
                let caption = rich_text_to_markdown(caption);
                render_embed(url, &caption)
            }
            BlockKind::Bookmark { url, caption } => {
                let url = required_url(block, url)?;
                let caption = rich_text_to_markdown(caption);
                let label = if caption.is_empty() { url } else { caption.as_str() };
                format!("🔖 **Bookmark**: [{label}]({url})\n\n")
            }
            BlockKind::LinkPreview { url, title, description } => {
                let url = required_url(block, url)?;
                render_link_preview(url, title.as_deref(), description.as_deref())
            }
            BlockKind::Mention { mention, plain_text } => {
                format!("{}\n\n", mention_to_markdown(mention, plain_text))
            }
            BlockKind::Other { .. } => {
                if block.has_children {
                    self.render_children(block, document_id).await?
                } else {
                    String::new()
                }
            }
        };
        Ok(out)
    }

    async fn render_children(&self, block: &BlockNode, document_id: &str) -> Result<String, SyncError> {
        let children = self.children.fetch_children(&block.id).await?;
        Ok(self.render(&children, document_id).await)
    }

    async fn render_table(&self, block: &BlockNode, document_id: &str) -> Result<String, SyncError> {
        if !block.has_children {
            return Ok(String::new());
        }
        let rows: Vec<Vec<String>> = self
            .children
            .fetch_children(&block.id)
            .await?
            .iter()
            .filter_map(|child| match &child.kind {
                BlockKind::TableRow { cells } => Some(escape_cells(cells)),
                _ => None,
            })
            .collect();
        debug!(block_id = %block.id, document_id, rows = rows.len(), "Assembled table rows");
        Ok(render_table_rows(&rows))
    }
}

/// One-line comment substituted for a block that failed to render.
pub fn placeholder(block_type: &str) -> String {
    format!("<!-- failed to render block: {block_type} -->\n\n")
}

/// Concatenate runs, wrapping markers from the inside out:
/// code, strikethrough, italic, bold, then the link.
pub fn rich_text_to_markdown(runs: &[RichTextRun]) -> String {
    runs.iter().map(run_to_markdown).collect()
}

fn run_to_markdown(run: &RichTextRun) -> String {
    let mut text = run.plain_text.clone();
    let a = &run.annotations;
    if a.code {
        text = format!("`{text}`");
    }
    if a.strikethrough {
        text = format!("~~{text}~~");
    }
    if a.italic {
        text = format!("*{text}*");
    }
    if a.bold {
        text = format!("**{text}**");
    }
    if let Some(href) = &run.href {
        text = format!("[{text}]({href})");
    }
    text
}

/// Prefix every non-blank line; blank lines pass through untouched.
fn indent(markdown: &str, prefix: &str) -> String {
    markdown
        .split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn blockquote(markdown: &str) -> String {
    markdown
        .split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn required_url<'b>(block: &BlockNode, url: &'b Option<String>) -> Result<&'b str, SyncError> {
    url.as_deref().filter(|u| !u.is_empty()).ok_or_else(|| SyncError::BlockRender {
        block_type: block.type_name().to_string(),
        block_id: block.id.clone(),
        reason: "block has no url".to_string(),
    })
}

fn escape_cells(cells: &[RichText]) -> Vec<String> {
    cells
        .iter()
        .map(|cell| rich_text_to_markdown(cell).replace('|', "\\|"))
        .collect()
}

fn table_line(cells: &[String]) -> String {
    format!("| {} |", cells.join(" | "))
}

/// First row is the header; shorter data rows are padded to its width.
pub fn render_table_rows(rows: &[Vec<String>]) -> String {
    let Some((header, data)) = rows.split_first() else {
        return String::new();
    };
    let mut out = String::new();
    out.push_str(&table_line(header));
    out.push('\n');
    out.push_str(&table_line(&vec!["---".to_string(); header.len()]));
    out.push('\n');
    for row in data {
        let mut row = row.clone();
        if row.len() < header.len() {
            row.resize(header.len(), String::new());
        }
        out.push_str(&table_line(&row));
        out.push('\n');
    }
    out.push('\n');
    out
}

fn render_embed(url: &str, caption: &str) -> String {
    let (label, fallback) = if url.contains("youtube.com") || url.contains("youtu.be") {
        ("📺 **Video**", "YouTube video")
    } else if url.contains("codepen.io") {
        ("💻 **CodePen**", "CodePen demo")
    } else {
        ("🔗 **Embed**", "View content")
    };
    let text = if caption.is_empty() { fallback } else { caption };
    format!("{label}: [{text}]({url})\n\n")
}

fn render_link_preview(url: &str, title: Option<&str>, description: Option<&str>) -> String {
    let host = reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string));
    let title = title
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or(host)
        .unwrap_or_else(|| url.to_string());

    let mut out = format!("### 🔗 [{title}]({url})\n\n");
    if let Some(description) = description.filter(|d| !d.is_empty()) {
        out.push_str(description);
        out.push_str("\n\n");
    }
    out.push_str(&format!("**Link**: {url}\n\n"));
    out
}

pub fn mention_to_markdown(mention: &Mention, plain_text: &str) -> String {
    let notion_link = |label: &str, id: &str| format!("[{label}](https://notion.so/{})", id.replace('-', ""));
    match mention {
        Mention::User { id, name } => format!("@{}", name.as_deref().unwrap_or(id)),
        Mention::Page { id } => notion_link("Page", id),
        Mention::Database { id } => notion_link("Database", id),
        Mention::Date { start, end: Some(end) } => format!("[{start} → {end}]"),
        Mention::Date { start, end: None } => format!("[{start}]"),
        Mention::LinkPreview { url } => format!("[{url}]({url})"),
        Mention::Template(TemplateMention::Date(value)) => value.clone().unwrap_or_else(|| "@today".to_string()),
        Mention::Template(TemplateMention::User(value)) => value.clone().unwrap_or_else(|| "@me".to_string()),
        Mention::Template(TemplateMention::Unknown) | Mention::Unknown => plain_text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indent_skips_blank_lines() {
        assert_eq!(indent("a\n\nb\n", "  "), "  a\n\n  b\n");
    }

    #[test]
    fn link_preview_falls_back_to_host() {
        let out = render_link_preview("https://docs.rs/tokio/latest", None, Some("Async runtime"));
        assert_eq!(
            out,
            "### 🔗 [docs.rs](https://docs.rs/tokio/latest)\n\nAsync runtime\n\n**Link**: https://docs.rs/tokio/latest\n\n"
        );
    }

    #[test]
    fn embeds_pick_label_by_host() {
        assert!(render_embed("https://youtu.be/xyz", "").starts_with("📺 **Video**: [YouTube video]"));
        assert!(render_embed("https://codepen.io/pen/1", "demo").contains("[demo](https://codepen.io/pen/1)"));
        assert!(render_embed("https://example.com", "").starts_with("🔗 **Embed**: [View content]"));
    }
}
