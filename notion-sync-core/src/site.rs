//! Files consumed by the static site generator.
//!
//! ```text
//! {docs_dir}/
//! +-- index.md                       # landing page, latest documents
//! +-- <top>/index.md                 # one per top-level category
//! +-- <top>/<sub>/<title>.md         # one per document
//! +-- .vitepress/config.mjs          # nav + sidebar
//! ```
//!
//! All renderers here are pure; [`write_file`] is the only filesystem effect.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::SiteConfig;
use crate::error::SyncError;
use crate::model::Document;
use crate::navigation::{ArticleMeta, NavEntry, Sidebar};

const DESCRIPTION_CHARS: usize = 100;
const ILLEGAL_FILE_NAME_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if ILLEGAL_FILE_NAME_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Path of a document's file relative to the docs root.
pub fn document_relative_path(doc: &Document) -> PathBuf {
    let mut path: PathBuf = doc.category_path.iter().collect();
    path.push(format!("{}.md", sanitize_file_name(&doc.title)));
    path
}

/// Site-absolute link to a document's page.
pub fn document_link(doc: &Document) -> String {
    format!(
        "/{}/{}.md",
        doc.category_path.join("/"),
        sanitize_file_name(&doc.title)
    )
}

pub fn article_meta(doc: &Document) -> ArticleMeta {
    ArticleMeta {
        title: doc.title.clone(),
        link: document_link(doc),
        category_path: doc.category_path.clone(),
        tags: doc.tags.clone(),
        created_at: doc.created_at,
    }
}

fn timestamp(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[derive(Serialize)]
struct DocumentFrontmatter<'a> {
    title: &'a str,
    description: String,
    date: Option<String>,
    updated: Option<String>,
    category: &'a [String],
    tags: &'a [String],
    source_id: &'a str,
    source_url: &'a str,
}

/// Leading characters of the content on one line, used as the page description.
pub fn description(content: &str) -> String {
    content
        .chars()
        .take(DESCRIPTION_CHARS)
        .collect::<String>()
        .replace('\n', " ")
        .trim()
        .to_string()
}

/// Complete document file: frontmatter, title heading, rendered body.
pub fn render_document_file(doc: &Document, body: &str) -> Result<String, SyncError> {
    let content = format!("# {}\n{}", doc.title, body);
    let frontmatter = DocumentFrontmatter {
        title: &doc.title,
        description: description(&content),
        date: timestamp(doc.created_at),
        updated: timestamp(doc.updated_at),
        category: &doc.category_path,
        tags: &doc.tags,
        source_id: &doc.id,
        source_url: &doc.source_url,
    };
    let yaml = serde_yaml::to_string(&frontmatter)?;
    let mut out = format!("---\n{yaml}---\n{content}");
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

/// Top-level categories with their articles, in first-seen order.
pub fn group_by_top_category(articles: &[ArticleMeta]) -> Vec<(String, Vec<&ArticleMeta>)> {
    let mut groups: Vec<(String, Vec<&ArticleMeta>)> = Vec::new();
    for article in articles {
        let Some(top) = article.category_path.first() else {
            continue;
        };
        match groups.iter_mut().find(|(name, _)| name == top) {
            Some((_, members)) => members.push(article),
            None => groups.push((top.clone(), vec![article])),
        }
    }
    groups
}

pub fn render_category_index(category: &str, articles: &[&ArticleMeta]) -> String {
    let links: Vec<String> = articles
        .iter()
        .map(|a| format!("- [{}]({})", a.title, a.link))
        .collect();
    format!("# {category}\n\n{}\n", links.join("\n"))
}

#[derive(Serialize)]
struct HeroAction<'a> {
    theme: &'a str,
    text: &'a str,
    link: &'a str,
}

#[derive(Serialize)]
struct Hero<'a> {
    name: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    actions: Vec<HeroAction<'a>>,
}

#[derive(Serialize)]
struct Feature {
    title: String,
    link: String,
    details: String,
}

#[derive(Serialize)]
struct HomeFrontmatter<'a> {
    layout: &'a str,
    hero: Hero<'a>,
    features: Vec<Feature>,
}

/// Landing page: hero, one feature card per top-level category, latest documents.
pub fn render_landing_index(
    site: &SiteConfig,
    articles: &[ArticleMeta],
    latest_count: usize,
) -> Result<String, SyncError> {
    let actions = site
        .github_url
        .as_deref()
        .map(|link| {
            vec![HeroAction {
                theme: "alt",
                text: "View on GitHub",
                link,
            }]
        })
        .unwrap_or_default();
    let features = group_by_top_category(articles)
        .into_iter()
        .map(|(category, members)| Feature {
            link: format!("/{category}/"),
            details: format!("{} articles", members.len()),
            title: category,
        })
        .collect();
    let frontmatter = HomeFrontmatter {
        layout: "home",
        hero: Hero {
            name: &site.hero_name,
            text: &site.hero_text,
            actions,
        },
        features,
    };

    let latest: Vec<String> = articles
        .iter()
        .take(latest_count)
        .map(|a| match a.created_at {
            Some(date) => format!("- [{}]({}) - {}", a.title, a.link, date.format("%Y-%m-%d")),
            None => format!("- [{}]({})", a.title, a.link),
        })
        .collect();

    Ok(format!(
        "---\n{}---\n\n## Latest articles\n\n{}\n",
        serde_yaml::to_string(&frontmatter)?,
        latest.join("\n")
    ))
}

/// VitePress `config.mjs` with the generated nav (home entry first) and sidebar.
pub fn render_site_config(site: &SiteConfig, nav: &[NavEntry], sidebar: &Sidebar) -> Result<String, SyncError> {
    let mut full_nav = Vec::with_capacity(nav.len() + 1);
    full_nav.push(NavEntry::link(&site.home_label, "/"));
    full_nav.extend_from_slice(nav);

    let social_links = match &site.github_url {
        Some(url) => format!("[{{ icon: 'github', link: {} }}]", serde_json::to_string(url)?),
        None => "[]".to_string(),
    };

    Ok(format!(
        r#"import {{ defineConfig }} from 'vitepress'

export default defineConfig({{
  title: {title},
  lang: {lang},
  base: "/",
  cleanUrls: true,
  srcExclude: ['**/README.md'],
  head: [['link', {{ rel: 'icon', href: {logo} }}]],
  themeConfig: {{
    logo: {logo},
    siteTitle: {site_title},
    nav: {nav},
    sidebar: {sidebar},
    outline: {{
      level: 'deep'
    }},
    socialLinks: {social_links},
    footer: {{
      message: {footer_message},
      copyright: {footer_copyright}
    }},
    search: {{
      provider: 'local'
    }}
  }}
}})
"#,
        title = serde_json::to_string(&site.title)?,
        lang = serde_json::to_string(&site.lang)?,
        logo = serde_json::to_string(&site.logo)?,
        site_title = serde_json::to_string(&site.site_title)?,
        nav = indent_json(&serde_json::to_string_pretty(&full_nav)?),
        sidebar = indent_json(&serde_json::to_string_pretty(sidebar)?),
        footer_message = serde_json::to_string(&site.footer_message)?,
        footer_copyright = serde_json::to_string(&site.footer_copyright)?,
    ))
}

fn indent_json(json: &str) -> String {
    json.replace('\n', "\n    ")
}

/// Write `contents` to `path`, creating parent directories and replacing any existing file.
pub fn write_file(path: &Path, contents: &str) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    debug!(path = %path.display(), bytes = contents.len(), "Wrote site file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_illegal_file_name_characters() {
        assert_eq!(sanitize_file_name(r#"a/b\c:d*e?f"g<h>i|j"#), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_file_name("Plain title"), "Plain title");
    }

    #[test]
    fn description_is_single_line_prefix() {
        let content = format!("# Title\n{}", "x".repeat(200));
        let d = description(&content);
        assert_eq!(d.chars().count(), 100);
        assert!(d.starts_with("# Title x"));
        assert_eq!(description("  short\n"), "short");
    }
}
