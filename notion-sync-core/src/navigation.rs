//! Sidebar and top-nav structures derived from the flat list of published documents.
//!
//! Both are rebuilt from scratch every run. Category order is first-seen order
//! in the input; within any sibling list, neighbouring entries whose leading
//! tokens are both numbers are put in numeric order (see [`sort_numeric_prefix`]).

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// What the indexer needs to know about one written document.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleMeta {
    pub title: String,
    /// Site-absolute link, e.g. `/guide/setup/Install.md`.
    pub link: String,
    pub category_path: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Sidebar node: a grouping (`items`, no `link`) or a leaf (`link`, no `items`).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NavNode {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<NavNode>>,
}

impl NavNode {
    fn group(text: &str) -> Self {
        NavNode {
            text: text.to_string(),
            link: None,
            collapsed: None,
            items: Some(Vec::new()),
        }
    }

    fn leaf(text: &str, link: &str) -> Self {
        NavNode {
            text: text.to_string(),
            link: Some(link.to_string()),
            collapsed: None,
            items: None,
        }
    }
}

/// Top-level category → its sidebar tree, in first-seen order.
///
/// Serialises as `{"/<category>/": [<root node>], ...}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sidebar {
    pub sections: Vec<(String, NavNode)>,
}

impl Sidebar {
    pub fn section(&self, category: &str) -> Option<&NavNode> {
        self.sections.iter().find(|(c, _)| c == category).map(|(_, node)| node)
    }
}

impl Serialize for Sidebar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for (category, root) in &self.sections {
            map.serialize_entry(&format!("/{category}/"), &[root])?;
        }
        map.end()
    }
}

/// Entry of the top navigation bar.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavEntry {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_match: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<NavEntry>>,
}

impl NavEntry {
    pub fn link(text: &str, link: &str) -> Self {
        NavEntry {
            text: text.to_string(),
            link: Some(link.to_string()),
            active_match: None,
            items: None,
        }
    }
}

pub fn build_sidebar(articles: &[ArticleMeta]) -> Sidebar {
    let mut sidebar = Sidebar::default();

    for article in articles {
        let Some((top, rest)) = article.category_path.split_first() else {
            continue;
        };
        let index = match sidebar.sections.iter().position(|(c, _)| c == top) {
            Some(i) => i,
            None => {
                let mut root = NavNode::group(top);
                root.collapsed = Some(false);
                sidebar.sections.push((top.clone(), root));
                sidebar.sections.len() - 1
            }
        };

        let mut items = sidebar.sections[index].1.items.get_or_insert_with(Vec::new);
        for segment in rest {
            let position = items
                .iter()
                .position(|node| node.text == *segment && node.link.is_none());
            let position = position.unwrap_or_else(|| {
                items.push(NavNode::group(segment));
                items.len() - 1
            });
            items = items[position].items.get_or_insert_with(Vec::new);
        }

        let duplicate = items
            .iter()
            .any(|node| node.text == article.title && node.link.as_deref() == Some(article.link.as_str()));
        if !duplicate {
            items.push(NavNode::leaf(&article.title, &article.link));
        }
    }

    for (_, root) in &mut sidebar.sections {
        sort_tree(root);
    }
    sidebar
}

fn sort_tree(node: &mut NavNode) {
    if let Some(items) = node.items.as_mut() {
        sort_numeric_prefix(items, |n| n.text.as_str());
        items.iter_mut().for_each(sort_tree);
    }
}

/// One menu per top-level category listing its distinct second-level categories.
pub fn build_nav(articles: &[ArticleMeta]) -> Vec<NavEntry> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();

    for article in articles {
        let [top, second, ..] = article.category_path.as_slice() else {
            continue;
        };
        let index = match groups.iter().position(|(c, _)| c == top) {
            Some(i) => i,
            None => {
                groups.push((top.clone(), Vec::new()));
                groups.len() - 1
            }
        };
        let seconds = &mut groups[index].1;
        if !seconds.contains(second) {
            seconds.push(second.clone());
        }
    }

    let mut nav: Vec<NavEntry> = groups
        .into_iter()
        .map(|(top, seconds)| {
            let target = format!("/{top}/");
            let mut items: Vec<NavEntry> = seconds
                .iter()
                .map(|second| NavEntry {
                    text: second.clone(),
                    link: Some(target.clone()),
                    active_match: Some(target.clone()),
                    items: None,
                })
                .collect();
            sort_numeric_prefix(&mut items, |e| e.text.as_str());
            NavEntry {
                text: top,
                link: None,
                active_match: None,
                items: Some(items),
            }
        })
        .collect();
    sort_numeric_prefix(&mut nav, |e| e.text.as_str());
    nav
}

fn numeric_prefix(text: &str) -> Option<f64> {
    let token = text.split_whitespace().next()?;
    token.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Stable reorder of siblings by numeric leading token.
///
/// Adjacent entries are swapped only when both leading tokens parse as
/// numbers and are out of order, so an entry without a number blocks any
/// reordering across it.
pub fn sort_numeric_prefix<T, F>(items: &mut [T], text: F)
where
    F: Fn(&T) -> &str,
{
    let len = items.len();
    for pass in 1..len {
        for j in 1..=(len - pass) {
            let prev = numeric_prefix(text(&items[j - 1]));
            let cur = numeric_prefix(text(&items[j]));
            if let (Some(prev), Some(cur)) = (prev, cur) {
                if prev > cur {
                    items.swap(j - 1, j);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_prefix_parsing() {
        assert_eq!(numeric_prefix("10 Intro"), Some(10.0));
        assert_eq!(numeric_prefix("2.5 Setup"), Some(2.5));
        assert_eq!(numeric_prefix("Intro 1"), None);
        assert_eq!(numeric_prefix(""), None);
    }
}
