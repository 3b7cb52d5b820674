use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Everything one synchronisation run needs, minus credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub output: OutputConfig,
    pub query: QueryConfig,
    pub fetch: FetchConfig,
    pub retry: RetryPolicy,
    pub media: MediaConfig,
    pub site: SiteConfig,
}

impl SyncConfig {
    pub fn trace_loaded(&self) {
        info!(
            docs_dir = %self.output.docs_dir.display(),
            cache_dir = %self.media.cache_dir.display(),
            max_attempts = self.retry.max_attempts,
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root of the generated site sources.
    pub docs_dir: PathBuf,
    /// Where the site generator config is written; defaults to `<docs_dir>/.vitepress/config.mjs`.
    pub site_config_path: Option<PathBuf>,
    /// Category assigned to documents whose category path is empty.
    pub default_category: String,
    /// Number of documents listed on the landing index.
    pub latest_count: usize,
}

impl OutputConfig {
    pub fn site_config_path(&self) -> PathBuf {
        self.site_config_path
            .clone()
            .unwrap_or_else(|| self.docs_dir.join(".vitepress").join("config.mjs"))
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("docs"),
            site_config_path: None,
            default_category: "uncategorized".to_string(),
            latest_count: 10,
        }
    }
}

/// Labels of the `status` select property in the source database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusLabels {
    pub draft: String,
    pub pending: String,
    pub published: String,
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            draft: "Draft".to_string(),
            pending: "Pending".to_string(),
            published: "Published".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub page_size: u32,
    pub status_labels: StatusLabels,
    pub sort_property: String,
    pub page_delay_ms: u64,
    pub max_documents: Option<usize>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            status_labels: StatusLabels::default(),
            sort_property: "date".to_string(),
            page_delay_ms: 400,
            max_documents: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub page_size: u32,
    pub page_delay_ms: u64,
}

impl FetchConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            page_delay_ms: 400,
        }
    }
}

/// Exponential backoff: `delay = min(base_delay * exponential_base^(attempt-1), max_delay)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: u32,
}

impl RetryPolicy {
    /// Backoff before the attempt following `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.exponential_base).saturating_pow(attempt.saturating_sub(1));
        let delay = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            exponential_base: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub cache_dir: PathBuf,
    pub freshness_hours: i64,
    pub retention_days: i64,
    pub download_timeout_secs: u64,
    /// Folder on the image host; each document uploads into `<upload_folder>/<document id>`.
    pub upload_folder: String,
    /// Prefix turning a host-relative upload path into an absolute URL.
    pub public_base_url: String,
    pub batch_size: usize,
    pub batch_pause_ms: u64,
    pub upload_attempts: u32,
}

impl MediaConfig {
    pub fn freshness(&self) -> chrono::Duration {
        chrono::Duration::hours(self.freshness_hours)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".cache/images"),
            freshness_hours: 24,
            retention_days: 7,
            download_timeout_secs: 30,
            upload_folder: "notion".to_string(),
            public_base_url: String::new(),
            batch_size: 3,
            batch_pause_ms: 1000,
            upload_attempts: 3,
        }
    }
}

/// Presentation options copied into the generated site artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    pub site_title: String,
    pub lang: String,
    pub logo: String,
    pub home_label: String,
    pub hero_name: String,
    pub hero_text: String,
    pub github_url: Option<String>,
    pub footer_message: String,
    pub footer_copyright: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Notes".to_string(),
            site_title: "Notes".to_string(),
            lang: "en-US".to_string(),
            logo: "/logo.svg".to_string(),
            home_label: "Home".to_string(),
            hero_name: "Notes".to_string(),
            hero_text: "Synchronised from Notion".to_string(),
            github_url: None,
            footer_message: "Released under the MIT License.".to_string(),
            footer_copyright: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(8000));
        assert_eq!(policy.delay_for(5), Duration::from_millis(10_000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(10_000));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: SyncConfig = serde_yaml::from_str("output:\n  docs_dir: site\n").unwrap();
        assert_eq!(config.output.docs_dir, PathBuf::from("site"));
        assert_eq!(config.output.latest_count, 10);
        assert_eq!(config.fetch.page_size, 50);
        assert_eq!(
            config.output.site_config_path(),
            PathBuf::from("site/.vitepress/config.mjs")
        );
    }
}
