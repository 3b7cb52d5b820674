/// `load_config` module: reads the static YAML config and the secrets kept in the environment.
///
/// The YAML file holds everything that is safe to commit (output layout,
/// paging, retry policy, media and site options) and maps one-to-one onto
/// [`SyncConfig`]; omitted keys keep their defaults. Tokens and endpoint URLs
/// are only ever read from the environment (`.env` is loaded by `main`).
///
/// # Errors
/// All errors in this module use `anyhow::Error` with the offending path or
/// variable name, and are surfaced at the CLI boundary.
use anyhow::{anyhow, Context, Result};
use notion_sync_core::image_host::ImageHostSettings;
use notion_sync_core::SyncConfig;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const NOTION_TOKEN: &str = "NOTION_TOKEN";
pub const NOTION_DATABASE_ID: &str = "NOTION_DATABASE_ID";
pub const IMG_UPLOAD_URL: &str = "IMG_UPLOAD_URL";
pub const IMG_UPLOAD_AUTHCODE: &str = "IMG_UPLOAD_AUTHCODE";
pub const IMG_DELETE_URL: &str = "IMG_DELETE_URL";
pub const IMG_BASEURL: &str = "IMG_BASEURL";
pub const IMG_UPLOAD_FOLDER: &str = "IMG_UPLOAD_FOLDER";

/// Access to the document database.
#[derive(Debug, Clone)]
pub struct NotionCredentials {
    pub token: String,
    pub database_id: String,
}

/// Loads the YAML config file and applies the optional media overrides
/// from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SyncConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref)
        .inspect_err(|e| error!(error = ?e, config_path = ?path_ref, "Failed to read config file"))
        .with_context(|| format!("Failed to read config file {path_ref:?}"))?;

    let mut config: SyncConfig = if config_content.trim().is_empty() {
        SyncConfig::default()
    } else {
        serde_yaml::from_str(&config_content)
            .inspect_err(|e| error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML"))
            .context("Failed to parse config YAML")?
    };
    info!(config_path = ?path_ref, "Parsed config YAML successfully");

    if let Some(base_url) = optional_env(IMG_BASEURL) {
        config.media.public_base_url = base_url;
    }
    if let Some(folder) = optional_env(IMG_UPLOAD_FOLDER) {
        config.media.upload_folder = folder;
    }

    config.trace_loaded();
    Ok(config)
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required_env(name: &str) -> Result<String> {
    optional_env(name).ok_or_else(|| {
        error!(variable = name, "Required environment variable is missing");
        anyhow!("{name} missing in environment")
    })
}

pub fn notion_credentials_from_env() -> Result<NotionCredentials> {
    let credentials = NotionCredentials {
        token: required_env(NOTION_TOKEN)?,
        database_id: required_env(NOTION_DATABASE_ID)?,
    };
    info!(database_id = %credentials.database_id, "Loaded Notion credentials from environment");
    Ok(credentials)
}

pub fn image_host_from_env() -> Result<ImageHostSettings> {
    let settings = ImageHostSettings {
        upload_url: required_env(IMG_UPLOAD_URL)?,
        delete_url: required_env(IMG_DELETE_URL)?,
        auth_code: required_env(IMG_UPLOAD_AUTHCODE)?,
    };
    info!(upload_url = %settings.upload_url, "Loaded image host settings from environment");
    Ok(settings)
}
