/// # notion-sync CLI Interface (Module)
///
/// Command parsing and dispatch for the `notion-sync` binary. All pipeline
/// logic lives in [`notion_sync_core`]; this module only loads configuration,
/// builds the HTTP clients and reports outcomes.
///
/// - For command-line users: run the installed `notion-sync` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
use crate::load_config::{image_host_from_env, load_config, notion_credentials_from_env};
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use notion_sync_core::image_host::ImageHostClient;
use notion_sync_core::notion::NotionClient;
use notion_sync_core::retry::RetryingClient;
use notion_sync_core::synchronise::{
    clean_media_cache, health_check, media_cache_stats, purge_document_media, synchronise,
};
use notion_sync_core::SyncConfig;
use std::path::PathBuf;
use std::time::Duration;

/// CLI for notion-sync: publish a Notion database as a VitePress site.
#[derive(Parser)]
#[clap(
    name = "notion-sync",
    version,
    about = "Synchronise a Notion document database into VitePress Markdown, navigation and site config"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one full synchronisation
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Synchronise now and then on a fixed interval
    Watch {
        #[clap(long)]
        config: PathBuf,
        /// Minutes between runs
        #[clap(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
        interval_minutes: u64,
    },
    /// Check that the document database is reachable
    Health {
        #[clap(long)]
        config: PathBuf,
    },
    /// Inspect or clean the local media cache
    Cache {
        #[clap(subcommand)]
        action: CacheAction,
    },
    /// Delete every uploaded image of one document from the image host
    PurgeMedia {
        #[clap(long)]
        config: PathBuf,
        /// Document id whose media folder is removed
        #[clap(long)]
        document: String,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Print entry count and total size
    Stats {
        #[clap(long)]
        config: PathBuf,
    },
    /// Remove entries older than the retention window
    Clean {
        #[clap(long)]
        config: PathBuf,
    },
}

fn notion_client() -> Result<NotionClient> {
    let credentials = notion_credentials_from_env()?;
    Ok(NotionClient::new(&credentials.token, &credentials.database_id)?)
}

fn image_host_client() -> Result<ImageHostClient> {
    Ok(ImageHostClient::new(image_host_from_env()?)?)
}

async fn sync_once(config: &SyncConfig, store: &NotionClient, host: &ImageHostClient) -> Result<()> {
    let report = synchronise(config, store, host).await.inspect_err(|e| {
        tracing::error!(command = "sync", error = %e, "Synchronisation failed");
    })?;
    for failed in &report.failed {
        tracing::warn!(document_id = %failed.id, title = %failed.title, error = %failed.error, "Document skipped");
    }
    tracing::info!(
        command = "sync",
        written = report.documents.len(),
        failed = report.failed.len(),
        "Synchronisation complete"
    );
    Ok(())
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "sync", "Starting synchronisation process");
            let store = notion_client()?;
            let host = image_host_client()?;
            sync_once(&config, &store, &host).await
        }
        Commands::Watch {
            config,
            interval_minutes,
        } => {
            let config = load_config(config)?;
            let store = notion_client()?;
            let host = image_host_client()?;
            tracing::info!(command = "watch", interval_minutes, "Starting watcher");

            let mut ticker = tokio::time::interval(Duration::from_secs(interval_minutes * 60));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tracing::info!(command = "watch", "Scheduled synchronisation starting");
                if let Err(e) = sync_once(&config, &store, &host).await {
                    tracing::error!(command = "watch", error = %e, "Scheduled run failed, waiting for next tick");
                }
            }
        }
        Commands::Health { config } => {
            let config = load_config(config)?;
            let store = notion_client()?;
            let info = health_check(&store, &RetryingClient::new(config.retry.clone()))
                .await
                .map_err(|e| anyhow!("Content store unreachable: {e}"))?;
            println!(
                "ok: database {} ({})",
                info.id,
                info.title.as_deref().unwrap_or("untitled")
            );
            Ok(())
        }
        Commands::Cache { action } => match action {
            CacheAction::Stats { config } => {
                let config = load_config(config)?;
                let stats = media_cache_stats(&config.media);
                println!(
                    "cache dir: {}\nentries: {}\nsize: {}",
                    config.media.cache_dir.display(),
                    stats.count,
                    stats.size_formatted
                );
                Ok(())
            }
            CacheAction::Clean { config } => {
                let config = load_config(config)?;
                let removed = clean_media_cache(&config.media)?;
                println!("removed {removed} expired cache entries");
                Ok(())
            }
        },
        Commands::PurgeMedia { config, document } => {
            let config = load_config(config)?;
            let host = image_host_client()?;
            purge_document_media(
                &host,
                &RetryingClient::new(config.retry.clone()),
                &config.media,
                &document,
            )
            .await?;
            println!("purged media folder {}/{}", config.media.upload_folder, document);
            Ok(())
        }
    }
}
