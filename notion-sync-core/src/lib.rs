#![doc = "notion-sync-core: pipeline library for notion-sync."]

//! Publishes a Notion document database as a static documentation site.
//!
//! A run lists the publishable documents, walks each document's block tree,
//! renders it to Markdown (relocating embedded images onto a controlled image
//! host) and writes the result next to regenerated navigation artifacts.
//!
//! # Usage
//! The CLI crate wires [`notion::NotionClient`] and [`image_host::ImageHostClient`]
//! into [`synchronise::synchronise`]; tests drive the same entrypoint with the
//! mocks generated from [`contract`].

pub mod config;
pub mod contract;
pub mod error;
pub mod fetch;
pub mod image_host;
pub mod media;
pub mod model;
pub mod navigation;
pub mod notion;
pub mod render;
pub mod retry;
pub mod site;
pub mod synchronise;

// Re-exports for consumers
pub use config::SyncConfig;
pub use error::{RemoteError, SyncError};
pub use synchronise::{synchronise, SynchroniseReport};
