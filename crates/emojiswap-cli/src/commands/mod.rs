//! # CLI Commands
//!
//! Subcommand implementations for the emojiswap CLI.

pub mod config;
pub mod detect;
pub mod gallery;
pub mod styles;
pub mod swap;

use crate::cli::Cli;
use emojiswap_client::PhotoHandle;
use emojiswap_core::{AppConfig, FilePicker, PhotoPicker, ProcessingSession, SessionOptions};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Effective configuration: file, environment, then command-line flags
pub fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load_with(cli.config.as_deref())?;
    if let Some(url) = &cli.base_url {
        config.api.base_url = url.clone();
        config.validate()?;
    }
    Ok(config)
}

pub async fn pick_photo(path: &Path) -> anyhow::Result<PhotoHandle> {
    FilePicker::new(path)
        .pick()
        .await?
        .ok_or_else(|| anyhow::anyhow!("No photo selected"))
}

pub fn new_session(config: &AppConfig, options: SessionOptions) -> ProcessingSession {
    debug!("Using service at {}", config.api.base_url);
    ProcessingSession::new(Arc::new(config.http_client()), config.result_cache(), options)
}

/// Cancel the session's requests on Ctrl-C instead of killing the process,
/// so the failure is reported like any other
pub fn cancel_on_ctrl_c(session: &ProcessingSession) -> JoinHandle<()> {
    let session = session.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            session.cancel_in_flight();
        }
    })
}
