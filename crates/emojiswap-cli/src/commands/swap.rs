//! # Swap Command
//!
//! Full pipeline: detect, process with the requested style and sliders, write
//! the result locally and optionally save it to the gallery.

use super::{cancel_on_ctrl_c, new_session, pick_photo};
use crate::render::{self, Spinner, Style};
use colored::Colorize;
use emojiswap_client::EmojiConfig;
use emojiswap_core::{
    AppConfig, Gallery, Parameter, SessionOptions, SessionSnapshot, SessionStatus, StyleCatalog,
};
use std::path::Path;

/// Optional overrides of the default config
#[derive(Debug, Default)]
pub struct SwapArgs {
    pub style: Option<u32>,
    pub blend: Option<u32>,
    pub expression: Option<u32>,
    pub color: Option<u32>,
    pub save: Option<String>,
}

impl SwapArgs {
    fn emoji_config(&self, catalog: &StyleCatalog) -> anyhow::Result<EmojiConfig> {
        let mut config = EmojiConfig::default();
        if let Some(style) = self.style {
            catalog.require(style)?;
        }

        for (parameter, value) in [
            (Parameter::StyleId, self.style),
            (Parameter::BlendIntensity, self.blend),
            (Parameter::ExpressionMatch, self.expression),
            (Parameter::ColorAdjustment, self.color),
        ] {
            if let Some(value) = value {
                parameter.apply(&mut config, value)?;
            }
        }
        Ok(config)
    }
}

fn report_failure(snapshot: &SessionSnapshot) -> anyhow::Error {
    match &snapshot.error {
        Some(error) => {
            render::print_styled(&error.message, Style::Error);
            println!("  {}", render::recovery_hint(error).dimmed());
            anyhow::anyhow!("swap failed: {}", error.kind)
        }
        None => anyhow::anyhow!("swap ended in state {}", snapshot.status),
    }
}

/// Run the swap command
pub async fn run(photo: &Path, args: SwapArgs, config: &AppConfig) -> anyhow::Result<()> {
    let catalog = StyleCatalog::builtin();
    let emoji_config = args.emoji_config(&catalog)?;

    let handle = pick_photo(photo).await?;
    let session = new_session(config, SessionOptions::default());
    let ctrl_c = cancel_on_ctrl_c(&session);

    let spinner = Spinner::new("Detecting faces...");
    let snapshot = session.submit(handle).await;
    if snapshot.status != SessionStatus::AwaitingConfig {
        spinner.finish();
        ctrl_c.abort();
        return Err(report_failure(&snapshot));
    }

    spinner.update(&format!(
        "Swapping {} face(s)...",
        snapshot.face_count()
    ));
    let snapshot = session.config_changed(emoji_config).await;
    spinner.finish();
    ctrl_c.abort();

    if snapshot.status != SessionStatus::Ready {
        return Err(report_failure(&snapshot));
    }

    let style = catalog
        .get(emoji_config.style_id)
        .map(|s| format!("{} {}", s.emoji, s.name))
        .unwrap_or_else(|| format!("style {}", emoji_config.style_id));
    let location = snapshot
        .latest_artifact
        .as_ref()
        .and_then(|a| a.location.clone());

    match (&location, &snapshot.warning) {
        (Some(location), _) => {
            render::print_styled(&format!("Swapped with {}", style), Style::Success);
            println!("  {}", location.path.display().to_string().bright_green());
        }
        (None, Some(warning)) => {
            render::print_styled(&format!("Result not written: {}", warning.message), Style::Warning);
            println!("  {}", render::recovery_hint(warning).dimmed());
        }
        (None, None) => {}
    }

    if let Some(title) = &args.save {
        let mut gallery = Gallery::open(&config.storage.gallery_dir).await?;
        if let Some(entry) = session.commit_to_gallery(&mut gallery, title).await? {
            render::print_styled(
                &format!("Saved to gallery as {}", entry.id.to_string()[..8].bright_yellow()),
                Style::Success,
            );
        }
    }

    if location.is_none() && args.save.is_none() {
        anyhow::bail!("result could not be saved locally");
    }
    Ok(())
}
