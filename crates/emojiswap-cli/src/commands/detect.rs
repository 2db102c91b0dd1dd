//! # Detect Command
//!
//! Run face detection only and report what was found.

use super::{cancel_on_ctrl_c, new_session, pick_photo};
use crate::render::{self, Spinner, Style};
use colored::Colorize;
use emojiswap_core::{AppConfig, SessionOptions, SessionStatus};
use std::path::Path;

fn coordinate(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.0}", v))
}

/// Run the detect command
pub async fn run(photo: &Path, config: &AppConfig) -> anyhow::Result<()> {
    let handle = pick_photo(photo).await?;
    let session = new_session(config, SessionOptions::default());
    let ctrl_c = cancel_on_ctrl_c(&session);

    let spinner = Spinner::new("Detecting faces...");
    let snapshot = session.submit(handle).await;
    spinner.finish();
    ctrl_c.abort();

    if snapshot.status != SessionStatus::AwaitingConfig {
        if let Some(error) = snapshot.error {
            render::print_styled(&error.message, Style::Error);
            println!("  {}", render::recovery_hint(&error).dimmed());
            anyhow::bail!("detection failed: {}", error.kind);
        }
        anyhow::bail!("detection ended in state {}", snapshot.status);
    }

    render::print_styled(
        &format!("{} face(s) detected", snapshot.face_count()),
        Style::Success,
    );
    println!();

    let faces = snapshot.detection.map(|d| d.faces).unwrap_or_default();
    let rows: Vec<Vec<String>> = faces
        .iter()
        .enumerate()
        .map(|(i, face)| {
            vec![
                (i + 1).to_string(),
                coordinate(face.x),
                coordinate(face.y),
                coordinate(face.width),
                coordinate(face.height),
                face.confidence
                    .map_or_else(|| "-".to_string(), |c| format!("{:.2}", c)),
            ]
        })
        .collect();
    render::print_table(&["#", "X", "Y", "Width", "Height", "Confidence"], &rows);

    Ok(())
}
