//! # Gallery Command
//!
//! Browse, favorite and delete saved swaps.

use crate::cli::GalleryAction;
use crate::render::{self, Style};
use colored::Colorize;
use emojiswap_core::{AppConfig, Gallery, StyleCatalog};

/// Run the gallery command
pub async fn run(action: GalleryAction, config: &AppConfig) -> anyhow::Result<()> {
    let mut gallery = Gallery::open(&config.storage.gallery_dir).await?;

    match action {
        GalleryAction::List { filter, search } => {
            let entries = gallery.list(filter.into(), search.as_deref());
            if entries.is_empty() {
                println!("{}", "No saved swaps.".yellow());
                println!(
                    "Use {} to save one",
                    "emojiswap swap <photo> --save <title>".bright_green()
                );
                return Ok(());
            }

            let catalog = StyleCatalog::builtin();
            let rows: Vec<Vec<String>> = entries
                .iter()
                .map(|entry| {
                    vec![
                        entry.id.to_string()[..8].to_string(),
                        entry.title.clone(),
                        catalog
                            .get(entry.style_id)
                            .map_or_else(|| entry.style_id.to_string(), |s| s.emoji.to_string()),
                        entry.created_at.format("%Y-%m-%d %H:%M").to_string(),
                        if entry.favorite { "★".to_string() } else { String::new() },
                        gallery.image_path(entry).display().to_string(),
                    ]
                })
                .collect();
            render::print_table(&["ID", "Title", "Style", "Created", "Fav", "File"], &rows);

            println!();
            println!("{} swap(s)", entries.len().to_string().bright_green());
        }

        GalleryAction::Favorite { id } => {
            let id = gallery.resolve(&id)?;
            let favorite = gallery.toggle_favorite(id).await?;
            let message = if favorite { "Marked as favorite" } else { "Removed from favorites" };
            render::print_styled(message, Style::Success);
        }

        GalleryAction::Remove { id } => {
            let id = gallery.resolve(&id)?;
            let entry = gallery.remove(id).await?;
            render::print_styled(&format!("Removed '{}'", entry.title), Style::Success);
        }
    }

    Ok(())
}
