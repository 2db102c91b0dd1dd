//! # Styles Command
//!
//! List the emoji styles the service can apply.

use crate::render;
use colored::Colorize;
use emojiswap_client::EmojiConfig;
use emojiswap_core::StyleCatalog;

/// Run the styles command
pub fn run() {
    let catalog = StyleCatalog::builtin();
    let default_id = EmojiConfig::default().style_id;

    println!("{}", "Emoji Styles".bright_cyan().bold());
    println!();

    let rows: Vec<Vec<String>> = catalog
        .iter()
        .map(|style| {
            vec![
                style.id.to_string(),
                style.emoji.to_string(),
                style.name.to_string(),
                if style.id == default_id { "default".to_string() } else { String::new() },
            ]
        })
        .collect();
    render::print_table(&["ID", "Emoji", "Name", ""], &rows);

    println!();
    println!(
        "Use {} to pick one",
        "emojiswap swap <photo> --style <id>".bright_green()
    );
}
