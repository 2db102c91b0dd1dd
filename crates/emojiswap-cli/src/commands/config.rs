//! # Config Command
//!
//! Show the effective configuration or write a default config file.

use crate::cli::ConfigAction;
use crate::render::{self, Style};
use colored::Colorize;
use emojiswap_core::AppConfig;
use std::path::Path;

/// Run the config command
pub fn run(action: ConfigAction, explicit: Option<&Path>, config: &AppConfig) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", "Current Configuration".bright_cyan().bold());
            match config.loaded_from() {
                Some(path) => println!("{}", format!("# from {}", path.display()).dimmed()),
                None => println!("{}", "# built-in defaults".dimmed()),
            }
            println!();
            print!("{}", toml::to_string_pretty(config)?);
        }

        ConfigAction::Init { force } => {
            let path = explicit
                .map(Path::to_path_buf)
                .or_else(AppConfig::global_config_path)
                .ok_or_else(|| anyhow::anyhow!("No config directory available; pass --config"))?;

            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }

            AppConfig::default().save_to_file(&path)?;
            render::print_styled(&format!("Wrote {}", path.display()), Style::Success);
        }
    }

    Ok(())
}
