//! # emojiswap CLI
//!
//! Terminal front end for the emoji face swap service.

mod cli;
mod commands;
mod render;

use clap::Parser;
use emojiswap_core::AppConfig;
use tracing_subscriber::{fmt, EnvFilter};

use cli::{Cli, Commands, ConfigAction};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Enable ANSI colors on Windows
    #[cfg(windows)]
    let _ = colored::control::set_virtual_terminal(true);

    let cli = Cli::parse();
    // `config init` must work before any config file exists
    let config = match &cli.command {
        Commands::Config {
            action: ConfigAction::Init { .. },
        } => AppConfig::default(),
        _ => commands::load_config(&cli)?,
    };

    // RUST_LOG wins, then --verbose, then the config file, then warn
    let default_filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.filter.clone().unwrap_or_else(|| "warn".to_string())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        Commands::Detect { ref photo } => {
            commands::detect::run(photo, &config).await?;
        }
        Commands::Swap {
            ref photo,
            style,
            blend,
            expression,
            color,
            ref save,
        } => {
            let args = commands::swap::SwapArgs {
                style,
                blend,
                expression,
                color,
                save: save.clone(),
            };
            commands::swap::run(photo, args, &config).await?;
        }
        Commands::Styles => {
            commands::styles::run();
        }
        Commands::Gallery { action } => {
            commands::gallery::run(action, &config).await?;
        }
        Commands::Config { action } => {
            commands::config::run(action, cli.config.as_deref(), &config)?;
        }
    }

    Ok(())
}
