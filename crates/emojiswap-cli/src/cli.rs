//! # CLI Arguments
//!
//! Command-line argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use emojiswap_core::GalleryFilter;
use std::path::PathBuf;

/// emojiswap - replace faces in a photo with emoji
#[derive(Parser, Debug)]
#[command(name = "emojiswap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to the global config)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Service base URL (overrides config)
    #[arg(long, global = true, env = "EMOJISWAP_BASE_URL")]
    pub base_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect faces in a photo
    Detect {
        /// Photo to analyze
        photo: PathBuf,
    },

    /// Swap the faces in a photo for emoji
    Swap {
        /// Photo to process
        photo: PathBuf,

        /// Emoji style id (see `emojiswap styles`)
        #[arg(short, long)]
        style: Option<u32>,

        /// Blend intensity (0-100)
        #[arg(long)]
        blend: Option<u32>,

        /// Expression match (0-100)
        #[arg(long)]
        expression: Option<u32>,

        /// Color adjustment (0-100)
        #[arg(long)]
        color: Option<u32>,

        /// Save the result to the gallery under this title
        #[arg(long, value_name = "TITLE")]
        save: Option<String>,
    },

    /// List the available emoji styles
    Styles,

    /// Browse saved swaps
    Gallery {
        #[command(subcommand)]
        action: GalleryAction,
    },

    /// View or create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum GalleryAction {
    /// List saved swaps
    List {
        #[arg(short, long, value_enum, default_value_t = FilterArg::All)]
        filter: FilterArg,

        /// Only titles containing this text (ignores --filter)
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Toggle the favorite mark
    Favorite {
        /// Entry id or unique prefix
        id: String,
    },
    /// Delete a saved swap
    Remove {
        /// Entry id or unique prefix
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum FilterArg {
    #[default]
    All,
    Favorites,
    Recent,
}

impl From<FilterArg> for GalleryFilter {
    fn from(filter: FilterArg) -> Self {
        match filter {
            FilterArg::All => GalleryFilter::All,
            FilterArg::Favorites => GalleryFilter::Favorites,
            FilterArg::Recent => GalleryFilter::Recent,
        }
    }
}
