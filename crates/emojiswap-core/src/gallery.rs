//! # Gallery
//!
//! Saved swaps. Each committed result is copied into the gallery directory and
//! recorded in `index.json` next to it.

use crate::session::ProcessedArtifact;
use crate::{CoreError, Result};
use chrono::{DateTime, Duration, Utc};
use emojiswap_client::EmojiConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

const INDEX_FILE: &str = "index.json";

/// How far back the `Recent` filter looks
pub const RECENT_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub id: Uuid,
    pub title: String,
    /// Image file name, relative to the gallery directory
    pub file: String,
    pub style_id: u32,
    pub config: EmojiConfig,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub favorite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GalleryFilter {
    #[default]
    All,
    Favorites,
    Recent,
}

impl FromStr for GalleryFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all" => Ok(GalleryFilter::All),
            "favorites" | "favourites" | "fav" => Ok(GalleryFilter::Favorites),
            "recent" => Ok(GalleryFilter::Recent),
            other => Err(CoreError::InvalidParameter(format!(
                "unknown gallery filter '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for GalleryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GalleryFilter::All => write!(f, "all"),
            GalleryFilter::Favorites => write!(f, "favorites"),
            GalleryFilter::Recent => write!(f, "recent"),
        }
    }
}

#[derive(Debug)]
pub struct Gallery {
    dir: PathBuf,
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    /// `<platform data dir>/emojiswap/gallery`
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("emojiswap")
            .join("gallery")
    }

    /// Open the gallery in `dir`, creating it if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CoreError::Storage(format!("{}: {}", dir.display(), e)))?;

        let index = dir.join(INDEX_FILE);
        let entries = match tokio::fs::read_to_string(&index).await {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let gallery = Self { dir, entries };
        debug!("Opened gallery at {:?} with {} entries", gallery.dir, gallery.len());
        Ok(gallery)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&GalleryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Absolute path of an entry's image
    pub fn image_path(&self, entry: &GalleryEntry) -> PathBuf {
        self.dir.join(&entry.file)
    }

    /// Find the entry whose id is `id` or starts with it
    pub fn resolve(&self, id: &str) -> Result<Uuid> {
        if let Ok(uuid) = Uuid::parse_str(id) {
            return Ok(uuid);
        }

        let needle = id.to_lowercase();
        let mut matches = self
            .entries
            .iter()
            .filter(|e| e.id.to_string().starts_with(&needle));
        match (matches.next(), matches.next()) {
            (Some(entry), None) => Ok(entry.id),
            (Some(_), Some(_)) => Err(CoreError::InvalidParameter(format!(
                "gallery id '{}' is ambiguous",
                id
            ))),
            _ => Err(CoreError::NotFound(format!("gallery entry {}", id))),
        }
    }

    /// Copy the artifact's bytes into the gallery and record it
    pub async fn commit(&mut self, artifact: &ProcessedArtifact, title: &str) -> Result<GalleryEntry> {
        let id = Uuid::new_v4();
        let file = format!("{}.jpg", id);
        let path = self.dir.join(&file);
        tokio::fs::write(&path, &artifact.bytes)
            .await
            .map_err(|e| CoreError::Storage(format!("{}: {}", path.display(), e)))?;

        let entry = GalleryEntry {
            id,
            title: title.trim().to_string(),
            file,
            style_id: artifact.config.style_id,
            config: artifact.config,
            created_at: Utc::now(),
            favorite: false,
        };
        let mut entries = self.entries.clone();
        entries.push(entry.clone());
        if let Err(err) = self.save_index(&entries).await {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!("Failed to delete {:?}: {}", path, e);
            }
            return Err(err);
        }
        self.entries = entries;

        info!("Saved '{}' to gallery as {}", entry.title, entry.id);
        Ok(entry)
    }

    /// Entries newest first.
    ///
    /// A non-empty `search` matches titles case-insensitively and replaces the
    /// filter.
    pub fn list(&self, filter: GalleryFilter, search: Option<&str>) -> Vec<&GalleryEntry> {
        self.list_at(filter, search, Utc::now())
    }

    fn list_at(
        &self,
        filter: GalleryFilter,
        search: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<&GalleryEntry> {
        let search = search.map(str::trim).filter(|s| !s.is_empty()).map(str::to_lowercase);
        let cutoff = now - Duration::days(RECENT_DAYS);

        let mut entries: Vec<&GalleryEntry> = self
            .entries
            .iter()
            .filter(|e| match &search {
                Some(needle) => e.title.to_lowercase().contains(needle),
                None => match filter {
                    GalleryFilter::All => true,
                    GalleryFilter::Favorites => e.favorite,
                    GalleryFilter::Recent => e.created_at >= cutoff,
                },
            })
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }

    /// Flip the favorite flag, returning the new value
    pub async fn toggle_favorite(&mut self, id: Uuid) -> Result<bool> {
        let mut entries = self.entries.clone();
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("gallery entry {}", id)))?;
        entry.favorite = !entry.favorite;
        let favorite = entry.favorite;

        self.save_index(&entries).await?;
        self.entries = entries;
        Ok(favorite)
    }

    /// Delete an entry and its image
    pub async fn remove(&mut self, id: Uuid) -> Result<GalleryEntry> {
        let position = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("gallery entry {}", id)))?;
        let mut entries = self.entries.clone();
        let entry = entries.remove(position);
        self.save_index(&entries).await?;
        self.entries = entries;

        let path = self.image_path(&entry);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to delete {:?}: {}", path, e);
            }
        }

        info!("Removed gallery entry {}", id);
        Ok(entry)
    }

    /// Write `entries` as the index; callers adopt them only on success
    async fn save_index(&self, entries: &[GalleryEntry]) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        let index = self.dir.join(INDEX_FILE);
        let partial = self.dir.join(format!(".{}.part", INDEX_FILE));

        tokio::fs::write(&partial, json)
            .await
            .map_err(|e| CoreError::Storage(format!("{}: {}", partial.display(), e)))?;
        tokio::fs::rename(&partial, &index)
            .await
            .map_err(|e| CoreError::Storage(format!("{}: {}", index.display(), e)))?;
        Ok(())
    }
}
