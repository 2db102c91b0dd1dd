//! Emoji style templates the service knows how to composite.

use crate::{CoreError, Result};
use serde::Serialize;

/// One selectable emoji style
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmojiStyle {
    pub id: u32,
    pub name: &'static str,
    pub emoji: &'static str,
}

const BUILTIN_STYLES: [(u32, &str, &str); 8] = [
    (1, "Smiley", "😊"),
    (2, "Cool", "😎"),
    (3, "Heart Eyes", "😍"),
    (4, "Tongue Out", "😛"),
    (5, "Sunglasses", "🕶️"),
    (6, "Star Eyes", "🤩"),
    (7, "Silly", "🤪"),
    (8, "Blush", "☺️"),
];

#[derive(Debug, Clone)]
pub struct StyleCatalog {
    styles: Vec<EmojiStyle>,
}

impl Default for StyleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl StyleCatalog {
    /// The styles shipped with the app
    pub fn builtin() -> Self {
        Self {
            styles: BUILTIN_STYLES
                .iter()
                .map(|&(id, name, emoji)| EmojiStyle { id, name, emoji })
                .collect(),
        }
    }

    pub fn get(&self, id: u32) -> Option<&EmojiStyle> {
        self.styles.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    /// Like [`get`](Self::get) but unknown ids are an error
    pub fn require(&self, id: u32) -> Result<&EmojiStyle> {
        self.get(id).ok_or(CoreError::UnknownStyle(id))
    }

    pub fn default_style(&self) -> Option<&EmojiStyle> {
        self.styles.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmojiStyle> {
        self.styles.iter()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}
