//! # Wire Types
//!
//! Request and response payloads shared with the face swap service.

use crate::{ClientError, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Upper bound for every slider value
pub const MAX_LEVEL: u8 = 100;

pub const DEFAULT_STYLE_ID: u32 = 1;
pub const DEFAULT_BLEND_INTENSITY: u8 = 75;
pub const DEFAULT_EXPRESSION_MATCH: u8 = 60;
pub const DEFAULT_COLOR_ADJUSTMENT: u8 = 50;

/// User-tunable compositing parameters.
///
/// Sent as the JSON string of the `emoji_config` form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmojiConfig {
    /// Emoji style template
    pub style_id: u32,
    /// How strongly the emoji replaces the face (0-100)
    pub blend_intensity: u8,
    /// How closely the emoji follows the detected expression (0-100)
    pub expression_match: u8,
    /// Skin tone / color correction strength (0-100)
    pub color_adjustment: u8,
}

impl Default for EmojiConfig {
    fn default() -> Self {
        Self {
            style_id: DEFAULT_STYLE_ID,
            blend_intensity: DEFAULT_BLEND_INTENSITY,
            expression_match: DEFAULT_EXPRESSION_MATCH,
            color_adjustment: DEFAULT_COLOR_ADJUSTMENT,
        }
    }
}

impl EmojiConfig {
    /// Same style, default slider values
    pub fn with_default_levels(self) -> Self {
        Self {
            style_id: self.style_id,
            ..Self::default()
        }
    }

    /// Check every slider is within `0..=100`
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("blendIntensity", self.blend_intensity),
            ("expressionMatch", self.expression_match),
            ("colorAdjustment", self.color_adjustment),
        ] {
            if value > MAX_LEVEL {
                return Err(ClientError::InvalidConfig(format!(
                    "{} must be between 0 and {}, got {}",
                    name, MAX_LEVEL, value
                )));
            }
        }
        Ok(())
    }

    /// Encode as the `emoji_config` form value
    pub fn to_wire(&self) -> Result<String> {
        self.validate()?;
        Ok(serde_json::to_string(self)?)
    }

    /// Decode an `emoji_config` form value
    pub fn from_wire(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }
}

/// One detected face.
///
/// The service reports geometry loosely; anything beyond the common fields is
/// kept in `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Answer of the detect endpoint. Missing or `null` faces mean none were found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub faces: Vec<FaceRegion>,
}

impl DetectionResult {
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn has_faces(&self) -> bool {
        !self.faces.is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<FaceRegion>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<FaceRegion>>::deserialize(deserializer)?.unwrap_or_default())
}
