//! Bet and prize label configuration (text.json)

use anyhow::{Context, Result};
use image::Rgba;
use serde::Deserialize;
use std::path::Path;

/// RGBA colour, written in JSON as `[r, g, b]` or `[r, g, b, a]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<u8>")]
pub struct Color(pub [u8; 4]);

impl TryFrom<Vec<u8>> for Color {
    type Error = String;

    fn try_from(channels: Vec<u8>) -> Result<Self, Self::Error> {
        match channels.as_slice() {
            &[r, g, b] => Ok(Color([r, g, b, 255])),
            &[r, g, b, a] => Ok(Color([r, g, b, a])),
            other => Err(format!(
                "colour needs 3 or 4 channels, got {}",
                other.len()
            )),
        }
    }
}

impl From<Color> for Rgba<u8> {
    fn from(color: Color) -> Self {
        Rgba(color.0)
    }
}

/// Text drawn on a texture with a drop shadow
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Label {
    pub text: String,
    pub color: Color,
    pub shadow: Color,
}

/// Contents of text.json
///
/// `prizes[i]` labels symbol `i`.
#[derive(Debug, Clone, Deserialize)]
pub struct TextData {
    pub bet: Label,
    pub prizes: Vec<Label>,
}

impl TextData {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse text JSON")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read text config: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid text config: {}", path.display()))
    }
}
