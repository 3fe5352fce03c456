//! Reel pattern loading and validation
//!
//! The pattern assigns a symbol index to each of the 8 rows of the 3 reels.
//! Reel meshes may enumerate more rows than that, so row lookups wrap.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::path::Path;

/// Number of reels on the machine
pub const REELS: usize = 3;

/// Symbol slots stored per reel
pub const ROWS_PER_REEL: usize = 8;

/// Validation error for pattern, symbols and labels
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    /// Pattern is not 3 reels of 8 rows
    #[error(
        "invalid pattern dimension: got {} reels with row counts [{}], should be 3x8",
        .rows.len(),
        join(.rows)
    )]
    Shape { rows: Vec<usize> },

    /// Symbols referenced by the pattern that were not loaded
    #[error("missing symbol images (required in pattern cfg): {}", join(.0))]
    MissingSymbols(BTreeSet<u32>),

    /// Loaded symbols without a prize label
    #[error("missing symbol indices in text cfg: {}", join(.0))]
    MissingLabels(BTreeSet<u32>),
}

fn join<T: Display>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fixed-shape reel pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    reels: [[u32; ROWS_PER_REEL]; REELS],
}

impl Pattern {
    pub fn new(reels: [[u32; ROWS_PER_REEL]; REELS]) -> Self {
        Self { reels }
    }

    /// Parse a pattern from JSON text (`[[..], [..], [..]]`)
    pub fn from_json(content: &str) -> Result<Self> {
        let raw: Vec<Vec<u32>> =
            serde_json::from_str(content).context("Failed to parse pattern JSON")?;
        Ok(Self::try_from(raw)?)
    }

    /// Load a pattern JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pattern: {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid pattern: {}", path.display()))
    }

    /// Symbol at a reel position, wrapping rows past the stored 8
    ///
    /// Returns `None` if `reel` is not one of the machine's reels.
    pub fn symbol_at(&self, reel: usize, row: usize) -> Option<u32> {
        self.reels
            .get(reel)
            .map(|slots| slots[row % ROWS_PER_REEL])
    }

    /// Every symbol index the pattern references
    pub fn indices(&self) -> BTreeSet<u32> {
        self.reels.iter().flatten().copied().collect()
    }

    pub fn reels(&self) -> &[[u32; ROWS_PER_REEL]; REELS] {
        &self.reels
    }
}

impl TryFrom<Vec<Vec<u32>>> for Pattern {
    type Error = PatternError;

    fn try_from(raw: Vec<Vec<u32>>) -> Result<Self, Self::Error> {
        let shape_error = || PatternError::Shape {
            rows: raw.iter().map(Vec::len).collect(),
        };

        if raw.len() != REELS {
            return Err(shape_error());
        }

        let mut reels = [[0u32; ROWS_PER_REEL]; REELS];
        for (dst, src) in reels.iter_mut().zip(&raw) {
            *dst = src.as_slice().try_into().map_err(|_| shape_error())?;
        }
        Ok(Self { reels })
    }
}

/// Check that symbols and labels cover the pattern
///
/// Every pattern index must have a loaded image and every loaded image must
/// have a label (labels are indexed `0..label_count`). Each failure carries
/// the full set of offending indices.
pub fn validate(
    pattern: &Pattern,
    loaded: &BTreeSet<u32>,
    label_count: usize,
) -> Result<(), PatternError> {
    check_symbols(pattern, loaded)?;
    check_labels(loaded, label_count)
}

/// Every pattern index must have a loaded image
pub fn check_symbols(pattern: &Pattern, loaded: &BTreeSet<u32>) -> Result<(), PatternError> {
    let missing: BTreeSet<u32> = pattern.indices().difference(loaded).copied().collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PatternError::MissingSymbols(missing))
    }
}

/// Every loaded image must have a label
pub fn check_labels(loaded: &BTreeSet<u32>, label_count: usize) -> Result<(), PatternError> {
    let missing: BTreeSet<u32> = loaded
        .iter()
        .copied()
        .filter(|&idx| idx as usize >= label_count)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PatternError::MissingLabels(missing))
    }
}

/// Shape check followed by [`validate`]
pub fn validate_raw(
    raw: Vec<Vec<u32>>,
    loaded: &BTreeSet<u32>,
    label_count: usize,
) -> Result<Pattern, PatternError> {
    let pattern = Pattern::try_from(raw)?;
    validate(&pattern, loaded, label_count)?;
    Ok(pattern)
}
