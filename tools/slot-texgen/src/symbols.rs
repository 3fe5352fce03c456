//! Symbol image discovery and loading
//!
//! Symbol images are named after their index: `0.png`, `7.jpg`, ...

use anyhow::{bail, Context, Result};
use image::RgbaImage;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Decoded symbols by index
pub type SymbolSet = BTreeMap<u32, RgbaImage>;

/// Symbol index encoded in a file name (text before the first `.`)
pub fn symbol_index(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    let stem = name.split('.').next()?;
    stem.parse().ok()
}

/// List symbol image files in `dir`, sorted by index
pub fn find_symbols(dir: &Path) -> Result<BTreeMap<u32, PathBuf>> {
    let mut found = BTreeMap::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("Failed to read symbols directory: {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden {
            tracing::debug!("Skipping hidden file {}", path.display());
            continue;
        }

        let Some(index) = symbol_index(&path) else {
            bail!(
                "Symbol file name must start with its index (e.g. 3.png): {}",
                path.display()
            );
        };
        if let Some(previous) = found.insert(index, path.clone()) {
            bail!(
                "Duplicate symbol index {}: {} and {}",
                index,
                previous.display(),
                path.display()
            );
        }
    }

    Ok(found)
}

/// Load and decode every symbol image in `dir` (parallel)
pub fn load_symbols(dir: &Path) -> Result<SymbolSet> {
    use rayon::prelude::*;

    let files = find_symbols(dir)?;

    let symbols: Result<SymbolSet> = files
        .par_iter()
        .map(|(&index, path)| {
            let img = image::open(path)
                .with_context(|| format!("Failed to load symbol: {}", path.display()))?;
            Ok((index, img.to_rgba8()))
        })
        .collect();
    let symbols = symbols?;

    tracing::info!("Loaded {} symbols from {}", symbols.len(), dir.display());
    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::tempdir;

    fn write_png(path: &Path, w: u32, h: u32) {
        RgbaImage::from_pixel(w, h, Rgba([1, 2, 3, 255]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_symbol_index() {
        assert_eq!(symbol_index(Path::new("symbols/3.png")), Some(3));
        assert_eq!(symbol_index(Path::new("12.prize.png")), Some(12));
        assert_eq!(symbol_index(Path::new("cherry.png")), None);
    }

    #[test]
    fn test_load_symbols() {
        let dir = tempdir().unwrap();
        write_png(&dir.path().join("0.png"), 10, 20);
        write_png(&dir.path().join("5.png"), 8, 8);
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join(".hidden"), b"x").unwrap();

        let symbols = load_symbols(dir.path()).unwrap();
        assert_eq!(symbols.keys().copied().collect::<Vec<_>>(), vec![0, 5]);
        assert_eq!(symbols[&0].dimensions(), (10, 20));
    }

    #[test]
    fn test_non_numeric_name_rejected() {
        let dir = tempdir().unwrap();
        write_png(&dir.path().join("cherry.png"), 4, 4);
        let err = find_symbols(dir.path()).unwrap_err();
        assert!(err.to_string().contains("cherry.png"));
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let dir = tempdir().unwrap();
        write_png(&dir.path().join("1.png"), 4, 4);
        write_png(&dir.path().join("1.bmp.png"), 4, 4);
        assert!(find_symbols(dir.path()).is_err());
    }
}
