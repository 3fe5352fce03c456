//! slot-texgen library
//!
//! Builds the reel symbol atlas, remaps the reel mesh UVs onto it and draws the
//! prize/bet overlay textures for the slot machine prop.

pub mod atlas;
pub mod config;
pub mod formats;
pub mod labels;
pub mod overlay;
pub mod pattern;
pub mod pipeline;
pub mod smd;
pub mod symbols;

// Re-export the core engine types
pub use atlas::{pack, PackedAtlas, UvRect};
pub use config::{AtlasLayout, OverlayLayout, TexgenConfig};
pub use pattern::{Pattern, PatternError, REELS, ROWS_PER_REEL};
pub use smd::{rewrite, MeshError, MeshLine};
