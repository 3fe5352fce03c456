//! Reel mesh (SMD text) UV rewriting
//!
//! The source reel mesh groups its triangles under `<reel>.<row>` marker
//! lines. Each marker is followed by the three vertex lines of one face, whose
//! last two fields are placeholder UVs. A placeholder only says which corner
//! of the symbol cell the vertex samples: a non-zero magnitude selects the
//! max edge, zero selects the min edge.
//!
//! Markers are rewritten to the atlas texture name and the placeholder UVs are
//! replaced with the resolved symbol's atlas coordinates. Every other line is
//! copied unchanged.

use anyhow::{Context, Result};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;

use crate::atlas::UvRect;
use crate::pattern::{Pattern, ROWS_PER_REEL};

/// Vertex lines following each marker
pub const VERTICES_PER_FACE: usize = 3;

/// Mesh rewrite error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    /// Vertex line inside a face group without two trailing numeric UV fields
    #[error("line {line}: vertex data needs two trailing numeric UV fields: {content:?}")]
    MalformedVertex { line: usize, content: String },

    /// Marker names a reel the pattern does not have
    #[error("line {line}: reel {reel} is out of range (pattern has 3 reels)")]
    ReelOutOfRange { line: usize, reel: i64 },

    /// Pattern symbol that was not packed into the atlas
    #[error("line {line}: symbol {symbol} has no atlas UVs")]
    UnknownSymbol { line: usize, symbol: u32 },
}

/// Structural kind of a mesh line, without surrounding context
#[derive(Debug, Clone, PartialEq)]
pub enum MeshLine<'a> {
    /// `<reel>.<row>` face group marker
    Marker { reel: i64, row: i64 },
    /// Whitespace-separated fields ending in two numeric UVs
    Vertex { fields: Vec<&'a str>, uv: [f64; 2] },
    /// Anything else
    Passthrough,
}

impl<'a> MeshLine<'a> {
    /// Classify a line (without its terminator)
    pub fn classify(line: &'a str) -> Self {
        if let Some((reel, row)) = parse_marker(line) {
            return MeshLine::Marker { reel, row };
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if let [.., u, v] = fields.as_slice() {
            if let (Ok(u), Ok(v)) = (u.parse::<f64>(), v.parse::<f64>()) {
                return MeshLine::Vertex {
                    fields,
                    uv: [u, v],
                };
            }
        }

        MeshLine::Passthrough
    }
}

/// Parse `"<reel>.<row>"` (surrounding whitespace allowed)
fn parse_marker(line: &str) -> Option<(i64, i64)> {
    let (reel, row) = line.split_once('.')?;
    let reel = reel.trim().parse().ok()?;
    let row = row.trim().parse().ok()?;
    Some((reel, row))
}

/// Face group tracking
#[derive(Debug, Clone, Copy, PartialEq)]
enum FaceState {
    /// Between face groups
    Idle,
    /// Inside a face group, `emitted` vertex lines rewritten so far
    InFace { uv: UvRect, emitted: usize },
}

/// Streaming rewriter, one line at a time in file order
pub struct MeshRewriter<'a> {
    pattern: &'a Pattern,
    uvs: &'a BTreeMap<u32, UvRect>,
    texture_name: &'a str,
    state: FaceState,
    line_no: usize,
    faces: usize,
}

impl<'a> MeshRewriter<'a> {
    pub fn new(
        pattern: &'a Pattern,
        uvs: &'a BTreeMap<u32, UvRect>,
        texture_name: &'a str,
    ) -> Self {
        Self {
            pattern,
            uvs,
            texture_name,
            state: FaceState::Idle,
            line_no: 0,
            faces: 0,
        }
    }

    /// Rewrite the next line (without its terminator)
    pub fn rewrite_line<'l>(&mut self, line: &'l str) -> Result<Cow<'l, str>, MeshError> {
        self.line_no += 1;

        match (MeshLine::classify(line), self.state) {
            (MeshLine::Marker { reel, row }, _) => {
                let uv = self.resolve(reel, row)?;
                self.state = FaceState::InFace { uv, emitted: 0 };
                self.faces += 1;
                Ok(Cow::Owned(self.texture_name.to_string()))
            }
            (MeshLine::Vertex { fields, uv: old }, FaceState::InFace { uv, emitted }) => {
                let (u, v) = uv.corner(old[0].abs() > 0.0, old[1].abs() > 0.0);
                let (u, v) = (format!("{:.6}", u), format!("{:.6}", v));
                let keep = fields.len() - 2;
                let rewritten = fields[..keep]
                    .iter()
                    .copied()
                    .chain([u.as_str(), v.as_str()])
                    .collect::<Vec<_>>()
                    .join(" ");

                let emitted = emitted + 1;
                self.state = if emitted < VERTICES_PER_FACE {
                    FaceState::InFace { uv, emitted }
                } else {
                    FaceState::Idle
                };
                Ok(Cow::Owned(rewritten))
            }
            (MeshLine::Passthrough, FaceState::InFace { .. }) => Err(MeshError::MalformedVertex {
                line: self.line_no,
                content: line.to_string(),
            }),
            (_, FaceState::Idle) => Ok(Cow::Borrowed(line)),
        }
    }

    /// Number of face groups seen so far
    pub fn faces(&self) -> usize {
        self.faces
    }

    /// Finish the stream, warning about a trailing incomplete face
    pub fn finish(self) -> usize {
        if let FaceState::InFace { emitted, .. } = self.state {
            tracing::warn!(
                "Mesh ended inside a face group ({} of {} vertices)",
                emitted,
                VERTICES_PER_FACE
            );
        }
        self.faces
    }

    fn resolve(&self, reel: i64, row: i64) -> Result<UvRect, MeshError> {
        let symbol = usize::try_from(reel)
            .ok()
            .and_then(|reel| {
                let row = row.rem_euclid(ROWS_PER_REEL as i64) as usize;
                self.pattern.symbol_at(reel, row)
            })
            .ok_or(MeshError::ReelOutOfRange {
                line: self.line_no,
                reel,
            })?;

        self.uvs
            .get(&symbol)
            .copied()
            .ok_or(MeshError::UnknownSymbol {
                line: self.line_no,
                symbol,
            })
    }
}

/// Rewrite a sequence of lines (without terminators)
pub fn rewrite<'l>(
    lines: impl IntoIterator<Item = &'l str>,
    pattern: &Pattern,
    uvs: &BTreeMap<u32, UvRect>,
    texture_name: &str,
) -> Result<Vec<String>, MeshError> {
    let mut rewriter = MeshRewriter::new(pattern, uvs, texture_name);
    let out = lines
        .into_iter()
        .map(|line| rewriter.rewrite_line(line).map(Cow::into_owned))
        .collect::<Result<Vec<_>, _>>()?;
    rewriter.finish();
    Ok(out)
}

/// Rewrite a whole mesh text, keeping each line's own terminator
pub fn rewrite_text(
    text: &str,
    pattern: &Pattern,
    uvs: &BTreeMap<u32, UvRect>,
    texture_name: &str,
) -> Result<String, MeshError> {
    let mut rewriter = MeshRewriter::new(pattern, uvs, texture_name);
    let mut out = String::with_capacity(text.len());

    for raw in text.split_inclusive('\n') {
        let (line, ending) = split_terminator(raw);
        out.push_str(&rewriter.rewrite_line(line)?);
        out.push_str(ending);
    }

    let faces = rewriter.finish();
    tracing::debug!("Rewrote {} face groups", faces);
    Ok(out)
}

fn split_terminator(raw: &str) -> (&str, &str) {
    if let Some(line) = raw.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = raw.strip_suffix('\n') {
        (line, "\n")
    } else {
        (raw, "")
    }
}

/// Rewrite a mesh file from `input` into `output`
pub fn rewrite_file(
    input: &Path,
    output: &Path,
    pattern: &Pattern,
    uvs: &BTreeMap<u32, UvRect>,
    texture_name: &str,
) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read mesh: {}", input.display()))?;
    let rewritten = rewrite_text(&text, pattern, uvs, texture_name)
        .with_context(|| format!("Failed to rewrite mesh: {}", input.display()))?;
    std::fs::write(output, rewritten)
        .with_context(|| format!("Failed to write mesh: {}", output.display()))?;

    tracing::info!("Rewrote mesh {} -> {}", input.display(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> Pattern {
        Pattern::new([
            [0, 1, 2, 3, 0, 1, 2, 3],
            [3, 2, 1, 0, 3, 2, 1, 0],
            [1, 1, 1, 1, 2, 2, 2, 2],
        ])
    }

    fn uvs() -> BTreeMap<u32, UvRect> {
        (0..4)
            .map(|i| {
                let base = i as f64 * 0.1;
                (i, UvRect::new(base, base + 0.05, base + 0.08, base + 0.09))
            })
            .collect()
    }

    fn run(lines: &[&str]) -> Result<Vec<String>, MeshError> {
        rewrite(lines.iter().copied(), &pattern(), &uvs(), "reel.bmp")
    }

    #[test]
    fn test_classify() {
        assert_eq!(MeshLine::classify("1.9"), MeshLine::Marker { reel: 1, row: 9 });
        assert_eq!(MeshLine::classify(" 2.0 "), MeshLine::Marker { reel: 2, row: 0 });
        assert_eq!(MeshLine::classify("triangles"), MeshLine::Passthrough);
        assert_eq!(MeshLine::classify("1.5.2"), MeshLine::Passthrough);
        assert_eq!(MeshLine::classify("0.25"), MeshLine::Marker { reel: 0, row: 25 });
        assert_eq!(
            MeshLine::classify("1.0 2.0"),
            MeshLine::Vertex {
                fields: vec!["1.0", "2.0"],
                uv: [1.0, 2.0],
            }
        );
        assert_eq!(MeshLine::classify("0 1 2 abc"), MeshLine::Passthrough);
        assert_eq!(MeshLine::classify("5"), MeshLine::Passthrough);
    }

    #[test]
    fn test_uv_selector() {
        let mut uvs = BTreeMap::new();
        uvs.insert(0, UvRect::new(0.1, 0.2, 0.5, 0.45));
        let pattern = Pattern::new([[0; 8]; 3]);
        let lines = [
            "0.0",
            "0 1.0 2.0 3.0 0.0 0.0 1.0 0.000000 0.000000",
            "0 1.0 2.0 3.0 0.0 0.0 1.0 1.000000 0.000000",
            "0 1.0 2.0 3.0 0.0 0.0 1.0 0.000000 1.000000",
        ];
        let out = rewrite(lines, &pattern, &uvs, "reel.bmp").unwrap();
        assert_eq!(out[0], "reel.bmp");
        assert_eq!(out[1], "0 1.0 2.0 3.0 0.0 0.0 1.0 0.100000 0.200000");
        assert_eq!(out[2], "0 1.0 2.0 3.0 0.0 0.0 1.0 0.500000 0.200000");
        assert_eq!(out[3], "0 1.0 2.0 3.0 0.0 0.0 1.0 0.100000 0.450000");
    }

    #[test]
    fn test_negative_placeholder_selects_max() {
        let out = run(&["0.0", "0 0 0 -1.0 -0.5", "0 0 0 -0.0 0", "0 0 0 0 0"]).unwrap();
        // Symbol 0: (0.0, 0.05)-(0.08, 0.09)
        assert_eq!(out[1], "0 0 0 0.080000 0.090000");
        assert_eq!(out[2], "0 0 0 0.000000 0.050000");
    }

    #[test]
    fn test_row_wraparound() {
        let wrapped = run(&["1.9", "v 1 1"]).unwrap();
        let direct = run(&["1.1", "v 1 1"]).unwrap();
        assert_eq!(wrapped[1], direct[1]);
        // Reel 1, row 1 is symbol 2
        assert_eq!(direct[1], "v 0.280000 0.290000");
    }

    #[test]
    fn test_negative_row_wraps() {
        let out = run(&["0.-1", "v 0 0"]).unwrap();
        // Reel 0, row 7 is symbol 3
        assert_eq!(out[1], "v 0.300000 0.350000");
    }

    #[test]
    fn test_passthrough_lines_untouched() {
        let lines = [
            "version 1",
            "nodes",
            "0 \"root\" -1",
            "end",
            "triangles",
            "2.3",
            "0  0.5 0.5   0.5 0 0 1 1 0",
            "0 0.5 0.5 0.5 0 0 1 1 1",
            "0 0.5 0.5 0.5 0 0 1 0 1",
            "0 0.5 0.5 0.5 0 0 1 0 0",
            "end",
        ];
        let out = run(&lines).unwrap();
        assert_eq!(out.len(), lines.len());
        for i in [0, 1, 2, 3, 4, 9, 10] {
            assert_eq!(out[i], lines[i], "line {i} changed");
        }
        assert_eq!(out[5], "reel.bmp");
        // Fields are re-joined with single spaces
        assert_eq!(out[6], "0 0.5 0.5 0.5 0 0 1 0.180000 0.150000");
    }

    #[test]
    fn test_face_group_ends_after_three_vertices() {
        let out = run(&["0.0", "a 0 0", "b 0 0", "c 0 0", "d 0 0"]).unwrap();
        assert_eq!(out[3], "c 0.000000 0.050000");
        assert_eq!(out[4], "d 0 0");
    }

    #[test]
    fn test_malformed_vertex() {
        let err = run(&["nodes", "0.0", "0 0 0 0.5 0.5", "end"]).unwrap_err();
        assert_eq!(
            err,
            MeshError::MalformedVertex {
                line: 4,
                content: "end".to_string()
            }
        );
    }

    #[test]
    fn test_reel_out_of_range() {
        let err = run(&["3.0"]).unwrap_err();
        assert_eq!(err, MeshError::ReelOutOfRange { line: 1, reel: 3 });
        let err = run(&["-1.0"]).unwrap_err();
        assert_eq!(err, MeshError::ReelOutOfRange { line: 1, reel: -1 });
    }

    #[test]
    fn test_unknown_symbol() {
        let mut uvs = uvs();
        uvs.remove(&2);
        let err = rewrite(["1.1"], &pattern(), &uvs, "reel.bmp").unwrap_err();
        assert_eq!(err, MeshError::UnknownSymbol { line: 1, symbol: 2 });
    }

    #[test]
    fn test_marker_inside_face_starts_new_group() {
        let out = run(&["0.0", "v 0 0", "2.4", "v 0 0", "v 0 0", "v 0 0"]).unwrap();
        assert_eq!(out[2], "reel.bmp");
        // Reel 2, row 4 is symbol 2
        assert_eq!(out[5], "v 0.200000 0.250000");
    }

    #[test]
    fn test_rewrite_text_keeps_terminators() {
        let text = "version 1\r\ntriangles\n0.0\nv 0 0\nv 1 1\nv 0 1\nend";
        let out = rewrite_text(text, &pattern(), &uvs(), "reel.bmp").unwrap();
        assert_eq!(
            out,
            concat!(
                "version 1\r\ntriangles\nreel.bmp\n",
                "v 0.000000 0.050000\nv 0.080000 0.090000\nv 0.000000 0.090000\nend",
            )
        );
        assert_eq!(out.lines().count(), text.lines().count());
    }

    #[test]
    fn test_truncated_face_is_accepted() {
        let out = run(&["0.0", "v 0 0"]).unwrap();
        assert_eq!(out.len(), 2);
    }
}
