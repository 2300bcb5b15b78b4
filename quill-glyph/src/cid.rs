//! CID-keyed descendant fonts: range-encoded width tables and the
//! CID to glyph index table.

use crate::{DEFAULT_WIDTH, Glyph, GlyphSource};
use kurbo::Vec2;
use rustc_hash::FxHashMap;
use std::fmt;

/// One entry of a `W`/`W2` number array.
///
/// The arrays mix plain numbers and nested arrays; which of the two run
/// shapes applies is only decidable while scanning.
#[derive(Debug, Clone)]
pub enum WidthValue {
    /// A plain number.
    Number(f32),
    /// A nested array of numbers.
    Array(Vec<f32>),
}

/// The CID-related entries of a descendant font dictionary.
#[derive(Debug, Clone, Default)]
pub struct CidDict {
    /// The `W` array.
    pub w: Vec<WidthValue>,
    /// The declared default width (`DW`).
    pub dw: Option<f32>,
    /// The `W2` array.
    pub w2: Vec<WidthValue>,
    /// The declared vertical default (`DW2`), position and displacement.
    pub dw2: Option<[f32; 2]>,
    /// The raw `CIDToGIDMap` stream contents, if mapped.
    pub cid_to_gid: Option<Vec<u8>>,
    /// Whether a declared `DW`/`DW2` replaces the constant default for
    /// CIDs absent from the tables.
    ///
    /// Off by default: a number of real-world documents declare a `DW`
    /// that renders incorrectly when honored, so the constant default
    /// wins unless a caller opts in.
    pub respect_default_width: bool,
}

/// A CID-keyed font: width tables plus an outline provider.
pub struct CidFont {
    source: Box<dyn GlyphSource + Send + Sync>,
    widths: FxHashMap<u32, f32>,
    widths2: FxHashMap<u32, f32>,
    default_width: f32,
    default_width2: f32,
    cid_to_gid: CidToGidMap,
}

impl CidFont {
    /// Builds a CID font from its dictionary entries and an outline
    /// provider for the embedded program.
    pub fn new(dict: CidDict, source: Box<dyn GlyphSource + Send + Sync>) -> Self {
        let default_width = if dict.respect_default_width {
            dict.dw.unwrap_or(DEFAULT_WIDTH) / DEFAULT_WIDTH
        } else {
            1.0
        };
        let default_width2 = if dict.respect_default_width {
            dict.dw2.map(|v| v[1]).unwrap_or(-DEFAULT_WIDTH) / DEFAULT_WIDTH
        } else {
            -1.0
        };

        Self {
            source,
            widths: read_widths(&dict.w),
            widths2: read_widths(&dict.w2),
            default_width,
            default_width2,
            cid_to_gid: CidToGidMap::new(dict.cid_to_gid),
        }
    }

    /// Resolves a CID to its glyph outline and horizontal advance.
    pub fn outline(&self, cid: u32) -> Glyph {
        let glyph = self.cid_to_gid.map(cid);

        Glyph {
            path: self.source.outline_glyph(glyph),
            advance: Vec2::new(f64::from(self.width(cid)), 0.0),
        }
    }

    /// The normalized horizontal advance of a CID.
    pub fn width(&self, cid: u32) -> f32 {
        self.widths.get(&cid).copied().unwrap_or(self.default_width)
    }

    /// The normalized vertical advance of a CID.
    pub fn vertical_width(&self, cid: u32) -> f32 {
        self.widths2
            .get(&cid)
            .copied()
            .unwrap_or(self.default_width2)
    }

    /// The vertical advance of CIDs absent from the `W2` table.
    pub fn default_vertical_width(&self) -> f32 {
        self.default_width2
    }
}

impl fmt::Debug for CidFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CidFont")
            .field("widths", &self.widths.len())
            .field("widths2", &self.widths2.len())
            .field("default_width", &self.default_width)
            .field("cid_to_gid", &self.cid_to_gid)
            .finish_non_exhaustive()
    }
}

/// The CID to glyph index table of a descendant font.
#[derive(Debug, Default)]
pub enum CidToGidMap {
    /// CID and glyph index coincide.
    #[default]
    Identity,
    /// A raw array of big-endian 16-bit glyph indices, one per CID.
    Mapped(Vec<u8>),
}

impl CidToGidMap {
    /// An absent stream means the identity mapping.
    pub fn new(data: Option<Vec<u8>>) -> Self {
        match data {
            Some(data) => Self::Mapped(data),
            None => Self::Identity,
        }
    }

    /// Maps a CID to the glyph index to render; CIDs past the end of a
    /// mapped table yield glyph 0.
    pub fn map(&self, cid: u32) -> u32 {
        match self {
            Self::Identity => cid,
            Self::Mapped(data) => (cid as usize)
                .checked_mul(2)
                .and_then(|offset| data.get(offset..offset + 2))
                .map(|b| u32::from(u16::from_be_bytes([b[0], b[1]])))
                .unwrap_or(0),
        }
    }
}

/// Expands the two run shapes of a `W`/`W2` array into a per-CID map of
/// normalized values: `first last w` fills an inclusive range, `first
/// [w ...]` fills consecutive CIDs.
fn read_widths(values: &[WidthValue]) -> FxHashMap<u32, f32> {
    let mut map = FxHashMap::default();
    let mut rest = values;

    loop {
        match rest {
            [WidthValue::Number(first), WidthValue::Array(range), tail @ ..] => {
                let mut cid = *first as u32;

                for width in range {
                    map.insert(cid, width / DEFAULT_WIDTH);
                    cid = match cid.checked_add(1) {
                        Some(c) => c,
                        None => break,
                    };
                }

                rest = tail;
            }
            [
                WidthValue::Number(first),
                WidthValue::Number(last),
                WidthValue::Number(width),
                tail @ ..,
            ] => {
                for cid in *first as u32..=*last as u32 {
                    map.insert(cid, width / DEFAULT_WIDTH);
                }

                rest = tail;
            }
            _ => break,
        }
    }

    map
}
