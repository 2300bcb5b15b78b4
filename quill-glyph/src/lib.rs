/*!
Glyph resolution for embedded PDF fonts.

This crate sits between a PDF interpreter and the font programs it
extracts: it owns the per-font width tables, the CID machinery of
composite fonts and the glyph outline cache, and exposes a uniform
"code in, outline and advance out" surface. Outline geometry is
represented with [`kurbo::BezPath`] in text space, advances in the
normalized space where 1.0 equals the design advance unit (1000 glyph
units).

All per-glyph failures degrade to a `.notdef` or empty outline; only
font construction can fail.

Note that this is an internal crate of the renderer and not meant to be
used directly.
*/

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cid;
mod composite;
mod type1;
mod widths;

pub use cid::{CidDict, CidFont, CidToGidMap, WidthValue};
pub use composite::CompositeFont;
pub use type1::Type1Font;

use kurbo::{BezPath, Vec2};
use quill_font::OutlineBuilder;

/// The number of glyph-space units per normalized advance unit.
pub(crate) const DEFAULT_WIDTH: f32 = 1000.0;

/// A resolved glyph: its outline in text space and its advance in
/// normalized units.
#[derive(Debug, Clone, Default)]
pub struct Glyph {
    /// The outline.
    pub path: BezPath,
    /// The advance vector.
    pub advance: Vec2,
}

/// The raw bytes of an embedded font program.
#[derive(Debug, Clone)]
pub struct FontFile {
    /// The full program.
    pub data: Vec<u8>,
    /// The length of the cleartext prefix (`Length1`).
    pub clear_len: usize,
    /// The length of the encrypted section (`Length2`).
    pub encrypted_len: usize,
}

/// The width-related entries of a simple font dictionary.
#[derive(Debug, Clone, Default)]
pub struct SimpleFontDict {
    /// The code the `Widths` array starts at (`FirstChar`).
    pub first_char: u32,
    /// The raw `Widths` array, in glyph-space units.
    pub widths: Option<Vec<f32>>,
    /// The descriptor's `MissingWidth`, if there is a descriptor.
    pub missing_width: Option<f32>,
}

/// An outline provider for glyph-index-keyed font programs.
///
/// CID-keyed fonts carry TrueType or CFF programs whose parsing lives
/// elsewhere; the resolver only needs outlines by glyph index, in glyph
/// space.
pub trait GlyphSource {
    /// Returns the outline of a glyph, empty if the glyph does not
    /// exist.
    fn outline_glyph(&self, glyph: u32) -> BezPath;
}

/// An embedded font, dispatched over the kinds the renderer knows.
#[derive(Debug)]
pub enum Font {
    /// A simple Type 1 font.
    Type1(Type1Font),
    /// A CID-keyed descendant font.
    Cid(CidFont),
    /// A Type 0 composite font.
    Composite(CompositeFont),
}

impl Font {
    /// Resolves a character code to a glyph.
    ///
    /// `name` is the glyph name when the font's encoding already
    /// resolved one. Never fails; unresolvable codes yield the font's
    /// `.notdef` glyph or an empty outline.
    pub fn outline(&self, code: u32, name: Option<&str>) -> Glyph {
        match self {
            Self::Type1(f) => f.outline(code, name),
            Self::Cid(f) => f.outline(code),
            Self::Composite(f) => f.outline(code, name),
        }
    }

    /// Returns the normalized advance width of a character code.
    pub fn width(&self, code: u32, name: Option<&str>) -> f32 {
        match self {
            Self::Type1(f) => f.width(code, name),
            Self::Cid(f) => f.width(code),
            Self::Composite(f) => f.width(code, name),
        }
    }

    /// The number of glyph-space units per normalized advance unit.
    pub fn default_width(&self) -> i32 {
        DEFAULT_WIDTH as i32
    }
}

/// Collects interpreter callbacks into a [`BezPath`].
pub(crate) struct OutlinePath(BezPath);

impl OutlinePath {
    pub(crate) fn new() -> Self {
        Self(BezPath::new())
    }

    pub(crate) fn take(self) -> BezPath {
        self.0
    }
}

impl OutlineBuilder for OutlinePath {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to((x, y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        if !self.0.elements().is_empty() {
            self.0.line_to((x, y));
        }
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        if !self.0.elements().is_empty() {
            self.0.curve_to((x1, y1), (x2, y2), (x, y));
        }
    }

    fn close(&mut self) {
        if !self.0.elements().is_empty() {
            self.0.close_path();
        }
    }
}
