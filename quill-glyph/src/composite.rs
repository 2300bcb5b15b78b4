//! Type 0 composite fonts.

use crate::{Font, Glyph};
use log::warn;

/// A Type 0 font: an ordered list of descendant fonts.
///
/// All requests go to descendant 0. Real-world Type 0 fonts carry
/// exactly one descendant; per-character descendant selection would
/// need CMap-driven dispatch in the caller first.
#[derive(Debug)]
pub struct CompositeFont {
    descendants: Vec<Font>,
}

impl CompositeFont {
    /// Builds a composite font; a descendant-less one is unusable.
    pub fn new(descendants: Vec<Font>) -> Option<Self> {
        if descendants.is_empty() {
            warn!("composite font without descendant fonts");

            return None;
        }

        Some(Self { descendants })
    }

    pub(crate) fn outline(&self, code: u32, name: Option<&str>) -> Glyph {
        self.descendants[0].outline(code, name)
    }

    pub(crate) fn width(&self, code: u32, name: Option<&str>) -> f32 {
        self.descendants[0].width(code, name)
    }

    /// The vertical advance of a code, when descendant 0 is CID-keyed.
    pub fn vertical_width(&self, code: u32) -> Option<f32> {
        match &self.descendants[0] {
            Font::Cid(f) => Some(f.vertical_width(code)),
            _ => None,
        }
    }

    /// The vertical advance of codes absent from descendant 0's `W2`
    /// table, when that descendant is CID-keyed.
    pub fn default_vertical_width(&self) -> Option<f32> {
        match &self.descendants[0] {
            Font::Cid(f) => Some(f.default_vertical_width()),
            _ => None,
        }
    }
}
