//! The dense width table of simple fonts.

use crate::{DEFAULT_WIDTH, SimpleFontDict};

/// Normalized per-code advance widths from a `Widths` array.
#[derive(Debug)]
pub(crate) struct WidthTable {
    first_char: u32,
    widths: Vec<f32>,
    missing_width: Option<f32>,
}

impl WidthTable {
    /// Returns `None` when the dictionary has no `Widths` array; the
    /// caller then derives widths from the font program instead.
    pub(crate) fn new(dict: &SimpleFontDict) -> Option<Self> {
        Some(Self {
            first_char: dict.first_char,
            widths: dict.widths.clone()?,
            missing_width: dict.missing_width,
        })
    }

    /// The normalized width of a code, falling back to the descriptor's
    /// missing width and then to zero.
    pub(crate) fn get(&self, code: u32) -> f32 {
        let declared = code
            .checked_sub(self.first_char)
            .and_then(|idx| self.widths.get(idx as usize))
            .copied()
            .or(self.missing_width)
            .unwrap_or(0.0);

        declared / DEFAULT_WIDTH
    }
}
