/*!
A parser and interpreter for embedded Type 1 font programs.

This crate turns the raw, partially encrypted bytes of a Type 1 font
program (as found in a PDF `FontFile` stream) into vector glyph outlines
and advance widths. It deliberately implements only the subset of
PostScript needed to locate the encoding table, the subroutine array and
the charstring dictionary; everything else in the program is treated as
opaque.

Outlines are emitted through the [`OutlineBuilder`] trait so that callers
can collect them into whatever path representation they use.

Note that this is an internal crate of the renderer and not meant to be
used directly.
*/

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod type1;

mod argstack;

/// A trait for glyph outline construction.
pub trait OutlineBuilder {
    /// Appends a `MoveTo` segment.
    ///
    /// Start of a contour.
    fn move_to(&mut self, x: f32, y: f32);

    /// Appends a `LineTo` segment.
    fn line_to(&mut self, x: f32, y: f32);

    /// Appends a cubic `CurveTo` segment.
    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32);

    /// Appends a `ClosePath` segment.
    ///
    /// End of a contour.
    fn close(&mut self);
}

/// The advance vector of a glyph, in glyph space units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Advance {
    /// The horizontal advance.
    pub x: f32,
    /// The vertical advance.
    pub y: f32,
}

/// The font transformation matrix from glyph space to text space.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix {
    pub sx: f32,
    pub ky: f32,
    pub kx: f32,
    pub sy: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self {
            sx: 0.001,
            ky: 0.0,
            kx: 0.0,
            sy: 0.001,
            tx: 0.0,
            ty: 0.0,
        }
    }
}

impl Matrix {
    /// Whether the linear part of the matrix can be inverted.
    pub fn is_invertible(&self) -> bool {
        let det = self.sx * self.sy - self.kx * self.ky;
        det.is_finite() && det != 0.0
    }
}

/// An error while reading the structure of a font program.
///
/// These surface at font construction time; a font that fails to parse
/// is unusable and the caller decides whether to substitute a fallback.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProgramError {
    /// The encrypted section is missing or shorter than declared.
    TruncatedProgram,
    /// No `/CharStrings` dictionary could be located.
    MissingCharStrings,
}

impl core::fmt::Display for ProgramError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TruncatedProgram => write!(f, "font program is truncated"),
            Self::MissingCharStrings => write!(f, "font program has no CharStrings"),
        }
    }
}

impl std::error::Error for ProgramError {}

/// An error while executing a single charstring.
///
/// Fatal to the glyph being interpreted, never to the document; callers
/// substitute a `.notdef` outline.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CharstringError {
    /// An opcode that is not part of the charstring language.
    InvalidOperator(u8),
    /// The program ran past the end of its byte stream.
    ReadOutOfBounds,
    /// More operands were pushed than the operand stack can hold.
    StackOverflow,
    /// An operator consumed more operands than were available.
    StackUnderflow,
    /// A `seac` component referenced a code with no glyph behind it.
    InvalidSeacCode,
    /// The requested glyph name has no charstring.
    GlyphNotFound,
}

impl core::fmt::Display for CharstringError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidOperator(op) => write!(f, "invalid charstring operator {op}"),
            Self::ReadOutOfBounds => write!(f, "charstring read out of bounds"),
            Self::StackOverflow => write!(f, "operand stack overflow"),
            Self::StackUnderflow => write!(f, "operand stack underflow"),
            Self::InvalidSeacCode => write!(f, "invalid seac component code"),
            Self::GlyphNotFound => write!(f, "no charstring for the requested glyph"),
        }
    }
}

impl std::error::Error for CharstringError {}

/// Forwards segments to the caller's builder, offset by a fixed amount.
///
/// The offset is zero for ordinary glyphs; `seac` uses it to place the
/// accent component relative to the base glyph.
pub(crate) struct Builder<'a> {
    pub(crate) builder: &'a mut dyn OutlineBuilder,
    pub(crate) dx: f32,
    pub(crate) dy: f32,
}

impl Builder<'_> {
    #[inline]
    pub(crate) fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(x + self.dx, y + self.dy);
    }

    #[inline]
    pub(crate) fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(x + self.dx, y + self.dy);
    }

    #[inline]
    pub(crate) fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder.curve_to(
            x1 + self.dx,
            y1 + self.dy,
            x2 + self.dx,
            y2 + self.dy,
            x + self.dx,
            y + self.dy,
        );
    }

    #[inline]
    pub(crate) fn close(&mut self) {
        self.builder.close();
    }
}
