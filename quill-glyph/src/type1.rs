//! Simple Type 1 fonts: charstring interpretation, the glyph cache and
//! the width fallback chain.

use crate::widths::WidthTable;
use crate::{DEFAULT_WIDTH, FontFile, Glyph, OutlinePath, SimpleFontDict};
use kurbo::{Affine, BezPath, Vec2};
use log::warn;
use quill_font::type1::FontProgram;
use quill_font::{Advance, ProgramError};
use rustc_hash::FxHashMap;
use std::sync::Mutex;

const NOTDEF: &str = ".notdef";

/// A simple Type 1 font: the parsed program plus the dictionary's width
/// table and a cache of resolved glyphs.
#[derive(Debug)]
pub struct Type1Font {
    program: FontProgram,
    matrix: Affine,
    widths: Option<WidthTable>,
    cache: Mutex<FxHashMap<String, Glyph>>,
}

impl Type1Font {
    /// Parses the embedded program and attaches the dictionary's width
    /// entries.
    pub fn new(file: &FontFile, dict: &SimpleFontDict) -> Result<Self, ProgramError> {
        let program = FontProgram::parse(&file.data, file.clear_len, file.encrypted_len)?;
        let m = program.matrix();
        let matrix = Affine::new([
            f64::from(m.sx),
            f64::from(m.ky),
            f64::from(m.kx),
            f64::from(m.sy),
            f64::from(m.tx),
            f64::from(m.ty),
        ]);

        Ok(Self {
            program,
            matrix,
            widths: WidthTable::new(dict),
            cache: Mutex::new(FxHashMap::default()),
        })
    }

    /// Resolves a character code (or an already-resolved glyph name) to
    /// a glyph.
    pub fn outline(&self, code: u32, name: Option<&str>) -> Glyph {
        let name = self.glyph_name(code, name);
        let declared = self.widths.as_ref().map(|w| w.get(code)).unwrap_or(0.0);

        self.resolve(name, declared)
    }

    /// The normalized advance width of a code.
    ///
    /// With a `Widths` array the table decides; without one the width
    /// comes from interpreting the glyph's charstring.
    pub fn width(&self, code: u32, name: Option<&str>) -> f32 {
        if let Some(widths) = &self.widths {
            return widths.get(code);
        }

        let name = self.glyph_name(code, name);
        if self.program.has_glyph(&name) {
            self.resolve(name, 0.0).advance.x as f32
        } else {
            0.0
        }
    }

    /// The glyph name a request resolves to: the explicit name, else the
    /// encoding's name for the code, else `.notdef`.
    fn glyph_name<'a>(&'a self, code: u32, name: Option<&'a str>) -> &'a str {
        name.or_else(|| {
            u8::try_from(code)
                .ok()
                .and_then(|code| self.program.glyph_name(code))
        })
        .unwrap_or(NOTDEF)
    }

    /// Returns the cached glyph for `name`, interpreting and caching it
    /// on first request.
    ///
    /// When the dictionary declares a nonzero width and the interpreted
    /// advance disagrees, the outline is stretched horizontally so the
    /// glyph fills exactly the declared advance.
    fn resolve(&self, name: &str, declared: f32) -> Glyph {
        if let Some(glyph) = self.cache.lock().unwrap().get(name) {
            return glyph.clone();
        }

        let (path, advance) = self.interpret(name);
        let path = self.matrix * path;
        let mut x = advance.x / DEFAULT_WIDTH;
        let y = advance.y / DEFAULT_WIDTH;

        let path = if declared != 0.0 && x != 0.0 && declared != x {
            x = declared;
            Affine::scale_non_uniform(f64::from(declared / (advance.x / DEFAULT_WIDTH)), 1.0)
                * path
        } else {
            path
        };

        let glyph = Glyph {
            path,
            advance: Vec2::new(f64::from(x), f64::from(y)),
        };

        self.cache
            .lock()
            .unwrap()
            .insert(name.to_owned(), glyph.clone());

        glyph
    }

    /// Runs the charstring for `name`, falling back to `.notdef` and
    /// then to an empty outline.
    fn interpret(&self, name: &str) -> (BezPath, Advance) {
        let mut path = OutlinePath::new();

        match self.program.outline(name, &mut path) {
            Ok(advance) => (path.take(), advance),
            Err(err) => {
                if name != NOTDEF {
                    warn!("failed to interpret glyph {name}: {err}");
                    self.interpret(NOTDEF)
                } else {
                    (BezPath::new(), Advance::default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::PathEl;

    /// The Type 1 eexec/charstring cipher, encrypting direction.
    fn encrypt(plain: &[u8], key: u16, lead_in: usize) -> Vec<u8> {
        let mut r = u32::from(key);
        let mut out = Vec::new();

        for p in core::iter::repeat_n(0u8, lead_in).chain(plain.iter().copied()) {
            let c = (u32::from(p) ^ (r >> 8)) & 0xFF;
            r = ((c + r).wrapping_mul(52845) + 22719) & 0xFFFF;
            out.push(c as u8);
        }

        out
    }

    /// A miniature font: "alpha" at code 65 with advance 600 drawing a
    /// line to (500, 0), and an empty ".notdef" with advance 500.
    fn test_font() -> FontFile {
        // 0 600 hsbw 0 0 rmoveto 500 0 rlineto endchar
        let alpha: &[u8] = &[139, 248, 236, 13, 139, 139, 21, 248, 136, 139, 5, 14];
        // 0 500 hsbw endchar
        let notdef: &[u8] = &[139, 248, 136, 13, 14];

        let clear: &[u8] = b"%!PS-AdobeFont-1.0: Mini\n\
            /FontMatrix [0.001 0 0 0.001 0 0] readonly def\n\
            /Encoding 256 array\n\
            dup 65 /alpha put\n\
            readonly def\n\
            currentfile eexec\n";

        let mut plain = Vec::new();
        plain.extend_from_slice(b"dup /Private 4 dict dup begin\n/lenIV 4 def\n");
        plain.extend_from_slice(b"/CharStrings 2 dict dup begin\n/alpha 16 RD ");
        plain.extend_from_slice(&encrypt(alpha, 4330, 4));
        plain.extend_from_slice(b" ND\n/.notdef 9 RD ");
        plain.extend_from_slice(&encrypt(notdef, 4330, 4));
        plain.extend_from_slice(b" ND\nend\n");

        let encrypted = encrypt(&plain, 55665, 4);

        let mut data = clear.to_vec();
        data.extend_from_slice(&encrypted);

        FontFile {
            clear_len: clear.len(),
            encrypted_len: encrypted.len(),
            data,
        }
    }

    fn font(dict: SimpleFontDict) -> Type1Font {
        Type1Font::new(&test_font(), &dict).unwrap()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{a} != {b}");
    }

    fn last_line_to(glyph: &Glyph) -> kurbo::Point {
        match glyph.path.elements().last() {
            Some(PathEl::LineTo(p)) => *p,
            other => panic!("expected a line, got {other:?}"),
        }
    }

    #[test]
    fn advance_is_normalized() {
        // The program's "alpha" charstring declares an advance of 600.
        let f = font(SimpleFontDict::default());
        let glyph = f.outline(65, None);

        assert_close(glyph.advance.x, 0.6);
        assert_close(glyph.advance.y, 0.0);
    }

    #[test]
    fn outline_is_in_text_space() {
        let f = font(SimpleFontDict::default());
        let glyph = f.outline(65, Some("alpha"));

        // The line to (500, 0), scaled by the 0.001 font matrix.
        let p = last_line_to(&glyph);
        assert_close(p.x, 0.5);
        assert_close(p.y, 0.0);
    }

    #[test]
    fn unknown_code_falls_back_to_notdef() {
        let f = font(SimpleFontDict::default());
        let glyph = f.outline(66, None);

        // .notdef declares an advance of 500 and draws nothing.
        assert_close(glyph.advance.x, 0.5);
        assert!(glyph.path.elements().is_empty());
    }

    #[test]
    fn repeated_requests_hit_the_cache() {
        let f = font(SimpleFontDict::default());

        let first = f.outline(65, None);
        let second = f.outline(65, None);

        assert_eq!(first.advance, second.advance);
        assert_eq!(f.cache.lock().unwrap().len(), 1);
    }

    #[test]
    fn width_without_widths_array_interprets_the_glyph() {
        let f = font(SimpleFontDict::default());

        assert_close(f.width(65, None).into(), 0.6);
        // No charstring and no table: zero.
        assert_eq!(f.width(66, Some("nosuchglyph")), 0.0);
    }

    #[test]
    fn width_with_widths_array_uses_the_table() {
        let f = font(SimpleFontDict {
            first_char: 65,
            widths: Some(vec![800.0]),
            missing_width: Some(300.0),
        });

        assert_eq!(f.width(65, None), 0.8);
        assert_eq!(f.width(70, None), 0.3);
    }

    #[test]
    fn declared_width_stretches_the_outline() {
        let f = font(SimpleFontDict {
            first_char: 65,
            widths: Some(vec![1200.0]),
            missing_width: None,
        });
        let glyph = f.outline(65, None);

        // Interpreted advance 0.6, declared 1.2: outline doubled in x.
        assert_close(glyph.advance.x, 1.2);
        let p = last_line_to(&glyph);
        assert_close(p.x, 1.0);
    }
}
