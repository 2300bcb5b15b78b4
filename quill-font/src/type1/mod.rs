//! Reading Type 1 font programs.

mod charstring;
mod decrypt;
mod standard;
mod state;

pub(crate) mod operator;
pub(crate) mod stream;

use crate::type1::decrypt::{CHARSTRING_KEY, EEXEC_KEY, decode_hex, decrypt, is_hex_armored};
use crate::type1::standard::STANDARD;
use crate::type1::stream::Stream;
use crate::{Advance, CharstringError, Matrix, OutlineBuilder, ProgramError};
use log::{debug, warn};
use std::collections::HashMap;
use std::str::FromStr;

const RD: &[u8] = b"RD";
const RD_ALT: &[u8] = b"-|";

const ND: &[u8] = b"ND";
const ND_ALT: &[u8] = b"|-";

/// A parsed Type 1 font program.
///
/// Holds the glyph-name encoding table, the subroutine array, the
/// charstring dictionary and the font matrix. Subroutines are decrypted
/// at parse time; charstrings stay encrypted until a glyph is first
/// interpreted, so that glyphs which are never rendered cost nothing.
#[derive(Debug)]
pub struct FontProgram {
    matrix: Matrix,
    encoding: EncodingTable,
    len_iv: i64,
    use_decryption: bool,
    subrs: Vec<Option<Vec<u8>>>,
    charstrings: HashMap<String, Vec<u8>>,
}

impl FontProgram {
    /// Parses a font program.
    ///
    /// `clear_len` and `encrypted_len` delimit the cleartext prefix and
    /// the `eexec`-encrypted section; both come from the font
    /// descriptor's stream dictionary.
    pub fn parse(
        data: &[u8],
        clear_len: usize,
        encrypted_len: usize,
    ) -> Result<Self, ProgramError> {
        if clear_len == 0 || clear_len >= data.len() {
            return Err(ProgramError::TruncatedProgram);
        }

        let clear = &data[..clear_len];
        let end = (clear_len + encrypted_len).min(data.len());
        let region = &data[clear_len..end];

        let decrypted = if is_hex_armored(region) {
            decrypt(&decode_hex(region), EEXEC_KEY, 4)
        } else {
            decrypt(region, EEXEC_KEY, 4)
        };

        let mut matrix = None;
        let mut encoding = None;

        let mut s = Stream::new(clear);
        while let Some(token) = s.next_token() {
            match token {
                b"/FontMatrix" => matrix = s.read_font_matrix(),
                b"/Encoding" => encoding = s.read_encoding(),
                _ => {}
            }
        }

        if matrix.is_none() {
            debug!("font program has no FontMatrix, using the 0.001 scale");
        }

        let mut len_iv = 4i64;
        let mut use_decryption = true;
        let mut subrs = Vec::new();
        let mut charstrings = None;

        let mut s = Stream::new(&decrypted);
        while let Some(token) = s.next_token() {
            match token {
                b"/lenIV" => {
                    if let Some(v) = s.next_int() {
                        if v < 0 {
                            use_decryption = false;
                            len_iv = 0;
                        } else {
                            len_iv = v;
                        }
                    }
                }
                b"/Subrs" => subrs = s.parse_subroutines(len_iv, use_decryption),
                b"/CharStrings" => {
                    charstrings = Some(s.parse_charstrings());
                    break;
                }
                _ => {}
            }
        }

        Ok(Self {
            matrix: matrix.unwrap_or_default(),
            encoding: encoding.unwrap_or(EncodingTable::Standard),
            len_iv,
            use_decryption,
            subrs,
            charstrings: charstrings.ok_or(ProgramError::MissingCharStrings)?,
        })
    }

    /// Returns the font transformation matrix.
    pub fn matrix(&self) -> Matrix {
        self.matrix
    }

    /// Returns the glyph name a character code maps to.
    pub fn glyph_name(&self, code: u8) -> Option<&str> {
        self.encoding.lookup(code)
    }

    /// Whether a charstring exists for the given glyph name.
    pub fn has_glyph(&self, name: &str) -> bool {
        self.charstrings.contains_key(name)
    }

    /// Interprets the named glyph's charstring, emitting its outline
    /// into `builder` and returning the advance vector, both in glyph
    /// space.
    pub fn outline(
        &self,
        name: &str,
        builder: &mut dyn OutlineBuilder,
    ) -> Result<Advance, CharstringError> {
        let data = self
            .charstring(name)
            .ok_or(CharstringError::GlyphNotFound)?;

        charstring::run(self, &data, builder, (0.0, 0.0), 0)
    }

    pub(crate) fn subr(&self, index: i32) -> Option<&[u8]> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.subrs.get(i))
            .and_then(|s| s.as_deref())
    }

    pub(crate) fn charstring(&self, name: &str) -> Option<Vec<u8>> {
        let raw = self.charstrings.get(name)?;
        Some(decrypt_charstring(raw, self.len_iv, self.use_decryption))
    }
}

fn decrypt_charstring(data: &[u8], len_iv: i64, use_decryption: bool) -> Vec<u8> {
    if use_decryption {
        decrypt(data, CHARSTRING_KEY, len_iv.max(0) as usize)
    } else {
        data.to_vec()
    }
}

#[derive(Debug)]
enum EncodingTable {
    Standard,
    Custom(Box<[Option<String>; 256]>),
}

impl EncodingTable {
    fn lookup(&self, code: u8) -> Option<&str> {
        match self {
            Self::Standard => STANDARD.get(&code).copied(),
            Self::Custom(table) => table[code as usize].as_deref(),
        }
    }
}

impl<'a> Stream<'a> {
    /// Returns the next PostScript token.
    ///
    /// Comments are skipped; the self-delimiting characters become
    /// single-byte tokens; a `/name` literal is one token including the
    /// slash.
    pub(crate) fn next_token(&mut self) -> Option<&'a [u8]> {
        loop {
            self.skip_whitespaces();
            if self.peek_byte()? == b'%' {
                self.skip_line_comment();
            } else {
                break;
            }
        }

        let tail = self.tail()?;
        let first = self.read_byte()?;

        let len = if is_self_delimiting(first) && first != b'/' {
            1
        } else {
            self.skip_regular() + 1
        };

        Some(&tail[..len])
    }

    /// Consumes regular characters until a delimiter, returning how many
    /// were consumed.
    fn skip_regular(&mut self) -> usize {
        let mut count = 0;

        while let Some(c) = self.peek_byte() {
            if is_whitespace(c) || is_self_delimiting(c) {
                break;
            }

            self.read_byte();
            count += 1;
        }

        count
    }

    fn skip_whitespaces(&mut self) {
        while let Some(c) = self.peek_byte() {
            if is_whitespace(c) {
                self.read_byte();
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.read_byte() {
            if matches!(c, b'\n' | b'\r') {
                break;
            }
        }
    }

    fn next_int(&mut self) -> Option<i64> {
        parse_int(std::str::from_utf8(self.next_token()?).ok()?)
    }

    fn next_f32(&mut self) -> Option<f32> {
        f32::from_str(std::str::from_utf8(self.next_token()?).ok()?).ok()
    }

    /// Reads `[a b c d e f]` following a `/FontMatrix` token.
    fn read_font_matrix(&mut self) -> Option<Matrix> {
        if self.next_token()? != b"[" {
            return None;
        }

        let mut entries = [0.0f32; 6];
        for entry in &mut entries {
            *entry = self.next_f32()?;
        }

        // Trailing `]`.
        self.next_token();

        Some(Matrix {
            sx: entries[0],
            ky: entries[1],
            kx: entries[2],
            sy: entries[3],
            tx: entries[4],
            ty: entries[5],
        })
    }

    /// Reads the value of an `/Encoding` definition: either the literal
    /// `StandardEncoding` or a sequence of `dup <code> /<name> put`
    /// entries terminated by `def`/`readonly`.
    fn read_encoding(&mut self) -> Option<EncodingTable> {
        if self.next_token()? == b"StandardEncoding" {
            return Some(EncodingTable::Standard);
        }

        let mut table: Box<[Option<String>; 256]> = Box::new([const { None }; 256]);

        while let Some(token) = self.next_token() {
            match token {
                b"def" | b"readonly" => break,
                b"dup" => {
                    let Some(code) = self.next_int() else {
                        continue;
                    };
                    let Some(name) = self.next_token()?.strip_prefix(b"/") else {
                        continue;
                    };

                    if self.next_token()? != b"put" {
                        warn!("malformed Encoding entry for code {code}");
                        continue;
                    }

                    if let Ok(code) = u8::try_from(code) {
                        table[code as usize] =
                            Some(String::from_utf8_lossy(name).into_owned());
                    }
                }
                _ => {}
            }
        }

        Some(EncodingTable::Custom(table))
    }

    /// Reads `dup <index> <len> RD <len bytes>` entries following a
    /// `/Subrs` token, decrypting each one.
    fn parse_subroutines(&mut self, len_iv: i64, use_decryption: bool) -> Vec<Option<Vec<u8>>> {
        let declared = self.next_int().unwrap_or(0).max(0) as usize;
        let mut subrs: Vec<Option<Vec<u8>>> = Vec::new();
        subrs.resize(declared, None);

        while let Some(token) = self.next_token() {
            match token {
                b"dup" => {
                    let Some((index, bytes)) = self.read_binary_entry() else {
                        break;
                    };

                    let Ok(index) = usize::try_from(index) else {
                        continue;
                    };
                    if index >= subrs.len() {
                        subrs.resize(index + 1, None);
                    }

                    subrs[index] = Some(decrypt_charstring(bytes, len_iv, use_decryption));
                }
                b"def" => break,
                t if t == ND || t == ND_ALT => break,
                // `NP`, `|`, `noaccess`, `put` and friends.
                _ => {}
            }
        }

        subrs
    }

    /// Reads `<index> <len> RD <len bytes>` after a `dup` token.
    fn read_binary_entry(&mut self) -> Option<(i64, &'a [u8])> {
        let index = self.next_int()?;
        let len = self.next_int()?;
        let tok = self.next_token()?;

        if tok != RD && tok != RD_ALT {
            warn!("expected RD before binary data, found {:?}", tok);
            return None;
        }

        // The single whitespace separating `RD` from the data.
        self.read_byte();
        let bytes = self.read_bytes(usize::try_from(len).ok()?)?;

        Some((index, bytes))
    }

    /// Reads `/<name> <len> RD <len bytes>` entries until `end`.
    ///
    /// The returned charstrings are still encrypted.
    fn parse_charstrings(&mut self) -> HashMap<String, Vec<u8>> {
        let mut charstrings = HashMap::new();

        while let Some(token) = self.next_token() {
            if token == b"end" {
                break;
            }

            let Some(name) = token.strip_prefix(b"/") else {
                continue;
            };

            let Some(len) = self.next_int() else {
                continue;
            };
            let Some(tok) = self.next_token() else {
                break;
            };

            if tok != RD && tok != RD_ALT {
                warn!("invalid charstring for {:?}, expected RD", token);
                continue;
            }

            self.read_byte();
            let Some(bytes) = usize::try_from(len).ok().and_then(|l| self.read_bytes(l))
            else {
                break;
            };

            charstrings.insert(String::from_utf8_lossy(name).into_owned(), bytes.to_vec());
        }

        charstrings
    }
}

fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\n' | b'\r' | b'\t' | 0x00 | 0x0C)
}

fn is_self_delimiting(c: u8) -> bool {
    // The characters ()<>[]{}/% delimit syntactic entities such as
    // strings, procedure bodies, name literals, and comments. Any of
    // them terminates the entity preceding it and is not part of it.
    matches!(
        c,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn parse_int(str: &str) -> Option<i64> {
    if let Some(hash_idx) = str.find('#') {
        if hash_idx == 1 || hash_idx == 2 {
            // A radix number, like 8#40.
            let radix = str[0..hash_idx].parse::<u32>().ok()?;

            i64::from_str_radix(&str[hash_idx + 1..], radix).ok()
        } else {
            str.parse::<i64>().ok()
        }
    } else {
        str.parse::<i64>().ok()
    }
}
