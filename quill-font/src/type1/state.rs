//! The mutable state of a running charstring program.

use crate::argstack::{ArgumentsStack, AuxStack};
use crate::type1::stream::Stream;
use crate::{Advance, Builder, CharstringError};
use log::debug;

/// A complete flex sequence: the reference point plus six curve control
/// points, two coordinates each.
pub(crate) const FLEX_SEQUENCE_LEN: usize = 14;
const FLEX_CAPACITY: usize = 16;

pub(crate) struct ExecState<'a> {
    pub(crate) stack: ArgumentsStack<'a>,
    pub(crate) aux: AuxStack,
    pub(crate) builder: Builder<'a>,
    pub(crate) advance: Advance,
    x: f32,
    y: f32,
    flex: [f32; FLEX_CAPACITY],
    flex_len: usize,
    pub(crate) flexing: bool,
}

impl<'a> ExecState<'a> {
    pub(crate) fn new(stack: ArgumentsStack<'a>, builder: Builder<'a>) -> Self {
        Self {
            stack,
            aux: AuxStack::default(),
            builder,
            advance: Advance::default(),
            x: 0.0,
            y: 0.0,
            flex: [0.0; FLEX_CAPACITY],
            flex_len: 0,
            flexing: false,
        }
    }

    // A move during a flex sequence records the new pen position instead
    // of starting a contour.
    fn moved(&mut self) {
        if self.flexing {
            if self.flex_len + 2 <= FLEX_CAPACITY {
                self.flex[self.flex_len] = self.x;
                self.flex[self.flex_len + 1] = self.y;
                self.flex_len += 2;
            } else {
                debug!("flex point buffer is full, dropping ({}, {})", self.x, self.y);
            }
        } else {
            self.builder.move_to(self.x, self.y);
        }
    }

    pub(crate) fn rmove_to(&mut self) -> Result<(), CharstringError> {
        let dy = self.stack.pop()?;
        let dx = self.stack.pop()?;

        self.x += dx;
        self.y += dy;
        self.moved();
        self.stack.clear();

        Ok(())
    }

    pub(crate) fn hmove_to(&mut self) -> Result<(), CharstringError> {
        self.x += self.stack.pop()?;
        self.moved();
        self.stack.clear();

        Ok(())
    }

    pub(crate) fn vmove_to(&mut self) -> Result<(), CharstringError> {
        self.y += self.stack.pop()?;
        self.moved();
        self.stack.clear();

        Ok(())
    }

    pub(crate) fn rline_to(&mut self) -> Result<(), CharstringError> {
        let dy = self.stack.pop()?;
        let dx = self.stack.pop()?;

        self.x += dx;
        self.y += dy;
        self.builder.line_to(self.x, self.y);
        self.stack.clear();

        Ok(())
    }

    pub(crate) fn hline_to(&mut self) -> Result<(), CharstringError> {
        self.x += self.stack.pop()?;
        self.builder.line_to(self.x, self.y);
        self.stack.clear();

        Ok(())
    }

    pub(crate) fn vline_to(&mut self) -> Result<(), CharstringError> {
        self.y += self.stack.pop()?;
        self.builder.line_to(self.x, self.y);
        self.stack.clear();

        Ok(())
    }

    pub(crate) fn rrcurve_to(&mut self) -> Result<(), CharstringError> {
        let dy3 = self.stack.pop()?;
        let dx3 = self.stack.pop()?;
        let dy2 = self.stack.pop()?;
        let dx2 = self.stack.pop()?;
        let dy1 = self.stack.pop()?;
        let dx1 = self.stack.pop()?;

        let x1 = self.x + dx1;
        let y1 = self.y + dy1;
        let x2 = x1 + dx2;
        let y2 = y1 + dy2;
        self.x = x2 + dx3;
        self.y = y2 + dy3;

        self.builder.curve_to(x1, y1, x2, y2, self.x, self.y);
        self.stack.clear();

        Ok(())
    }

    /// `dy1 dx2 dy2 dx3 vhcurveto`: starts vertical, ends horizontal.
    pub(crate) fn vhcurve_to(&mut self) -> Result<(), CharstringError> {
        let dx3 = self.stack.pop()?;
        let dy2 = self.stack.pop()?;
        let dx2 = self.stack.pop()?;
        let dy1 = self.stack.pop()?;

        let x1 = self.x;
        let y1 = self.y + dy1;
        let x2 = x1 + dx2;
        let y2 = y1 + dy2;
        self.x = x2 + dx3;
        self.y = y2;

        self.builder.curve_to(x1, y1, x2, y2, self.x, self.y);
        self.stack.clear();

        Ok(())
    }

    /// `dx1 dx2 dy2 dy3 hvcurveto`: starts horizontal, ends vertical.
    pub(crate) fn hvcurve_to(&mut self) -> Result<(), CharstringError> {
        let dy3 = self.stack.pop()?;
        let dy2 = self.stack.pop()?;
        let dx2 = self.stack.pop()?;
        let dx1 = self.stack.pop()?;

        let x1 = self.x + dx1;
        let y1 = self.y;
        let x2 = x1 + dx2;
        let y2 = y1 + dy2;
        self.x = x2;
        self.y = y2 + dy3;

        self.builder.curve_to(x1, y1, x2, y2, self.x, self.y);
        self.stack.clear();

        Ok(())
    }

    pub(crate) fn close_path(&mut self) {
        self.builder.close();
        self.stack.clear();
    }

    pub(crate) fn hsbw(&mut self) -> Result<(), CharstringError> {
        let wx = self.stack.pop()?;
        let sbx = self.stack.pop()?;

        self.advance = Advance { x: wx, y: 0.0 };
        self.x = sbx;
        self.y = 0.0;
        self.stack.clear();

        Ok(())
    }

    pub(crate) fn sbw(&mut self) -> Result<(), CharstringError> {
        let wy = self.stack.pop()?;
        let wx = self.stack.pop()?;
        let sby = self.stack.pop()?;
        let sbx = self.stack.pop()?;

        self.advance = Advance { x: wx, y: wy };
        self.x = sbx;
        self.y = sby;
        self.stack.clear();

        Ok(())
    }

    pub(crate) fn div(&mut self) -> Result<(), CharstringError> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        self.stack.push(a / b)?;

        Ok(())
    }

    pub(crate) fn set_current_point(&mut self) -> Result<(), CharstringError> {
        self.y = self.stack.pop()?;
        self.x = self.stack.pop()?;
        self.builder.move_to(self.x, self.y);
        self.stack.clear();

        Ok(())
    }

    pub(crate) fn call_other_subr(&mut self) -> Result<(), CharstringError> {
        let number = self.stack.pop()? as i32;
        let count = self.stack.pop()? as i32;

        match number {
            // Flex also reaches the interpreter through this channel
            // when a font calls it directly: keep the end point for the
            // `pop pop setcurrentpoint` that follows and drop the
            // reference point.
            0 => {
                let a = self.stack.pop()?;
                self.aux.push(a);
                let b = self.stack.pop()?;
                self.aux.push(b);
                self.stack.pop()?;
            }
            // Hint replacement: answer with the subroutine number.
            3 => self.aux.push(3.0),
            _ => {
                for _ in 0..count.max(0) {
                    let v = self.stack.pop()?;
                    self.aux.push(v);
                }
            }
        }

        Ok(())
    }

    pub(crate) fn pop_aux(&mut self) -> Result<(), CharstringError> {
        let v = self.aux.pop();
        self.stack.push(v)?;

        Ok(())
    }

    pub(crate) fn begin_flex(&mut self) {
        self.flexing = true;
        self.flex_len = 0;
        self.stack.clear();
    }

    /// Ends a flex sequence, emitting the two recorded curves.
    ///
    /// A sequence that did not record exactly seven points is dropped
    /// without error; the outline simply misses that piece.
    pub(crate) fn end_flex(&mut self) {
        if self.flex_len == FLEX_SEQUENCE_LEN {
            let f = &self.flex;
            self.builder
                .curve_to(f[2], f[3], f[4], f[5], f[6], f[7]);
            self.builder
                .curve_to(f[8], f[9], f[10], f[11], f[12], f[13]);
        } else {
            debug!(
                "flex sequence with {} coordinates instead of {FLEX_SEQUENCE_LEN}, dropping",
                self.flex_len
            );
        }

        self.flexing = false;
        self.flex_len = 0;
        self.stack.clear();
    }

    pub(crate) fn push_int1(&mut self, op: u8) -> Result<(), CharstringError> {
        self.stack.push(f32::from(i16::from(op) - 139))
    }

    pub(crate) fn push_int2(&mut self, op: u8, s: &mut Stream<'_>) -> Result<(), CharstringError> {
        let b1 = s.read_byte().ok_or(CharstringError::ReadOutOfBounds)?;
        let n = (i16::from(op) - 247) * 256 + i16::from(b1) + 108;
        self.stack.push(f32::from(n))
    }

    pub(crate) fn push_int3(&mut self, op: u8, s: &mut Stream<'_>) -> Result<(), CharstringError> {
        let b1 = s.read_byte().ok_or(CharstringError::ReadOutOfBounds)?;
        let n = -(i16::from(op) - 251) * 256 - i16::from(b1) - 108;
        self.stack.push(f32::from(n))
    }

    pub(crate) fn push_int4(&mut self, s: &mut Stream<'_>) -> Result<(), CharstringError> {
        let b = s.read_bytes(4).ok_or(CharstringError::ReadOutOfBounds)?;
        let n = i32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        self.stack.push(n as f32)
    }
}
