//! The Type 1 charstring interpreter.

use crate::argstack::ArgumentsStack;
use crate::type1::FontProgram;
use crate::type1::operator::{flex_marker, sb_operator, tb_operator};
use crate::type1::state::ExecState;
use crate::type1::stream::Stream;
use crate::{Advance, Builder, CharstringError, OutlineBuilder};
use log::warn;

/// Calls nested deeper than this are skipped instead of executed.
const RECURSION_LIMIT: u8 = 10;

const MAX_OPERANDS: usize = 48;

macro_rules! trace_op {
    ($p:expr, $op:expr) => {
        log::trace!("{}: {}", $op, $p.stack.dump());
    };
}

struct ExecCtx<'a> {
    program: &'a FontProgram,
    /// Set once `endchar` ran, at any call depth.
    finished: bool,
}

/// Runs a decrypted charstring against `builder`.
///
/// `offset` translates every emitted segment; `seac` uses it to place
/// accent components.
pub(crate) fn run(
    program: &FontProgram,
    char_string: &[u8],
    builder: &mut dyn OutlineBuilder,
    offset: (f32, f32),
    depth: u8,
) -> Result<Advance, CharstringError> {
    let mut ctx = ExecCtx {
        program,
        finished: false,
    };
    let mut data = [0.0; MAX_OPERANDS];
    let mut state = ExecState::new(
        ArgumentsStack {
            data: &mut data,
            len: 0,
        },
        Builder {
            builder,
            dx: offset.0,
            dy: offset.1,
        },
    );

    execute(&mut ctx, char_string, depth, &mut state)?;

    Ok(state.advance)
}

fn execute(
    ctx: &mut ExecCtx<'_>,
    char_string: &[u8],
    depth: u8,
    p: &mut ExecState<'_>,
) -> Result<(), CharstringError> {
    let mut s = Stream::new(char_string);

    while !s.at_end() {
        let op = s.read_byte().ok_or(CharstringError::ReadOutOfBounds)?;

        match op {
            sb_operator::HORIZONTAL_STEM | sb_operator::VERTICAL_STEM => {
                trace_op!(p, "h/vstem");
                p.stack.clear();
            }
            sb_operator::VERTICAL_MOVE_TO => {
                trace_op!(p, "vmoveto");
                p.vmove_to()?;
            }
            sb_operator::LINE_TO => {
                trace_op!(p, "rlineto");
                p.rline_to()?;
            }
            sb_operator::HORIZONTAL_LINE_TO => {
                trace_op!(p, "hlineto");
                p.hline_to()?;
            }
            sb_operator::VERTICAL_LINE_TO => {
                trace_op!(p, "vlineto");
                p.vline_to()?;
            }
            sb_operator::CURVE_TO => {
                trace_op!(p, "rrcurveto");
                p.rrcurve_to()?;
            }
            sb_operator::CLOSE_PATH => {
                trace_op!(p, "closepath");
                p.close_path();
            }
            sb_operator::CALL_SUBR => {
                trace_op!(p, "callsubr");
                call_subr(ctx, depth, p)?;
            }
            sb_operator::RETURN => {
                trace_op!(p, "return");
                break;
            }
            sb_operator::ESCAPE => {
                let op2 = s.read_byte().ok_or(CharstringError::ReadOutOfBounds)?;

                match op2 {
                    tb_operator::DOTSECTION
                    | tb_operator::VSTEM3
                    | tb_operator::HSTEM3 => {
                        trace_op!(p, "hint");
                        p.stack.clear();
                    }
                    tb_operator::SEAC => {
                        trace_op!(p, "seac");
                        seac(ctx, depth, p)?;
                    }
                    tb_operator::SBW => {
                        trace_op!(p, "sbw");
                        p.sbw()?;
                    }
                    tb_operator::DIV => {
                        trace_op!(p, "div");
                        p.div()?;
                    }
                    tb_operator::CALL_OTHER_SUBR => {
                        trace_op!(p, "callothersubr");
                        p.call_other_subr()?;
                    }
                    tb_operator::POP => {
                        trace_op!(p, "pop");
                        p.pop_aux()?;
                    }
                    tb_operator::SET_CURRENT_POINT => {
                        trace_op!(p, "setcurrentpoint");
                        p.set_current_point()?;
                    }
                    _ => return Err(CharstringError::InvalidOperator(op2)),
                }
            }
            sb_operator::HSBW => {
                trace_op!(p, "hsbw");
                p.hsbw()?;
            }
            sb_operator::ENDCHAR => {
                trace_op!(p, "endchar");
                ctx.finished = true;
                break;
            }
            sb_operator::MOVE_TO => {
                trace_op!(p, "rmoveto");
                p.rmove_to()?;
            }
            sb_operator::HORIZONTAL_MOVE_TO => {
                trace_op!(p, "hmoveto");
                p.hmove_to()?;
            }
            sb_operator::VH_CURVE_TO => {
                trace_op!(p, "vhcurveto");
                p.vhcurve_to()?;
            }
            sb_operator::HV_CURVE_TO => {
                trace_op!(p, "hvcurveto");
                p.hvcurve_to()?;
            }
            32..=246 => p.push_int1(op)?,
            247..=250 => p.push_int2(op, &mut s)?,
            251..=254 => p.push_int3(op, &mut s)?,
            255 => p.push_int4(&mut s)?,
            _ => return Err(CharstringError::InvalidOperator(op)),
        }

        if ctx.finished {
            break;
        }
    }

    Ok(())
}

/// Dispatches `callsubr`, intercepting the reserved flex indices.
///
/// Index 1 opens a flex sequence and 0 closes it; index 2 is a no-op
/// while one is open. Outside of a flex sequence all three call the
/// subroutine of that number like any other index.
fn call_subr(
    ctx: &mut ExecCtx<'_>,
    depth: u8,
    p: &mut ExecState<'_>,
) -> Result<(), CharstringError> {
    let index = p.stack.pop()? as i32;

    if index == flex_marker::BEGIN {
        p.begin_flex();
        return Ok(());
    }

    if p.flexing && index == flex_marker::END {
        p.end_flex();
        return Ok(());
    }

    if p.flexing && index == flex_marker::PROGRESS {
        p.stack.clear();
        return Ok(());
    }

    if depth >= RECURSION_LIMIT {
        warn!("subroutine calls nested deeper than {RECURSION_LIMIT}, truncating the glyph");
        return Ok(());
    }

    let program = ctx.program;
    match program.subr(index) {
        Some(subr) => execute(ctx, subr, depth + 1, p),
        None => {
            warn!("call of missing subroutine {index}");
            Ok(())
        }
    }
}

/// Builds an accented glyph from its two components.
///
/// The base outline is emitted as-is, then the accent outline shifted by
/// the accent displacement. Both sub-runs keep their own advance, which
/// is discarded; the composite keeps the advance of the charstring that
/// invoked `seac`.
fn seac(
    ctx: &mut ExecCtx<'_>,
    depth: u8,
    p: &mut ExecState<'_>,
) -> Result<(), CharstringError> {
    let achar = p.stack.pop()? as u8;
    let bchar = p.stack.pop()? as u8;
    let ady = p.stack.pop()?;
    let adx = p.stack.pop()?;
    // The accent's own sidebearing already accounts for the horizontal
    // placement in well-formed fonts, so asb goes unused.
    let _asb = p.stack.pop().unwrap_or(0.0);
    p.stack.clear();

    let program = ctx.program;

    let base = program
        .glyph_name(bchar)
        .and_then(|name| program.charstring(name))
        .ok_or(CharstringError::InvalidSeacCode)?;
    let accent = program
        .glyph_name(achar)
        .and_then(|name| program.charstring(name))
        .ok_or(CharstringError::InvalidSeacCode)?;

    if depth >= RECURSION_LIMIT {
        warn!("seac nested deeper than {RECURSION_LIMIT}, truncating the glyph");
        return Ok(());
    }

    // With an invertible font matrix the horizontal shift is redundant
    // with the accent's sidebearing; without one there is nothing to
    // undo it with, so apply the full displacement.
    let (dx, dy) = if program.matrix().is_invertible() {
        (0.0, ady)
    } else {
        (adx, ady)
    };

    let base_offset = (p.builder.dx, p.builder.dy);
    let accent_offset = (p.builder.dx + dx, p.builder.dy + dy);

    run(program, &base, &mut *p.builder.builder, base_offset, depth + 1)?;
    run(
        program,
        &accent,
        &mut *p.builder.builder,
        accent_offset,
        depth + 1,
    )?;

    ctx.finished = true;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Matrix;
    use crate::type1::EncodingTable;
    use std::collections::HashMap;

    #[derive(Debug, PartialEq)]
    enum Seg {
        Move(f32, f32),
        Line(f32, f32),
        Curve([f32; 6]),
        Close,
    }

    #[derive(Default)]
    struct Sink(Vec<Seg>);

    impl OutlineBuilder for Sink {
        fn move_to(&mut self, x: f32, y: f32) {
            self.0.push(Seg::Move(x, y));
        }

        fn line_to(&mut self, x: f32, y: f32) {
            self.0.push(Seg::Line(x, y));
        }

        fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
            self.0.push(Seg::Curve([x1, y1, x2, y2, x, y]));
        }

        fn close(&mut self) {
            self.0.push(Seg::Close);
        }
    }

    fn program(
        charstrings: Vec<(&str, Vec<u8>)>,
        subrs: Vec<Option<Vec<u8>>>,
    ) -> FontProgram {
        FontProgram {
            matrix: Matrix::default(),
            encoding: EncodingTable::Standard,
            len_iv: 0,
            use_decryption: false,
            subrs,
            charstrings: charstrings
                .into_iter()
                .map(|(name, cs)| (name.to_owned(), cs))
                .collect(),
        }
    }

    fn interpret(cs: &[u8], subrs: Vec<Option<Vec<u8>>>) -> (Vec<Seg>, Advance) {
        let program = program(vec![("g", cs.to_vec())], subrs);
        let mut sink = Sink::default();
        let advance = program.outline("g", &mut sink).unwrap();

        (sink.0, advance)
    }

    /// A small number as a charstring push.
    fn num(v: i16) -> u8 {
        u8::try_from(v + 139).unwrap()
    }

    #[test]
    fn advance_without_segments() {
        // 0 600 hsbw endchar
        let (segs, advance) = interpret(&[num(0), 248, 236, 13, 14], vec![]);

        assert_eq!(advance, Advance { x: 600.0, y: 0.0 });
        assert!(segs.is_empty());
    }

    #[test]
    fn sidebearing_offsets_the_pen() {
        // 50 600 hsbw 0 100 rmoveto 10 0 rlineto closepath endchar
        let cs = [
            num(50), 248, 236, 13,
            num(0), num(100), 21,
            num(10), num(0), 5,
            9, 14,
        ];
        let (segs, advance) = interpret(&cs, vec![]);

        assert_eq!(
            segs,
            vec![Seg::Move(50.0, 100.0), Seg::Line(60.0, 100.0), Seg::Close]
        );
        assert_eq!(advance.x, 600.0);
    }

    #[test]
    fn vertical_advance() {
        // 10 20 0 800 sbw endchar
        let cs = [num(10), num(20), num(0), 249, 180, 12, 7, 14];
        let (segs, advance) = interpret(&cs, vec![]);

        assert!(segs.is_empty());
        assert_eq!(advance, Advance { x: 0.0, y: 800.0 });
    }

    #[test]
    fn curve_operators() {
        // 0 100 hsbw
        // 10 10 20 0 30 -10 rrcurveto
        // 10 20 30 40 vhcurveto
        // 10 20 30 40 hvcurveto
        // endchar
        let cs = [
            num(0), num(100), 13,
            num(10), num(10), num(20), num(0), num(30), num(-10), 8,
            num(10), num(20), num(30), num(40), 30,
            num(10), num(20), num(30), num(40), 31,
            14,
        ];
        let (segs, _) = interpret(&cs, vec![]);

        assert_eq!(
            segs,
            vec![
                Seg::Curve([10.0, 10.0, 30.0, 10.0, 60.0, 0.0]),
                Seg::Curve([60.0, 10.0, 80.0, 40.0, 120.0, 40.0]),
                Seg::Curve([130.0, 40.0, 150.0, 70.0, 150.0, 110.0]),
            ]
        );
    }

    #[test]
    fn division() {
        // 0 100 hsbw 20 10 2 div rmoveto endchar => rmoveto(20, 5)
        let cs = [num(0), num(100), 13, num(20), num(10), num(2), 12, 12, 21, 14];
        let (segs, _) = interpret(&cs, vec![]);

        assert_eq!(segs, vec![Seg::Move(20.0, 5.0)]);
    }

    #[test]
    fn flex_emits_two_curves() {
        // Seven rmoveto/hmoveto calls between the begin and end markers
        // record the reference point and six control points.
        let mut cs = vec![num(0), num(100), 13];
        cs.extend([num(1), 10]); // 1 callsubr: begin
        for _ in 0..7 {
            cs.extend([num(10), num(10), 21]); // 10 10 rmoveto
        }
        cs.extend([num(0), 10]); // 0 callsubr: end
        cs.push(14);

        let (segs, _) = interpret(&cs, vec![]);

        assert_eq!(
            segs,
            vec![
                Seg::Curve([20.0, 20.0, 30.0, 30.0, 40.0, 40.0]),
                Seg::Curve([50.0, 50.0, 60.0, 60.0, 70.0, 70.0]),
            ]
        );
    }

    #[test]
    fn short_flex_is_dropped() {
        // Six recorded points instead of seven.
        let mut cs = vec![num(0), num(100), 13];
        cs.extend([num(1), 10]);
        for _ in 0..6 {
            cs.extend([num(10), num(10), 21]);
        }
        cs.extend([num(0), 10]);
        // Interpretation continues normally afterwards.
        cs.extend([num(5), num(0), 5, 14]); // 5 0 rlineto

        let (segs, _) = interpret(&cs, vec![]);

        assert_eq!(segs, vec![Seg::Line(65.0, 60.0)]);
    }

    #[test]
    fn overlong_flex_is_dropped() {
        // Eight recorded points fill the buffer past the expected
        // seven; the sequence is dropped without error.
        let mut cs = vec![num(0), num(100), 13];
        cs.extend([num(1), 10]);
        for _ in 0..8 {
            cs.extend([num(10), num(10), 21]);
        }
        cs.extend([num(0), 10, 14]);

        let (segs, _) = interpret(&cs, vec![]);

        assert!(segs.is_empty());
    }

    #[test]
    fn flex_progress_marker_is_inert_while_flexing() {
        let mut cs = vec![num(0), num(100), 13];
        cs.extend([num(1), 10]);
        cs.extend([num(2), 10]); // 2 callsubr: ignored
        for _ in 0..7 {
            cs.extend([num(10), num(10), 21]);
        }
        cs.extend([num(0), 10]);
        cs.push(14);

        let (segs, _) = interpret(&cs, vec![]);
        assert_eq!(segs.len(), 2);
    }

    #[test]
    fn subroutine_call_and_return() {
        // Subroutine 3 draws one line segment.
        let subr = vec![num(10), num(0), 5, 11];
        let cs = [num(0), num(100), 13, num(0), num(0), 21, num(3), 10, 14];

        let (segs, _) = interpret(&cs, vec![None, None, None, Some(subr)]);

        assert_eq!(segs, vec![Seg::Move(0.0, 0.0), Seg::Line(10.0, 0.0)]);
    }

    #[test]
    fn recursion_is_capped() {
        // Subroutine 3 draws a line and calls itself.
        let subr = vec![num(1), num(0), 5, num(3), 10];
        let cs = [num(0), num(100), 13, num(0), num(0), 21, num(3), 10, 14];

        let (segs, _) = interpret(&cs, vec![None, None, None, Some(subr)]);

        // One line per call level until the cap stops the recursion.
        assert_eq!(segs.len(), 1 + usize::from(RECURSION_LIMIT));
    }

    #[test]
    fn missing_subroutine_is_skipped() {
        let cs = [num(0), num(100), 13, num(7), 10, num(0), num(0), 21, 14];
        let (segs, advance) = interpret(&cs, vec![]);

        assert_eq!(segs, vec![Seg::Move(0.0, 0.0)]);
        assert_eq!(advance.x, 100.0);
    }

    #[test]
    fn endchar_inside_subroutine_ends_the_glyph() {
        let subr = vec![14];
        let cs = [num(0), num(100), 13, num(0), 10, num(0), num(0), 21];

        let (segs, _) = interpret(&cs, vec![Some(subr)]);

        // The rmoveto after the call never ran.
        assert!(segs.is_empty());
    }

    #[test]
    fn othersubr_roundtrip() {
        // 7 1 13 callothersubr pop hmoveto => the argument comes back.
        let cs = [
            num(0), num(100), 13,
            num(7), num(1), num(13), 12, 16,
            12, 17, 22, 14,
        ];
        let (segs, _) = interpret(&cs, vec![]);

        assert_eq!(segs, vec![Seg::Move(7.0, 0.0)]);
    }

    #[test]
    fn othersubr_zero_keeps_the_end_point() {
        // a b c 3 0 callothersubr pop pop => b then c.
        let cs = [
            num(0), num(100), 13,
            num(5), num(30), num(40), num(3), num(0), 12, 16,
            12, 17, 12, 17, 21, 14,
        ];
        let (segs, _) = interpret(&cs, vec![]);

        // The retained values come back in x-then-y order.
        assert_eq!(segs, vec![Seg::Move(30.0, 40.0)]);
    }

    #[test]
    fn seac_places_base_then_accent() {
        let base = vec![
            num(0), 248, 136, 13, // 0 500 hsbw
            num(10), num(0), 21, // 10 0 rmoveto
            num(5), num(0), 5, // 5 0 rlineto
            14,
        ];
        let accent = vec![
            num(0), num(100), 13,
            num(2), num(3), 21,
            14,
        ];
        // 0 250 300 65 194 seac (A + acute)
        let cs = vec![
            num(0), 248, 236, 13, // 0 600 hsbw
            num(0), 247, 142, 247, 192, num(65), 247, 86, 12, 6,
        ];

        let program = program(
            vec![("g", cs), ("A", base), ("acute", accent)],
            vec![],
        );
        let mut sink = Sink::default();
        let advance = program.outline("g", &mut sink).unwrap();

        assert_eq!(
            sink.0,
            vec![
                Seg::Move(10.0, 0.0),
                Seg::Line(15.0, 0.0),
                // Accent segments shifted by (0, ady): the default font
                // matrix is invertible, so adx is dropped.
                Seg::Move(2.0, 303.0),
            ]
        );
        // The composite keeps its own advance.
        assert_eq!(advance, Advance { x: 600.0, y: 0.0 });
    }

    #[test]
    fn seac_with_unknown_component_fails() {
        // bchar 1 has no name in the standard encoding.
        let cs = vec![num(0), num(100), 13, num(0), num(0), num(0), num(1), num(65), 12, 6];
        let program = program(vec![("g", cs)], vec![]);
        let mut sink = Sink::default();

        assert_eq!(
            program.outline("g", &mut sink),
            Err(CharstringError::InvalidSeacCode)
        );
    }

    #[test]
    fn invalid_operator_fails() {
        let program = program(vec![("g", vec![num(0), num(100), 13, 15])], vec![]);
        let mut sink = Sink::default();

        assert_eq!(
            program.outline("g", &mut sink),
            Err(CharstringError::InvalidOperator(15))
        );
    }

    #[test]
    fn unknown_glyph_name() {
        let program = program(vec![], vec![]);
        let mut sink = Sink::default();

        assert_eq!(
            program.outline("missing", &mut sink),
            Err(CharstringError::GlyphNotFound)
        );
    }

    #[test]
    fn operand_stack_overflow_is_fatal() {
        // One push past the 48-slot operand stack.
        let cs = vec![num(1); MAX_OPERANDS + 1];
        let program = program(vec![("g", cs)], vec![]);
        let mut sink = Sink::default();

        assert_eq!(
            program.outline("g", &mut sink),
            Err(CharstringError::StackOverflow)
        );
    }

    #[test]
    fn stack_underflow_is_fatal() {
        // rlineto with one operand.
        let program = program(vec![("g", vec![num(5), 5])], vec![]);
        let mut sink = Sink::default();

        assert_eq!(
            program.outline("g", &mut sink),
            Err(CharstringError::StackUnderflow)
        );
    }

    #[test]
    fn four_byte_integers() {
        // 255 <i32> pushes big values.
        let mut cs = vec![num(0), num(100), 13, 255];
        cs.extend(1000i32.to_be_bytes());
        cs.push(255);
        cs.extend((-2000i32).to_be_bytes());
        cs.extend([21, 14]); // rmoveto

        let (segs, _) = interpret(&cs, vec![]);
        assert_eq!(segs, vec![Seg::Move(1000.0, -2000.0)]);
    }
}
