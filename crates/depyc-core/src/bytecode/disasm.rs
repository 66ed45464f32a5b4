//! Textual opcode listing of a chunk.

use crate::bytecode::chunk::{Chunk, ConstValue, Op};

#[cfg(not(feature = "std"))]
use alloc::{format, string::String, vec::Vec};
#[cfg(feature = "std")]
use std::{format, string::String, vec::Vec};

use core::fmt::Write;

const PREVIEW_MAX: usize = 64;

/// Produce a multi-line, human readable disassembly with metadata.
///
/// Each op is rendered as `line  offset OPNAME  arg (preview)`; the line
/// column is only filled on the first op of a source line.
pub fn disassemble(chunk: &Chunk, title: &str) -> String {
    let mut out = String::new();
    let flags: Vec<&str> = chunk.flags().iter_names().map(|(name, _)| name).collect();
    let _ = writeln!(
        out,
        "== {title} == (version={}, flags={}, consts={}, names={}, ops={})",
        chunk.version(),
        if flags.is_empty() { String::from("-") } else { flags.join("|") },
        chunk.consts.len(),
        chunk.names.len(),
        chunk.ops.len()
    );
    if let Some(file) = &chunk.filename {
        let _ = writeln!(out, ";; filename: {file}");
    }
    let _ = writeln!(out);

    let mut last_line = None;
    for (pc, op) in chunk.ops.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let line = chunk.lines.line_for_pc(pc as u32);
        let line_col = if chunk.lines.is_empty() || last_line == Some(line) {
            String::new()
        } else {
            format!("{line}")
        };
        last_line = Some(line);

        let mut row = format!("{line_col:>4} {pc:>6} {:<20}", op.mnemonic());
        if let Some(arg) = op.arg() {
            let _ = write!(row, " {arg:>4}");
            if let Some(p) = preview(chunk, op) {
                let _ = write!(row, " ({p})");
            }
        }
        let _ = writeln!(out, "{}", row.trim_end());
    }

    out
}

fn preview(chunk: &Chunk, op: &Op) -> Option<String> {
    match *op {
        Op::LoadConst(ix) => chunk.consts.get(ix).map(show_const),
        Op::LoadName(ix) | Op::StoreName(ix) => chunk.names.get(ix).map(String::from),
        Op::Binary(kind) => Some(String::from(kind.symbol())),
        Op::Unary(kind) => Some(String::from(kind.symbol())),
        Op::Nop | Op::Call(_) | Op::PopTop | Op::ReturnValue => None,
    }
}

fn show_const(value: &ConstValue) -> String {
    match value {
        ConstValue::None => "None".into(),
        ConstValue::Bool(true) => "True".into(),
        ConstValue::Bool(false) => "False".into(),
        ConstValue::Int(i) => format!("{i}"),
        ConstValue::Float(f) if f.is_nan() => "nan".into(),
        ConstValue::Float(f) if f.is_infinite() => if f.is_sign_negative() { "-inf".into() } else { "inf".into() },
        ConstValue::Float(f) => format!("{f:?}"),
        ConstValue::Str(s) => {
            let mut quoted = String::from("'");
            for (n, c) in s.chars().enumerate() {
                if n == PREVIEW_MAX {
                    quoted.push_str("...");
                    break;
                }
                match c {
                    '\'' => quoted.push_str("\\'"),
                    '\\' => quoted.push_str("\\\\"),
                    '\n' => quoted.push_str("\\n"),
                    '\t' => quoted.push_str("\\t"),
                    '\r' => quoted.push_str("\\r"),
                    c if c.is_control() => { let _ = write!(quoted, "\\x{:02x}", u32::from(c)); }
                    c => quoted.push(c),
                }
            }
            quoted.push('\'');
            quoted
        }
    }
}
