//! Rendu AST → texte source (une instruction par ligne, parenthèses minimales).

use std::fmt::Write;

use crate::{Constant, Expr, Module, StmtKind, UnaryOp};

/// Précédence d’un atome (nom, constante positive, appel).
const ATOM: u8 = 4;

/// Littéral qui déborde en `inf` à la relecture.
const INF_REPR: &str = "1e309";

/// Rend `module` en source, une instruction par ligne (`\n` final).
pub fn unparse(module: &Module) -> String {
    let mut out = String::new();
    for stmt in &module.body {
        match &stmt.kind {
            StmtKind::Expr(e) => write_expr(&mut out, e, 0),
            StmtKind::Assign { target, value } => {
                out.push_str(target);
                out.push_str(" = ");
                write_expr(&mut out, value, 0);
            }
            StmtKind::Pass => out.push_str("pass"),
        }
        out.push('\n');
    }
    out
}

/// Rend une expression seule.
pub fn unparse_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, 0);
    out
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::BinOp { op, .. } => op.precedence(),
        Expr::UnaryOp { .. } => UnaryOp::PRECEDENCE,
        // rendus avec un `-` de tête : se comportent comme un préfixe
        Expr::Constant(Constant::Int(i)) if *i < 0 => UnaryOp::PRECEDENCE,
        Expr::Constant(Constant::Float(f)) if f.is_sign_negative() && !f.is_nan() => UnaryOp::PRECEDENCE,
        _ => ATOM,
    }
}

fn write_expr(out: &mut String, expr: &Expr, min_prec: u8) {
    let prec = precedence(expr);
    let wrap = prec < min_prec;
    if wrap {
        out.push('(');
    }
    match expr {
        Expr::Constant(c) => out.push_str(&constant_repr(c)),
        Expr::Name(n) => out.push_str(n),
        Expr::Call { func, args } => {
            write_expr(out, func, ATOM);
            out.push('(');
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, a, 0);
            }
            out.push(')');
        }
        Expr::BinOp { left, op, right } => {
            write_expr(out, left, prec);
            let _ = write!(out, " {} ", op.symbol());
            write_expr(out, right, prec + 1);
        }
        Expr::UnaryOp { op, operand } => {
            match op {
                UnaryOp::Neg => out.push('-'),
                UnaryOp::Not => out.push_str("not "),
            }
            write_expr(out, operand, UnaryOp::PRECEDENCE);
        }
    }
    if wrap {
        out.push(')');
    }
}

/// Représentation source d’une constante.
pub(crate) fn constant_repr(c: &Constant) -> String {
    match c {
        Constant::None => "None".into(),
        Constant::Bool(true) => "True".into(),
        Constant::Bool(false) => "False".into(),
        Constant::Int(i) => i.to_string(),
        Constant::Float(f) if f.is_nan() => format!("({INF_REPR} - {INF_REPR})"),
        Constant::Float(f) if f.is_infinite() => {
            if f.is_sign_negative() { format!("-{INF_REPR}") } else { INF_REPR.into() }
        }
        Constant::Float(f) => format!("{f:?}"),
        Constant::Str(s) => quote(s),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if u32::from(c) < 0x20 || c == '\x7f' => {
                let _ = write!(out, "\\x{:02x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
