//! Arbre indenté (deux espaces par niveau), un nœud par ligne.

use std::fmt::Write;

use crate::{unparse::constant_repr, Expr, Module, StmtKind};

/// Rend l’arbre de `module`.
///
/// ```text
/// Module
///   Assign x (line 1)
///     BinOp +
///       Constant 1
///       Name y
/// ```
pub fn dump(module: &Module) -> String {
    let mut out = String::from("Module\n");
    for stmt in &module.body {
        match &stmt.kind {
            StmtKind::Expr(e) => {
                let _ = writeln!(out, "  Expr (line {})", stmt.line);
                dump_expr(&mut out, e, 2);
            }
            StmtKind::Assign { target, value } => {
                let _ = writeln!(out, "  Assign {target} (line {})", stmt.line);
                dump_expr(&mut out, value, 2);
            }
            StmtKind::Pass => {
                let _ = writeln!(out, "  Pass (line {})", stmt.line);
            }
        }
    }
    out
}

fn dump_expr(out: &mut String, expr: &Expr, depth: usize) {
    let pad = "  ".repeat(depth);
    match expr {
        Expr::Constant(c) => {
            let _ = writeln!(out, "{pad}Constant {}", constant_repr(c));
        }
        Expr::Name(n) => {
            let _ = writeln!(out, "{pad}Name {n}");
        }
        Expr::Call { func, args } => {
            let _ = writeln!(out, "{pad}Call ({} arg{})", args.len(), if args.len() == 1 { "" } else { "s" });
            dump_expr(out, func, depth + 1);
            for a in args {
                dump_expr(out, a, depth + 1);
            }
        }
        Expr::BinOp { left, op, right } => {
            let _ = writeln!(out, "{pad}BinOp {}", op.symbol());
            dump_expr(out, left, depth + 1);
            dump_expr(out, right, depth + 1);
        }
        Expr::UnaryOp { op, operand } => {
            let _ = writeln!(out, "{pad}UnaryOp {}", op.symbol());
            dump_expr(out, operand, depth + 1);
        }
    }
}
