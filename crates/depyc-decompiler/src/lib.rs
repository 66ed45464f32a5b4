//! depyc-decompiler: chunk → AST
//!
//! Simulation de pile sur la suite d’ops :
//! - `LOAD_CONST` / `LOAD_NAME` empilent des expressions
//! - `CALL`, `BINARY_OP`, `UNARY_OP` les combinent
//! - `STORE_NAME` → `Assign`, `POP_TOP` → `Expr`, `NOP` → `Pass`
//! - l’épilogue `LOAD_CONST None; RETURN_VALUE` clôt le module
//!
//! La ligne d’une instruction est celle de son premier op (`0` si le chunk
//! est `STRIPPED`).
//!
//! ```
//! let chunk = depyc_compiler::compile_source("x = 1 + 2\n", "m.py").unwrap();
//! let module = depyc_decompiler::reconstruct(&chunk).unwrap();
//! assert_eq!(depyc_ast::unparse(&module), "x = 1 + 2\n");
//! ```

#![deny(missing_docs)]

use depyc_ast as ast;
use depyc_core::bytecode::{BinOpKind, Chunk, CodeFlags, ConstValue, Op, UnOpKind};
use depyc_core::helpers::has_module_epilogue;

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Échec de reconstruction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconstructError {
    /// Un op consomme plus de valeurs que la pile n’en contient.
    #[error("stack underflow at offset {pc} ({op})")]
    StackUnderflow {
        /// Offset de l’op.
        pc: usize,
        /// Mnémonique.
        op: &'static str,
    },
    /// Des valeurs restent sur la pile à la fin d’une instruction.
    #[error("{count} value(s) left on the stack at offset {pc}")]
    LeftoverValues {
        /// Offset où l’instruction aurait dû être close.
        pc: usize,
        /// Valeurs en trop.
        count: usize,
    },
    /// Le code ne se termine pas par `LOAD_CONST None; RETURN_VALUE`.
    #[error("missing module epilogue (LOAD_CONST None; RETURN_VALUE)")]
    MissingEpilogue,
    /// Op hors du sous-ensemble produit pour un module.
    #[error("unexpected {op} at offset {pc}")]
    UnexpectedOp {
        /// Offset.
        pc: usize,
        /// Mnémonique.
        op: &'static str,
    },
    /// Index de constante ou de nom hors table.
    #[error("{table} index {index} out of range at offset {pc}")]
    BadIndex {
        /// `"const"` ou `"name"`.
        table: &'static str,
        /// Index fautif.
        index: u32,
        /// Offset.
        pc: usize,
    },
}

/* ─────────────────────────── Reconstruction ─────────────────────────── */

/// Reconstruit le module dont `chunk` est le code.
///
/// # Errors
/// Voir [`ReconstructError`].
pub fn reconstruct(chunk: &Chunk) -> Result<ast::Module, ReconstructError> {
    if !has_module_epilogue(chunk) {
        return Err(ReconstructError::MissingEpilogue);
    }
    let body_len = chunk.ops.len() - 2;
    let mut sim = Simulator { chunk, stack: Vec::new(), stmt_start: 0, body: Vec::new() };

    for (pc, op) in chunk.ops[..body_len].iter().enumerate() {
        sim.step(pc, *op)?;
    }
    if !sim.stack.is_empty() {
        return Err(ReconstructError::LeftoverValues { pc: body_len, count: sim.stack.len() });
    }

    log::debug!("reconstructed {} statement(s) from {} op(s)", sim.body.len(), chunk.ops.len());
    Ok(ast::Module::new(sim.body))
}

struct Simulator<'c> {
    chunk: &'c Chunk,
    stack: Vec<ast::Expr>,
    /// Offset du premier op de l’instruction en cours.
    stmt_start: usize,
    body: Vec<ast::Stmt>,
}

impl Simulator<'_> {
    fn step(&mut self, pc: usize, op: Op) -> Result<(), ReconstructError> {
        if self.stack.is_empty() {
            self.stmt_start = pc;
        }
        match op {
            Op::Nop => {
                if self.stack.is_empty() {
                    self.close(ast::StmtKind::Pass);
                }
            }
            Op::LoadConst(ix) => {
                let c = self.chunk.consts.get(ix).ok_or(ReconstructError::BadIndex { table: "const", index: ix, pc })?;
                self.stack.push(ast::Expr::Constant(constant(c)));
            }
            Op::LoadName(ix) => {
                let n = name(self.chunk, ix, pc)?;
                self.stack.push(ast::Expr::name(n));
            }
            Op::Call(argc) => {
                let argc = argc as usize;
                let mut args = self.pop_n(argc.saturating_add(1), pc, op)?;
                let func = args.remove(0);
                self.stack.push(ast::Expr::call(func, args));
            }
            Op::Binary(kind) => {
                let mut xs = self.pop_n(2, pc, op)?;
                let (left, right) = (xs.remove(0), xs.remove(0));
                self.stack.push(ast::Expr::binary(left, binary(kind), right));
            }
            Op::Unary(kind) => {
                let operand = self.pop(pc, op)?;
                self.stack.push(ast::Expr::unary(unary(kind), operand));
            }
            Op::StoreName(ix) => {
                let value = self.pop(pc, op)?;
                let target = name(self.chunk, ix, pc)?.to_owned();
                self.finish(pc, ast::StmtKind::Assign { target, value })?;
            }
            Op::PopTop => {
                let e = self.pop(pc, op)?;
                self.finish(pc, ast::StmtKind::Expr(e))?;
            }
            Op::ReturnValue => return Err(ReconstructError::UnexpectedOp { pc, op: op.mnemonic() }),
        }
        Ok(())
    }

    fn pop(&mut self, pc: usize, op: Op) -> Result<ast::Expr, ReconstructError> {
        self.stack.pop().ok_or(ReconstructError::StackUnderflow { pc, op: op.mnemonic() })
    }

    fn pop_n(&mut self, n: usize, pc: usize, op: Op) -> Result<Vec<ast::Expr>, ReconstructError> {
        if self.stack.len() < n {
            return Err(ReconstructError::StackUnderflow { pc, op: op.mnemonic() });
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    /// Clôt l’instruction courante ; la pile doit être vide.
    fn finish(&mut self, pc: usize, kind: ast::StmtKind) -> Result<(), ReconstructError> {
        if !self.stack.is_empty() {
            return Err(ReconstructError::LeftoverValues { pc, count: self.stack.len() });
        }
        self.close(kind);
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn close(&mut self, kind: ast::StmtKind) {
        let line = if self.chunk.flags().contains(CodeFlags::STRIPPED) {
            0
        } else {
            self.chunk.lines.line_for_pc(self.stmt_start as u32)
        };
        self.body.push(ast::Stmt::new(kind, line));
    }
}

fn name(chunk: &Chunk, ix: u32, pc: usize) -> Result<&str, ReconstructError> {
    chunk.names.get(ix).ok_or(ReconstructError::BadIndex { table: "name", index: ix, pc })
}

fn constant(c: &ConstValue) -> ast::Constant {
    match c {
        ConstValue::None => ast::Constant::None,
        ConstValue::Bool(b) => ast::Constant::Bool(*b),
        ConstValue::Int(i) => ast::Constant::Int(*i),
        ConstValue::Float(f) => ast::Constant::Float(*f),
        ConstValue::Str(s) => ast::Constant::Str(s.clone()),
    }
}

const fn binary(kind: BinOpKind) -> ast::BinaryOp {
    match kind {
        BinOpKind::Add => ast::BinaryOp::Add,
        BinOpKind::Sub => ast::BinaryOp::Sub,
        BinOpKind::Mul => ast::BinaryOp::Mul,
        BinOpKind::Div => ast::BinaryOp::Div,
        BinOpKind::Mod => ast::BinaryOp::Mod,
    }
}

const fn unary(kind: UnOpKind) -> ast::UnaryOp {
    match kind {
        UnOpKind::Neg => ast::UnaryOp::Neg,
        UnOpKind::Not => ast::UnaryOp::Not,
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */
