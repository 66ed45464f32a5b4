// src/lib.rs
//! depyc Compiler - passes + émission de chunks
//!
//! - Entrée : texte source (via `depyc-parser`) ou `depyc_ast::Module`
//! - Sortie : `depyc_core::bytecode::Chunk`
//! - Diagnostics : erreurs/warnings collectés avec ligne/colonne
//! - Passes (trait `Pass`) + Backend (trait `Emitter`)
//! - [`ChunkMarshal`] : implémentation de `depyc_container::Marshal` pour les chunks
//!
//! Features :
//! - `serde` (pour sérialiser les options)
//! - `trace` (traces `log` du lexer/parser)
//!
//! API principale :
//! ```
//! use depyc_compiler::compile_source;
//!
//! let chunk = compile_source("print('hi')\n", "hello.py").unwrap();
//! assert_eq!(chunk.filename.as_deref(), Some("hello.py"));
//! assert!(depyc_core::helpers::has_module_epilogue(&chunk));
//! ```

#![deny(missing_docs)]

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use depyc_ast as ast;
use depyc_container::{CodeObject, ContainerError, ContainerResult, Marshal};
use depyc_core::bytecode::{BinOpKind, Chunk, CodeFlags, ConstValue, Op, UnOpKind};
use depyc_core::helpers::validate_chunk;
use depyc_core::SourceId;
use depyc_parser::{ParseError, Parser};

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// Nombre maximal d’arguments positionnels d’un appel.
pub const MAX_ARGS: usize = 255;

/// Options du compilateur
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompilerOptions {
    /// Nom de la source enregistré dans le chunk
    pub filename: Option<String>,
    /// Conserver la table des lignes (sinon chunk `STRIPPED`)
    pub embed_lines: bool,
    /// Replier les expressions constantes (marque le chunk `OPTIMIZED`)
    pub optimize: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self { Self { filename: None, embed_lines: true, optimize: false } }
}

impl CompilerOptions {
    /// Options par défaut pour la source `name`.
    pub fn for_file(name: impl Into<String>) -> Self { Self { filename: Some(name.into()), ..Self::default() } }
}

// ─────────────────────────────────────────────────────────────────────────────
/* Diagnostics */
// ─────────────────────────────────────────────────────────────────────────────

/// Gravité d’un diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Alerte
    Warning,
    /// Erreur bloquante
    Error,
}

/// Un diagnostic localisé (ligne/colonne 1-based, `0` si inconnue)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Gravité
    pub severity: Severity,
    /// Message humain
    pub message: String,
    /// Ligne
    pub line: u32,
    /// Colonne
    pub column: u32,
}

impl Diagnostic {
    /// Construit une erreur
    pub fn error(msg: impl Into<String>, line: u32) -> Self {
        Self { severity: Severity::Error, message: msg.into(), line, column: 0 }
    }
    /// Construit un warning
    pub fn warn(msg: impl Into<String>, line: u32) -> Self {
        Self { severity: Severity::Warning, message: msg.into(), line, column: 0 }
    }
    /// Vrai pour une erreur bloquante
    pub fn is_error(&self) -> bool { self.severity == Severity::Error }
}

impl From<ParseError> for Diagnostic {
    fn from(e: ParseError) -> Self {
        Self { severity: Severity::Error, message: e.message, line: e.line, column: e.column }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sev = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match (self.line, self.column) {
            (0, _) => write!(f, "{sev}: {}", self.message),
            (l, 0) => write!(f, "line {l}: {sev}: {}", self.message),
            (l, c) => write!(f, "line {l}, column {c}: {sev}: {}", self.message),
        }
    }
}

/// Erreur globale de compilation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{filename}: {}", summary(.diagnostics))]
pub struct CompileError {
    /// Source fautive
    pub filename: String,
    /// Diagnostics accumulés (au moins une erreur)
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileError {
    /// Première erreur bloquante.
    pub fn first_error(&self) -> Option<&Diagnostic> { self.diagnostics.iter().find(|d| d.is_error()) }
}

fn summary(diags: &[Diagnostic]) -> String {
    let errors: Vec<&Diagnostic> = diags.iter().filter(|d| d.is_error()).collect();
    match errors.as_slice() {
        [] => "compilation failed".into(),
        [one] => one.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more error(s))", rest.len()),
    }
}

type CompileResult<T> = core::result::Result<T, CompileError>;

// ─────────────────────────────────────────────────────────────────────────────
/* Contexte & Passes */
// ─────────────────────────────────────────────────────────────────────────────

/// Contexte mut du compilateur partagé entre passes
pub struct Ctx<'a> {
    /// Options
    pub opts: &'a CompilerOptions,
    /// Diagnostics accumulés
    pub diags: &'a mut Vec<Diagnostic>,
}

/// Trait générique d’une passe de compilation
pub trait Pass {
    /// Exécuter la passe sur le module
    ///
    /// # Errors
    /// Une passe peut interrompre la compilation ; les diagnostics
    /// ordinaires sont poussés dans `ctx.diags`.
    fn run(&mut self, ctx: &mut Ctx<'_>, module: &ast::Module) -> CompileResult<()>;
}

fn walk_expr(e: &ast::Expr, f: &mut impl FnMut(&ast::Expr)) {
    f(e);
    match e {
        ast::Expr::Constant(_) | ast::Expr::Name(_) => {}
        ast::Expr::Call { func, args } => {
            walk_expr(func, f);
            for a in args {
                walk_expr(a, f);
            }
        }
        ast::Expr::BinOp { left, right, .. } => {
            walk_expr(left, f);
            walk_expr(right, f);
        }
        ast::Expr::UnaryOp { operand, .. } => walk_expr(operand, f),
    }
}

const fn stmt_expr(s: &ast::Stmt) -> Option<&ast::Expr> {
    match &s.kind {
        ast::StmtKind::Expr(e) | ast::StmtKind::Assign { value: e, .. } => Some(e),
        ast::StmtKind::Pass => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
/* Passe : limites du format */
// ─────────────────────────────────────────────────────────────────────────────

struct CheckLimits;

impl Pass for CheckLimits {
    fn run(&mut self, ctx: &mut Ctx<'_>, module: &ast::Module) -> CompileResult<()> {
        for stmt in &module.body {
            let Some(e) = stmt_expr(stmt) else { continue };
            walk_expr(e, &mut |x| {
                if let ast::Expr::Call { args, .. } = x {
                    if args.len() > MAX_ARGS {
                        ctx.diags.push(Diagnostic::error(
                            format!("more than {MAX_ARGS} arguments ({})", args.len()),
                            stmt.line,
                        ));
                    }
                }
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
/* Passe : avertissements */
// ─────────────────────────────────────────────────────────────────────────────

struct Lint;

impl Pass for Lint {
    fn run(&mut self, ctx: &mut Ctx<'_>, module: &ast::Module) -> CompileResult<()> {
        for stmt in &module.body {
            if let ast::StmtKind::Expr(e) = &stmt.kind {
                if matches!(e, ast::Expr::Constant(_) | ast::Expr::Name(_)) {
                    ctx.diags.push(Diagnostic::warn("statement seems to have no effect", stmt.line));
                }
            }
            let Some(e) = stmt_expr(stmt) else { continue };
            walk_expr(e, &mut |x| {
                if let ast::Expr::BinOp { op: ast::BinaryOp::Div | ast::BinaryOp::Mod, right, .. } = x {
                    if is_literal_zero(right) {
                        ctx.diags.push(Diagnostic::warn("division by zero", stmt.line));
                    }
                }
            });
        }
        Ok(())
    }
}

#[allow(clippy::float_cmp)]
fn is_literal_zero(e: &ast::Expr) -> bool {
    match e {
        ast::Expr::Constant(ast::Constant::Int(0)) => true,
        ast::Expr::Constant(ast::Constant::Float(f)) => *f == 0.0,
        _ => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
/* Repli de constantes (option `optimize`) */
// ─────────────────────────────────────────────────────────────────────────────

/// Évalue `e` si c’est une expression constante sans effet ni erreur possible.
fn fold(e: &ast::Expr) -> Option<ast::Constant> {
    use ast::Constant as C;
    match e {
        ast::Expr::Constant(c) => Some(c.clone()),
        ast::Expr::UnaryOp { op, operand } => {
            let v = fold(operand)?;
            match (op, v) {
                (ast::UnaryOp::Neg, C::Int(i)) => i.checked_neg().map(C::Int),
                (ast::UnaryOp::Neg, C::Float(f)) => Some(C::Float(-f)),
                (ast::UnaryOp::Not, v) => Some(C::Bool(!truthy(&v))),
                _ => None,
            }
        }
        ast::Expr::BinOp { left, op, right } => {
            let (l, r) = (fold(left)?, fold(right)?);
            match (op, l, r) {
                (ast::BinaryOp::Add, C::Int(a), C::Int(b)) => a.checked_add(b).map(C::Int),
                (ast::BinaryOp::Sub, C::Int(a), C::Int(b)) => a.checked_sub(b).map(C::Int),
                (ast::BinaryOp::Mul, C::Int(a), C::Int(b)) => a.checked_mul(b).map(C::Int),
                (ast::BinaryOp::Add, C::Float(a), C::Float(b)) => Some(C::Float(a + b)),
                (ast::BinaryOp::Sub, C::Float(a), C::Float(b)) => Some(C::Float(a - b)),
                (ast::BinaryOp::Mul, C::Float(a), C::Float(b)) => Some(C::Float(a * b)),
                (ast::BinaryOp::Add, C::Str(a), C::Str(b)) => Some(C::Str(a + &b)),
                _ => None,
            }
        }
        ast::Expr::Name(_) | ast::Expr::Call { .. } => None,
    }
}

#[allow(clippy::float_cmp)]
fn truthy(c: &ast::Constant) -> bool {
    match c {
        ast::Constant::None => false,
        ast::Constant::Bool(b) => *b,
        ast::Constant::Int(i) => *i != 0,
        ast::Constant::Float(f) => *f != 0.0,
        ast::Constant::Str(s) => !s.is_empty(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
/* Backend : Emitter */
// ─────────────────────────────────────────────────────────────────────────────

/// Trait d’émission backend
pub trait Emitter {
    /// Émet le chunk à partir d’un AST
    fn emit(&mut self, module: &ast::Module) -> Chunk;
}

/// Émetteur de chunks (machine à pile)
pub struct ChunkEmitter {
    opts: CompilerOptions,
}

impl ChunkEmitter {
    /// Nouveau
    pub const fn new(opts: CompilerOptions) -> Self { Self { opts } }

    fn emit_expr(&self, chunk: &mut Chunk, e: &ast::Expr, line: u32) {
        if self.opts.optimize && !matches!(e, ast::Expr::Constant(_)) {
            if let Some(c) = fold(e) {
                let ix = chunk.add_const(const_value(&c));
                chunk.push_op(Op::LoadConst(ix), line);
                return;
            }
        }
        match e {
            ast::Expr::Constant(c) => {
                let ix = chunk.add_const(const_value(c));
                chunk.push_op(Op::LoadConst(ix), line);
            }
            ast::Expr::Name(n) => {
                let ix = chunk.add_name(n);
                chunk.push_op(Op::LoadName(ix), line);
            }
            ast::Expr::Call { func, args } => {
                self.emit_expr(chunk, func, line);
                for a in args {
                    self.emit_expr(chunk, a, line);
                }
                // borné par `CheckLimits`
                let argc = u32::try_from(args.len()).unwrap_or(u32::MAX);
                chunk.push_op(Op::Call(argc), line);
            }
            ast::Expr::BinOp { left, op, right } => {
                self.emit_expr(chunk, left, line);
                self.emit_expr(chunk, right, line);
                chunk.push_op(Op::Binary(bin_kind(*op)), line);
            }
            ast::Expr::UnaryOp { op, operand } => {
                self.emit_expr(chunk, operand, line);
                let kind = match op {
                    ast::UnaryOp::Neg => UnOpKind::Neg,
                    ast::UnaryOp::Not => UnOpKind::Not,
                };
                chunk.push_op(Op::Unary(kind), line);
            }
        }
    }
}

impl Emitter for ChunkEmitter {
    fn emit(&mut self, module: &ast::Module) -> Chunk {
        let mut flags = CodeFlags::empty();
        flags.set(CodeFlags::STRIPPED, !self.opts.embed_lines);
        flags.set(CodeFlags::OPTIMIZED, self.opts.optimize);
        let mut chunk = Chunk::new(flags);
        chunk.filename.clone_from(&self.opts.filename);

        for stmt in &module.body {
            match &stmt.kind {
                ast::StmtKind::Expr(e) => {
                    self.emit_expr(&mut chunk, e, stmt.line);
                    chunk.push_op(Op::PopTop, stmt.line);
                }
                ast::StmtKind::Assign { target, value } => {
                    self.emit_expr(&mut chunk, value, stmt.line);
                    let ix = chunk.add_name(target);
                    chunk.push_op(Op::StoreName(ix), stmt.line);
                }
                ast::StmtKind::Pass => chunk.push_op(Op::Nop, stmt.line),
            }
        }

        // épilogue implicite : `return None`
        let last = module.body.last().map_or(1, |s| s.line);
        let none = chunk.add_const(ConstValue::None);
        chunk.push_op(Op::LoadConst(none), last);
        chunk.push_op(Op::ReturnValue, last);
        chunk
    }
}

fn const_value(c: &ast::Constant) -> ConstValue {
    match c {
        ast::Constant::None => ConstValue::None,
        ast::Constant::Bool(b) => ConstValue::Bool(*b),
        ast::Constant::Int(i) => ConstValue::Int(*i),
        ast::Constant::Float(f) => ConstValue::Float(*f),
        ast::Constant::Str(s) => ConstValue::Str(s.clone()),
    }
}

const fn bin_kind(op: ast::BinaryOp) -> BinOpKind {
    match op {
        ast::BinaryOp::Add => BinOpKind::Add,
        ast::BinaryOp::Sub => BinOpKind::Sub,
        ast::BinaryOp::Mul => BinOpKind::Mul,
        ast::BinaryOp::Div => BinOpKind::Div,
        ast::BinaryOp::Mod => BinOpKind::Mod,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
/* Compiler façade */
// ─────────────────────────────────────────────────────────────────────────────

/// Le compilateur : orchestre passes + backend
pub struct Compiler {
    /// Options
    pub options: CompilerOptions,
    diags: Vec<Diagnostic>,
}

impl Compiler {
    /// Crée un compilateur
    pub const fn new(options: CompilerOptions) -> Self { Self { options, diags: Vec::new() } }

    fn filename(&self) -> String { self.options.filename.clone().unwrap_or_else(|| "<string>".into()) }

    fn fail(&mut self) -> CompileError {
        CompileError { filename: self.filename(), diagnostics: core::mem::take(&mut self.diags) }
    }

    /// Parse `src` (sans compiler).
    ///
    /// # Errors
    /// Erreur lexicale ou syntaxique, localisée.
    pub fn parse(&mut self, src: &str) -> CompileResult<ast::Module> {
        Parser::new(src, SourceId(0)).parse_module().map_err(|e| {
            self.diags.push(e.into());
            self.fail()
        })
    }

    /// Compile un module AST → Chunk
    ///
    /// # Errors
    /// Au moins un diagnostic de gravité `Error`.
    pub fn compile(&mut self, module: &ast::Module) -> CompileResult<Chunk> {
        self.diags.clear();

        let passes: [&mut dyn Pass; 2] = [&mut CheckLimits, &mut Lint];
        for pass in passes {
            let mut ctx = Ctx { opts: &self.options, diags: &mut self.diags };
            pass.run(&mut ctx, module)?;
        }

        if self.diags.iter().any(Diagnostic::is_error) {
            return Err(self.fail());
        }

        let mut emitter = ChunkEmitter::new(self.options.clone());
        let chunk = emitter.emit(module);

        if let Err(e) = validate_chunk(&chunk) {
            self.diags.push(Diagnostic::error(format!("internal: emitted invalid code: {e}"), 0));
            return Err(self.fail());
        }
        log::debug!(
            "compiled {}: {} op(s), {} const(s), {} name(s)",
            self.filename(),
            chunk.ops.len(),
            chunk.consts.len(),
            chunk.names.len()
        );
        Ok(chunk)
    }

    /// Parse puis compile `src`.
    ///
    /// # Errors
    /// Voir [`Compiler::parse`] et [`Compiler::compile`].
    pub fn compile_str(&mut self, src: &str) -> CompileResult<Chunk> {
        let module = self.parse(src)?;
        self.compile(&module)
    }

    /// Récupère et vide les diagnostics accumulés
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> { core::mem::take(&mut self.diags) }
}

/// Parse `src` (nommée `name`) en AST, sans compiler.
///
/// # Errors
/// Erreur de syntaxe, avec ligne/colonne.
pub fn parse_source(src: &str, name: &str) -> CompileResult<ast::Module> {
    Compiler::new(CompilerOptions::for_file(name)).parse(src)
}

/// Compile `src` (nommée `name`) avec les options par défaut.
///
/// # Errors
/// Erreur de syntaxe ou diagnostic bloquant.
pub fn compile_source(src: &str, name: &str) -> CompileResult<Chunk> {
    compile_source_with(src, CompilerOptions::for_file(name))
}

/// Compile `src` avec des options explicites ; les warnings sont journalisés.
///
/// # Errors
/// Erreur de syntaxe ou diagnostic bloquant.
pub fn compile_source_with(src: &str, options: CompilerOptions) -> CompileResult<Chunk> {
    let mut c = Compiler::new(options);
    let chunk = c.compile_str(src)?;
    let name = c.filename();
    for d in c.take_diagnostics() {
        log::warn!("{name}: {d}");
    }
    Ok(chunk)
}

// ─────────────────────────────────────────────────────────────────────────────
/* Marshal */
// ─────────────────────────────────────────────────────────────────────────────

/// `Marshal` des chunks : `loads` décode et valide, `dumps` rend les octets tels quels.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkMarshal;

impl ChunkMarshal {
    /// Décode un `CodeObject` produit par ce marshal.
    ///
    /// # Errors
    /// `PayloadCorrupt` si les octets ne forment pas un chunk valide.
    pub fn chunk(code: &CodeObject) -> ContainerResult<Chunk> { decode_chunk(code.as_bytes()) }

    /// Encapsule un chunk.
    pub fn code(chunk: &Chunk) -> CodeObject { CodeObject::from_bytes(chunk.to_bytes()) }
}

fn decode_chunk(payload: &[u8]) -> ContainerResult<Chunk> {
    let chunk = Chunk::from_bytes(payload).map_err(ContainerError::corrupt)?;
    validate_chunk(&chunk).map_err(ContainerError::corrupt)?;
    Ok(chunk)
}

impl Marshal for ChunkMarshal {
    fn loads(&self, payload: &[u8]) -> ContainerResult<CodeObject> {
        decode_chunk(payload)?;
        Ok(CodeObject::from_bytes(payload.to_vec()))
    }

    fn dumps(&self, code: &CodeObject) -> Vec<u8> { code.as_bytes().to_vec() }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use depyc_container::{CompiledModule, ContainerCodec, ContainerConfig, MagicTag, Timestamp};
    use pretty_assertions::assert_eq;

    #[test]
    fn hello_world_ops() {
        let c = compile_source("print('hi')\n", "hello.py").unwrap();
        assert_eq!(
            c.ops,
            vec![Op::LoadName(0), Op::LoadConst(0), Op::Call(1), Op::PopTop, Op::LoadConst(1), Op::ReturnValue]
        );
        assert_eq!(c.names.get(0), Some("print"));
        assert_eq!(c.consts.get(0), Some(&ConstValue::Str("hi".into())));
        assert_eq!(c.consts.get(1), Some(&ConstValue::None));
        assert_eq!(c.lines.len(), c.ops.len());
        assert_eq!(c.flags(), CodeFlags::empty());
    }

    #[test]
    fn statements_and_lines() {
        let c = compile_source("x = 1 + 2\npass\n\ny = -x", "m.py").unwrap();
        assert_eq!(
            c.ops,
            vec![
                Op::LoadConst(0),
                Op::LoadConst(1),
                Op::Binary(BinOpKind::Add),
                Op::StoreName(0),
                Op::Nop,
                Op::LoadName(0),
                Op::Unary(UnOpKind::Neg),
                Op::StoreName(1),
                Op::LoadConst(2),
                Op::ReturnValue,
            ]
        );
        let lines: Vec<u32> = (0..c.ops.len() as u32).map(|pc| c.lines.line_for_pc(pc)).collect();
        assert_eq!(lines, vec![1, 1, 1, 1, 2, 4, 4, 4, 4, 4]);
    }

    #[test]
    fn optimize_folds_constants() {
        let opts = CompilerOptions { optimize: true, ..CompilerOptions::for_file("o.py") };
        let c = compile_source_with("x = (1 + 2) * 3\ny = 'a' + 'b'\nz = f(-1, not 0)", opts).unwrap();
        assert!(c.flags().contains(CodeFlags::OPTIMIZED));
        assert_eq!(c.consts.get(0), Some(&ConstValue::Int(9)));
        assert_eq!(c.consts.get(1), Some(&ConstValue::Str("ab".into())));
        assert_eq!(c.ops[0], Op::LoadConst(0));
        assert_eq!(c.ops[1], Op::StoreName(0));
        assert!(c.consts.iter().any(|(_, v)| *v == ConstValue::Int(-1)));
        assert!(c.consts.iter().any(|(_, v)| *v == ConstValue::Bool(true)));
        assert!(!c.ops.iter().any(|op| matches!(op, Op::Binary(_) | Op::Unary(_))));
    }

    #[test]
    fn optimize_leaves_overflow_and_division_alone() {
        let opts = CompilerOptions { optimize: true, ..CompilerOptions::default() };
        let c = compile_source_with("x = 9223372036854775807 + 1\ny = 1 / 2", opts).unwrap();
        let binaries = c.ops.iter().filter(|op| matches!(op, Op::Binary(_))).count();
        assert_eq!(binaries, 2);
    }

    #[test]
    fn stripped_chunks_have_no_lines() {
        let opts = CompilerOptions { embed_lines: false, ..CompilerOptions::default() };
        let c = compile_source_with("pass\n", opts).unwrap();
        assert!(c.flags().contains(CodeFlags::STRIPPED));
        assert!(c.lines.is_empty());
        assert_eq!(c.filename, None);
    }

    #[test]
    fn syntax_errors_carry_position() {
        let err = compile_source("x = 1\nprint('hi'\n", "bad.py").unwrap_err();
        assert_eq!(err.filename, "bad.py");
        let d = err.first_error().unwrap();
        assert_eq!(d.line, 3);
        assert!(err.to_string().starts_with("bad.py: line 3, column "), "{err}");

        let err = parse_source("  x = 1", "indent.py").unwrap_err();
        assert_eq!(err.to_string(), "indent.py: line 1, column 1: error: unexpected indent");
    }

    #[test]
    fn too_many_arguments_is_an_error() {
        let args = vec!["0"; MAX_ARGS + 1].join(", ");
        let err = compile_source(&format!("f({args})\n"), "big.py").unwrap_err();
        let d = err.first_error().unwrap();
        assert_eq!(d.line, 1);
        assert!(d.message.starts_with("more than 255 arguments"));
    }

    #[test]
    fn warnings_do_not_fail() {
        let mut c = Compiler::new(CompilerOptions::default());
        let chunk = c.compile_str("x\n1 % 0\n").unwrap();
        assert!(!chunk.ops.is_empty());
        let diags = c.take_diagnostics();
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().all(|d| d.severity == Severity::Warning));
        assert_eq!(diags[1].to_string(), "line 2: warning: division by zero");
    }

    #[test]
    fn empty_source_is_just_the_epilogue() {
        let c = compile_source("", "empty.py").unwrap();
        assert_eq!(c.ops, vec![Op::LoadConst(0), Op::ReturnValue]);
    }

    #[test]
    fn marshal_accepts_chunks_and_rejects_garbage() {
        let chunk = compile_source("print(1)\n", "m.py").unwrap();
        let code = ChunkMarshal::code(&chunk);
        let loaded = ChunkMarshal.loads(code.as_bytes()).unwrap();
        assert_eq!(loaded, code);
        assert_eq!(ChunkMarshal::chunk(&loaded).unwrap(), chunk);
        assert_eq!(ChunkMarshal.dumps(&loaded), code.as_bytes());

        let err = ChunkMarshal.loads(b"not a chunk").unwrap_err();
        assert!(matches!(err, ContainerError::PayloadCorrupt(_)), "{err:?}");
    }

    #[test]
    fn container_roundtrip_with_chunk_marshal() {
        let codec = ContainerCodec::new(ContainerConfig::default(), ChunkMarshal);
        let chunk = compile_source("x = 2\n", "m.py").unwrap();
        let module = CompiledModule::new(MagicTag::CURRENT, Timestamp(1_700_000_000), ChunkMarshal::code(&chunk));
        let bytes = codec.encode(&module);
        assert_eq!(codec.decode(&bytes).unwrap(), module);

        let mut broken = bytes;
        let last = broken.len() - 1;
        broken[last] ^= 0xFF;
        assert!(matches!(codec.decode(&broken), Err(ContainerError::PayloadCorrupt(_))));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn options_json() {
        let o = CompilerOptions { optimize: true, ..CompilerOptions::for_file("a.py") };
        let back: CompilerOptions = serde_json::from_str(&serde_json::to_string(&o).unwrap()).unwrap();
        assert_eq!(back, o);
    }
}
