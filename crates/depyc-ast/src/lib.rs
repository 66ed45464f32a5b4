// src/lib.rs
//! depyc AST (Abstract Syntax Tree)
//!
//! Structures produites par le parseur du langage de référence (instructions
//! d’une ligne, sans blocs), consommées par le compilateur et reconstruites
//! par le décompilateur.
//!
//! - [`dump`] : arbre indenté, un nœud par ligne
//! - [`unparse`] : rendu en texte source, re-parsable
//!
//! # Features
//! - `serde` : permet la sérialisation/désérialisation de l’AST
//!
//! # Exemple
//! ```rust
//! use depyc_ast::{Constant, Expr, Module, Stmt, StmtKind};
//!
//! let call = Expr::call(Expr::name("print"), vec![Expr::Constant(Constant::Str("hi".into()))]);
//! let module = Module::new(vec![Stmt::new(StmtKind::Expr(call), 1)]);
//! assert_eq!(depyc_ast::unparse(&module), "print('hi')\n");
//! ```

#![deny(missing_docs)]

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod dump;
mod unparse;

pub use dump::dump;
pub use unparse::{unparse, unparse_expr};

/// Un module complet (suite d’instructions top-level).
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Module {
    /// Instructions dans l’ordre du source.
    pub body: Vec<Stmt>,
}

impl Module {
    /// Construit un module.
    pub const fn new(body: Vec<Stmt>) -> Self { Self { body } }
}

/// Une instruction et sa ligne source (1-based, `0` si inconnue).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stmt {
    /// Nature de l’instruction.
    pub kind: StmtKind,
    /// Ligne de début.
    pub line: u32,
}

impl Stmt {
    /// Construit une instruction.
    pub const fn new(kind: StmtKind, line: u32) -> Self { Self { kind, line } }
}

/// Les instructions du langage.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StmtKind {
    /// Expression évaluée pour ses effets (souvent un appel).
    Expr(Expr),
    /// `target = value`
    Assign {
        /// Nom lié.
        target: String,
        /// Valeur affectée.
        value: Expr,
    },
    /// `pass`
    Pass,
}

/// Une expression.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Expr {
    /// Valeur littérale.
    Constant(Constant),
    /// Référence à un nom.
    Name(String),
    /// Appel `func(args…)`.
    Call {
        /// Expression appelée.
        func: Box<Expr>,
        /// Arguments positionnels.
        args: Vec<Expr>,
    },
    /// Opération binaire.
    BinOp {
        /// Opérande gauche.
        left: Box<Expr>,
        /// Opérateur.
        op: BinaryOp,
        /// Opérande droite.
        right: Box<Expr>,
    },
    /// Opération unaire.
    UnaryOp {
        /// Opérateur.
        op: UnaryOp,
        /// Opérande.
        operand: Box<Expr>,
    },
}

impl Expr {
    /// `Name(name)`.
    pub fn name(name: impl Into<String>) -> Self { Self::Name(name.into()) }

    /// `Call { func, args }`.
    pub fn call(func: Self, args: Vec<Self>) -> Self { Self::Call { func: Box::new(func), args } }

    /// `BinOp { left, op, right }`.
    pub fn binary(left: Self, op: BinaryOp, right: Self) -> Self {
        Self::BinOp { left: Box::new(left), op, right: Box::new(right) }
    }

    /// `UnaryOp { op, operand }`.
    pub fn unary(op: UnaryOp, operand: Self) -> Self { Self::UnaryOp { op, operand: Box::new(operand) } }
}

/// Valeurs littérales.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Constant {
    /// `None`.
    None,
    /// `True` / `False`.
    Bool(bool),
    /// Entier signé 64 bits.
    Int(i64),
    /// Flottant 64 bits.
    Float(f64),
    /// Chaîne UTF-8.
    Str(String),
}

/// Opérateurs binaires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
}

impl BinaryOp {
    /// Symbole source.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }

    /// Précédence (plus grand = lie plus fort). Tous associatifs à gauche.
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Sub => 1,
            Self::Mul | Self::Div | Self::Mod => 2,
        }
    }
}

/// Opérateurs unaires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `not x`
    Not,
}

impl UnaryOp {
    /// Symbole source.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "not",
        }
    }

    /// Précédence des opérateurs préfixes.
    pub const PRECEDENCE: u8 = 3;
}
