//! depyc-parser: parseur du langage de référence
//!
//! Branches :
//! - `depyc-lexer` pour la tokenisation
//! - `depyc-core` pour `Span`
//! - `depyc-ast` pour l’AST cible
//!
//! Grammaire :
//! ```text
//! module   := (line)* EOF
//! line     := stmt (";" stmt)* ";"? NEWLINE
//! stmt     := "pass" | NAME "=" expr | expr
//! expr     := pratt  (+ - : 1 ; * / % : 2 ; préfixes - not : 3)
//! postfix  := primary ( "(" (expr ("," expr)* ","?)? ")" )*
//! primary  := NAME | INT | FLOAT | STRING | "True" | "False" | "None" | "(" expr ")"
//! ```

#![deny(missing_docs)]

use core::fmt;

use depyc_ast as ast;
use depyc_core::{SourceId, Span};
use depyc_lexer::{Keyword, LexError, Lexer, LineMap, Token, TokenKind};

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreur de parsing (ou lexicale) avec localisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Localisation.
    pub span: Span,
    /// Ligne (1-based).
    pub line: u32,
    /// Colonne (1-based, en octets).
    pub column: u32,
    /// Message humain.
    pub message: String,
}

impl ParseError {
    fn new(lines: &LineMap, span: Span, message: impl Into<String>) -> Self {
        let (line, column) = lines.line_col(span.start);
        Self { span, line, column, message: message.into() }
    }

    fn from_lex(lines: &LineMap, e: &LexError) -> Self { Self::new(lines, e.span, e.to_string()) }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {}, column {})", self.message, self.line, self.column)
    }
}

impl std::error::Error for ParseError {}

type PResult<T> = core::result::Result<T, ParseError>;

/* ─────────────────────────── Parser ─────────────────────────── */

/// Parser du langage de référence.
pub struct Parser<'a> {
    src: &'a str,
    source: SourceId,
    toks: Vec<Token<'a>>,
    pos: usize,
    lines: LineMap,
}

impl<'a> Parser<'a> {
    /// Crée un parser depuis une source.
    pub fn new(src: &'a str, source: SourceId) -> Self {
        Self { src, source, toks: Vec::new(), pos: 0, lines: LineMap::new(src) }
    }

    /// Parse un module complet.
    pub fn parse_module(&mut self) -> PResult<ast::Module> {
        let mut lx = Lexer::new(self.src, self.source);
        self.toks = lx.tokenize().map_err(|e| ParseError::from_lex(&self.lines, &e))?;
        self.pos = 0;

        let mut body = Vec::new();
        while !self.at(&TokenKind::Eof) {
            self.parse_line(&mut body)?;
        }
        #[cfg(feature = "trace")]
        log::trace!("parsed {} statement(s)", body.len());
        Ok(ast::Module::new(body))
    }

    /* ─────────── Instructions ─────────── */

    fn parse_line(&mut self, body: &mut Vec<ast::Stmt>) -> PResult<()> {
        loop {
            body.push(self.parse_stmt()?);
            if self.eat(&TokenKind::Semi) {
                if self.eat(&TokenKind::Newline) {
                    return Ok(());
                }
                continue;
            }
            let t = self.peek();
            return match t.value {
                TokenKind::Newline => {
                    self.bump();
                    Ok(())
                }
                TokenKind::Eof => Ok(()),
                _ => Err(self.err(t.span, "invalid syntax: expected end of statement")),
            };
        }
    }

    fn parse_stmt(&mut self) -> PResult<ast::Stmt> {
        let first = self.peek().span;
        let line = self.lines.line(first.start);

        if self.eat(&TokenKind::Kw(Keyword::Pass)) {
            return Ok(ast::Stmt::new(ast::StmtKind::Pass, line));
        }

        let e = self.parse_expr()?;
        if self.at(&TokenKind::Eq) {
            let eq = self.bump().span;
            let ast::Expr::Name(target) = e else {
                return Err(self.err(eq, "cannot assign to expression"));
            };
            let value = self.parse_expr()?;
            return Ok(ast::Stmt::new(ast::StmtKind::Assign { target, value }, line));
        }
        Ok(ast::Stmt::new(ast::StmtKind::Expr(e), line))
    }

    /* ─────────── Expressions (Pratt) ─────────── */

    fn parse_expr(&mut self) -> PResult<ast::Expr> { self.parse_prec(0) }

    fn parse_prec(&mut self, min_bp: u8) -> PResult<ast::Expr> {
        let mut lhs = self.parse_unary()?;

        loop {
            let op = match self.peek().value {
                TokenKind::Plus => ast::BinaryOp::Add,
                TokenKind::Minus => ast::BinaryOp::Sub,
                TokenKind::Star => ast::BinaryOp::Mul,
                TokenKind::Slash => ast::BinaryOp::Div,
                TokenKind::Percent => ast::BinaryOp::Mod,
                _ => break,
            };
            let (lbp, rbp) = binding_power(op);
            if lbp < min_bp {
                break;
            }
            self.bump();
            let rhs = self.parse_prec(rbp)?;
            lhs = ast::Expr::binary(lhs, op, rhs);
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<ast::Expr> {
        let op = match self.peek().value {
            TokenKind::Minus => ast::UnaryOp::Neg,
            TokenKind::Kw(Keyword::Not) => ast::UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.bump();
        let operand = self.parse_unary()?;
        Ok(ast::Expr::unary(op, operand))
    }

    fn parse_postfix(&mut self) -> PResult<ast::Expr> {
        let mut e = self.parse_primary()?;
        while self.eat(&TokenKind::LParen) {
            let mut args = Vec::new();
            while !self.at(&TokenKind::RParen) {
                args.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RParen, "`)`")?;
            e = ast::Expr::call(e, args);
        }
        Ok(e)
    }

    fn parse_primary(&mut self) -> PResult<ast::Expr> {
        let t = self.bump();
        let c = match t.value {
            TokenKind::Ident(s) => return Ok(ast::Expr::name(s)),
            TokenKind::Int(i) => ast::Constant::Int(i),
            TokenKind::Float(f) => ast::Constant::Float(f),
            TokenKind::Str(s) => ast::Constant::Str(s),
            TokenKind::Kw(Keyword::True) => ast::Constant::Bool(true),
            TokenKind::Kw(Keyword::False) => ast::Constant::Bool(false),
            TokenKind::Kw(Keyword::None) => ast::Constant::None,
            TokenKind::LParen => {
                let e = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "`)`")?;
                return Ok(e);
            }
            TokenKind::Eof | TokenKind::Newline => {
                return Err(self.err(t.span, "invalid syntax: unexpected end of statement"));
            }
            _ => return Err(self.err(t.span, "invalid syntax: expected an expression")),
        };
        Ok(ast::Expr::Constant(c))
    }

    /* ─────────── Utilitaires ─────────── */

    fn peek(&self) -> Token<'a> {
        // `tokenize` garantit un `Eof` final
        self.toks.get(self.pos).or_else(|| self.toks.last()).cloned().unwrap_or_else(|| {
            Token::new(TokenKind::Eof, Span::new(self.source, depyc_core::Pos::ZERO, depyc_core::Pos::ZERO))
        })
    }

    fn bump(&mut self) -> Token<'a> {
        let t = self.peek();
        if self.pos < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    fn at(&self, kind: &TokenKind<'_>) -> bool {
        self.toks.get(self.pos).is_some_and(|t| same_kind(&t.value, kind))
    }

    fn eat(&mut self, kind: &TokenKind<'_>) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind<'_>, what: &str) -> PResult<Token<'a>> {
        if self.at(kind) {
            return Ok(self.bump());
        }
        let t = self.peek();
        Err(self.err(t.span, format!("invalid syntax: expected {what}")))
    }

    fn err(&self, span: Span, message: impl Into<String>) -> ParseError { ParseError::new(&self.lines, span, message) }
}

/// Parse `src` en module.
///
/// # Errors
/// Première erreur lexicale ou syntaxique rencontrée.
pub fn parse(src: &str) -> PResult<ast::Module> { Parser::new(src, SourceId(0)).parse_module() }

/* ─────────────────────────── Opérateurs & helpers ─────────────────────────── */

/// Pratt binding power (gauche-associatif).
const fn binding_power(op: ast::BinaryOp) -> (u8, u8) {
    let p = op.precedence() * 2;
    (p - 1, p)
}

/// Égalité de genre (ignore la charge des littéraux).
fn same_kind(a: &TokenKind<'_>, b: &TokenKind<'_>) -> bool {
    match (a, b) {
        (TokenKind::Kw(ka), TokenKind::Kw(kb)) => ka == kb,
        _ => core::mem::discriminant(a) == core::mem::discriminant(b),
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use ast::{BinaryOp, Constant, Expr, StmtKind, UnaryOp};
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<StmtKind> { parse(src).unwrap().body.into_iter().map(|s| s.kind).collect() }

    fn expr(src: &str) -> Expr {
        match kinds(src).pop() {
            Some(StmtKind::Expr(e)) => e,
            other => panic!("not an expression statement: {other:?}"),
        }
    }

    fn n(s: &str) -> Expr { Expr::name(s) }
    fn int(i: i64) -> Expr { Expr::Constant(Constant::Int(i)) }

    #[test]
    fn hello() {
        let m = parse("print('hi')\n").unwrap();
        assert_eq!(m.body.len(), 1);
        assert_eq!(m.body[0].line, 1);
        assert_eq!(m.body[0].kind, StmtKind::Expr(Expr::call(n("print"), vec![Expr::Constant(Constant::Str("hi".into()))])));
    }

    #[test]
    fn statements_and_lines() {
        let m = parse("x = 1\n\npass; y = x  # c\nf()").unwrap();
        let lines: Vec<u32> = m.body.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![1, 3, 3, 4]);
        assert_eq!(m.body[0].kind, StmtKind::Assign { target: "x".into(), value: int(1) });
        assert_eq!(m.body[1].kind, StmtKind::Pass);
        assert_eq!(m.body[2].kind, StmtKind::Assign { target: "y".into(), value: n("x") });
        assert_eq!(m.body[3].kind, StmtKind::Expr(Expr::call(n("f"), vec![])));
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(
            expr("a + b * c"),
            Expr::binary(n("a"), BinaryOp::Add, Expr::binary(n("b"), BinaryOp::Mul, n("c")))
        );
        assert_eq!(
            expr("a - b - c"),
            Expr::binary(Expr::binary(n("a"), BinaryOp::Sub, n("b")), BinaryOp::Sub, n("c"))
        );
        assert_eq!(
            expr("(a - b) % c"),
            Expr::binary(Expr::binary(n("a"), BinaryOp::Sub, n("b")), BinaryOp::Mod, n("c"))
        );
        assert_eq!(expr("-a * b"), Expr::binary(Expr::unary(UnaryOp::Neg, n("a")), BinaryOp::Mul, n("b")));
        assert_eq!(expr("not not x"), Expr::unary(UnaryOp::Not, Expr::unary(UnaryOp::Not, n("x"))));
    }

    #[test]
    fn calls() {
        assert_eq!(expr("f(1, g(2),)"), Expr::call(n("f"), vec![int(1), Expr::call(n("g"), vec![int(2)])]));
        assert_eq!(expr("f(a)(b)"), Expr::call(Expr::call(n("f"), vec![n("a")]), vec![n("b")]));
        assert_eq!(expr("print(\n  1,\n  2\n)"), Expr::call(n("print"), vec![int(1), int(2)]));
    }

    #[test]
    fn literals() {
        assert_eq!(expr("None"), Expr::Constant(Constant::None));
        assert_eq!(expr("True"), Expr::Constant(Constant::Bool(true)));
        assert_eq!(expr("2.5"), Expr::Constant(Constant::Float(2.5)));
        assert_eq!(expr("-1"), Expr::unary(UnaryOp::Neg, int(1)));
    }

    #[test]
    fn syntax_errors_are_located() {
        let e = parse("x = 1\n1 = x\n").unwrap_err();
        assert_eq!((e.line, e.column), (2, 3));
        assert_eq!(e.message, "cannot assign to expression");

        let e = parse("f(1\n").unwrap_err();
        assert_eq!(e.line, 2);

        let e = parse("x y").unwrap_err();
        assert_eq!((e.line, e.column), (1, 3));

        let e = parse("x = \n").unwrap_err();
        assert!(e.message.contains("unexpected end"), "{e}");

        let e = parse("x = 1\n  y = 2").unwrap_err();
        assert_eq!(e.to_string(), "unexpected indent (line 2, column 1)");
    }

    #[test]
    fn empty_sources() {
        assert!(parse("").unwrap().body.is_empty());
        assert!(parse("\n# only a comment\n\n").unwrap().body.is_empty());
    }
}
