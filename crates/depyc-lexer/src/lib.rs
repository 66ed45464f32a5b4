//! depyc-lexer: analyse lexicale du langage de référence
//!
//! Faits saillants :
//! - lignes logiques : `Newline` émis en fin de ligne non vide, ignoré entre parenthèses,
//!   `\` + fin de ligne pour continuer
//! - commentaires `#`, ident/keywords (`pass`, `not`, `True`, `False`, `None`)
//! - nombres (2/8/10/16, `_`, floats + exposant), chaînes `'…'` / `"…"` avec échappements
//! - une ligne qui commence par une indentation est refusée (`unexpected indent`)
//! - `LineMap` pour `(ligne, colonne)`
//!
//! Exemple éclair :
//! ```
//! use depyc_core::SourceId;
//! use depyc_lexer::{Lexer, TokenKind};
//!
//! let mut lx = Lexer::new("print('hi')\n", SourceId(0));
//! let toks = lx.tokenize().unwrap();
//! assert!(matches!(toks[0].value, TokenKind::Ident("print")));
//! ```

#![deny(missing_docs)]

use core::fmt;

use depyc_core::{Pos, SourceId, Span, Spanned};

/* ─────────────────────────── LineMap ─────────────────────────── */

/// Table des lignes pour (byte offset) → (ligne, colonne).
#[derive(Debug, Clone)]
pub struct LineMap {
    /// Offsets des débuts de lignes (toujours contient 0).
    pub line_starts: Vec<u32>,
}

impl LineMap {
    /// Construit la table à partir d’un `&str`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(src: &str) -> Self {
        let mut ls = Vec::with_capacity(64);
        ls.push(0);
        for (i, b) in src.as_bytes().iter().enumerate() {
            if *b == b'\n' {
                ls.push((i as u32) + 1);
            }
        }
        Self { line_starts: ls }
    }

    /// Convertit un `Pos` en (ligne, colonne), 1-based.
    #[allow(clippy::cast_possible_truncation)]
    pub fn line_col(&self, pos: Pos) -> (u32, u32) {
        let off = pos.0;
        let idx = match self.line_starts.binary_search(&off) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.line_starts[idx];
        let col = off.saturating_sub(line_start) + 1;
        ((idx as u32) + 1, col)
    }

    /// Ligne (1-based) d’un `Pos`.
    pub fn line(&self, pos: Pos) -> u32 { self.line_col(pos).0 }
}

/* ─────────────────────────── Tokens ─────────────────────────── */

/// Mots-clés reconnus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// `pass`
    Pass,
    /// `not`
    Not,
    /// `True`
    True,
    /// `False`
    False,
    /// `None`
    None,
}

/// Genre de jeton lexical.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    /// Fin de fichier.
    Eof,
    /// Fin de ligne logique.
    Newline,
    /// Identifiant.
    Ident(&'a str),
    /// Mot-clé.
    Kw(Keyword),
    /// Littéral entier (i64).
    Int(i64),
    /// Littéral flottant (f64).
    Float(f64),
    /// Littéral chaîne (décodée).
    Str(String),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `;`
    Semi,
    /// `=`
    Eq,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
}

/// Jeton avec span.
pub type Token<'a> = Spanned<TokenKind<'a>>;

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Genre d’erreur lexicale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    /// Caractère inattendu.
    UnexpectedChar(char),
    /// Chaîne non terminée (ou coupée par une fin de ligne).
    UnterminatedString,
    /// Séquence d’échappement invalide.
    InvalidEscape,
    /// Littéral numérique invalide.
    InvalidNumber,
    /// Dépassement entier i64.
    IntOverflow,
    /// Instruction indentée (aucun bloc dans le langage).
    UnexpectedIndent,
    /// `\` non suivi d’une fin de ligne.
    StrayBackslash,
}

/// Erreur lexicale avec localisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    /// Localisation.
    pub span: Span,
    /// Genre d’erreur.
    pub kind: LexErrorKind,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use LexErrorKind::*;
        match &self.kind {
            UnexpectedChar(c) => write!(f, "unexpected character: {c:?}"),
            UnterminatedString => write!(f, "unterminated string literal"),
            InvalidEscape => write!(f, "invalid escape sequence"),
            InvalidNumber => write!(f, "invalid number literal"),
            IntOverflow => write!(f, "integer literal overflows i64"),
            UnexpectedIndent => write!(f, "unexpected indent"),
            StrayBackslash => write!(f, "unexpected character after line continuation character"),
        }
    }
}

impl std::error::Error for LexError {}

/* ─────────────────────────── Lexer ─────────────────────────── */

/// Analyseur lexical (itératif).
pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    /// Position courante en bytes.
    off: usize,
    /// Id de la source.
    source: SourceId,
    /// Profondeur de parenthèses ouvertes.
    depth: u32,
    /// Vrai tant qu’aucun jeton n’a été émis sur la ligne logique courante.
    at_line_start: bool,
    /// Table des lignes (exposée pour diagnostics).
    pub lines: LineMap,
}

impl<'a> Lexer<'a> {
    /// Crée un lexer.
    pub fn new(src: &'a str, source: SourceId) -> Self {
        Self { src, bytes: src.as_bytes(), off: 0, source, depth: 0, at_line_start: true, lines: LineMap::new(src) }
    }

    /// Prochain jeton ; `Eof` est émis indéfiniment une fois la source épuisée.
    pub fn next(&mut self) -> Result<Token<'a>, LexError> {
        loop {
            if self.at_line_start && self.depth == 0 {
                self.check_indent()?;
            }
            self.skip_blanks()?;

            if self.is_eof() {
                // ferme la dernière ligne si elle ne l’est pas
                if !self.at_line_start {
                    self.at_line_start = true;
                    return Ok(Spanned::new(TokenKind::Newline, self.span_here(0)));
                }
                return Ok(Spanned::new(TokenKind::Eof, self.span_here(0)));
            }

            if self.peek() == Some(b'\n') {
                let start = self.off;
                self.off += 1;
                if self.depth > 0 || self.at_line_start {
                    continue;
                }
                self.at_line_start = true;
                return Ok(Spanned::new(TokenKind::Newline, self.span_from(start)));
            }
            break;
        }

        let start = self.off;
        let Some(c) = self.bump_char() else {
            return Ok(Spanned::new(TokenKind::Eof, self.span_here(0)));
        };
        self.at_line_start = false;

        let kind = match c {
            ch if is_ident_start(ch) => {
                self.consume_while(|b| is_ident_continue(b as char));
                let s = &self.src[start..self.off];
                keyword_of(s).map_or(TokenKind::Ident(s), TokenKind::Kw)
            }
            ch if ch.is_ascii_digit() => self.lex_number(start)?,
            '.' if self.peek().is_some_and(|b| b.is_ascii_digit()) => self.lex_number(start)?,
            '"' | '\'' => TokenKind::Str(self.lex_string(start, c)?),

            '(' => {
                self.depth += 1;
                TokenKind::LParen
            }
            ')' => {
                self.depth = self.depth.saturating_sub(1);
                TokenKind::RParen
            }
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semi,
            '=' => TokenKind::Eq,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,

            other => return Err(self.err_from(start, LexErrorKind::UnexpectedChar(other))),
        };

        Ok(Spanned::new(kind, self.span_from(start)))
    }

    /// Tokenise toute la source (ajoute `Eof` final).
    pub fn tokenize(&mut self) -> Result<Vec<Token<'a>>, LexError> {
        let mut out = Vec::new();
        loop {
            let t = self.next()?;
            let is_eof = matches!(t.value, TokenKind::Eof);
            out.push(t);
            if is_eof {
                break;
            }
        }
        #[cfg(feature = "trace")]
        log::trace!("lexed {} token(s)", out.len());
        Ok(out)
    }

    /* ────────── Primitives internes ────────── */

    #[inline] fn is_eof(&self) -> bool { self.off >= self.bytes.len() }
    #[inline] fn peek(&self) -> Option<u8> { self.bytes.get(self.off).copied() }
    #[inline] fn peek2(&self) -> Option<u8> { self.bytes.get(self.off + 1).copied() }
    #[inline] fn peek_char(&self) -> Option<char> { self.src[self.off..].chars().next() }
    #[inline] fn bump_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.off += c.len_utf8();
        Some(c)
    }
    #[inline] fn eat(&mut self, b: u8) -> bool { if self.peek() == Some(b) { self.off += 1; true } else { false } }

    fn consume_while(&mut self, mut p: impl FnMut(u8) -> bool) {
        while let Some(b) = self.peek() {
            if p(b) { self.off += 1; } else { break; }
        }
    }

    /// Refuse une ligne indentée, sauf si elle est vide ou ne contient qu’un commentaire.
    fn check_indent(&self) -> Result<(), LexError> {
        let rest = &self.bytes[self.off..];
        let indent = rest.iter().take_while(|b| matches!(b, b' ' | b'\t' | b'\x0c')).count();
        if indent == 0 {
            return Ok(());
        }
        match rest.get(indent) {
            None | Some(b'\n' | b'\r' | b'#') => Ok(()),
            Some(_) => Err(LexError {
                span: Span::new(self.source, pos(self.off), pos(self.off + indent)),
                kind: LexErrorKind::UnexpectedIndent,
            }),
        }
    }

    /// Espaces (hors `\n`), commentaires `#`, continuations `\`.
    fn skip_blanks(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\x0c') => self.off += 1,
                Some(b'#') => self.consume_while(|b| b != b'\n'),
                Some(b'\\') => {
                    let start = self.off;
                    self.off += 1;
                    self.eat(b'\r');
                    if !self.eat(b'\n') {
                        return Err(self.err_from(start, LexErrorKind::StrayBackslash));
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex_string(&mut self, start_quote: usize, quote: char) -> Result<String, LexError> {
        let mut out = String::new();
        loop {
            let c = self.bump_char().ok_or_else(|| self.err_from(start_quote, LexErrorKind::UnterminatedString))?;
            match c {
                '\n' => return Err(self.err_from(start_quote, LexErrorKind::UnterminatedString)),
                c if c == quote => break,
                '\\' => {
                    let esc_start = self.off - 1;
                    let esc = self.bump_char().ok_or_else(|| self.err_from(start_quote, LexErrorKind::UnterminatedString))?;
                    match esc {
                        '\'' => out.push('\''),
                        '"' => out.push('"'),
                        '\\' => out.push('\\'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        '0' => out.push('\0'),
                        'x' => {
                            let h1 = self.bump_char().and_then(hex_val);
                            let h2 = self.bump_char().and_then(hex_val);
                            match (h1, h2) {
                                (Some(h1), Some(h2)) => out.push(char::from((h1 << 4) | h2)),
                                _ => return Err(self.err_from(esc_start, LexErrorKind::InvalidEscape)),
                            }
                        }
                        'u' => out.push(self.read_unicode_escape(esc_start)?),
                        _ => return Err(self.err_from(esc_start, LexErrorKind::InvalidEscape)),
                    }
                }
                other => out.push(other),
            }
        }
        Ok(out)
    }

    fn read_unicode_escape(&mut self, esc_start: usize) -> Result<char, LexError> {
        if !self.eat(b'{') {
            return Err(self.err_from(esc_start, LexErrorKind::InvalidEscape));
        }
        let start = self.off;
        self.consume_while(|b| b.is_ascii_hexdigit() || b == b'_');
        let raw = self.src[start..self.off].replace('_', "");
        if !self.eat(b'}') || raw.is_empty() {
            return Err(self.err_from(esc_start, LexErrorKind::InvalidEscape));
        }
        u32::from_str_radix(&raw, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.err_from(esc_start, LexErrorKind::InvalidEscape))
    }

    fn lex_number(&mut self, start: usize) -> Result<TokenKind<'a>, LexError> {
        let first = self.bytes[start];
        if first == b'0' {
            let radix = match self.peek() {
                Some(b'x' | b'X') => Some(16),
                Some(b'o' | b'O') => Some(8),
                Some(b'b' | b'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.off += 1;
                self.consume_while(|b| (b as char).is_digit(radix) || b == b'_');
                let raw = self.src[start + 2..self.off].replace('_', "");
                if raw.is_empty() {
                    return Err(self.err_from(start, LexErrorKind::InvalidNumber));
                }
                let v = i64::from_str_radix(&raw, radix).map_err(|_| self.err_from(start, LexErrorKind::IntOverflow))?;
                return Ok(TokenKind::Int(v));
            }
        }

        // Décimal / flottant (`first` peut être `.`)
        self.consume_while(|b| b.is_ascii_digit() || b == b'_');
        let mut is_float = first == b'.';
        if !is_float && self.peek() == Some(b'.') {
            is_float = true;
            self.off += 1;
            self.consume_while(|b| b.is_ascii_digit() || b == b'_');
        }
        if matches!(self.peek(), Some(b'e' | b'E'))
            && (self.peek2().is_some_and(|d| d.is_ascii_digit())
                || (matches!(self.peek2(), Some(b'+' | b'-')) && self.bytes.get(self.off + 2).is_some_and(u8::is_ascii_digit)))
        {
            is_float = true;
            self.off += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.off += 1;
            }
            self.consume_while(|b| b.is_ascii_digit() || b == b'_');
        }
        if self.peek().is_some_and(|b| is_ident_continue(b as char)) {
            self.consume_while(|b| is_ident_continue(b as char));
            return Err(self.err_from(start, LexErrorKind::InvalidNumber));
        }

        let raw = self.src[start..self.off].replace('_', "");
        if is_float {
            raw.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| self.err_from(start, LexErrorKind::InvalidNumber))
        } else {
            raw.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| self.err_from(start, LexErrorKind::IntOverflow))
        }
    }

    /* ────────── Spans / erreurs ────────── */

    #[inline] fn span_here(&self, width: usize) -> Span { Span::new(self.source, pos(self.off), pos(self.off + width)) }
    #[inline] fn span_from(&self, start: usize) -> Span { Span::new(self.source, pos(start), pos(self.off)) }
    #[inline] fn err_from(&self, start: usize, kind: LexErrorKind) -> LexError { LexError { span: self.span_from(start), kind } }
}

/* ─────────────────────────── Helpers ─────────────────────────── */

#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn pos(off: usize) -> Pos { Pos(off as u32) }

#[inline]
const fn is_ident_start(c: char) -> bool { c == '_' || c.is_ascii_alphabetic() }

#[inline]
const fn is_ident_continue(c: char) -> bool { c == '_' || c.is_ascii_alphanumeric() }

#[inline]
fn keyword_of(s: &str) -> Option<Keyword> {
    Some(match s {
        "pass" => Keyword::Pass,
        "not" => Keyword::Not,
        "True" => Keyword::True,
        "False" => Keyword::False,
        "None" => Keyword::None,
        _ => return None,
    })
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
fn hex_val(c: char) -> Option<u8> { c.to_digit(16).map(|d| d as u8) }

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn toks(src: &str) -> Vec<TokenKind<'_>> {
        Lexer::new(src, SourceId(0)).tokenize().unwrap().into_iter().map(|t| t.value).collect()
    }

    fn err(src: &str) -> LexErrorKind { Lexer::new(src, SourceId(0)).tokenize().unwrap_err().kind }

    #[test]
    fn idents_keywords() {
        use TokenKind::*;
        let v = toks("pass not True False None ident _x x1 true");
        assert_eq!(
            v,
            vec![
                Kw(Keyword::Pass), Kw(Keyword::Not), Kw(Keyword::True), Kw(Keyword::False), Kw(Keyword::None),
                Ident("ident"), Ident("_x"), Ident("x1"), Ident("true"), Newline, Eof,
            ]
        );
    }

    #[test]
    fn numbers_and_floats() {
        use TokenKind::*;
        let v = toks("0xFF 0o77 0b1010 123 1_234 12.34 1e3 2.5e-2 1. .5 1e309");
        assert_eq!(v[0], Int(255));
        assert_eq!(v[1], Int(63));
        assert_eq!(v[2], Int(10));
        assert_eq!(v[3], Int(123));
        assert_eq!(v[4], Int(1234));
        assert_eq!(v[5], Float(12.34));
        assert_eq!(v[6], Float(1000.0));
        assert_eq!(v[7], Float(0.025));
        assert_eq!(v[8], Float(1.0));
        assert_eq!(v[9], Float(0.5));
        assert_eq!(v[10], Float(f64::INFINITY));
    }

    #[test]
    fn bad_numbers() {
        assert_eq!(err("9223372036854775808"), LexErrorKind::IntOverflow);
        assert_eq!(err("12abc"), LexErrorKind::InvalidNumber);
        assert_eq!(err("0x"), LexErrorKind::InvalidNumber);
    }

    #[test]
    fn strings_and_escapes() {
        use TokenKind::*;
        let v = toks(r#"'hi' "it's" '\n' '\x41' '\u{1F600}' 'é' "\"q\"""#);
        assert_eq!(v[0], Str("hi".into()));
        assert_eq!(v[1], Str("it's".into()));
        assert_eq!(v[2], Str("\n".into()));
        assert_eq!(v[3], Str("A".into()));
        assert_eq!(v[4], Str("😀".into()));
        assert_eq!(v[5], Str("é".into()));
        assert_eq!(v[6], Str("\"q\"".into()));
    }

    #[test]
    fn string_errors() {
        assert_eq!(err("'abc"), LexErrorKind::UnterminatedString);
        assert_eq!(err("'ab\ncd'"), LexErrorKind::UnterminatedString);
        assert_eq!(err(r"'\q'"), LexErrorKind::InvalidEscape);
        assert_eq!(err(r"'\xZZ'"), LexErrorKind::InvalidEscape);
    }

    #[test]
    fn logical_lines() {
        use TokenKind::*;
        let v = toks("a\n\n# comment\nb # trailing\n");
        assert_eq!(v, vec![Ident("a"), Newline, Ident("b"), Newline, Eof]);

        let v = toks("f(1,\n  2)\nx = \\\n 3");
        assert_eq!(
            v,
            vec![
                Ident("f"), LParen, Int(1), Comma, Int(2), RParen, Newline,
                Ident("x"), Eq, Int(3), Newline, Eof,
            ]
        );
    }

    #[test]
    fn indentation_is_rejected() {
        assert_eq!(err("x = 1\n  y = 2\n"), LexErrorKind::UnexpectedIndent);
        // lignes vides et commentaires indentés tolérés
        assert_eq!(toks("x\n   \n  # c\n").len(), 3);
    }

    #[test]
    fn ops_punct() {
        use TokenKind::*;
        let v = toks("( ) , ; = + - * / %");
        assert_eq!(v, vec![LParen, RParen, Comma, Semi, Eq, Plus, Minus, Star, Slash, Percent, Newline, Eof]);
        assert_eq!(err("a & b"), LexErrorKind::UnexpectedChar('&'));
        assert_eq!(err("x \\ y"), LexErrorKind::StrayBackslash);
    }

    #[test]
    fn linemap_basic() {
        let lm = LineMap::new("a\nbb\nccc");
        assert_eq!(lm.line_col(Pos(0)), (1, 1));
        assert_eq!(lm.line_col(Pos(2)), (2, 1));
        assert_eq!(lm.line_col(Pos(4)), (2, 3));
        assert_eq!(lm.line_col(Pos(7)), (3, 3));
    }

    proptest::proptest! {
        #[test]
        fn never_panics(src in "[ -~\n]{0,64}") {
            let _ = Lexer::new(&src, SourceId(0)).tokenize();
        }
    }
}
