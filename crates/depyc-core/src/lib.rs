//! depyc-core: primitives partagées (no_std-ready)
//!
//! Fournit :
//! - `SourceId`, `Pos`, `Span`, `Spanned<T>`
//! - Constantes du format d'enregistrement de code (`CHUNK_VERSION`, `MAGIC_NUMBER`)
//! - IO mémoire (little-endian) : `ByteWriter`, `ByteReader`
//! - `crc32` (via `crc32fast`)
//! - Erreurs `CoreError` + alias `CoreResult<T>`
//! - `bytecode` : chunk de référence, validation, désassembleur
//!
//! Features :
//! - `std` (par défaut) : impl `std::error::Error` & tests
//! - `serde` : derive (dé)sérialisation sur les structures utiles

#![deny(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

/* ─────────────────────────── Imports ─────────────────────────── */

use core::fmt;

#[cfg(feature = "std")]
use std::{borrow::Cow, vec::Vec};

#[cfg(not(feature = "std"))]
use alloc::{borrow::Cow, vec::Vec};

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ─────────────────────────── Modules publics ─────────────────────────── */

/// Enregistrement de code de référence (chunk, validation, désassembleur).
pub mod bytecode;

/// Compatibilité : ré-exporte les helpers de validation.
pub use bytecode::helpers;
/// Compatibilité : ré-exporte le désassembleur textuel.
pub use bytecode::disasm;

/* ─────────────────────────── Résultat commun ─────────────────────────── */

/// Alias résultat commun au core.
pub type CoreResult<T> = core::result::Result<T, CoreError>;

/* ─────────────────────────── Spans / Positions ─────────────────────────── */

/// Identifiant de source (fichier, buffer, etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SourceId(pub u32);

/// Position (offset byte) depuis le début de la source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pos(pub u32);

impl Pos {
    /// Début de la source.
    pub const ZERO: Self = Self(0);
}

/// Plage (demi-ouverte) `[start, end)` dans une source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Span {
    /// Source d’où provient l’item.
    pub source: SourceId,
    /// Début inclus.
    pub start: Pos,
    /// Fin exclue.
    pub end: Pos,
}

impl Span {
    /// Crée un span.
    pub const fn new(source: SourceId, start: Pos, end: Pos) -> Self { Self { source, start, end } }
}

/// Wrapper utilitaire « valeur + span ».
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spanned<T> {
    /// La valeur.
    pub value: T,
    /// La localisation.
    pub span: Span,
}

impl<T> Spanned<T> {
    /// Construit un `Spanned<T>`.
    pub const fn new(value: T, span: Span) -> Self { Self { value, span } }
}

/* ─────────────────────────── Constantes du chunk ─────────────────────────── */

/// Version du format binaire des chunks.
pub const CHUNK_VERSION: u16 = 1;

/// Numéro de version publié dans l’étiquette magique des conteneurs
/// qui embarquent un chunk de cette version.
pub const MAGIC_NUMBER: u16 = 3100 + CHUNK_VERSION;

/* ─────────────────────────── CRC32 IEEE ─────────────────────────── */

/// CRC32 (IEEE 802.3).
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/* ─────────────────────────── Byte Writer (LE) ─────────────────────────── */

/// Buffer d’écriture (croît automatiquement).
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Crée un writer vide.
    pub const fn new() -> Self { Self { buf: Vec::new() } }
    /// Accès en lecture au contenu.
    pub fn as_slice(&self) -> &[u8] { &self.buf }
    /// Récupère le buffer (consomme).
    pub fn into_vec(self) -> Vec<u8> { self.buf }
    /// Nombre d’octets écrits.
    pub fn len(&self) -> usize { self.buf.len() }
    /// Vrai si rien n’a été écrit.
    pub fn is_empty(&self) -> bool { self.buf.is_empty() }
    /// Ajoute des octets bruts.
    pub fn write_bytes(&mut self, bytes: &[u8]) { self.buf.extend_from_slice(bytes); }
    /// Écrit un u8.
    pub fn write_u8(&mut self, v: u8) { self.buf.push(v); }
    /// Écrit un u16 little-endian.
    pub fn write_u16_le(&mut self, v: u16) { self.buf.extend_from_slice(&v.to_le_bytes()); }
    /// Écrit un u32 little-endian.
    pub fn write_u32_le(&mut self, v: u32) { self.buf.extend_from_slice(&v.to_le_bytes()); }
    /// Écrit un i64 little-endian.
    pub fn write_i64_le(&mut self, v: i64) { self.buf.extend_from_slice(&v.to_le_bytes()); }
    /// Écrit un f64 little-endian.
    pub fn write_f64_le(&mut self, v: f64) { self.buf.extend_from_slice(&v.to_le_bytes()); }
    /// Écrit une chaîne préfixée par sa longueur (u32 LE).
    pub fn write_str(&mut self, s: &str) {
        self.write_len(s.len());
        self.write_bytes(s.as_bytes());
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_len(&mut self, len: usize) { self.write_u32_le(len as u32); }
}

/* ─────────────────────────── Byte Reader (LE) ─────────────────────────── */

/// Lecteur séquentiel sur un slice d’octets (helpers LE).
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    off: usize,
}

impl<'a> ByteReader<'a> {
    /// Construit un lecteur.
    pub const fn new(data: &'a [u8]) -> Self { Self { data, off: 0 } }
    /// Taille restante.
    pub const fn remaining(&self) -> usize { self.data.len().saturating_sub(self.off) }
    /// Octets déjà consommés.
    pub fn consumed(&self) -> &'a [u8] { &self.data[..self.off] }

    /// Lit `n` octets (ou erreur si EOF).
    pub fn read_bytes(&mut self, n: usize) -> CoreResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(CoreError::UnexpectedEof { needed: n as u64, at: self.off as u64 });
        }
        let start = self.off;
        self.off += n;
        Ok(&self.data[start..self.off])
    }

    /// Lit un tableau de taille fixe.
    pub fn read_array<const N: usize>(&mut self) -> CoreResult<[u8; N]> {
        let b = self.read_bytes(N)?;
        let mut arr = [0u8; N];
        arr.copy_from_slice(b);
        Ok(arr)
    }

    /// Lit un u8.
    pub fn read_u8(&mut self) -> CoreResult<u8> { Ok(self.read_bytes(1)?[0]) }

    /// Lit un u16 LE.
    pub fn read_u16_le(&mut self) -> CoreResult<u16> { Ok(u16::from_le_bytes(self.read_array()?)) }

    /// Lit un u32 LE.
    pub fn read_u32_le(&mut self) -> CoreResult<u32> { Ok(u32::from_le_bytes(self.read_array()?)) }

    /// Lit un u64 LE.
    pub fn read_u64_le(&mut self) -> CoreResult<u64> { Ok(u64::from_le_bytes(self.read_array()?)) }

    /// Lit un i64 LE.
    pub fn read_i64_le(&mut self) -> CoreResult<i64> { Ok(i64::from_le_bytes(self.read_array()?)) }

    /// Lit un f64 LE.
    pub fn read_f64_le(&mut self) -> CoreResult<f64> {
        let bits = self.read_u64_le()?;
        Ok(f64::from_bits(bits))
    }

    /// Lit une chaîne UTF-8 préfixée par sa longueur (u32 LE).
    pub fn read_str(&mut self) -> CoreResult<&'a str> {
        let len = self.read_u32_le()? as usize;
        let bytes = self.read_bytes(len)?;
        core::str::from_utf8(bytes).map_err(|_| CoreError::InvalidUtf8)
    }
}

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreurs de bas niveau communes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoreError {
    /// Fin de buffer inattendue.
    UnexpectedEof {
        /// Nombre d’octets demandés.
        needed: u64,
        /// Offset où l’erreur s’est produite.
        at: u64,
    },
    /// Longueur invalide (ex: dépasse le buffer).
    InvalidLength {
        /// Nom de la table (si connu).
        section: Option<Cow<'static, str>>,
        /// Longueur fautive.
        len: u64,
    },
    /// UTF-8 invalide.
    InvalidUtf8,
    /// Données corrompues (CRC / format).
    Corrupted(Cow<'static, str>),
}

impl CoreError {
    /// Construit une erreur « corrompu ».
    pub fn corrupted(msg: impl Into<Cow<'static, str>>) -> Self { Self::Corrupted(msg.into()) }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof { needed, at } => write!(f, "unexpected EOF: need {needed} bytes at {at}"),
            Self::InvalidLength { section, len } => {
                if let Some(s) = section { write!(f, "invalid length for {s}: {len}") }
                else { write!(f, "invalid length: {len}") }
            }
            Self::InvalidUtf8 => write!(f, "invalid utf-8"),
            Self::Corrupted(msg) => write!(f, "corrupted: {msg}"),
        }
    }
}

/// Implémente `std::error::Error` uniquement avec la feature `std`.
#[cfg(feature = "std")]
impl std::error::Error for CoreError {}

/* ─────────────────────────── Tests ─────────────────────────── */
