//! depyc-container: codec du conteneur de module compilé
//!
//! Format :
//! ```text
//! [4 octets MagicTag][4 octets Timestamp LE][N octets charge utile]
//! ```
//!
//! Le codec ne regarde jamais l’intérieur de la charge utile : il la confie
//! au sérialiseur d’enregistrement de code ([`Marshal`]) et ne manipule que
//! le cadre. L’étiquette de référence est une configuration explicite
//! ([`ContainerConfig`]), jamais un global.
//!
//! API :
//! - `ContainerCodec::decode()` / `encode()` / `decode_header()`
//! - `read_file()`, `write_file()`

#![deny(missing_docs)]

use std::{fmt, fs, io, path::{Path, PathBuf}};

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace};

mod header;

pub use header::{Header, MagicTag, ParseMagicError, Timestamp, HEADER_LEN};

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Échecs du codec.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Les 4 premiers octets ne sont pas l’étiquette de référence.
    #[error("bad magic number: expected {expected}, found {found}")]
    FormatMismatch {
        /// Étiquette attendue (configuration du codec).
        expected: MagicTag,
        /// Étiquette lue.
        found: MagicTag,
    },
    /// Moins d’octets que l’en-tête fixe.
    #[error("not a compiled module: {len} byte(s), header needs 8")]
    Truncated {
        /// Taille de l’entrée.
        len: usize,
    },
    /// Le sérialiseur a refusé la charge utile.
    #[error("corrupt code record: {0}")]
    PayloadCorrupt(String),
    /// Erreur d’E/S sur un fichier conteneur.
    #[error("cannot access `{}`", .path.display())]
    Io {
        /// Fichier concerné.
        path: PathBuf,
        /// Cause.
        #[source]
        source: io::Error,
    },
}

impl ContainerError {
    /// Vrai pour les erreurs « ce n’est pas un conteneur de ce format ».
    pub const fn is_format_mismatch(&self) -> bool {
        matches!(self, Self::FormatMismatch { .. } | Self::Truncated { .. })
    }

    /// Helper pour les implémentations de [`Marshal`].
    pub fn corrupt(msg: impl fmt::Display) -> Self { Self::PayloadCorrupt(msg.to_string()) }

    fn io(path: &Path, source: io::Error) -> Self { Self::Io { path: path.to_path_buf(), source } }
}

/// Alias résultat du codec.
pub type ContainerResult<T> = Result<T, ContainerError>;

/* ─────────────────────────── Charge utile ─────────────────────────── */

/// Enregistrement de code sérialisé, opaque pour le codec.
///
/// Aucune structure publique : seuls les octets sérialisés sont exposés.
/// Jamais modifié en place, seulement remplacé.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CodeObject {
    bytes: Vec<u8>,
}

impl CodeObject {
    /// Enveloppe des octets produits par un sérialiseur.
    pub const fn from_bytes(bytes: Vec<u8>) -> Self { Self { bytes } }
    /// Octets sérialisés.
    pub fn as_bytes(&self) -> &[u8] { &self.bytes }
    /// Taille sérialisée.
    pub fn len(&self) -> usize { self.bytes.len() }
    /// Vrai si vide.
    pub fn is_empty(&self) -> bool { self.bytes.is_empty() }
    /// Consomme et rend les octets.
    pub fn into_bytes(self) -> Vec<u8> { self.bytes }
}

impl fmt::Debug for CodeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeObject").field("len", &self.bytes.len()).finish_non_exhaustive()
    }
}

/// Sérialiseur d’enregistrement de code (le « marshal » du format).
pub trait Marshal {
    /// Reconstruit un enregistrement à partir de la charge utile complète.
    ///
    /// # Errors
    /// [`ContainerError::PayloadCorrupt`] si les octets ne forment pas un enregistrement valide.
    fn loads(&self, payload: &[u8]) -> ContainerResult<CodeObject>;

    /// Octets écrits après l’en-tête pour `code`.
    fn dumps(&self, code: &CodeObject) -> Vec<u8>;
}

/// Sérialiseur identité : accepte toute charge utile telle quelle.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawMarshal;

impl Marshal for RawMarshal {
    fn loads(&self, payload: &[u8]) -> ContainerResult<CodeObject> { Ok(CodeObject::from_bytes(payload.to_vec())) }
    fn dumps(&self, code: &CodeObject) -> Vec<u8> { code.as_bytes().to_vec() }
}

impl<M: Marshal + ?Sized> Marshal for &M {
    fn loads(&self, payload: &[u8]) -> ContainerResult<CodeObject> { (**self).loads(payload) }
    fn dumps(&self, code: &CodeObject) -> Vec<u8> { (**self).dumps(code) }
}

/* ─────────────────────────── Module compilé ─────────────────────────── */

/// Conteneur décodé : `{MagicTag, Timestamp, CodeObject}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModule {
    /// Version de sérialisation.
    pub magic: MagicTag,
    /// Horodatage (mtime de la source).
    pub timestamp: Timestamp,
    /// Enregistrement de code.
    pub code: CodeObject,
}

impl CompiledModule {
    /// Assemble un module à partir de ses trois parties.
    pub const fn new(magic: MagicTag, timestamp: Timestamp, code: CodeObject) -> Self { Self { magic, timestamp, code } }
}

/* ─────────────────────────── Codec ─────────────────────────── */

/// Configuration du codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContainerConfig {
    /// Étiquette de référence acceptée au décodage et écrite à l’encodage.
    pub magic: MagicTag,
}

impl ContainerConfig {
    /// Configuration pour une étiquette donnée.
    pub const fn with_magic(magic: MagicTag) -> Self { Self { magic } }
}

/// Lecteur/écrivain de conteneurs pour une étiquette et un sérialiseur donnés.
#[derive(Debug, Clone, Default)]
pub struct ContainerCodec<M = RawMarshal> {
    config: ContainerConfig,
    marshal: M,
}

impl<M: Marshal> ContainerCodec<M> {
    /// Construit un codec.
    pub const fn new(config: ContainerConfig, marshal: M) -> Self { Self { config, marshal } }

    /// Configuration active.
    pub const fn config(&self) -> &ContainerConfig { &self.config }

    /// Sérialiseur utilisé.
    pub const fn marshal(&self) -> &M { &self.marshal }

    /// Valide l’en-tête sans toucher à la charge utile.
    ///
    /// # Errors
    /// `FormatMismatch` si l’étiquette diffère (dès que 4 octets sont présents),
    /// `Truncated` si l’entrée est plus courte que l’en-tête.
    pub fn decode_header(&self, bytes: &[u8]) -> ContainerResult<Header> {
        let expected = self.config.magic;
        if bytes.len() >= 4 {
            let found = MagicTag([bytes[0], bytes[1], bytes[2], bytes[3]]);
            if found != expected {
                debug!("magic mismatch: expected {expected}, found {found}");
                return Err(ContainerError::FormatMismatch { expected, found });
            }
        }
        if bytes.len() < HEADER_LEN {
            return Err(ContainerError::Truncated { len: bytes.len() });
        }
        let timestamp = Timestamp(LittleEndian::read_u32(&bytes[4..HEADER_LEN]));
        let header = Header { magic: expected, timestamp, payload_len: bytes.len() - HEADER_LEN };
        trace!("header ok: magic={} timestamp={} payload={}B", header.magic, header.timestamp, header.payload_len);
        Ok(header)
    }

    /// Décode un conteneur complet.
    ///
    /// # Errors
    /// Erreurs d’en-tête de [`Self::decode_header`], puis `PayloadCorrupt`
    /// propagée telle quelle depuis le sérialiseur.
    pub fn decode(&self, bytes: &[u8]) -> ContainerResult<CompiledModule> {
        let header = self.decode_header(bytes)?;
        let code = self.marshal.loads(&bytes[HEADER_LEN..])?;
        Ok(CompiledModule::new(header.magic, header.timestamp, code))
    }

    /// Encode un module : étiquette de référence, horodatage LE, charge utile.
    ///
    /// L’étiquette écrite est celle de la configuration, pas celle du module.
    pub fn encode(&self, module: &CompiledModule) -> Vec<u8> {
        let payload = self.marshal.dumps(&module.code);
        let mut out = vec![0u8; HEADER_LEN];
        out[..4].copy_from_slice(self.config.magic.as_bytes());
        LittleEndian::write_u32(&mut out[4..HEADER_LEN], module.timestamp.0);
        out.extend_from_slice(&payload);
        out
    }

    /// Lit et décode un fichier conteneur.
    ///
    /// # Errors
    /// `Io` si le fichier est illisible, sinon comme [`Self::decode`].
    pub fn read_file(&self, path: impl AsRef<Path>) -> ContainerResult<CompiledModule> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| ContainerError::io(path, e))?;
        self.decode(&bytes)
    }

    /// Encode et écrit un fichier conteneur.
    ///
    /// # Errors
    /// `Io` si l’écriture échoue.
    pub fn write_file(&self, path: impl AsRef<Path>, module: &CompiledModule) -> ContainerResult<()> {
        let path = path.as_ref();
        fs::write(path, self.encode(module)).map_err(|e| ContainerError::io(path, e))
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */
