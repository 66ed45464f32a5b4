//! depyc-cli: bibliothèque interne du binaire `depyc`
//!
//! But : une API **testable et réutilisable** pour le CLI, sans mélanger la
//! logique d'E/S et le parsing d'arguments (laissé à `main.rs`).
//!
//! Points clés :
//! - Taxonomie d'erreurs ([`DepycError`], [`ErrorKind`])
//! - Hooks vers les collaborateurs (compilateur, désassembleur, reconstructeur,
//!   rendus d'AST) ; `Hooks::default()` branche la chaîne de référence
//! - [`dispatch`] : sélection (catégorie d'entrée × mode de sortie)
//! - [`adapter`] : compilation de source et dérivation de l'horodatage
//! - Utilitaires d'E/S (stdin/stdout, écriture atomique)
//! - Traces (`feature = "trace"`) et couleurs (`feature = "color"`) optionnelles

#![deny(unused_must_use)]
#![forbid(unsafe_code)]

pub mod adapter;
pub mod dispatch;

use std::{
    error::Error as StdError,
    fmt, fs,
    fs::File,
    io::{self, BufWriter, Read, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use depyc_ast::Module;
use depyc_compiler::{ChunkMarshal, CompileError, CompilerOptions};
use depyc_container::{CodeObject, ContainerError, Marshal};
use depyc_decompiler::ReconstructError;

#[cfg(feature = "color")]
use owo_colors::OwoColorize;

pub use adapter::{derive_timestamp, SourceAdapter, TimestampSource};
pub use dispatch::{Dispatcher, Request};

// ───────────────────────────── Erreurs ─────────────────────────────

/// Catégorie d'échec, préservée de bout en bout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// L'entrée n'est pas un conteneur de la version attendue.
    FormatMismatch,
    /// L'enregistrement de code est illisible.
    PayloadCorrupt,
    /// La source ne compile pas.
    CompileError,
    /// Le reconstructeur a échoué.
    ReconstructionError,
    /// Mode de sortie inconnu.
    UnsupportedMode,
    /// Entrée/sortie ou métadonnées inaccessibles.
    ResourceUnavailable,
}

/// Erreur du pipeline ; chaque variante nomme l'étape et la ressource.
#[derive(Debug, thiserror::Error)]
pub enum DepycError {
    /// Décodage du conteneur ou de sa charge utile.
    #[error("cannot decode `{resource}`")]
    Container {
        /// Entrée concernée.
        resource: String,
        /// Cause.
        #[source]
        source: ContainerError,
    },
    /// Compilation (ou parsing) de la source.
    #[error("cannot compile `{resource}`")]
    Compile {
        /// Entrée concernée.
        resource: String,
        /// Cause.
        #[source]
        source: CompileError,
    },
    /// Reconstruction de l'AST depuis le code.
    #[error("cannot reconstruct `{resource}`")]
    Reconstruct {
        /// Entrée concernée.
        resource: String,
        /// Cause.
        #[source]
        source: ReconstructError,
    },
    /// Nom de mode inconnu.
    #[error("unsupported output mode `{0}` (expected pyc, opcode, ast or python)")]
    UnsupportedMode(String),
    /// Lecture de l'entrée ou écriture de la sortie.
    #[error("cannot access `{resource}`")]
    Io {
        /// Fichier ou flux.
        resource: String,
        /// Cause.
        #[source]
        source: io::Error,
    },
    /// Ni le handle ni le chemin ne donnent de date de modification.
    #[error("cannot determine the modification time of `{resource}`")]
    NoTimestamp {
        /// Entrée concernée.
        resource: String,
        /// Cause (stratégie par chemin).
        #[source]
        source: io::Error,
    },
}

impl DepycError {
    /// Catégorie de l'erreur.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Container { source, .. } => match source {
                ContainerError::FormatMismatch { .. } | ContainerError::Truncated { .. } => ErrorKind::FormatMismatch,
                ContainerError::PayloadCorrupt(_) => ErrorKind::PayloadCorrupt,
                ContainerError::Io { .. } => ErrorKind::ResourceUnavailable,
            },
            Self::Compile { .. } => ErrorKind::CompileError,
            Self::Reconstruct { .. } => ErrorKind::ReconstructionError,
            Self::UnsupportedMode(_) => ErrorKind::UnsupportedMode,
            Self::Io { .. } | Self::NoTimestamp { .. } => ErrorKind::ResourceUnavailable,
        }
    }

    /// Message et causes, séparés par `: `.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut cur = self.source();
        while let Some(e) = cur {
            out.push_str(": ");
            out.push_str(&e.to_string());
            cur = e.source();
        }
        out
    }

    fn io(resource: impl Into<String>, source: io::Error) -> Self { Self::Io { resource: resource.into(), source } }
}

// ───────────────────────────── Modes ─────────────────────────────

/// Transformation demandée.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Conteneur compilé (`pyc`).
    PassThroughContainer,
    /// Listing d'opcodes (`opcode`).
    Disassembly,
    /// Arbre syntaxique (`ast`).
    AbstractSyntaxTree,
    /// Source reconstruite (`python`).
    #[default]
    ReconstructedSource,
}

impl OutputMode {
    /// Tous les modes, dans l'ordre des noms.
    pub const ALL: [Self; 4] =
        [Self::PassThroughContainer, Self::Disassembly, Self::AbstractSyntaxTree, Self::ReconstructedSource];

    /// Nom textuel.
    pub const fn name(self) -> &'static str {
        match self {
            Self::PassThroughContainer => "pyc",
            Self::Disassembly => "opcode",
            Self::AbstractSyntaxTree => "ast",
            Self::ReconstructedSource => "python",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for OutputMode {
    type Err = DepycError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|m| m.name() == s).ok_or_else(|| DepycError::UnsupportedMode(s.to_owned()))
    }
}

/// Nature de l'entrée, fixée avant le dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCategory {
    /// Texte source.
    SourceText,
    /// Conteneur compilé.
    CompiledContainer,
}

/// Choix de l'utilisateur pour la nature de l'entrée.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputType {
    /// Source si le nom finit par `.py`, conteneur sinon.
    #[default]
    FromFilename,
    /// Toujours du texte source.
    Python,
    /// Toujours un conteneur.
    Pyc,
}

impl InputType {
    /// Catégorie effective pour l'entrée `name`.
    pub fn resolve(self, name: &str) -> InputCategory {
        match self {
            Self::Python => InputCategory::SourceText,
            Self::Pyc => InputCategory::CompiledContainer,
            Self::FromFilename if name.ends_with(".py") => InputCategory::SourceText,
            Self::FromFilename => InputCategory::CompiledContainer,
        }
    }
}

// ───────────────────────────── Entrées / sorties ─────────────────────────────

/// Entrée : fichier ou `-` (=stdin).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Input {
    /// Fichier.
    Path(PathBuf),
    /// Entrée standard.
    #[default]
    Stdin,
}

impl Input {
    /// `-` désigne stdin.
    pub fn from_arg(p: impl Into<PathBuf>) -> Self {
        let p = p.into();
        if p.as_os_str() == "-" { Self::Stdin } else { Self::Path(p) }
    }
}

/// Sortie : fichier ou `-` (=stdout).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Output {
    /// Fichier (écrit atomiquement).
    Path(PathBuf),
    /// Sortie standard.
    #[default]
    Stdout,
}

impl Output {
    /// `-` désigne stdout.
    pub fn from_arg(p: impl Into<PathBuf>) -> Self {
        let p = p.into();
        if p.as_os_str() == "-" { Self::Stdout } else { Self::Path(p) }
    }
}

/// Entrée ouverte et lue en entier.
///
/// Un fichier garde son handle (pour ses métadonnées). Sous unix, stdin en
/// garde un aussi : redirigé depuis un fichier, il a une date de modification.
#[derive(Debug)]
pub struct InputHandle {
    name: String,
    file: Option<File>,
    bytes: Vec<u8>,
}

impl InputHandle {
    /// Ouvre et lit `input`.
    ///
    /// # Errors
    /// `Io` si l'entrée est illisible.
    pub fn open(input: &Input) -> Result<Self, DepycError> {
        match input {
            Input::Stdin => {
                let mut bytes = Vec::new();
                io::stdin().lock().read_to_end(&mut bytes).map_err(|e| DepycError::io("<stdin>", e))?;
                Ok(Self { name: "<stdin>".to_owned(), file: stdin_file(), bytes })
            }
            Input::Path(p) => {
                let name = display(p);
                let mut file = File::open(p).map_err(|e| DepycError::io(&name, e))?;
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes).map_err(|e| DepycError::io(&name, e))?;
                Ok(Self { name, file: Some(file), bytes })
            }
        }
    }

    /// Flux d'octets nommé, sans handle de fichier.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), file: None, bytes }
    }

    /// Nom (chemin tel que donné, ou `<stdin>`).
    pub fn name(&self) -> &str { &self.name }

    /// Contenu complet.
    pub fn bytes(&self) -> &[u8] { &self.bytes }

    /// Métadonnées du handle ouvert, s'il y en a un.
    pub fn handle_metadata(&self) -> Option<io::Result<fs::Metadata>> { self.file.as_ref().map(File::metadata) }

    /// Ressource désignée par le nom.
    pub fn path(&self) -> &Path { Path::new(&self.name) }
}

/// Duplique le descripteur de stdin (tube, terminal ou fichier).
#[cfg(unix)]
fn stdin_file() -> Option<File> {
    use std::os::fd::AsFd;
    io::stdin().as_fd().try_clone_to_owned().map(File::from).ok()
}

#[cfg(not(unix))]
const fn stdin_file() -> Option<File> { None }

/// Écrit `bytes` vers `output`, en une fois.
///
/// # Errors
/// `Io` si l'écriture échoue ; aucun fichier partiel n'est laissé.
pub fn commit(output: &Output, bytes: &[u8]) -> Result<(), DepycError> {
    match output {
        Output::Stdout => {
            let mut w = BufWriter::new(io::stdout().lock());
            w.write_all(bytes).and_then(|()| w.flush()).map_err(|e| DepycError::io("<stdout>", e))
        }
        Output::Path(p) => write_bytes_atomic(p, bytes).map_err(|e| DepycError::io(display(p), e)),
    }
}

/// Écriture via un fichier temporaire voisin puis `rename`.
///
/// # Errors
/// Toute erreur d'E/S ; le temporaire est supprimé.
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let tmp = unique_tmp_path(parent, path.file_name().unwrap_or_default());
    let written = File::create(&tmp).and_then(|f| {
        let mut w = BufWriter::new(f);
        w.write_all(bytes)?;
        w.flush()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).or_else(|_| {
        // Windows : rename sur cible existante peut échouer
        #[cfg(windows)]
        if path.exists() && fs::remove_file(path).is_ok() && fs::rename(&tmp, path).is_ok() {
            return Ok(());
        }
        // fallback : copie puis suppr tmp
        let copied = fs::copy(&tmp, path).map(|_| ());
        let _ = fs::remove_file(&tmp);
        copied
    })
}

fn unique_tmp_path(dir: &Path, base: &std::ffi::OsStr) -> PathBuf {
    let mut i = 0u32;
    loop {
        let candidate = dir.join(format!("{}.tmp{}", base.to_string_lossy(), i));
        if !candidate.exists() {
            return candidate;
        }
        i = i.wrapping_add(1);
    }
}

fn display(p: &Path) -> String { p.to_string_lossy().to_string() }

// ───────────────────────────── Hooks ─────────────────────────────

/// Options passées au hook de compilation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Replier les constantes.
    pub optimize: bool,
    /// Ne pas embarquer la table des lignes.
    pub strip: bool,
}

/// Compilateur : source → enregistrement de code.
pub type CompileFn = fn(source: &str, name: &str, opts: &CompileOptions) -> Result<CodeObject, DepycError>;
/// Parseur seul : source → AST.
pub type ParseFn = fn(source: &str, name: &str) -> Result<Module, DepycError>;
/// Désassembleur : code → listing.
pub type DisasmFn = fn(code: &CodeObject, name: &str) -> Result<String, DepycError>;
/// Reconstructeur : code → AST.
pub type ReconstructFn = fn(code: &CodeObject, name: &str) -> Result<Module, DepycError>;
/// Rendu d'AST (arbre ou source).
pub type AstRenderFn = fn(module: &Module) -> String;

/// Collaborateurs du pipeline.
#[derive(Clone, Copy)]
pub struct Hooks {
    /// Sérialiseur de l'enregistrement de code.
    pub marshal: &'static (dyn Marshal + Sync),
    /// Compilation complète.
    pub compile: CompileFn,
    /// Parsing seul.
    pub parse: ParseFn,
    /// Listing d'opcodes.
    pub disassemble: DisasmFn,
    /// Code → AST.
    pub reconstruct: ReconstructFn,
    /// AST → arbre indenté.
    pub dump_ast: AstRenderFn,
    /// AST → source.
    pub render_source: AstRenderFn,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            marshal: &ChunkMarshal,
            compile: reference::compile,
            parse: reference::parse,
            disassemble: reference::disassemble,
            reconstruct: reference::reconstruct,
            dump_ast: depyc_ast::dump,
            render_source: depyc_ast::unparse,
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.debug_struct("Hooks").finish_non_exhaustive() }
}

/// Chaîne de référence (depyc-compiler, depyc-core, depyc-decompiler).
mod reference {
    use super::{ChunkMarshal, CodeObject, CompileOptions, CompilerOptions, DepycError, Module};

    pub(super) fn compile(source: &str, name: &str, opts: &CompileOptions) -> Result<CodeObject, DepycError> {
        let options =
            CompilerOptions { embed_lines: !opts.strip, optimize: opts.optimize, ..CompilerOptions::for_file(name) };
        let chunk = depyc_compiler::compile_source_with(source, options)
            .map_err(|source| DepycError::Compile { resource: name.to_owned(), source })?;
        Ok(ChunkMarshal::code(&chunk))
    }

    pub(super) fn parse(source: &str, name: &str) -> Result<Module, DepycError> {
        depyc_compiler::parse_source(source, name)
            .map_err(|source| DepycError::Compile { resource: name.to_owned(), source })
    }

    pub(super) fn disassemble(code: &CodeObject, name: &str) -> Result<String, DepycError> {
        let chunk =
            ChunkMarshal::chunk(code).map_err(|source| DepycError::Container { resource: name.to_owned(), source })?;
        Ok(depyc_core::disasm::disassemble(&chunk, name))
    }

    pub(super) fn reconstruct(code: &CodeObject, name: &str) -> Result<Module, DepycError> {
        let chunk =
            ChunkMarshal::chunk(code).map_err(|source| DepycError::Container { resource: name.to_owned(), source })?;
        depyc_decompiler::reconstruct(&chunk)
            .map_err(|source| DepycError::Reconstruct { resource: name.to_owned(), source })
    }
}

// ───────────────────────────── Initialisation ─────────────────────────────

/// Initialise le logger selon la feature `trace` ; `RUST_LOG` a priorité sur `default_level`.
pub fn init_logger(default_level: &str) {
    #[cfg(feature = "trace")]
    {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_secs()
            .try_init();
    }
    #[cfg(not(feature = "trace"))]
    let _ = default_level;
}

/// Force (`Some`) ou laisse détecter (`None`) la couleur des statuts.
pub fn set_color(enabled: Option<bool>) {
    #[cfg(feature = "color")]
    match enabled {
        Some(on) => owo_colors::set_override(on),
        None => owo_colors::unset_override(),
    }
    #[cfg(not(feature = "color"))]
    let _ = enabled;
}

// ───────────────────────────── Sorties jolies ─────────────────────────────

/// Statut de succès sur stderr.
pub fn status_ok(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    {
        let style = owo_colors::Style::new().green().bold();
        eprintln!("{} {}", tag.if_supports_color(owo_colors::Stream::Stderr, |t| t.style(style)), msg);
    }
    #[cfg(not(feature = "color"))]
    {
        eprintln!("{tag} {msg}");
    }
}

/// Erreur finale sur stderr (`error: …`).
pub fn status_error(msg: &str) {
    #[cfg(feature = "color")]
    {
        let style = owo_colors::Style::new().red().bold();
        eprintln!("{} {}", "error:".if_supports_color(owo_colors::Stream::Stderr, |t| t.style(style)), msg);
    }
    #[cfg(not(feature = "color"))]
    {
        eprintln!("error: {msg}");
    }
}

// ───────────────────────────── Tests ─────────────────────────────
