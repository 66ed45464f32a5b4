//! Adaptateur de compilation : source → AST / code, et horodatage du conteneur émis.

use std::{fs, io};

use depyc_ast::Module;
use depyc_compiler::{CompileError, Diagnostic};
use depyc_container::{CodeObject, Timestamp};

use crate::{CompileOptions, DepycError, Hooks, InputHandle};

/// Stratégie qui a fourni l'horodatage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    /// Métadonnées du handle ouvert.
    Handle,
    /// Ressource re-résolue par son nom.
    Path,
}

/// Enveloppe le front-end de compilation branché dans les hooks.
#[derive(Debug, Clone, Copy)]
pub struct SourceAdapter<'h> {
    hooks: &'h Hooks,
    options: &'h CompileOptions,
}

impl<'h> SourceAdapter<'h> {
    /// Nouvel adaptateur.
    pub const fn new(hooks: &'h Hooks, options: &'h CompileOptions) -> Self { Self { hooks, options } }

    /// Texte UTF-8 de l'entrée.
    ///
    /// # Errors
    /// `Compile` si les octets ne sont pas de l'UTF-8.
    pub fn source_text<'a>(&self, handle: &'a InputHandle) -> Result<&'a str, DepycError> {
        std::str::from_utf8(handle.bytes()).map_err(|e| DepycError::Compile {
            resource: handle.name().to_owned(),
            source: CompileError {
                filename: handle.name().to_owned(),
                diagnostics: vec![Diagnostic::error(
                    format!("source is not valid UTF-8 (byte {})", e.valid_up_to()),
                    0,
                )],
            },
        })
    }

    /// Compilation complète.
    ///
    /// # Errors
    /// `Compile` pour une source invalide (propagée telle quelle).
    pub fn compile(&self, handle: &InputHandle) -> Result<CodeObject, DepycError> {
        let src = self.source_text(handle)?;
        (self.hooks.compile)(src, handle.name(), self.options)
    }

    /// Parsing seul.
    ///
    /// # Errors
    /// `Compile` pour une erreur de syntaxe.
    pub fn parse(&self, handle: &InputHandle) -> Result<Module, DepycError> {
        let src = self.source_text(handle)?;
        (self.hooks.parse)(src, handle.name())
    }
}

/// Date de modification de l'entrée.
///
/// Essaie le handle ouvert s'il désigne un fichier régulier (stdin redirigé
/// compris), puis le nom ; jamais l'heure courante. Tubes et terminaux
/// passent directement au nom.
///
/// # Errors
/// `NoTimestamp` si les deux stratégies échouent.
pub fn derive_timestamp(handle: &InputHandle) -> Result<(Timestamp, TimestampSource), DepycError> {
    let name = handle.name();
    let from_handle = handle.handle_metadata().map(|m| {
        m.and_then(|m| if m.is_file() { m.modified() } else { Err(io::Error::other("not a regular file")) })
    });
    match from_handle {
        Some(Ok(t)) => match Timestamp::from_system_time(t) {
            Ok(ts) => {
                log::debug!("timestamp of '{name}' taken from the open handle: {ts}");
                return Ok((ts, TimestampSource::Handle));
            }
            Err(e) => log::debug!("mtime of '{name}' predates the epoch ({e}); resolving by name"),
        },
        Some(Err(e)) => log::debug!("handle of '{name}' has no mtime ({e}); resolving by name"),
        None => log::debug!("'{name}' is a stream; resolving by name"),
    }

    let no_ts = |source: io::Error| DepycError::NoTimestamp { resource: name.to_owned(), source };
    let t = fs::metadata(handle.path()).and_then(|m| m.modified()).map_err(no_ts)?;
    let ts = Timestamp::from_system_time(t).map_err(|e| no_ts(io::Error::other(e)))?;
    log::debug!("timestamp of '{name}' resolved by name: {ts}");
    Ok((ts, TimestampSource::Path))
}
