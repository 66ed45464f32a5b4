//! Sélection du chemin de transformation : (catégorie d'entrée × mode de sortie).
//!
//! Sans état, un seul passage : l'entrée est lue en entier, le chemin écrit
//! dans un tampon mémoire, puis le tampon est livré une seule fois.

use std::io::Write;

use chrono::{Local, TimeZone};
use depyc_container::{CompiledModule, ContainerCodec, ContainerConfig, Header, Marshal, Timestamp};

use crate::{
    adapter::{derive_timestamp, SourceAdapter},
    commit, CompileOptions, DepycError, Hooks, Input, InputCategory, InputHandle, InputType, Output, OutputMode,
};

/// Une invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Entrée.
    pub input: Input,
    /// Nature déclarée de l'entrée.
    pub input_type: InputType,
    /// Transformation.
    pub mode: OutputMode,
    /// Destination.
    pub output: Output,
}

/// Dispatcher : codec configuré + hooks.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: ContainerConfig,
    hooks: Hooks,
    compile: CompileOptions,
    banners: bool,
}

impl Dispatcher {
    /// Nouveau dispatcher (bannières actives).
    pub fn new(config: ContainerConfig, hooks: Hooks) -> Self {
        Self { config, hooks, compile: CompileOptions::default(), banners: true }
    }

    /// Options passées au compilateur.
    #[must_use]
    pub fn with_compile_options(mut self, compile: CompileOptions) -> Self {
        self.compile = compile;
        self
    }

    /// Active/désactive les lignes d'information sur le canal d'erreur.
    #[must_use]
    pub const fn with_banners(mut self, on: bool) -> Self {
        self.banners = on;
        self
    }

    fn codec(&self) -> ContainerCodec<&'static (dyn Marshal + Sync)> { ContainerCodec::new(self.config, self.hooks.marshal) }

    /// Lit l'entrée, applique le chemin choisi, livre la sortie.
    ///
    /// En cas d'échec, une ligne nommant l'entrée et l'étape est écrite sur
    /// `diag` et rien n'est livré.
    ///
    /// # Errors
    /// L'erreur de l'étape fautive, sans traduction.
    pub fn run(&self, req: &Request, diag: &mut dyn Write) -> Result<InputCategory, DepycError> {
        let handle = match InputHandle::open(&req.input) {
            Ok(h) => h,
            Err(e) => {
                report(diag, "reading", input_name(&req.input), &e);
                return Err(e);
            }
        };
        let category = req.input_type.resolve(handle.name());
        log::info!("'{}': {category:?} -> {}", handle.name(), req.mode);

        let mut sink = Vec::new();
        if let Err(e) = self.transform(&handle, category, req.mode, &mut sink, diag) {
            report(diag, stage(category, req.mode), handle.name(), &e);
            return Err(e);
        }
        if let Err(e) = commit(&req.output, &sink) {
            report(diag, "writing the output of", handle.name(), &e);
            return Err(e);
        }
        log::debug!("committed {} byte(s)", sink.len());
        Ok(category)
    }

    /// Applique le chemin (catégorie × mode) à une entrée déjà lue, vers `sink`.
    ///
    /// # Errors
    /// L'erreur du collaborateur ou du codec, telle quelle.
    pub fn transform(
        &self,
        handle: &InputHandle,
        category: InputCategory,
        mode: OutputMode,
        sink: &mut Vec<u8>,
        diag: &mut dyn Write,
    ) -> Result<(), DepycError> {
        use InputCategory::{CompiledContainer, SourceText};
        use OutputMode::{AbstractSyntaxTree, Disassembly, PassThroughContainer, ReconstructedSource};

        let name = handle.name();
        let adapter = SourceAdapter::new(&self.hooks, &self.compile);
        if category == SourceText {
            self.banner(diag, format_args!("Analysing module '{name}'"));
        }

        match (category, mode) {
            (CompiledContainer, PassThroughContainer) => {
                self.header(handle, diag)?;
                sink.extend_from_slice(handle.bytes());
            }
            (CompiledContainer, Disassembly) => {
                let module = self.decode(handle, diag)?;
                let text = (self.hooks.disassemble)(&module.code, name)?;
                push_text(sink, &text);
            }
            (CompiledContainer, AbstractSyntaxTree) => {
                let module = self.decode(handle, diag)?;
                let ast = (self.hooks.reconstruct)(&module.code, name)?;
                push_text(sink, &(self.hooks.dump_ast)(&ast));
            }
            (CompiledContainer, ReconstructedSource) => {
                let module = self.decode(handle, diag)?;
                let ast = (self.hooks.reconstruct)(&module.code, name)?;
                sink.extend_from_slice((self.hooks.render_source)(&ast).as_bytes());
            }
            (SourceText, Disassembly) => {
                let code = adapter.compile(handle)?;
                let text = (self.hooks.disassemble)(&code, name)?;
                push_text(sink, &text);
            }
            (SourceText, AbstractSyntaxTree) => {
                let ast = adapter.parse(handle)?;
                push_text(sink, &(self.hooks.dump_ast)(&ast));
            }
            (SourceText, ReconstructedSource) => sink.extend_from_slice(handle.bytes()),
            (SourceText, PassThroughContainer) => {
                let code = adapter.compile(handle)?;
                let (timestamp, from) = derive_timestamp(handle)?;
                log::debug!("'{name}': timestamp {timestamp} ({from:?})");
                let module = CompiledModule::new(self.config.magic, timestamp, code);
                sink.extend_from_slice(&self.codec().encode(&module));
            }
        }
        Ok(())
    }

    fn header(&self, handle: &InputHandle, diag: &mut dyn Write) -> Result<Header, DepycError> {
        let header = self.codec().decode_header(handle.bytes()).map_err(|source| DepycError::Container {
            resource: handle.name().to_owned(),
            source,
        })?;
        self.banner(
            diag,
            format_args!("Decompiling module '{}' compiled on {}", handle.name(), asctime(header.timestamp)),
        );
        Ok(header)
    }

    fn decode(&self, handle: &InputHandle, diag: &mut dyn Write) -> Result<CompiledModule, DepycError> {
        self.header(handle, diag)?;
        self.codec()
            .decode(handle.bytes())
            .map_err(|source| DepycError::Container { resource: handle.name().to_owned(), source })
    }

    fn banner(&self, diag: &mut dyn Write, line: std::fmt::Arguments<'_>) {
        if self.banners {
            let _ = writeln!(diag, "{line}");
        }
    }
}

/// Rendu `asctime` (heure locale) d'un horodatage d'en-tête.
pub fn asctime(ts: Timestamp) -> String {
    Local
        .timestamp_opt(i64::from(ts.0), 0)
        .single()
        .map_or_else(|| ts.to_string(), |dt| dt.format("%a %b %e %H:%M:%S %Y").to_string())
}

/// Nom de l'étape pour les diagnostics.
pub const fn stage(category: InputCategory, mode: OutputMode) -> &'static str {
    use InputCategory::{CompiledContainer, SourceText};
    use OutputMode::{AbstractSyntaxTree, Disassembly, PassThroughContainer, ReconstructedSource};
    match (category, mode) {
        (CompiledContainer, PassThroughContainer) => "validating",
        (CompiledContainer, Disassembly) => "disassembling",
        (CompiledContainer, AbstractSyntaxTree) => "reconstructing the AST of",
        (CompiledContainer, ReconstructedSource) => "decompiling",
        (SourceText, Disassembly) => "compiling and disassembling",
        (SourceText, AbstractSyntaxTree) => "parsing",
        (SourceText, ReconstructedSource) => "echoing",
        (SourceText, PassThroughContainer) => "compiling",
    }
}

fn report(diag: &mut dyn Write, stage: &str, name: &str, e: &DepycError) {
    let _ = writeln!(diag, "depyc: failed while {stage} '{name}': {}", e.chain());
}

fn input_name(input: &Input) -> &str {
    match input {
        Input::Stdin => "<stdin>",
        Input::Path(p) => p.to_str().unwrap_or("<non-UTF-8 path>"),
    }
}

fn push_text(sink: &mut Vec<u8>, text: &str) {
    sink.extend_from_slice(text.as_bytes());
    if !text.is_empty() && !text.ends_with('\n') {
        sink.push(b'\n');
    }
}
