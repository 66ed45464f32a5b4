//! `depyc`: CLI principal
//!
//! Ici on fait uniquement : parsing d'arguments, initialisation (logger,
//! couleur), et délégation à `depyc_cli` (lib).

#![forbid(unsafe_code)]

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{ArgAction, ArgGroup, Parser, ValueEnum};
use depyc_container::{ContainerConfig, MagicTag};

use depyc_cli as cli; // notre lib interne (src/lib.rs)

// ──────────────────────────── CLI (clap) ────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "depyc",
    version,
    about = "depyc : conteneurs compilés, désassemblage, AST et source reconstruite",
    long_about = None,
    group(ArgGroup::new("mode").args(["python", "ast", "opcode", "pyc", "output_type"]))
)]
struct Opt {
    /// Fichier d'entrée (`-` = stdin)
    input: PathBuf,

    /// Nature de l'entrée
    #[arg(short = 't', long = "input-type", value_enum, default_value_t = InputTypeArg::FromFilename)]
    input_type: InputTypeArg,

    /// Fichier de sortie (`-` = stdout)
    #[arg(short = 'o', long = "output", default_value = "-")]
    output: PathBuf,

    /// Source reconstruite (défaut)
    #[arg(long)]
    python: bool,

    /// Arbre syntaxique
    #[arg(long)]
    ast: bool,

    /// Listing d'opcodes
    #[arg(long)]
    opcode: bool,

    /// Conteneur compilé
    #[arg(long)]
    pyc: bool,

    /// Mode par son nom (pyc, opcode, ast, python)
    #[arg(long = "output-type", value_name = "NAME")]
    output_type: Option<String>,

    /// Étiquette magique de référence (8 chiffres hexadécimaux)
    #[arg(long, value_name = "HEX")]
    magic: Option<MagicTag>,

    /// Replie les constantes à la compilation
    #[arg(short = 'O', long)]
    optimize: bool,

    /// N'embarque pas la table des lignes
    #[arg(long)]
    strip: bool,

    /// Augmente la verbosité (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Mode silencieux (casse la verbosité)
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,

    /// Couleur des statuts (si la feature `color` est compilée)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InputTypeArg {
    FromFilename,
    Python,
    Pyc,
}

impl From<InputTypeArg> for cli::InputType {
    fn from(t: InputTypeArg) -> Self {
        match t {
            InputTypeArg::FromFilename => Self::FromFilename,
            InputTypeArg::Python => Self::Python,
            InputTypeArg::Pyc => Self::Pyc,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl Opt {
    /// Mode demandé ; un nom inconnu échoue ici, avant toute E/S.
    fn mode(&self) -> Result<cli::OutputMode, cli::DepycError> {
        if let Some(name) = &self.output_type {
            return name.parse();
        }
        Ok(if self.pyc {
            cli::OutputMode::PassThroughContainer
        } else if self.opcode {
            cli::OutputMode::Disassembly
        } else if self.ast {
            cli::OutputMode::AbstractSyntaxTree
        } else {
            cli::OutputMode::ReconstructedSource
        })
    }
}

// ──────────────────────────── Logger / Verbosité ────────────────────────────

const fn log_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

const fn color_override(choice: ColorChoice) -> Option<bool> {
    match choice {
        ColorChoice::Auto => None,
        ColorChoice::Always => Some(true),
        ColorChoice::Never => Some(false),
    }
}

// ──────────────────────────── main ────────────────────────────

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        cli::status_error(&format!("{e:#}"));
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn real_main() -> Result<()> {
    let opt = Opt::parse();

    cli::set_color(color_override(opt.color));
    cli::init_logger(log_level(opt.verbose, opt.quiet));

    let mode = opt.mode().context("invalid output mode")?;
    let config = opt.magic.map_or_else(ContainerConfig::default, ContainerConfig::with_magic);
    log::debug!("reference magic tag: {}", config.magic);

    let request = cli::Request {
        input: cli::Input::from_arg(&opt.input),
        input_type: opt.input_type.into(),
        mode,
        output: cli::Output::from_arg(&opt.output),
    };
    let dispatcher = cli::Dispatcher::new(config, cli::Hooks::default())
        .with_compile_options(cli::CompileOptions { optimize: opt.optimize, strip: opt.strip })
        .with_banners(!opt.quiet);

    let mut stderr = std::io::stderr().lock();
    dispatcher
        .run(&request, &mut stderr)
        .with_context(|| format!("{} → {}", opt.input.display(), mode))?;
    drop(stderr);

    if let cli::Output::Path(p) = &request.output {
        if !opt.quiet {
            cli::status_ok("WROTE", &p.display().to_string());
        }
    }
    Ok(())
}

// ──────────────────────────── Tests ────────────────────────────
