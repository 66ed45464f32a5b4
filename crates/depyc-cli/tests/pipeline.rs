//! Chemins complets : fichier d'entrée → dispatcher → fichier de sortie.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use depyc_cli::{
    Dispatcher, ErrorKind, Hooks, Input, InputCategory, InputType, Output, OutputMode, Request,
};
use depyc_container::{ContainerCodec, ContainerConfig, MagicTag, RawMarshal, Timestamp};
use pretty_assertions::assert_eq;

const HELLO: &str = "print('hi')\n";

fn write_source(dir: &Path, name: &str, src: &str, mtime: u32) -> PathBuf {
    let p = dir.join(name);
    fs::write(&p, src).unwrap();
    let f = fs::OpenOptions::new().write(true).open(&p).unwrap();
    f.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(u64::from(mtime))).unwrap();
    p
}

fn request(input: &Path, mode: OutputMode, output: &Path) -> Request {
    Request {
        input: Input::Path(input.to_path_buf()),
        input_type: InputType::FromFilename,
        mode,
        output: Output::Path(output.to_path_buf()),
    }
}

fn run(req: &Request) -> (Result<InputCategory, depyc_cli::DepycError>, String) {
    let mut diag = Vec::new();
    let r = Dispatcher::new(ContainerConfig::default(), Hooks::default()).run(req, &mut diag);
    (r, String::from_utf8(diag).unwrap())
}

fn compile_to_pyc(dir: &Path, src: &str, mtime: u32) -> (PathBuf, PathBuf) {
    let py = write_source(dir, "hello.py", src, mtime);
    let pyc = dir.join("hello.pyc");
    let (r, _) = run(&request(&py, OutputMode::PassThroughContainer, &pyc));
    assert_eq!(r.unwrap(), InputCategory::SourceText);
    (py, pyc)
}

/* ───────────── Identités ───────────── */

#[test]
fn container_pass_through_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let (_, pyc) = compile_to_pyc(dir.path(), HELLO, 1_000);
    let copy = dir.path().join("copy.pyc");
    let (r, diag) = run(&request(&pyc, OutputMode::PassThroughContainer, &copy));
    assert_eq!(r.unwrap(), InputCategory::CompiledContainer);
    assert_eq!(fs::read(&copy).unwrap(), fs::read(&pyc).unwrap());
    assert!(diag.starts_with("Decompiling module '"), "{diag}");
}

#[test]
fn source_echo_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let src = "x = 1  # spacing and comments survive\n\n\ny=x*2";
    let py = write_source(dir.path(), "echo.py", src, 0);
    let out = dir.path().join("echo.out.py");
    let (r, diag) = run(&request(&py, OutputMode::ReconstructedSource, &out));
    r.unwrap();
    assert_eq!(fs::read_to_string(&out).unwrap(), src);
    assert_eq!(diag, format!("Analysing module '{}'\n", py.display()));
}

/* ───────────── Horodatage ───────────── */

#[test]
fn container_timestamp_is_the_source_mtime() {
    let dir = tempfile::tempdir().unwrap();
    let (_, pyc) = compile_to_pyc(dir.path(), HELLO, 1_650_000_123);
    let codec = ContainerCodec::new(ContainerConfig::default(), RawMarshal);
    let header = codec.decode_header(&fs::read(&pyc).unwrap()).unwrap();
    assert_eq!(header.timestamp, Timestamp(1_650_000_123));
    assert_eq!(header.magic, MagicTag::CURRENT);
}

/* ───────────── Bout en bout ───────────── */

#[test]
fn compiled_then_disassembled_matches_direct_compile() {
    let dir = tempfile::tempdir().unwrap();
    let (py, pyc) = compile_to_pyc(dir.path(), HELLO, 42);
    let listing = dir.path().join("hello.txt");
    let (r, _) = run(&request(&pyc, OutputMode::Disassembly, &listing));
    r.unwrap();

    let chunk = depyc_compiler::compile_source(HELLO, &py.to_string_lossy()).unwrap();
    let direct = depyc_core::disasm::disassemble(&chunk, &pyc.to_string_lossy());
    assert_eq!(fs::read_to_string(&listing).unwrap(), direct);
}

#[test]
fn compiled_then_decompiled_gives_the_source_back() {
    let dir = tempfile::tempdir().unwrap();
    let src = "greeting = 'hello, ' + name\nprint(greeting, -len(greeting) * 2)\npass\n";
    let py = write_source(dir.path(), "greet.py", src, 7);
    let pyc = dir.path().join("greet.pyc");
    run(&request(&py, OutputMode::PassThroughContainer, &pyc)).0.unwrap();

    let back = dir.path().join("greet.back.py");
    run(&request(&pyc, OutputMode::ReconstructedSource, &back)).0.unwrap();
    assert_eq!(fs::read_to_string(&back).unwrap(), src);

    let from_pyc = dir.path().join("from_pyc.ast");
    let from_py = dir.path().join("from_py.ast");
    run(&request(&pyc, OutputMode::AbstractSyntaxTree, &from_pyc)).0.unwrap();
    run(&request(&py, OutputMode::AbstractSyntaxTree, &from_py)).0.unwrap();
    assert_eq!(fs::read_to_string(&from_pyc).unwrap(), fs::read_to_string(&from_py).unwrap());
}

#[test]
fn forced_input_type_overrides_the_extension() {
    let dir = tempfile::tempdir().unwrap();
    let src_txt = write_source(dir.path(), "script.txt", HELLO, 0);
    let out = dir.path().join("out.ast");
    let mut req = request(&src_txt, OutputMode::AbstractSyntaxTree, &out);
    req.input_type = InputType::Python;
    assert_eq!(run(&req).0.unwrap(), InputCategory::SourceText);
    assert!(fs::read_to_string(&out).unwrap().starts_with("Module\n"));
}

/* ───────────── Échecs ───────────── */

#[test]
fn unknown_mode_name_is_rejected() {
    let err = "bytecode".parse::<OutputMode>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedMode);
}

#[test]
fn foreign_container_fails_with_a_diagnostic_and_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("foreign.pyc");
    fs::write(&bad, b"\x42\x0d\x0d\x0a\0\0\0\0payload").unwrap();
    let out = dir.path().join("foreign.py");

    let (r, diag) = run(&request(&bad, OutputMode::ReconstructedSource, &out));
    assert_eq!(r.unwrap_err().kind(), ErrorKind::FormatMismatch);
    assert!(!out.exists());
    let lines: Vec<&str> = diag.lines().collect();
    assert_eq!(lines.len(), 1, "{diag}");
    assert!(lines[0].starts_with("depyc: failed while decompiling '"), "{diag}");
    assert!(lines[0].contains("foreign.pyc"), "{diag}");
}

#[test]
fn foreign_magic_is_accepted_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let (_, pyc) = compile_to_pyc(dir.path(), HELLO, 0);
    let other = MagicTag::from_version(3413);
    let mut bytes = fs::read(&pyc).unwrap();
    bytes[..4].copy_from_slice(&other.0);
    let foreign = dir.path().join("foreign.pyc");
    fs::write(&foreign, &bytes).unwrap();

    let out = dir.path().join("out.py");
    let (r, _) = run(&request(&foreign, OutputMode::ReconstructedSource, &out));
    assert_eq!(r.unwrap_err().kind(), ErrorKind::FormatMismatch);

    let mut diag = Vec::new();
    Dispatcher::new(ContainerConfig::with_magic(other), Hooks::default())
        .run(&request(&foreign, OutputMode::ReconstructedSource, &out), &mut diag)
        .unwrap();
    assert_eq!(fs::read_to_string(&out).unwrap(), HELLO);
}

#[test]
fn syntax_error_is_a_compile_error() {
    let dir = tempfile::tempdir().unwrap();
    let py = write_source(dir.path(), "broken.py", "x = = 1\n", 0);
    let pyc = dir.path().join("broken.pyc");
    let (r, diag) = run(&request(&py, OutputMode::PassThroughContainer, &pyc));
    let err = r.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CompileError);
    assert!(!pyc.exists());
    assert!(diag.contains("depyc: failed while compiling"), "{diag}");
    assert!(err.chain().contains("line 1"), "{}", err.chain());
}

#[test]
fn corrupt_payload_is_reported_as_such() {
    let dir = tempfile::tempdir().unwrap();
    let (_, pyc) = compile_to_pyc(dir.path(), HELLO, 0);
    let mut bytes = fs::read(&pyc).unwrap();
    bytes.truncate(bytes.len() - 3);
    fs::write(&pyc, &bytes).unwrap();
    let out = dir.path().join("out.txt");
    let (r, _) = run(&request(&pyc, OutputMode::Disassembly, &out));
    assert_eq!(r.unwrap_err().kind(), ErrorKind::PayloadCorrupt);
    assert!(!out.exists());
}

#[test]
fn missing_input_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let (r, diag) = run(&request(&dir.path().join("nope.pyc"), OutputMode::Disassembly, &dir.path().join("o")));
    assert_eq!(r.unwrap_err().kind(), ErrorKind::ResourceUnavailable);
    assert!(diag.starts_with("depyc: failed while reading '"), "{diag}");
}
