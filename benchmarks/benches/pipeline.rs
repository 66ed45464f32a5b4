//! Étapes du pipeline en mémoire (Criterion)
//!
//! lexer → parser → compilateur → reconstructeur → rendu, puis les huit
//! chemins du dispatcher sur un module moyen (aucune E/S disque).
//!
//! Lancement :
//!   cargo bench -p depyc-benches --bench pipeline
//!   cargo bench -p depyc-benches -- --save-baseline main

use std::{fmt::Write as _, io};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use depyc_cli::{Dispatcher, Hooks, InputCategory, InputHandle, OutputMode};
use depyc_compiler::{compile_source, ChunkMarshal};
use depyc_container::{CompiledModule, ContainerCodec, ContainerConfig, MagicTag, Timestamp};
use depyc_core::SourceId;

fn source(n: usize) -> String {
    let mut s = String::from("# generated\n");
    for i in 0..n {
        let _ = writeln!(s, "x{i} = (a + {i}) * -b % 7");
        let _ = writeln!(s, "print(x{i}, 'item', not flag)");
    }
    s
}

fn bench_front_end(c: &mut Criterion) {
    let mut g = c.benchmark_group("front_end");
    for n in [16usize, 256] {
        let src = source(n);
        g.throughput(Throughput::Bytes(src.len() as u64));
        g.bench_with_input(BenchmarkId::new("lex", n), &src, |b, s| {
            b.iter(|| depyc_lexer::Lexer::new(black_box(s), SourceId(0)).tokenize());
        });
        g.bench_with_input(BenchmarkId::new("parse", n), &src, |b, s| {
            b.iter(|| depyc_parser::parse(black_box(s)));
        });
        g.bench_with_input(BenchmarkId::new("compile", n), &src, |b, s| {
            b.iter(|| compile_source(black_box(s), "bench.py"));
        });
    }
    g.finish();
}

fn bench_back_end(c: &mut Criterion) {
    let mut g = c.benchmark_group("back_end");
    for n in [16usize, 256] {
        let chunk = compile_source(&source(n), "bench.py").unwrap_or_else(|e| panic!("{e}"));
        let ast = depyc_decompiler::reconstruct(&chunk).unwrap_or_else(|e| panic!("{e}"));
        g.bench_with_input(BenchmarkId::new("reconstruct", n), &chunk, |b, ch| {
            b.iter(|| depyc_decompiler::reconstruct(black_box(ch)));
        });
        g.bench_with_input(BenchmarkId::new("unparse", n), &ast, |b, m| {
            b.iter(|| depyc_ast::unparse(black_box(m)));
        });
        g.bench_with_input(BenchmarkId::new("disassemble", n), &chunk, |b, ch| {
            b.iter(|| depyc_core::disasm::disassemble(black_box(ch), "bench.py"));
        });
    }
    g.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let src = source(64);
    let chunk = compile_source(&src, "bench.py").unwrap_or_else(|e| panic!("{e}"));
    let module = CompiledModule::new(MagicTag::CURRENT, Timestamp(0), ChunkMarshal::code(&chunk));
    let pyc = ContainerCodec::new(ContainerConfig::default(), ChunkMarshal).encode(&module);

    let dispatcher = Dispatcher::new(ContainerConfig::default(), Hooks::default()).with_banners(false);
    let inputs = [
        (InputCategory::SourceText, InputHandle::from_bytes("bench.py", src.into_bytes())),
        (InputCategory::CompiledContainer, InputHandle::from_bytes("bench.pyc", pyc)),
    ];

    let mut g = c.benchmark_group("dispatch");
    for (category, handle) in &inputs {
        for mode in OutputMode::ALL {
            // source → pyc demande un horodatage de fichier réel
            if *category == InputCategory::SourceText && mode == OutputMode::PassThroughContainer {
                continue;
            }
            let id = format!("{}->{mode}", handle.name());
            g.bench_function(id, |b| {
                b.iter(|| {
                    let mut sink = Vec::new();
                    dispatcher.transform(black_box(handle), *category, mode, &mut sink, &mut io::sink())
                });
            });
        }
    }
    g.finish();
}

criterion_group!(benches, bench_front_end, bench_back_end, bench_dispatch);
criterion_main!(benches);
