//! Benchmarks du codec de conteneur (Criterion)
//!
//! ▶ Paramètres via variables d’environnement :
//!   - CRIT_SAMPLES      (def=60)   : taille d’échantillon Criterion
//!   - CRIT_MEASURE_MS   (def=1000) : fenêtre de mesure en ms
//!
//! Suites : en-tête seul, décodage complet (avec validation du code),
//! encodage, pour des modules de 1, 64 et 1024 instructions.

use std::{fmt::Write as _, time::Duration};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use depyc_compiler::{compile_source, ChunkMarshal};
use depyc_container::{CompiledModule, ContainerCodec, ContainerConfig, MagicTag, Timestamp};

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|s| s.parse::<u64>().ok()).unwrap_or(default)
}

fn config() -> Criterion {
    #[allow(clippy::cast_possible_truncation)]
    let samples = env_u64("CRIT_SAMPLES", 60) as usize;
    Criterion::default()
        .sample_size(samples.max(10))
        .measurement_time(Duration::from_millis(env_u64("CRIT_MEASURE_MS", 1000)))
}

/// Source synthétique de `n` affectations.
fn source(n: usize) -> String {
    let mut s = String::new();
    for i in 0..n {
        let _ = writeln!(s, "v{i} = v{} * {i} + 'x'", i.saturating_sub(1));
    }
    s
}

fn module(n: usize) -> CompiledModule {
    let chunk = compile_source(&source(n), "bench.py").unwrap_or_else(|e| panic!("{e}"));
    CompiledModule::new(MagicTag::CURRENT, Timestamp(1_700_000_000), ChunkMarshal::code(&chunk))
}

fn bench_codec(c: &mut Criterion) {
    let codec = ContainerCodec::new(ContainerConfig::default(), ChunkMarshal);
    let mut g = c.benchmark_group("container");
    for n in [1usize, 64, 1024] {
        let m = module(n);
        let bytes = codec.encode(&m);
        g.throughput(Throughput::Bytes(bytes.len() as u64));

        g.bench_with_input(BenchmarkId::new("header", n), &bytes, |b, bytes| {
            b.iter(|| codec.decode_header(black_box(bytes)));
        });
        g.bench_with_input(BenchmarkId::new("decode", n), &bytes, |b, bytes| {
            b.iter(|| codec.decode(black_box(bytes)));
        });
        g.bench_with_input(BenchmarkId::new("encode", n), &m, |b, m| {
            b.iter(|| codec.encode(black_box(m)));
        });
    }
    g.finish();
}

criterion_group! {
    name = benches;
    config = config();
    targets = bench_codec
}
criterion_main!(benches);
