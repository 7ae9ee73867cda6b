use bgcode::heatshrink::{decode_all, encode_all, Config};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Synthesized instruction stream: repetitive the way sliced G-code is.
fn gcode_corpus(lines: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..lines {
        out.extend_from_slice(
            format!(
                "G1 X{}.{:03} Y{}.{:03} E{}.{:05}\n",
                i % 250,
                i * 7 % 1000,
                i % 210,
                i * 13 % 1000,
                i % 3,
                i * 11 % 100_000,
            )
            .as_bytes(),
        );
    }
    out
}

fn bench_encode(c: &mut Criterion) {
    let data = gcode_corpus(8192);
    let hs11 = Config::new(11, 4).unwrap();
    let hs12 = Config::new(12, 4).unwrap();

    c.bench_function("heatshrink11_encode_gcode", |b| {
        b.iter(|| encode_all(black_box(&data), hs11).unwrap())
    });
    c.bench_function("heatshrink12_encode_gcode", |b| {
        b.iter(|| encode_all(black_box(&data), hs12).unwrap())
    });
}

fn bench_decode(c: &mut Criterion) {
    let data = gcode_corpus(8192);
    let hs11 = Config::new(11, 4).unwrap();
    let hs12 = Config::new(12, 4).unwrap();
    let packed11 = encode_all(&data, hs11).unwrap();
    let packed12 = encode_all(&data, hs12).unwrap();

    c.bench_function("heatshrink11_decode_gcode", |b| {
        b.iter(|| decode_all(black_box(&packed11), hs11).unwrap())
    });
    c.bench_function("heatshrink12_decode_gcode", |b| {
        b.iter(|| decode_all(black_box(&packed12), hs12).unwrap())
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
