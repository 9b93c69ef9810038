use coremgr::dsa::{format_core_list, parse_core_list, CoreMask};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_corelist(c: &mut Criterion) {
    let mut group = c.benchmark_group("corelist");

    let spec = "0-3,8..15:2,32-63,100,101,102..127:3";
    group.bench_function("parse", |b| {
        b.iter(|| black_box(parse_core_list(black_box(spec))))
    });

    let cores = parse_core_list(spec);
    group.bench_function("format", |b| {
        b.iter(|| black_box(format_core_list(black_box(cores.iter().copied()))))
    });

    let mask: CoreMask = cores.iter().copied().collect();
    group.bench_function("mask_display", |b| b.iter(|| black_box(mask.to_string())));

    group.finish();
}

criterion_group!(benches, bench_corelist);
criterion_main!(benches);
