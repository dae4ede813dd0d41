//! Benchmark for keyless identity derivation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use teleburn::derivation::{Deriver, InscriptionId};

fn create_ids(count: usize) -> Vec<InscriptionId> {
    (0..count)
        .map(|i| {
            let mut txid = [0x5a; 32];
            txid[..8].copy_from_slice(&(i as u64).to_le_bytes());
            InscriptionId::new(txid, (i % 4) as u32)
        })
        .collect()
}

fn bench_derive_single(c: &mut Criterion) {
    let deriver = Deriver::default();
    let id = create_ids(1)[0];

    c.bench_function("derive_single", |b| {
        b.iter(|| black_box(deriver.derive(black_box(&id))))
    });
}

fn bench_derive_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("derive_batch");
    let deriver = Deriver::default();

    for count in [16, 256, 4096].iter() {
        let ids = create_ids(*count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &ids, |b, ids| {
            b.iter(|| black_box(deriver.derive_batch(black_box(ids))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_derive_single, bench_derive_batch);
criterion_main!(benches);
