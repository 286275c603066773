use criterion::{criterion_group, Criterion};
use geoseis_storage::PrimaryKeyIndex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::hint::black_box;

const N_TRACES: usize = 1_000_000;
const KEYS: usize = 10_000;
const QUERIES: usize = 1_000;

fn bench_query_range(c: &mut Criterion) {
    let column = super::column(N_TRACES, KEYS);
    let index = PrimaryKeyIndex::build("INLINE", &column, f64::NAN);
    for width in [1.0, 100.0] {
        c.bench_function(
            &format!("{}/n={} width={}", module_path!(), N_TRACES, width),
            |b| {
                let mut rng = StdRng::seed_from_u64(0);
                b.iter(|| {
                    for _ in 0..QUERIES {
                        let min = rng.gen_range(0..KEYS) as f64;
                        black_box(index.query_range(min, min + width));
                    }
                })
            },
        );
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_query_range
}
