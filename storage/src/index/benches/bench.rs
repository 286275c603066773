use criterion::criterion_main;
use rand::{rngs::StdRng, Rng, SeedableRng};

mod query;

criterion_main!(build::benches, query::benches);

/// Generate a header column of `n` traces over `keys` distinct bins with a few null values.
fn column(n: usize, keys: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(0);
    (0..n)
        .map(|_| {
            if rng.gen_ratio(1, 1_000) {
                f64::NAN
            } else {
                rng.gen_range(0..keys) as f64
            }
        })
        .collect()
}
