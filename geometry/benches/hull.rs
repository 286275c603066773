use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use geoseis_geometry::{convex_hull, HullMethod, Point};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::hint::black_box;

fn bench_convex_hull(c: &mut Criterion) {
    let mut group = c.benchmark_group("convex_hull");
    for n in [1_000, 10_000, 100_000] {
        let mut rng = StdRng::seed_from_u64(0);
        let points: Vec<Point> = (0..n)
            .map(|_| Point::new(rng.gen_range(0.0..10_000.0), rng.gen_range(0.0..10_000.0)))
            .collect();
        for method in HullMethod::ALL {
            group.bench_with_input(
                BenchmarkId::new(format!("{method:?}"), n),
                &points,
                |b, points| b.iter(|| black_box(convex_hull(points, method))),
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_convex_hull);
criterion_main!(benches);
