use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use nbody2d::body::BodyStore;
use nbody2d::force;
use nbody2d::quadtree::Quadtree;
use ultraviolet::DVec2;

/// Uniform-disc galaxy layout used to exercise these benchmarks at a
/// few problem sizes, ported from `f32`/`Vec2` to the `f64`/`DVec2`
/// `BodyStore` the engines build on.
fn uniform_disc(n: usize) -> BodyStore {
    fastrand::seed(0);
    let inner_radius = 25.0;
    let outer_radius = (n as f64).sqrt() * 5.0;

    let mut ids = Vec::with_capacity(n);
    let mut mass = Vec::with_capacity(n);
    let mut pos = Vec::with_capacity(n);
    let mut vel = Vec::with_capacity(n);

    ids.push("0".to_string());
    mass.push(1e6);
    pos.push(DVec2::zero());
    vel.push(DVec2::zero());

    while pos.len() < n {
        let a = fastrand::f64() * std::f64::consts::TAU;
        let (sin, cos) = a.sin_cos();

        let t = inner_radius / outer_radius;
        let r = fastrand::f64() * (1.0 - t * t) + t * t;
        let p = DVec2::new(cos, sin) * outer_radius * r.sqrt();
        let v = DVec2::new(sin, -cos);

        ids.push(pos.len().to_string());
        mass.push(1.0);
        pos.push(p);
        vel.push(v);
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| pos[a].mag_sq().total_cmp(&pos[b].mag_sq()));
    let ids = order.iter().map(|&i| ids[i].clone()).collect::<Vec<_>>();
    let mass_sorted = order.iter().map(|&i| mass[i]).collect::<Vec<_>>();
    let pos_sorted = order.iter().map(|&i| pos[i]).collect::<Vec<_>>();
    let mut vel_sorted = order.iter().map(|&i| vel[i]).collect::<Vec<_>>();

    let mut accumulated = 0.0;
    for i in 0..n {
        accumulated += mass_sorted[i];
        if pos_sorted[i] == DVec2::zero() {
            continue;
        }
        let v = (accumulated / pos_sorted[i].mag()).sqrt();
        vel_sorted[i] *= v;
    }

    BodyStore::new(ids, mass_sorted, pos_sorted, vel_sorted)
}

fn bench_quadtree_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("quadtree_build");
    for &n in &[1_000usize, 10_000, 100_000] {
        let bodies = uniform_disc(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("n={n}"), |b| {
            b.iter(|| {
                let mut tree = Quadtree::new();
                tree.build(&bodies);
                tree
            });
        });
    }
    group.finish();
}

fn bench_barnes_hut_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("barnes_hut_iteration");
    for &n in &[1_000usize, 10_000, 100_000] {
        let bodies = uniform_disc(n);
        let eps_sq = force::softening_squared(0.01, &bodies);
        let mut tree = Quadtree::new();
        tree.build(&bodies);

        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("n={n}"), |b| {
            b.iter(|| {
                let mut total = DVec2::zero();
                for i in 0..bodies.len() {
                    total += force::force_on_body_bh(i, &bodies, &tree, 0.7, eps_sq);
                }
                total
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_quadtree_build, bench_barnes_hut_iteration);
criterion_main!(benches);
