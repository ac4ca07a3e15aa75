use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use segment_quadtree::quadtree::{CollisionReport, QuadTree, TreeConfig};
use segment_quadtree::{IntersectionKind, Intersector, Rect, Segment, Vec2};

fn get_rand() -> impl rand::Rng {
    SmallRng::seed_from_u64(0xdeadbeef)
}

struct Crossing;

fn orient(a: Vec2, b: Vec2, c: Vec2) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

impl Intersector for Crossing {
    fn intersect(
        &self,
        first: &Segment,
        second: &Segment,
        _time_step: f64,
    ) -> Option<IntersectionKind> {
        let o1 = orient(first.p1, first.p2, second.p1);
        let o2 = orient(first.p1, first.p2, second.p2);
        let o3 = orient(second.p1, second.p2, first.p1);
        let o4 = orient(second.p1, second.p2, first.p2);
        if o1 * o2 < 0.0 && o3 * o4 < 0.0 {
            Some(IntersectionKind::AlreadyOverlapping)
        } else {
            None
        }
    }
}

const SPAN: f64 = 1000.0;

fn random_segments(rng: &mut impl Rng, len: usize) -> Vec<Segment> {
    (0..len)
        .map(|i| {
            let x = rng.gen_range(-SPAN, SPAN);
            let y = rng.gen_range(-SPAN, SPAN);
            Segment::new(
                Vec2::new(x, y),
                Vec2::new(x + rng.gen_range(-2.0, 2.0), y + rng.gen_range(-2.0, 2.0)),
                Vec2::new(rng.gen_range(-0.5, 0.5), rng.gen_range(-0.5, 0.5)),
                i as u32,
            )
        })
        .collect()
}

fn bounds() -> Rect {
    Rect::new(Vec2::new(-1024.0, 1024.0), Vec2::new(1024.0, -1024.0))
}

fn build_and_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("QuadTree build");
    for size in 8..14 {
        let size = 1 << size;
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, move |b, &size| {
            let mut rng = get_rand();
            let segments = random_segments(&mut rng, size);

            b.iter(|| {
                let report = CollisionReport::new();
                let tree = QuadTree::build(
                    &segments,
                    bounds(),
                    0.5,
                    &Crossing,
                    TreeConfig::default(),
                    &report,
                )
                .unwrap();
                black_box(report.count());
                drop(tree);
            })
        });
    }
    group.finish();
}

fn brute_force_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("Brute force scan");
    for size in 8..12 {
        let size = 1 << size;
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, move |b, &size| {
            let mut rng = get_rand();
            let segments = random_segments(&mut rng, size);

            b.iter(|| {
                let mut collisions = 0usize;
                for (i, first) in segments.iter().enumerate() {
                    for second in &segments[i + 1..] {
                        if Crossing.intersect(first, second, 0.5).is_some() {
                            collisions += 1;
                        }
                    }
                }
                black_box(collisions)
            })
        });
    }
    group.finish();
}

criterion_group!(quadtree_benches, build_and_report, brute_force_scan);
criterion_main!(quadtree_benches);
