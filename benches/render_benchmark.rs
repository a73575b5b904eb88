use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mailindex::core::fields;
use mailindex::query::native::{BooleanClause, NativeQuery, Occur};
use mailindex::query::optimizer::optimize;
use mailindex::query::render::Renderer;
use rand::Rng;

const WORDS: &[&str] = &["budget", "review", "holiday", "q3 plan", "invoice", "draft*", "lunch", "report"];
const FIELDS: &[&str] = &[fields::CONTENT, fields::FROM, fields::TO, fields::SUBJECT, fields::CONTACT_DATA];

fn leaf(rng: &mut impl Rng) -> NativeQuery {
    let field = FIELDS[rng.gen_range(0..FIELDS.len())];
    let word = WORDS[rng.gen_range(0..WORDS.len())];
    NativeQuery::term(field, word)
}

/// Random boolean tree with `clauses` leaves, one level of nesting every fourth clause.
fn random_tree(clauses: usize) -> NativeQuery {
    let mut rng = rand::thread_rng();
    let occurs = [Occur::Must, Occur::Should, Occur::MustNot];
    let built = (0..clauses)
        .map(|i| {
            let occur = occurs[rng.gen_range(0..occurs.len())];
            let query = if i % 4 == 3 {
                NativeQuery::Boolean(vec![
                    BooleanClause::should(leaf(&mut rng)),
                    BooleanClause::should(leaf(&mut rng)),
                ])
            } else {
                leaf(&mut rng)
            };
            BooleanClause::new(query, occur)
        })
        .collect();
    NativeQuery::Boolean(built)
}

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize");
    for size in [4, 16, 64] {
        let tree = random_tree(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &tree, |b, tree| {
            b.iter(|| optimize(black_box(tree)));
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let renderer = Renderer::new(500);
    let mut group = c.benchmark_group("optimize_and_render");
    for size in [4, 16, 64] {
        let tree = random_tree(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &tree, |b, tree| {
            b.iter(|| renderer.render_tree(black_box(tree)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_optimize, bench_render);
criterion_main!(benches);
