use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mneme::{compile, run_ast, Ctx, CtxOptions};

fn arithmetic_loop(c: &mut Criterion) {
    let ast = compile("total = 0\nfor i in range(200):\n    total = total + i * i\ntotal").unwrap();
    c.bench_function("arithmetic_loop", |b| {
        b.iter(|| {
            let mut ctx = Ctx::new(CtxOptions {
                record: false,
                ..CtxOptions::default()
            });
            black_box(run_ast(&ast, &mut ctx).unwrap())
        });
    });
}

fn string_building(c: &mut Criterion) {
    let ast = compile("parts = [str(i) for i in range(100)]\n'-'.join(parts)").unwrap();
    c.bench_function("string_building", |b| {
        b.iter(|| {
            let mut ctx = Ctx::new(CtxOptions {
                record: false,
                ..CtxOptions::default()
            });
            black_box(run_ast(&ast, &mut ctx).unwrap())
        });
    });
}

criterion_group!(benches, arithmetic_loop, string_building);
criterion_main!(benches);
