use conduit_mem::StringInterner;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_intern_fresh(c: &mut Criterion) {
    c.bench_function("intern 1000 fresh names", |b| {
        let names: Vec<String> = (0..1000).map(|i| format!("field_{i}")).collect();
        b.iter(|| {
            let mut interner = StringInterner::new();
            for name in &names {
                black_box(interner.intern(name));
            }
        });
    });
}

fn bench_intern_hit(c: &mut Criterion) {
    c.bench_function("re-intern interned name", |b| {
        let mut interner = StringInterner::new();
        interner.intern("ethernet");
        b.iter(|| black_box(interner.intern("ethernet")));
    });
}

criterion_group!(benches, bench_intern_fresh, bench_intern_hit);
criterion_main!(benches);
