use conduit_syntax::Span;
use conduit_typecheck::types::ty::{Ty, TypeVar};
use conduit_typecheck::ConstraintSet;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::rc::Rc;

fn var(id: u32) -> Rc<Ty> {
    Rc::new(Ty::Var(TypeVar { id, name: None }))
}

fn bits(width: u32) -> Rc<Ty> {
    Rc::new(Ty::Bits {
        width,
        signed: false,
    })
}

fn bench_variable_chain(c: &mut Criterion) {
    c.bench_function("solve 256-variable chain", |b| {
        b.iter(|| {
            let mut set = ConstraintSet::new();
            for i in 0..256 {
                set.add_equality(var(i), var(i + 1));
            }
            set.add_equality(var(256), bits(32));
            black_box(set.solve(Span::dummy()).unwrap());
        });
    });
}

fn bench_tuple_unification(c: &mut Criterion) {
    c.bench_function("solve 64-component tuple", |b| {
        let lhs = Rc::new(Ty::Tuple((0..64).map(var).collect()));
        let rhs = Rc::new(Ty::Tuple((0..64).map(|i| bits(i + 1)).collect()));
        b.iter(|| {
            let mut set = ConstraintSet::new();
            set.add_equality(Rc::clone(&lhs), Rc::clone(&rhs));
            black_box(set.solve(Span::dummy()).unwrap());
        });
    });
}

criterion_group!(benches, bench_variable_chain, bench_tuple_unification);
criterion_main!(benches);
