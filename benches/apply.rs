use criterion::{criterion_group, criterion_main, Criterion};
use robdd_engine::{BddConfig, BddManager, Var};

/// Builds the BDD for the parity function over `n` variables by repeated `xor`, a worst case for
/// `apply`'s caching since every prefix is a distinct node.
fn build_parity(m: &mut BddManager, n: u32) -> robdd_engine::Bdd {
    let mut acc = robdd_engine::Bdd::FALSE;
    for v in 0..n {
        let lit = m.ithvar(Var::new(v)).unwrap();
        acc = m.xor(acc, lit).unwrap();
    }
    acc
}

fn apply_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");
    for &n in &[8u32, 12, 16, 20] {
        group.bench_function(format!("parity_xor_{}", n), |b| {
            b.iter(|| {
                let mut m = BddManager::new(BddConfig::default()).unwrap();
                m.set_varnum(n).unwrap();
                let f = build_parity(&mut m, n);
                m.done();
                f
            })
        });
    }
    group.finish();
}

fn ite_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("ite");
    group.bench_function("chained_ite_16", |b| {
        b.iter(|| {
            let mut m = BddManager::new(BddConfig::default()).unwrap();
            m.set_varnum(16).unwrap();
            let mut acc = m.ithvar(Var::new(0)).unwrap();
            for v in 1..16 {
                let lit = m.ithvar(Var::new(v)).unwrap();
                let not_acc = m.not(acc).unwrap();
                acc = m.ite(lit, acc, not_acc).unwrap();
            }
            m.done();
            acc
        })
    });
    group.finish();
}

criterion_group!(benches, apply_benchmark, ite_benchmark);
criterion_main!(benches);
