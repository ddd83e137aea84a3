//! End-to-end exercises against the public procedural surface, one engine instance per scenario.
//! Kept in a single test function (rather than six `#[test]`s) since the engine enforces a single
//! live instance per process and `cargo test` runs test functions concurrently by default.

use robdd_engine::{BddConfig, BddManager, BddOp, Var};

#[test]
fn spec_scenarios() {
    scenario_1_shannon_function();
    scenario_2_appex_matches_exist_of_apply();
    scenario_3_replace_renames();
    scenario_4_gc_preserves_live_roots();
    scenario_5_duplicate_var_preserves_function();
    scenario_6_parity_with_custom_cache_ratio();
}

fn scenario_1_shannon_function() {
    let mut m = BddManager::new(BddConfig::default()).unwrap();
    m.set_varnum(3).unwrap();
    let x0 = m.ithvar(Var::new(0)).unwrap();
    let x1 = m.ithvar(Var::new(1)).unwrap();
    let x2 = m.ithvar(Var::new(2)).unwrap();
    let not_x0 = m.not(x0).unwrap();

    let a = m.and(x0, x1).unwrap();
    let b = m.and(not_x0, x2).unwrap();
    let f = m.or(a, b).unwrap();

    assert_eq!(m.satcount(f).unwrap(), 4.0);
    assert_eq!(m.nodecount(f).unwrap(), 3);
    let support = m.support(f).unwrap();
    assert_eq!(m.scanset(support).unwrap(), vec![Var::new(0), Var::new(1), Var::new(2)]);

    let ite = m.ite(x0, x1, x2).unwrap();
    assert_eq!(f, ite);
    m.done();
}

fn scenario_2_appex_matches_exist_of_apply() {
    let mut m = BddManager::new(BddConfig::default()).unwrap();
    m.set_varnum(4).unwrap();
    let x0 = m.ithvar(Var::new(0)).unwrap();
    let x1 = m.ithvar(Var::new(1)).unwrap();
    let x2 = m.ithvar(Var::new(2)).unwrap();
    let x3 = m.ithvar(Var::new(3)).unwrap();

    let l = m.and(x0, x1).unwrap();
    let r = m.or(x2, x3).unwrap();
    let set = m.makeset(&[Var::new(0), Var::new(2)]).unwrap();
    let fused = m.appex(l, r, BddOp::And, set).unwrap();

    let applied = m.and(l, r).unwrap();
    let set2 = m.makeset(&[Var::new(0), Var::new(2)]).unwrap();
    let unfused = m.exist(applied, set2).unwrap();

    assert_eq!(fused, unfused);
    assert_eq!(fused, x1);
    m.done();
}

fn scenario_3_replace_renames() {
    let mut m = BddManager::new(BddConfig::default()).unwrap();
    m.set_varnum(4).unwrap();
    let x0 = m.ithvar(Var::new(0)).unwrap();
    let x1 = m.ithvar(Var::new(1)).unwrap();
    let x2 = m.ithvar(Var::new(2)).unwrap();
    let x3 = m.ithvar(Var::new(3)).unwrap();
    let f = m.or(x0, x1).unwrap();

    let mut pair = m.new_pair();
    pair.set_var(Var::new(0), Var::new(2));
    pair.set_var(Var::new(1), Var::new(3));
    let renamed = m.replace(f, &mut pair).unwrap();

    let expected = m.or(x2, x3).unwrap();
    assert_eq!(renamed, expected);
    assert_eq!(m.nodecount(renamed).unwrap(), 3);
    m.done();
}

fn scenario_4_gc_preserves_live_roots() {
    let mut m = BddManager::new(BddConfig::default()).unwrap();
    m.set_varnum(8).unwrap();
    let x0 = m.ithvar(Var::new(0)).unwrap();
    let x1 = m.ithvar(Var::new(1)).unwrap();
    let root = m.and(x0, x1).unwrap();
    m.add_ref(root).unwrap();

    for v in 2..8 {
        let lit = m.ithvar(Var::new(v)).unwrap();
        let _throwaway = m.and(root, lit).unwrap();
    }

    let before_count = m.nodecount(root).unwrap();
    let before_sat = m.satcount(root).unwrap();
    m.force_gc();
    let after_count = m.nodecount(root).unwrap();
    let after_sat = m.satcount(root).unwrap();

    assert_eq!(before_count, after_count);
    assert_eq!(before_sat, after_sat);
    m.done();
}

fn scenario_5_duplicate_var_preserves_function() {
    let mut m = BddManager::new(BddConfig::default()).unwrap();
    m.set_varnum(3).unwrap();
    let x0 = m.ithvar(Var::new(0)).unwrap();
    let x1 = m.ithvar(Var::new(1)).unwrap();
    let x2 = m.ithvar(Var::new(2)).unwrap();
    let f = m.ite(x0, x1, x2).unwrap();
    m.add_ref(f).unwrap();

    let x1_level = m.level(x1);
    let new_var = m.duplicate_var(Var::new(1)).unwrap();
    assert_eq!(m.level(m.ithvar(new_var).unwrap()), x1_level + 1);

    let new_neg = m.nithvar(new_var).unwrap();
    let restricted = m.restrict(f, new_neg).unwrap();
    assert_eq!(restricted, f);
    m.done();
}

fn scenario_6_parity_with_custom_cache_ratio() {
    let config = BddConfig::default().with_initial_nodes(10_000).with_cache_size(2_500);
    let mut m = BddManager::new(config).unwrap();
    m.set_cache_ratio(4);
    m.set_varnum(10).unwrap();

    let mut parity = robdd_engine::Bdd::FALSE;
    for v in 0..10 {
        let lit = m.ithvar(Var::new(v)).unwrap();
        parity = m.xor(parity, lit).unwrap();
    }

    assert!(m.error().is_none());
    assert_eq!(m.satcount(parity).unwrap(), 512.0);
    assert_eq!(m.nodecount(parity).unwrap(), 11);
    m.done();
}
