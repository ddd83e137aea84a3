//! Satisfiability enumeration and counting: `satone`/`satoneset`/`fullsatone`/`allsat`,
//! `satcount`/`satcountset`/`satcountln`/`satcountlnset`/`pathcount`, and the structural queries
//! `support`/`varprofile`/`nodecount`/`anodecount`.

use std::collections::HashSet;

use crate::arena::MakeNodeSignal;
use crate::cache::tag;
use crate::error::{BddError, Result};
use crate::manager::BddManager;
use crate::node::{Bdd, Var};
use crate::ops::apply::BddOp;

impl BddManager {
    fn satone_rec(&mut self, r: Bdd) -> std::result::Result<Bdd, MakeNodeSignal> {
        if r.is_true() {
            return Ok(Bdd::TRUE);
        }
        let level = self.arena.level(r);
        let (lo, hi) = (self.arena.low(r), self.arena.high(r));
        let (branch, positive) = if lo.is_false() { (hi, true) } else { (lo, false) };
        let var = Var(self.level_to_var[level as usize]);
        let lit = self.var_set[2 * var.0 as usize + if positive { 0 } else { 1 }];
        let sub = self.satone_rec(branch)?;
        self.protect(sub);
        let res = self.apply_rec(lit, sub, BddOp::And);
        self.unprotect();
        res
    }

    /// Any single satisfying cube of `r`, built greedily (no undetermined variables are added).
    pub fn satone(&mut self, r: Bdd) -> Result<Bdd> {
        self.check_error()?;
        if r.is_false() {
            return Err(BddError::IllegalBdd);
        }
        self.run_with_retry(|m| m.satone_rec(r))
    }

    /// Like `satone`, but the result mentions every variable in `var`; variables `r` leaves
    /// undetermined are fixed to `pol`.
    pub fn satoneset(&mut self, r: Bdd, var: Bdd, pol: bool) -> Result<Bdd> {
        self.check_error()?;
        if r.is_false() {
            return Err(BddError::IllegalBdd);
        }
        let cube = self.satone(r)?;
        let mut touched = HashSet::new();
        let mut cur = cube;
        while !cur.is_terminal() {
            let level = self.arena.level(cur);
            touched.insert(level);
            let (lo, hi) = (self.arena.low(cur), self.arena.high(cur));
            cur = if lo.is_false() { hi } else { lo };
        }
        let mut result = cube;
        for v in self.scanset(var)? {
            let level = self.var_to_level[v.0 as usize];
            if !touched.contains(&level) {
                let lit = if pol { self.ithvar(v)? } else { self.nithvar(v)? };
                result = self.and(result, lit)?;
            }
        }
        Ok(result)
    }

    /// `satoneset` over every variable the engine knows about, undetermined ones fixed to 0.
    pub fn fullsatone(&mut self, r: Bdd) -> Result<Bdd> {
        self.check_error()?;
        let all: Vec<Var> = (0..self.varnum).map(Var).collect();
        let set = self.makeset(&all)?;
        self.satoneset(r, set, false)
    }

    fn allsat_rec(&mut self, r: Bdd, profile: &mut Vec<i8>, handler: &mut dyn FnMut(&[i8])) {
        if r.is_true() {
            handler(profile);
            return;
        }
        if r.is_false() {
            return;
        }
        let level = self.arena.level(r);
        let var = self.level_to_var[level as usize] as usize;
        let (lo, hi) = (self.arena.low(r), self.arena.high(r));
        if !lo.is_false() {
            profile[var] = 0;
            self.allsat_rec(lo, profile, handler);
        }
        if !hi.is_false() {
            profile[var] = 1;
            self.allsat_rec(hi, profile, handler);
        }
        profile[var] = -1;
    }

    /// Enumerates every satisfying cube of `r`. `handler` receives one profile per cube:
    /// `profile[v] == -1` means `v` is a don't-care in that cube.
    pub fn allsat(&mut self, r: Bdd, mut handler: impl FnMut(&[i8])) -> Result<()> {
        self.check_error()?;
        let mut profile = vec![-1i8; self.varnum as usize];
        self.allsat_rec(r, &mut profile, &mut handler);
        Ok(())
    }

    fn satcount_node(&mut self, n: Bdd) -> f64 {
        if n.is_false() {
            return 0.0;
        }
        if n.is_true() {
            return 1.0;
        }
        if let Some(c) = self.misc_cache.get_real(n.0, u32::MAX, u32::MAX, tag::SATCOUNT) {
            return c;
        }
        let level = self.arena.level(n);
        let (lo, hi) = (self.arena.low(n), self.arena.high(n));
        let lo_level = if lo.is_terminal() { self.varnum } else { self.arena.level(lo) };
        let hi_level = if hi.is_terminal() { self.varnum } else { self.arena.level(hi) };
        let lo_count = self.satcount_node(lo) * 2f64.powi((lo_level - level - 1) as i32);
        let hi_count = self.satcount_node(hi) * 2f64.powi((hi_level - level - 1) as i32);
        let total = lo_count + hi_count;
        self.misc_cache
            .put_real(n.0, u32::MAX, u32::MAX, tag::SATCOUNT, total);
        total
    }

    /// Number of assignments to all `varnum` variables satisfying `r` (variables `r` doesn't
    /// depend on are free and contribute a factor of two each).
    pub fn satcount(&mut self, r: Bdd) -> Result<f64> {
        self.check_error()?;
        if r.is_false() {
            return Ok(0.0);
        }
        if r.is_true() {
            return Ok(2f64.powi(self.varnum as i32));
        }
        let top_level = self.arena.level(r);
        Ok(self.satcount_node(r) * 2f64.powi(top_level as i32))
    }

    fn satcountln_node(&mut self, n: Bdd) -> f64 {
        if n.is_false() {
            return f64::NEG_INFINITY;
        }
        if n.is_true() {
            return 0.0;
        }
        if let Some(c) = self
            .misc_cache
            .get_real(n.0, u32::MAX, u32::MAX, tag::SATCOUNTLN)
        {
            return c;
        }
        let level = self.arena.level(n);
        let (lo, hi) = (self.arena.low(n), self.arena.high(n));
        let lo_level = if lo.is_terminal() { self.varnum } else { self.arena.level(lo) };
        let hi_level = if hi.is_terminal() { self.varnum } else { self.arena.level(hi) };
        let lo_ln = self.satcountln_node(lo) + (lo_level - level - 1) as f64;
        let hi_ln = self.satcountln_node(hi) + (hi_level - level - 1) as f64;
        let combined = log2_add(lo_ln, hi_ln);
        self.misc_cache
            .put_real(n.0, u32::MAX, u32::MAX, tag::SATCOUNTLN, combined);
        combined
    }

    /// `log2(satcount(r))`, computed without ever materializing the (potentially astronomic)
    /// linear count.
    pub fn satcountln(&mut self, r: Bdd) -> Result<f64> {
        self.check_error()?;
        if r.is_false() {
            return Ok(f64::NEG_INFINITY);
        }
        if r.is_true() {
            return Ok(self.varnum as f64);
        }
        let top_level = self.arena.level(r);
        Ok(self.satcountln_node(r) + top_level as f64)
    }

    /// `satcount(r)`, scaled down as if only the variables in `var` were free. `var`'s variables
    /// must be a superset of `r`'s support for the result to be meaningful, mirroring the
    /// original's own caveat: the count is just `satcount(r) / 2^(varnum - |var|)`.
    pub fn satcountset(&mut self, r: Bdd, var: Bdd) -> Result<f64> {
        self.check_error()?;
        let set_size = self.scanset(var)?.len() as i32;
        if set_size == 0 {
            return Ok(0.0);
        }
        let unused = self.varnum as i32 - set_size;
        let scaled = self.satcount(r)? / 2f64.powi(unused);
        Ok(if scaled >= 1.0 { scaled } else { 0.0 })
    }

    /// `satcountln` analog of `satcountset`: `satcountln(r) - (varnum - |var|)`.
    pub fn satcountlnset(&mut self, r: Bdd, var: Bdd) -> Result<f64> {
        self.check_error()?;
        let set_size = self.scanset(var)?.len() as i32;
        if set_size == 0 {
            return Ok(f64::NEG_INFINITY);
        }
        let unused = self.varnum as i32 - set_size;
        Ok(self.satcountln(r)? - unused as f64)
    }

    fn pathcount_node(&mut self, n: Bdd) -> f64 {
        if n.is_false() {
            return 0.0;
        }
        if n.is_true() {
            return 1.0;
        }
        if let Some(c) = self.misc_cache.get_real(n.0, u32::MAX, u32::MAX, tag::PATHCOUNT) {
            return c;
        }
        let (lo, hi) = (self.arena.low(n), self.arena.high(n));
        let total = self.pathcount_node(lo) + self.pathcount_node(hi);
        self.misc_cache
            .put_real(n.0, u32::MAX, u32::MAX, tag::PATHCOUNT, total);
        total
    }

    /// Number of distinct root-to-one paths through `r`.
    pub fn pathcount(&mut self, r: Bdd) -> Result<f64> {
        self.check_error()?;
        Ok(self.pathcount_node(r))
    }

    fn unmark_rec(&mut self, n: Bdd) {
        if n.is_terminal() || !self.arena.is_marked(n) {
            return;
        }
        self.arena.set_mark(n, false);
        let (lo, hi) = (self.arena.low(n), self.arena.high(n));
        self.unmark_rec(lo);
        self.unmark_rec(hi);
    }

    fn nodecount_rec(&mut self, n: Bdd, count: &mut u64) {
        if n.is_terminal() || self.arena.is_marked(n) {
            return;
        }
        self.arena.set_mark(n, true);
        *count += 1;
        let (lo, hi) = (self.arena.low(n), self.arena.high(n));
        self.nodecount_rec(lo, count);
        self.nodecount_rec(hi, count);
    }

    /// Number of distinct internal nodes reachable from `r`.
    pub fn nodecount(&mut self, r: Bdd) -> Result<u64> {
        self.check_error()?;
        let mut count = 0;
        self.nodecount_rec(r, &mut count);
        self.unmark_rec(r);
        Ok(count)
    }

    /// Number of distinct internal nodes reachable from any root in `rs`, counting nodes shared
    /// between roots only once.
    pub fn anodecount(&mut self, rs: &[Bdd]) -> Result<u64> {
        self.check_error()?;
        let mut count = 0;
        for &r in rs {
            self.nodecount_rec(r, &mut count);
        }
        for &r in rs {
            self.unmark_rec(r);
        }
        Ok(count)
    }

    fn varprofile_rec(&mut self, n: Bdd, profile: &mut [u32]) {
        if n.is_terminal() || self.arena.is_marked(n) {
            return;
        }
        self.arena.set_mark(n, true);
        profile[self.arena.level(n) as usize] += 1;
        let (lo, hi) = (self.arena.low(n), self.arena.high(n));
        self.varprofile_rec(lo, profile);
        self.varprofile_rec(hi, profile);
    }

    /// Node count per variable, reachable from `r`.
    pub fn varprofile(&mut self, r: Bdd) -> Result<Vec<u32>> {
        self.check_error()?;
        let mut profile = vec![0u32; self.varnum as usize];
        self.varprofile_rec(r, &mut profile);
        self.unmark_rec(r);
        Ok(profile)
    }

    fn support_mark_rec(&mut self, n: Bdd) {
        if n.is_terminal() || self.arena.is_marked(n) {
            return;
        }
        self.arena.set_mark(n, true);
        let level = self.arena.level(n);
        self.support_seen[level as usize] = self.support_id;
        let (lo, hi) = (self.arena.low(n), self.arena.high(n));
        self.support_mark_rec(lo);
        self.support_mark_rec(hi);
    }

    /// The conjunction of every variable `r` depends on.
    pub fn support(&mut self, r: Bdd) -> Result<Bdd> {
        self.check_error()?;
        self.support_id += 1;
        if self.support_id == u64::MAX {
            for seen in self.support_seen.iter_mut() {
                *seen = 0;
            }
            self.support_id = 1;
        }
        self.support_mark_rec(r);
        self.unmark_rec(r);
        let mut cube = Bdd::TRUE;
        for level in 0..self.varnum {
            if self.support_seen[level as usize] == self.support_id {
                let var = Var(self.level_to_var[level as usize]);
                let lit = self.ithvar(var)?;
                cube = self.and(cube, lit)?;
            }
        }
        Ok(cube)
    }
}

/// `log2(2^a + 2^b)`, numerically stable and total (handles either side being `-inf`).
fn log2_add(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + (2f64.powf(lo - hi)).ln_1p() / std::f64::consts::LN_2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BddConfig;

    #[test]
    fn satcount_matches_inclusion_exclusion() {
        let _guard = BddManager::test_lock();
        let mut m = BddManager::new(BddConfig::default()).unwrap();
        m.set_varnum(3).unwrap();
        let x0 = m.ithvar(Var(0)).unwrap();
        let x1 = m.ithvar(Var(1)).unwrap();
        let x2 = m.ithvar(Var(2)).unwrap();
        let a = m.and(x0, x1).unwrap();
        let f = m.or(a, x2).unwrap();

        let count_a = m.satcount(a).unwrap();
        let count_x2 = m.satcount(x2).unwrap();
        let and_ax2 = m.and(a, x2).unwrap();
        let count_and = m.satcount(and_ax2).unwrap();
        let count_f = m.satcount(f).unwrap();
        assert_eq!(count_f + count_and, count_a + count_x2);
        m.done();
    }

    #[test]
    fn satcountln_matches_log2_of_satcount() {
        let _guard = BddManager::test_lock();
        let mut m = BddManager::new(BddConfig::default()).unwrap();
        m.set_varnum(10).unwrap();
        let mut parity = Bdd::FALSE;
        for v in 0..10 {
            let lit = m.ithvar(Var(v)).unwrap();
            parity = m.xor(parity, lit).unwrap();
        }
        let count = m.satcount(parity).unwrap();
        let ln = m.satcountln(parity).unwrap();
        assert!((count.log2() - ln).abs() < 1e-9);
        assert_eq!(count, 512.0);
        assert_eq!(m.nodecount(parity).unwrap(), 11);
        m.done();
    }

    #[test]
    fn satcountset_scales_by_free_variables() {
        let _guard = BddManager::test_lock();
        let mut m = BddManager::new(BddConfig::default()).unwrap();
        m.set_varnum(3).unwrap();
        let x0 = m.ithvar(Var(0)).unwrap();
        let set = m.makeset(&[Var(0)]).unwrap();
        // x0 alone, scaled to a one-variable universe: exactly one satisfying assignment.
        assert_eq!(m.satcountset(x0, set).unwrap(), 1.0);
        assert_eq!(m.satcount(x0).unwrap(), 4.0);
        m.done();
    }

    #[test]
    fn satcountlnset_matches_log2_of_satcountset() {
        let _guard = BddManager::test_lock();
        let mut m = BddManager::new(BddConfig::default()).unwrap();
        m.set_varnum(3).unwrap();
        let x0 = m.ithvar(Var(0)).unwrap();
        let x1 = m.ithvar(Var(1)).unwrap();
        let f = m.and(x0, x1).unwrap();
        let set = m.makeset(&[Var(0), Var(1)]).unwrap();
        let linear = m.satcountset(f, set).unwrap();
        let ln = m.satcountlnset(f, set).unwrap();
        assert!((linear.log2() - ln).abs() < 1e-9);
        m.done();
    }

    #[test]
    fn anodecount_shares_common_subgraphs() {
        let _guard = BddManager::test_lock();
        let mut m = BddManager::new(BddConfig::default()).unwrap();
        m.set_varnum(3).unwrap();
        // y sits above x0/x1 in the ordering, so `ite(y, f, FALSE)` reuses f's whole subgraph
        // as its high child rather than rebuilding it.
        let y = m.ithvar(Var(0)).unwrap();
        let x0 = m.ithvar(Var(1)).unwrap();
        let x1 = m.ithvar(Var(2)).unwrap();
        let f = m.and(x0, x1).unwrap();
        let g = m.ite(y, f, Bdd::FALSE).unwrap();
        let separate = m.nodecount(f).unwrap() + m.nodecount(g).unwrap();
        let shared = m.anodecount(&[f, g]).unwrap();
        assert!(shared < separate);
        m.done();
    }

    #[test]
    fn nodecount_and_support_agree_with_structure() {
        let _guard = BddManager::test_lock();
        let mut m = BddManager::new(BddConfig::default()).unwrap();
        m.set_varnum(3).unwrap();
        let x0 = m.ithvar(Var(0)).unwrap();
        let x1 = m.ithvar(Var(1)).unwrap();
        let f = m.and(x0, x1).unwrap();
        assert_eq!(m.nodecount(f).unwrap(), 2);
        let support = m.support(f).unwrap();
        let vars = m.scanset(support).unwrap();
        assert_eq!(vars, vec![Var(0), Var(1)]);
        m.done();
    }
}
