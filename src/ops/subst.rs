//! Substitution family: `replace` (variable renaming), `compose` and `veccompose` (substituting
//! whole BDDs for variables).

use crate::arena::MakeNodeSignal;
use crate::cache::tag;
use crate::error::{BddError, Result};
use crate::manager::BddManager;
use crate::node::{Bdd, Var};
use crate::pair::Pair;

/// `replace`'s recursion can fail in a way `make_node` never does: the renaming itself can put
/// a variable out of order. Kept distinct from [`MakeNodeSignal`] so the two don't get confused
/// at the call site.
enum ReplaceSignal {
    Retry(MakeNodeSignal),
    OutOfOrder,
}

impl From<MakeNodeSignal> for ReplaceSignal {
    fn from(s: MakeNodeSignal) -> ReplaceSignal {
        ReplaceSignal::Retry(s)
    }
}

impl BddManager {
    fn replace_rec(
        &mut self,
        r: Bdd,
        pair: &Pair,
    ) -> std::result::Result<Bdd, ReplaceSignal> {
        if r.is_terminal() {
            return Ok(r);
        }
        if let Some(cached) = self
            .subst_cache
            .get_node(r.0, pair.id as u32, u32::MAX, tag::REPLACE)
        {
            return Ok(cached);
        }
        let level = self.arena.level(r);
        let old_var = Var(self.level_to_var[level as usize]);
        let new_var = pair.target_var(old_var);
        let new_level = self.var_to_level[new_var.0 as usize];

        let (lo_src, hi_src) = (self.arena.low(r), self.arena.high(r));
        let lo = self.replace_rec(lo_src, pair)?;
        self.protect(lo);
        let hi = self.replace_rec(hi_src, pair);
        self.unprotect();
        let hi = hi?;

        let lo_violates = !lo.is_terminal() && self.arena.level(lo) <= new_level;
        let hi_violates = !hi.is_terminal() && self.arena.level(hi) <= new_level;
        if lo_violates || hi_violates {
            return Err(ReplaceSignal::OutOfOrder);
        }

        self.protect(lo);
        self.protect(hi);
        let res = self.arena.make_node(new_level, lo, hi, &self.protected);
        self.unprotect();
        self.unprotect();
        let res = res?;

        self.subst_cache
            .put_node(r.0, pair.id as u32, u32::MAX, tag::REPLACE, res);
        Ok(res)
    }

    /// Renames every variable `r` mentions according to `pair`. Fails with
    /// [`BddError::ReplaceOutOfOrder`] if the renaming would put a variable out of the current
    /// ordering (the caller should use `duplicate_var`/reordering to make room first).
    ///
    /// `pair` is grown to the engine's current variable count first: a pairing built before a
    /// later `set_varnum`/`duplicate_var` otherwise maps variables it never saw.
    pub fn replace(&mut self, r: Bdd, pair: &mut Pair) -> Result<Bdd> {
        self.check_error()?;
        pair.grow(self.varnum);
        let result = match self.replace_rec(r, pair) {
            Ok(b) => Ok(b),
            Err(ReplaceSignal::OutOfOrder) => Err(self.set_error(BddError::ReplaceOutOfOrder)),
            Err(ReplaceSignal::Retry(MakeNodeSignal::Exhausted)) => {
                Err(self.set_error(BddError::OutOfNodes))
            }
            Err(ReplaceSignal::Retry(MakeNodeSignal::ReorderAbort)) => {
                self.settle_reorder();
                match self.replace_rec(r, pair) {
                    Ok(b) => Ok(b),
                    Err(ReplaceSignal::OutOfOrder) => {
                        Err(self.set_error(BddError::ReplaceOutOfOrder))
                    }
                    Err(ReplaceSignal::Retry(_)) => Ok(Bdd::FALSE),
                }
            }
        };
        self.sync_arena_state();
        result
    }

    fn compose_rec(
        &mut self,
        f: Bdd,
        g: Bdd,
        var_level: u32,
        var: Var,
    ) -> std::result::Result<Bdd, MakeNodeSignal> {
        if f.is_terminal() || self.arena.level(f) > var_level {
            return Ok(f);
        }
        let level = self.arena.level(f);
        if level < var_level {
            if let Some(cached) =
                self.subst_cache
                    .get_node(f.0, g.0, var.0, tag::COMPOSE)
            {
                return Ok(cached);
            }
            let (lo_src, hi_src) = (self.arena.low(f), self.arena.high(f));
            let lo = self.compose_rec(lo_src, g, var_level, var)?;
            self.protect(lo);
            let hi = self.compose_rec(hi_src, g, var_level, var);
            self.unprotect();
            let hi = hi?;
            self.protect(lo);
            self.protect(hi);
            let res = self.arena.make_node(level, lo, hi, &self.protected);
            self.unprotect();
            self.unprotect();
            let res = res?;
            self.subst_cache
                .put_node(f.0, g.0, var.0, tag::COMPOSE, res);
            Ok(res)
        } else {
            let (lo, hi) = (self.arena.low(f), self.arena.high(f));
            self.ite_rec(g, hi, lo)
        }
    }

    /// Substitutes `g` for `var` in `f`.
    pub fn compose(&mut self, f: Bdd, g: Bdd, var: Var) -> Result<Bdd> {
        self.check_error()?;
        if var.0 >= self.varnum {
            return Err(BddError::UnknownVariable(var.0));
        }
        let var_level = self.var_to_level[var.0 as usize];
        self.run_with_retry(|m| m.compose_rec(f, g, var_level, var))
    }

    fn veccompose_rec(
        &mut self,
        f: Bdd,
        pair: &Pair,
    ) -> std::result::Result<Bdd, MakeNodeSignal> {
        if f.is_terminal() {
            return Ok(f);
        }
        if let Some(cached) =
            self.subst_cache
                .get_node(f.0, pair.id as u32, u32::MAX, tag::VECCOMPOSE)
        {
            return Ok(cached);
        }
        let level = self.arena.level(f);
        let var = Var(self.level_to_var[level as usize]);
        let (lo_src, hi_src) = (self.arena.low(f), self.arena.high(f));
        let lo = self.veccompose_rec(lo_src, pair)?;
        self.protect(lo);
        let hi = self.veccompose_rec(hi_src, pair);
        self.unprotect();
        let hi = hi?;

        let replacement = pair
            .target_bdd(var)
            .unwrap_or(self.var_set[2 * var.0 as usize]);
        self.protect(lo);
        self.protect(hi);
        let res = self.ite_rec(replacement, hi, lo);
        self.unprotect();
        self.unprotect();
        let res = res?;

        self.subst_cache
            .put_node(f.0, pair.id as u32, u32::MAX, tag::VECCOMPOSE, res);
        Ok(res)
    }

    /// Substitutes every variable `v` simultaneously by `pair`'s BDD for `v` (or leaves it
    /// alone if `pair` has no entry for `v`).
    ///
    /// `pair` is grown to the engine's current variable count first, for the same reason
    /// `replace` grows it.
    pub fn veccompose(&mut self, f: Bdd, pair: &mut Pair) -> Result<Bdd> {
        self.check_error()?;
        pair.grow(self.varnum);
        self.run_with_retry(|m| m.veccompose_rec(f, pair))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BddConfig;

    #[test]
    fn replace_renames_variables() {
        let _guard = BddManager::test_lock();
        let mut m = BddManager::new(BddConfig::default()).unwrap();
        m.set_varnum(4).unwrap();
        let x0 = m.ithvar(Var(0)).unwrap();
        let x1 = m.ithvar(Var(1)).unwrap();
        let x2 = m.ithvar(Var(2)).unwrap();
        let x3 = m.ithvar(Var(3)).unwrap();
        let f = m.or(x0, x1).unwrap();
        let mut pair = m.new_pair();
        pair.set_var(Var(0), Var(2));
        pair.set_var(Var(1), Var(3));
        let renamed = m.replace(f, &mut pair).unwrap();
        let expected = m.or(x2, x3).unwrap();
        assert_eq!(renamed, expected);
        m.done();
    }

    #[test]
    fn compose_substitutes_single_variable() {
        let _guard = BddManager::test_lock();
        let mut m = BddManager::new(BddConfig::default()).unwrap();
        m.set_varnum(2).unwrap();
        let x0 = m.ithvar(Var(0)).unwrap();
        let x1 = m.ithvar(Var(1)).unwrap();
        let composed = m.compose(x0, x1, Var(0)).unwrap();
        assert_eq!(composed, x1);
        m.done();
    }
}
