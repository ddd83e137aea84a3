//! Cofactor-family operators: `restrict`, `constrain` (generalized cofactor) and `simplify`.

use crate::arena::MakeNodeSignal;
use crate::cache::tag;
use crate::error::{BddError, Result};
use crate::manager::BddManager;
use crate::node::Bdd;

/// A decoded signed variable set: `polarity[level] = Some(true/false)` for every level the set
/// mentions, `None` elsewhere. Built once per `restrict` call and tagged into the misc cache
/// via the id returned by [`BddManager::next_quantvarset_id`], exactly as `varset2svartable`
/// does in the original.
struct SignedVarSet {
    id: i64,
    polarity: Vec<Option<bool>>,
}

impl BddManager {
    fn decode_signed_varset(&mut self, var: Bdd) -> Result<SignedVarSet> {
        let id = self.next_quantvarset_id();
        let mut polarity = vec![None; self.varnum as usize];
        let mut cur = var;
        while !cur.is_terminal() {
            let level = self.arena.level(cur);
            let (lo, hi) = (self.arena.low(cur), self.arena.high(cur));
            if lo.is_false() {
                polarity[level as usize] = Some(true);
                cur = hi;
            } else if hi.is_false() {
                polarity[level as usize] = Some(false);
                cur = lo;
            } else {
                return Err(BddError::IllegalVarSet);
            }
        }
        if cur.is_false() {
            return Err(BddError::IllegalVarSet);
        }
        Ok(SignedVarSet { id, polarity })
    }

    fn restrict_rec(
        &mut self,
        r: Bdd,
        set: &SignedVarSet,
    ) -> std::result::Result<Bdd, MakeNodeSignal> {
        if r.is_terminal() {
            return Ok(r);
        }
        let level = self.arena.level(r);
        if level as usize >= set.polarity.len() || set.polarity[level as usize].is_none() {
            if let Some(cached) = self
                .misc_cache
                .get_node(r.0, set.id as u32, u32::MAX, tag::RESTRICT)
            {
                return Ok(cached);
            }
            let (lo_src, hi_src) = (self.arena.low(r), self.arena.high(r));
            let lo = self.restrict_rec(lo_src, set)?;
            self.protect(lo);
            let hi = self.restrict_rec(hi_src, set);
            self.unprotect();
            let hi = hi?;
            self.protect(lo);
            self.protect(hi);
            let res = self.arena.make_node(level, lo, hi, &self.protected);
            self.unprotect();
            self.unprotect();
            let res = res?;
            self.misc_cache
                .put_node(r.0, set.id as u32, u32::MAX, tag::RESTRICT, res);
            Ok(res)
        } else {
            let positive = set.polarity[level as usize].unwrap();
            let branch = if positive {
                self.arena.high(r)
            } else {
                self.arena.low(r)
            };
            self.restrict_rec(branch, set)
        }
    }

    /// `restrict(r, var)`: `var` is a cube of literals (positive and/or negative); each
    /// variable it mentions is fixed to that literal's polarity throughout `r`.
    pub fn restrict(&mut self, r: Bdd, var: Bdd) -> Result<Bdd> {
        self.check_error()?;
        let set = self.decode_signed_varset(var)?;
        self.run_with_retry(|m| m.restrict_rec(r, &set))
    }

    fn constrain_rec(
        &mut self,
        f: Bdd,
        c: Bdd,
    ) -> std::result::Result<Bdd, MakeNodeSignal> {
        if c.is_false() {
            return Ok(Bdd::FALSE);
        }
        if c.is_true() || f.is_terminal() {
            return Ok(f);
        }
        if let Some(cached) = self.misc_cache.get_node(f.0, c.0, u32::MAX, tag::CONSTRAIN) {
            return Ok(cached);
        }
        let level = self.arena.level(f).min(self.arena.level(c));
        let (f_lo, f_hi) = self.cofactors(f, level);
        let (c_lo, c_hi) = self.cofactors(c, level);

        let res = if c.is_terminal() {
            self.constrain_rec(f_lo, c)?
        } else if c_lo.is_false() {
            self.constrain_rec(f_hi, c_hi)?
        } else if c_hi.is_false() {
            self.constrain_rec(f_lo, c_lo)?
        } else {
            let lo = self.constrain_rec(f_lo, c_lo)?;
            self.protect(lo);
            let hi = self.constrain_rec(f_hi, c_hi);
            self.unprotect();
            let hi = hi?;
            self.protect(lo);
            self.protect(hi);
            let node = self.arena.make_node(level, lo, hi, &self.protected);
            self.unprotect();
            self.unprotect();
            node?
        };
        self.misc_cache
            .put_node(f.0, c.0, u32::MAX, tag::CONSTRAIN, res);
        Ok(res)
    }

    /// Generalized cofactor of `f` with respect to `c` (Coudert's `bdd_constrain`).
    pub fn constrain(&mut self, f: Bdd, c: Bdd) -> Result<Bdd> {
        self.check_error()?;
        self.run_with_retry(|m| m.constrain_rec(f, c))
    }

    fn simplify_rec(
        &mut self,
        f: Bdd,
        d: Bdd,
    ) -> std::result::Result<Bdd, MakeNodeSignal> {
        if d.is_true() || f.is_terminal() {
            return Ok(f);
        }
        if d.is_false() {
            return Ok(Bdd::TRUE);
        }
        if let Some(cached) = self.misc_cache.get_node(f.0, d.0, u32::MAX, tag::SIMPLIFY) {
            return Ok(cached);
        }
        let level = self.arena.level(f).min(self.arena.level(d));
        let (f_lo, f_hi) = self.cofactors(f, level);
        let (d_lo, d_hi) = self.cofactors(d, level);

        let res = if d_lo.is_false() {
            self.simplify_rec(f_hi, d_hi)?
        } else if d_hi.is_false() {
            self.simplify_rec(f_lo, d_lo)?
        } else {
            let lo = self.simplify_rec(f_lo, d_lo)?;
            self.protect(lo);
            let hi = self.simplify_rec(f_hi, d_hi);
            self.unprotect();
            let hi = hi?;
            self.protect(lo);
            self.protect(hi);
            let node = self.arena.make_node(level, lo, hi, &self.protected);
            self.unprotect();
            self.unprotect();
            node?
        };
        self.misc_cache
            .put_node(f.0, d.0, u32::MAX, tag::SIMPLIFY, res);
        Ok(res)
    }

    /// Coudert-Madre restrict: shrinks `f` assuming the don't-care set `d`, without the
    /// asymmetric "pick a side" commitment `constrain` makes.
    pub fn simplify(&mut self, f: Bdd, d: Bdd) -> Result<Bdd> {
        self.check_error()?;
        self.run_with_retry(|m| m.simplify_rec(f, d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BddConfig;
    use crate::node::Var;

    #[test]
    fn restrict_fixes_named_variable() {
        let _guard = BddManager::test_lock();
        let mut m = BddManager::new(BddConfig::default()).unwrap();
        m.set_varnum(3).unwrap();
        let x0 = m.ithvar(Var(0)).unwrap();
        let x1 = m.ithvar(Var(1)).unwrap();
        let f = m.and(x0, x1).unwrap();
        let restricted = m.restrict(f, x0).unwrap();
        assert_eq!(restricted, x1);
        let not_x0 = m.nithvar(Var(0)).unwrap();
        let restricted_false = m.restrict(f, not_x0).unwrap();
        assert_eq!(restricted_false, Bdd::FALSE);
        m.done();
    }

    #[test]
    fn constrain_on_true_is_identity() {
        let _guard = BddManager::test_lock();
        let mut m = BddManager::new(BddConfig::default()).unwrap();
        m.set_varnum(2).unwrap();
        let x0 = m.ithvar(Var(0)).unwrap();
        assert_eq!(m.constrain(x0, Bdd::TRUE).unwrap(), x0);
        assert_eq!(m.constrain(x0, Bdd::FALSE).unwrap(), Bdd::FALSE);
        m.done();
    }
}
