//! Binary apply, if-then-else and negation: the three primitives every other operator family
//! is ultimately built from.

use crate::arena::MakeNodeSignal;
use crate::cache::tag;
use crate::error::Result;
use crate::manager::BddManager;
use crate::node::Bdd;

/// The ten binary connectives `bdd_apply` accepts, named after BuDDy's `bddop_*` constants.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BddOp {
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Imp,
    Biimp,
    Diff,
    Less,
    Invimp,
}

impl BddOp {
    #[inline]
    fn eval(self, a: bool, b: bool) -> bool {
        use BddOp::*;
        match self {
            And => a && b,
            Or => a || b,
            Xor => a ^ b,
            Nand => !(a && b),
            Nor => !(a || b),
            Imp => !a || b,
            Biimp => a == b,
            Diff => a && !b,
            Less => !a && b,
            Invimp => a || !b,
        }
    }

    #[inline]
    fn tag(self) -> u32 {
        use BddOp::*;
        match self {
            And => tag::AND,
            Or => tag::OR,
            Xor => tag::XOR,
            Nand => tag::NAND,
            Nor => tag::NOR,
            Imp => tag::IMP,
            Biimp => tag::BIIMP,
            Diff => tag::DIFF,
            Less => tag::LESS,
            Invimp => tag::INVIMP,
        }
    }
}

/// Constant short-circuits that don't need a recursive descent at all. Kept separate from the
/// terminal/terminal truth table below because they also fire when only one side is constant.
#[inline]
fn shortcut(l: Bdd, r: Bdd, op: BddOp) -> Option<Bdd> {
    use BddOp::*;
    match op {
        And => {
            if l.is_false() || r.is_false() {
                Some(Bdd::FALSE)
            } else if l.is_true() {
                Some(r)
            } else if r.is_true() {
                Some(l)
            } else if l == r {
                Some(l)
            } else {
                None
            }
        }
        Or => {
            if l.is_true() || r.is_true() {
                Some(Bdd::TRUE)
            } else if l.is_false() {
                Some(r)
            } else if r.is_false() {
                Some(l)
            } else if l == r {
                Some(l)
            } else {
                None
            }
        }
        Xor if l == r => Some(Bdd::FALSE),
        Biimp if l == r => Some(Bdd::TRUE),
        _ => None,
    }
}

impl BddManager {
    #[inline]
    pub(crate) fn cofactors(&self, n: Bdd, level: u32) -> (Bdd, Bdd) {
        if !n.is_terminal() && self.arena.level(n) == level {
            (self.arena.low(n), self.arena.high(n))
        } else {
            (n, n)
        }
    }

    pub(crate) fn apply_rec(
        &mut self,
        l: Bdd,
        r: Bdd,
        op: BddOp,
    ) -> std::result::Result<Bdd, MakeNodeSignal> {
        if let Some(v) = shortcut(l, r, op) {
            return Ok(v);
        }
        if l.is_terminal() && r.is_terminal() {
            let result = op.eval(l.is_true(), r.is_true());
            return Ok(if result { Bdd::TRUE } else { Bdd::FALSE });
        }
        if let Some(cached) = self.apply_cache.get_node(l.0, r.0, u32::MAX, op.tag()) {
            return Ok(cached);
        }

        let level = self.arena.level(l).min(self.arena.level(r));
        let (l_lo, l_hi) = self.cofactors(l, level);
        let (r_lo, r_hi) = self.cofactors(r, level);

        let lo = self.apply_rec(l_lo, r_lo, op)?;
        self.protect(lo);
        let hi = self.apply_rec(l_hi, r_hi, op);
        self.unprotect();
        let hi = hi?;

        self.protect(lo);
        self.protect(hi);
        let res = self.arena.make_node(level, lo, hi, &self.protected);
        self.unprotect();
        self.unprotect();
        let res = res?;

        self.apply_cache.put_node(l.0, r.0, u32::MAX, op.tag(), res);
        Ok(res)
    }

    pub(crate) fn not_rec(&mut self, r: Bdd) -> std::result::Result<Bdd, MakeNodeSignal> {
        if r.is_terminal() {
            return Ok(if r.is_true() { Bdd::FALSE } else { Bdd::TRUE });
        }
        if let Some(cached) = self.apply_cache.get_node(r.0, u32::MAX, u32::MAX, tag::NOT) {
            return Ok(cached);
        }
        let level = self.arena.level(r);
        let (lo_src, hi_src) = (self.arena.low(r), self.arena.high(r));
        let lo = self.not_rec(lo_src)?;
        self.protect(lo);
        let hi = self.not_rec(hi_src);
        self.unprotect();
        let hi = hi?;
        self.protect(lo);
        self.protect(hi);
        let res = self.arena.make_node(level, lo, hi, &self.protected);
        self.unprotect();
        self.unprotect();
        let res = res?;
        self.apply_cache.put_node(r.0, u32::MAX, u32::MAX, tag::NOT, res);
        Ok(res)
    }

    pub(crate) fn ite_rec(
        &mut self,
        f: Bdd,
        g: Bdd,
        h: Bdd,
    ) -> std::result::Result<Bdd, MakeNodeSignal> {
        if f.is_true() {
            return Ok(g);
        }
        if f.is_false() {
            return Ok(h);
        }
        if g == h {
            return Ok(g);
        }
        if g.is_true() && h.is_false() {
            return Ok(f);
        }
        if g.is_false() && h.is_true() {
            return self.not_rec(f);
        }
        if let Some(cached) = self.ite_cache.get_node(f.0, g.0, h.0, tag::ITE) {
            return Ok(cached);
        }

        let level = self
            .arena
            .level(f)
            .min(self.arena.level(g))
            .min(self.arena.level(h));
        let (f_lo, f_hi) = self.cofactors(f, level);
        let (g_lo, g_hi) = self.cofactors(g, level);
        let (h_lo, h_hi) = self.cofactors(h, level);

        let lo = self.ite_rec(f_lo, g_lo, h_lo)?;
        self.protect(lo);
        let hi = self.ite_rec(f_hi, g_hi, h_hi);
        self.unprotect();
        let hi = hi?;

        self.protect(lo);
        self.protect(hi);
        let res = self.arena.make_node(level, lo, hi, &self.protected);
        self.unprotect();
        self.unprotect();
        let res = res?;

        self.ite_cache.put_node(f.0, g.0, h.0, tag::ITE, res);
        Ok(res)
    }

    pub fn apply(&mut self, l: Bdd, r: Bdd, op: BddOp) -> Result<Bdd> {
        self.check_error()?;
        self.run_with_retry(|m| m.apply_rec(l, r, op))
    }

    pub fn and(&mut self, l: Bdd, r: Bdd) -> Result<Bdd> {
        self.apply(l, r, BddOp::And)
    }

    pub fn or(&mut self, l: Bdd, r: Bdd) -> Result<Bdd> {
        self.apply(l, r, BddOp::Or)
    }

    pub fn xor(&mut self, l: Bdd, r: Bdd) -> Result<Bdd> {
        self.apply(l, r, BddOp::Xor)
    }

    pub fn imp(&mut self, l: Bdd, r: Bdd) -> Result<Bdd> {
        self.apply(l, r, BddOp::Imp)
    }

    pub fn biimp(&mut self, l: Bdd, r: Bdd) -> Result<Bdd> {
        self.apply(l, r, BddOp::Biimp)
    }

    pub fn not(&mut self, r: Bdd) -> Result<Bdd> {
        self.check_error()?;
        self.run_with_retry(|m| m.not_rec(r))
    }

    pub fn ite(&mut self, f: Bdd, g: Bdd, h: Bdd) -> Result<Bdd> {
        self.check_error()?;
        self.run_with_retry(|m| m.ite_rec(f, g, h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BddConfig;
    use crate::node::Var;

    fn fresh(varnum: u32) -> BddManager {
        let mut m = BddManager::new(BddConfig::default()).expect("engine should start");
        m.set_varnum(varnum).unwrap();
        m
    }

    #[test]
    fn and_or_identities() {
        let _guard = BddManager::test_lock();
        let mut m = fresh(2);
        let x0 = m.ithvar(Var(0)).unwrap();
        let x1 = m.ithvar(Var(1)).unwrap();
        assert_eq!(m.and(x0, Bdd::TRUE).unwrap(), x0);
        assert_eq!(m.and(x0, Bdd::FALSE).unwrap(), Bdd::FALSE);
        assert_eq!(m.or(x0, Bdd::TRUE).unwrap(), Bdd::TRUE);
        assert_eq!(m.and(x0, x0).unwrap(), x0);
        let and01 = m.and(x0, x1).unwrap();
        let and10 = m.and(x1, x0).unwrap();
        assert_eq!(and01, and10);
        m.done();
    }

    #[test]
    fn not_is_involutive() {
        let _guard = BddManager::test_lock();
        let mut m = fresh(2);
        let x0 = m.ithvar(Var(0)).unwrap();
        let not_x0 = m.not(x0).unwrap();
        let not_not_x0 = m.not(not_x0).unwrap();
        assert_eq!(not_not_x0, x0);
        assert_eq!(m.and(x0, not_x0).unwrap(), Bdd::FALSE);
        assert_eq!(m.or(x0, not_x0).unwrap(), Bdd::TRUE);
        m.done();
    }

    #[test]
    fn ite_matches_apply_expansion() {
        let _guard = BddManager::test_lock();
        let mut m = fresh(3);
        let x0 = m.ithvar(Var(0)).unwrap();
        let x1 = m.ithvar(Var(1)).unwrap();
        let x2 = m.ithvar(Var(2)).unwrap();
        let f = m.ite(x0, x1, x2).unwrap();

        let not_x0 = m.not(x0).unwrap();
        let a = m.and(x0, x1).unwrap();
        let b = m.and(not_x0, x2).unwrap();
        let expected = m.or(a, b).unwrap();
        assert_eq!(f, expected);
        m.done();
    }
}
