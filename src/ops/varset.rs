//! Variable-set helpers: building and decoding the cube handles `restrict`/`exist`-family
//! operators take as their `var` argument.

use crate::error::{BddError, Result};
use crate::manager::BddManager;
use crate::node::{Bdd, Var};

impl BddManager {
    /// Folds `vars` into a cube (conjunction of positive literals) — the canonical way to build
    /// the `var` argument `exist`/`forall`/`unique`/`appex`-family operators expect.
    pub fn makeset(&mut self, vars: &[Var]) -> Result<Bdd> {
        self.check_error()?;
        let mut cube = Bdd::TRUE;
        for &v in vars {
            let lit = self.ithvar(v)?;
            cube = self.and(cube, lit)?;
        }
        Ok(cube)
    }

    /// Inverse of `makeset`: the variables a cube mentions, in ascending level order. Fails if
    /// `set` is not a pure conjunction of positive literals.
    pub fn scanset(&self, set: Bdd) -> Result<Vec<Var>> {
        let mut result = Vec::new();
        let mut cur = set;
        while !cur.is_terminal() {
            let level = self.arena.level(cur);
            let (lo, hi) = (self.arena.low(cur), self.arena.high(cur));
            if !lo.is_false() || hi.is_false() {
                return Err(BddError::IllegalVarSet);
            }
            result.push(Var(self.level_to_var[level as usize]));
            cur = hi;
        }
        if cur.is_false() {
            return Err(BddError::IllegalVarSet);
        }
        Ok(result)
    }

    /// Builds the minterm cube picking out `value`'s bits (most-significant first) over `vars`.
    pub fn buildcube(&mut self, value: u32, vars: &[Var]) -> Result<Bdd> {
        self.check_error()?;
        let mut result = Bdd::TRUE;
        let width = vars.len();
        for (i, &v) in vars.iter().enumerate() {
            let bit = (value >> (width - 1 - i)) & 1;
            let lit = if bit == 1 {
                self.ithvar(v)?
            } else {
                self.nithvar(v)?
            };
            result = self.and(result, lit)?;
        }
        Ok(result)
    }

    pub fn ibuildcube(&mut self, value: i32, vars: &[Var]) -> Result<Bdd> {
        self.buildcube(value as u32, vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BddConfig;

    #[test]
    fn makeset_then_scanset_roundtrips() {
        let _guard = BddManager::test_lock();
        let mut m = BddManager::new(BddConfig::default()).unwrap();
        m.set_varnum(3).unwrap();
        let set = m.makeset(&[Var(0), Var(2)]).unwrap();
        let scanned = m.scanset(set).unwrap();
        assert_eq!(scanned, vec![Var(0), Var(2)]);
        m.done();
    }

    #[test]
    fn empty_set_is_true() {
        let _guard = BddManager::test_lock();
        let mut m = BddManager::new(BddConfig::default()).unwrap();
        m.set_varnum(2).unwrap();
        let set = m.makeset(&[]).unwrap();
        assert_eq!(set, Bdd::TRUE);
        m.done();
    }
}
