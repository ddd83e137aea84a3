//! Pairing objects: the substitution maps consumed by `replace`, `compose` and `veccompose`.
//!
//! A pair is keyed by variable, not level, so it survives `duplicate_var` level shifts without
//! needing to be rebuilt. Its `id` is folded into the substitution caches' tag so that two
//! different pairings never collide on the same cache slot.

use crate::node::{Bdd, Var};

#[derive(Clone)]
pub struct Pair {
    pub(crate) id: u64,
    /// `replace` target: `var_map[v]` is the variable `v` is renamed to, or `v` itself if unset.
    var_map: Vec<u32>,
    /// `compose`/`veccompose` target: `bdd_map[v]` is the BDD substituted for `v`, or `None`.
    bdd_map: Vec<Option<Bdd>>,
}

impl Pair {
    pub(crate) fn new(id: u64, varnum: u32) -> Pair {
        Pair {
            id,
            var_map: (0..varnum).collect(),
            bdd_map: vec![None; varnum as usize],
        }
    }

    pub(crate) fn grow(&mut self, varnum: u32) {
        let old = self.var_map.len() as u32;
        for v in old..varnum {
            self.var_map.push(v);
            self.bdd_map.push(None);
        }
    }

    pub fn set_var(&mut self, old: Var, new: Var) {
        self.var_map[old.0 as usize] = new.0;
        self.bdd_map[old.0 as usize] = None;
    }

    pub fn set_bdd(&mut self, old: Var, new: Bdd) {
        self.bdd_map[old.0 as usize] = Some(new);
    }

    pub fn reset(&mut self) {
        for (i, slot) in self.var_map.iter_mut().enumerate() {
            *slot = i as u32;
        }
        for slot in self.bdd_map.iter_mut() {
            *slot = None;
        }
    }

    #[inline]
    pub(crate) fn target_var(&self, v: Var) -> Var {
        Var(self.var_map[v.0 as usize])
    }

    #[inline]
    pub(crate) fn target_bdd(&self, v: Var) -> Option<Bdd> {
        self.bdd_map[v.0 as usize]
    }
}
