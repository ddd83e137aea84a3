//! The engine itself: a single value owning the node arena, the variable table, every
//! operation cache and the reorder/error bookkeeping. There is deliberately no global state —
//! [`BddManager::new`] enforces the "one live engine" rule with a process-wide flag instead,
//! so the rule is checked at runtime rather than baked into `static` storage.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

use crate::arena::Arena;
use crate::cache::OpCache;
use crate::config::{BddConfig, Tuning};
use crate::error::{BddError, Result};
use crate::hooks::{GcEvent, Hooks};
use crate::node::{Bdd, Var};
use crate::pair::Pair;

static ENGINE_RUNNING: AtomicBool = AtomicBool::new(false);

pub struct BddManager {
    pub(crate) arena: Arena,
    pub(crate) varnum: u32,
    /// `var_to_level[v]` is variable `v`'s current position in the ordering.
    pub(crate) var_to_level: Vec<u32>,
    /// Inverse of `var_to_level`.
    pub(crate) level_to_var: Vec<u32>,
    /// `var_set[2*v]` / `var_set[2*v+1]` are the cached `ithvar`/`nithvar` handles.
    pub(crate) var_set: Vec<Bdd>,

    pub(crate) apply_cache: OpCache,
    pub(crate) ite_cache: OpCache,
    pub(crate) misc_cache: OpCache,
    pub(crate) quant_cache: OpCache,
    pub(crate) subst_cache: OpCache,

    /// Scratch reference stack: handles currently "in flight" inside a recursive operator call,
    /// protected from a GC that the call itself might trigger. See `protect`/`unprotect`.
    pub(crate) protected: Vec<Bdd>,

    pub(crate) tuning: Tuning,
    pub(crate) hooks: Hooks,
    error_flag: Option<BddError>,

    pub(crate) pair_id_counter: u64,
    /// Change-counter used by `support` to avoid clearing its per-variable scratch array
    /// every call; see the corresponding design note.
    pub(crate) support_id: u64,
    pub(crate) support_seen: Vec<u64>,

    quantvarset_id: i64,
}

impl BddManager {
    /// Equivalent to `bdd_init`: fails if another engine is already live in this process.
    pub fn new(config: BddConfig) -> Result<BddManager> {
        if ENGINE_RUNNING
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BddError::AlreadyRunning);
        }
        info!(
            "starting bdd engine: {} initial nodes, cache size {}",
            config.initial_nodes, config.cache_size
        );
        Ok(BddManager {
            arena: Arena::new(config.initial_nodes),
            varnum: 0,
            var_to_level: Vec::new(),
            level_to_var: Vec::new(),
            var_set: Vec::new(),
            apply_cache: OpCache::new(config.cache_size as usize),
            ite_cache: OpCache::new(config.cache_size as usize),
            misc_cache: OpCache::new(config.cache_size as usize),
            quant_cache: OpCache::new(config.cache_size as usize),
            subst_cache: OpCache::new(config.cache_size as usize),
            protected: Vec::with_capacity(64),
            tuning: Tuning::default(),
            hooks: Hooks::default(),
            error_flag: None,
            pair_id_counter: 0,
            support_id: 0,
            support_seen: Vec::new(),
            quantvarset_id: 0,
        })
    }

    pub fn is_running() -> bool {
        ENGINE_RUNNING.load(Ordering::SeqCst)
    }

    /// Equivalent to `bdd_done`. Consumes the manager, releasing the single-instance slot.
    pub fn done(self) {
        info!("shutting down bdd engine after {} gc cycles", self.arena.gc_count);
        ENGINE_RUNNING.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn protect(&mut self, h: Bdd) {
        self.protected.push(h);
    }

    #[inline]
    pub(crate) fn unprotect(&mut self) {
        self.protected.pop();
    }

    pub(crate) fn set_error(&mut self, err: BddError) -> BddError {
        self.error_flag = Some(err);
        (self.hooks.error)(err);
        err
    }

    pub fn clear_error(&mut self) {
        self.error_flag = None;
    }

    pub fn error(&self) -> Option<BddError> {
        self.error_flag
    }

    /// Sticky-error short-circuit: every fallible public entry point opens with this.
    pub(crate) fn check_error(&self) -> Result<()> {
        match self.error_flag {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn varnum(&self) -> u32 {
        self.varnum
    }

    /// Equivalent to `bdd_setvarnum`/`bdd_extvarnum` fused: grows (never shrinks) the variable
    /// count, allocating fresh level slots at the bottom of the current ordering and building
    /// the new `ithvar`/`nithvar` literals.
    pub fn set_varnum(&mut self, n: u32) -> Result<()> {
        self.check_error()?;
        if n < self.varnum {
            return Err(self.set_error(BddError::DecreaseVarNum));
        }
        let old = self.varnum;
        self.var_to_level.resize(n as usize, 0);
        self.level_to_var.resize(n as usize, 0);
        for v in old..n {
            self.var_to_level[v as usize] = v;
            self.level_to_var[v as usize] = v;
        }
        self.var_set.resize(2 * n as usize, Bdd::FALSE);
        for v in old..n {
            let level = self.var_to_level[v as usize];
            let pos = self
                .arena
                .make_node(level, Bdd::FALSE, Bdd::TRUE, &self.protected)
                .map_err(|_| self.set_error(BddError::OutOfNodes))?;
            let neg = self
                .arena
                .make_node(level, Bdd::TRUE, Bdd::FALSE, &self.protected)
                .map_err(|_| self.set_error(BddError::OutOfNodes))?;
            self.arena.add_ref(pos);
            self.arena.add_ref(neg);
            self.var_set[2 * v as usize] = pos;
            self.var_set[2 * v as usize + 1] = neg;
        }
        self.support_seen.resize(n as usize, 0);
        self.varnum = n;
        // `satcount`/`satcountln` cache per-node counts that fold in the terminal gap against
        // `varnum`; a changed variable count invalidates every entry in the misc cache.
        self.misc_cache.clear();
        self.sync_arena_state();
        Ok(())
    }

    /// Equivalent to `bdd_extvarnum`: always grows by a relative amount.
    pub fn ext_varnum(&mut self, by: u32) -> Result<()> {
        self.set_varnum(self.varnum + by)
    }

    /// Inserts a brand-new variable immediately below `var` in the ordering (`bdd_duplicatevar`).
    /// A two-pass protocol, deliberately not collapsed into one:
    ///
    /// 1. Every node at a level strictly below `var`'s shifts down by one to free the slot, and
    ///    the variable/level tables are rebuilt around the gap. No existing node's `(low, high)`
    ///    pair changes, so no root's Boolean function changes either — `duplicate_var` only
    ///    reshapes the ordering, it never touches semantics.
    /// 2. The freed level gets its own `ithvar`/`nithvar` literals and every per-variable scratch
    ///    table is extended to match the new variable count.
    ///
    /// The returned variable does not yet appear in any existing BDD; callers introduce it via
    /// `replace`/`compose` once it has a name of its own (the common use is building a primed
    /// copy of an existing variable for a transition relation).
    pub fn duplicate_var(&mut self, var: Var) -> Result<Var> {
        self.check_error()?;
        if var.0 >= self.varnum {
            return Err(self.set_error(BddError::UnknownVariable(var.0)));
        }
        let var_level = self.var_to_level[var.0 as usize];
        let old_varnum = self.varnum;
        let new_var = Var(old_varnum);

        // Pass 1: make room for the new level and rebuild the variable <-> level bijection.
        self.arena.shift_levels_above(var_level);
        self.var_to_level.push(0);
        self.level_to_var.push(0);
        for v in 0..old_varnum {
            if self.var_to_level[v as usize] > var_level {
                self.var_to_level[v as usize] += 1;
            }
        }
        let new_level = var_level + 1;
        self.var_to_level[new_var.0 as usize] = new_level;
        for v in 0..=old_varnum {
            let level = self.var_to_level[v as usize];
            self.level_to_var[level as usize] = v;
        }
        self.varnum = old_varnum + 1;

        // Pass 2: give the new variable its literals and extend the scratch tables.
        self.var_set.resize(2 * self.varnum as usize, Bdd::FALSE);
        let pos = self
            .arena
            .make_node(new_level, Bdd::FALSE, Bdd::TRUE, &self.protected)
            .map_err(|_| self.set_error(BddError::OutOfNodes))?;
        let neg = self
            .arena
            .make_node(new_level, Bdd::TRUE, Bdd::FALSE, &self.protected)
            .map_err(|_| self.set_error(BddError::OutOfNodes))?;
        self.arena.add_ref(pos);
        self.arena.add_ref(neg);
        self.var_set[2 * new_var.0 as usize] = pos;
        self.var_set[2 * new_var.0 as usize + 1] = neg;
        self.support_seen.resize(self.varnum as usize, 0);

        // Level numbers moved out from under every cached entry's implicit assumptions; safest
        // to drop them rather than reason about which caches are level-sensitive.
        self.invalidate_caches();
        self.sync_arena_state();
        Ok(new_var)
    }

    pub fn ithvar(&self, v: Var) -> Result<Bdd> {
        if v.0 >= self.varnum {
            return Err(BddError::UnknownVariable(v.0));
        }
        Ok(self.var_set[2 * v.0 as usize])
    }

    pub fn nithvar(&self, v: Var) -> Result<Bdd> {
        if v.0 >= self.varnum {
            return Err(BddError::UnknownVariable(v.0));
        }
        Ok(self.var_set[2 * v.0 as usize + 1])
    }

    pub fn var(&self, n: Bdd) -> Result<Var> {
        if n.is_terminal() {
            return Err(BddError::IllegalBdd);
        }
        let level = self.arena.level(n);
        Ok(Var(self.level_to_var[level as usize]))
    }

    pub fn level(&self, n: Bdd) -> u32 {
        self.arena.level(n)
    }

    pub fn low(&self, n: Bdd) -> Result<Bdd> {
        if n.is_terminal() {
            return Err(BddError::IllegalBdd);
        }
        Ok(self.arena.low(n))
    }

    pub fn high(&self, n: Bdd) -> Result<Bdd> {
        if n.is_terminal() {
            return Err(BddError::IllegalBdd);
        }
        Ok(self.arena.high(n))
    }

    pub fn add_ref(&mut self, n: Bdd) -> Result<Bdd> {
        self.check_error()?;
        self.arena.add_ref(n);
        Ok(n)
    }

    pub fn del_ref(&mut self, n: Bdd) -> Result<()> {
        self.check_error()?;
        if !n.is_terminal() && self.arena.refcount(n) == 0 {
            warn!("del_ref on a node with zero refcount");
        }
        self.arena.del_ref(n);
        Ok(())
    }

    pub fn node_count_allocated(&self) -> u32 {
        self.arena.capacity()
    }

    /// Installs the hook invoked whenever an operator sets the sticky error flag. Replaces the
    /// default, which only logs at `error!`.
    pub fn set_error_hook(&mut self, hook: impl FnMut(BddError) + 'static) {
        self.hooks.error = Box::new(hook);
    }

    /// Installs a hook invoked around every collection cycle; `None` disables it.
    pub fn set_gc_hook(&mut self, hook: Option<impl FnMut(GcEvent) + 'static>) {
        self.hooks.gc = hook.map(|h| Box::new(h) as crate::hooks::GcHook);
    }

    /// Installs a hook invoked whenever the arena grows; `None` disables it.
    pub fn set_resize_hook(&mut self, hook: Option<impl FnMut(u32, u32) + 'static>) {
        self.hooks.resize = hook.map(|h| Box::new(h) as crate::hooks::ResizeHook);
    }

    pub fn new_pair(&mut self) -> Pair {
        self.pair_id_counter += 1;
        Pair::new(self.pair_id_counter, self.varnum)
    }

    /// Drains the arena's pending notifications. Called at every point the manager hands control
    /// back to the caller after an operation that could have grown or collected the arena
    /// (`run_with_retry`, `set_varnum`, `duplicate_var`, `fnload`):
    ///
    /// - if an internal GC ran, every operation cache is cleared — a cache entry's key may
    ///   reference a node the collection just reclaimed and reused for something else.
    /// - if the arena grew, the resize hook fires.
    pub(crate) fn sync_arena_state(&mut self) {
        if self.arena.take_gc_event() {
            self.invalidate_caches();
        }
        if let Some((old, new)) = self.arena.take_resize_event() {
            if let Some(hook) = self.hooks.resize.as_mut() {
                hook(old, new);
            }
        }
    }

    pub(crate) fn invalidate_caches(&mut self) {
        self.apply_cache.clear();
        self.ite_cache.clear();
        self.misc_cache.clear();
        self.quant_cache.clear();
        self.subst_cache.clear();
    }

    pub fn force_gc(&mut self) -> u32 {
        (self.hooks.gc.as_mut()).map(|h| {
            h(GcEvent::Begin {
                nodes_used: self.arena.used(),
                nodes_total: self.arena.capacity(),
            })
        });
        let freed = self.arena.gc(&self.protected);
        self.invalidate_caches();
        self.arena.take_gc_event();
        (self.hooks.gc.as_mut()).map(|h| {
            h(GcEvent::End {
                freed,
                nodes_total: self.arena.capacity(),
            })
        });
        freed
    }

    /// Settles an in-flight reorder abort. Real sifting/windowing heuristics are out of scope;
    /// what matters here is the contract every operator relies on: after this call the arena has
    /// more headroom (or definitely doesn't, in which case the retry will fail cleanly too).
    pub(crate) fn settle_reorder(&mut self) {
        self.force_gc();
        self.arena.arm_reorder(self.arena.capacity() + self.tuning.alloc_num);
    }

    pub fn set_cache_ratio(&mut self, ratio: u32) -> u32 {
        let old = self.tuning.cache_ratio;
        self.tuning.cache_ratio = ratio;
        old
    }

    pub fn set_max_increase(&mut self, n: u32) -> u32 {
        let old = self.tuning.max_increase;
        self.tuning.max_increase = n;
        self.arena.set_max_increase(n);
        old
    }

    pub fn set_increase_factor(&mut self, percent: u32) -> u32 {
        let old = self.tuning.increase_factor;
        self.tuning.increase_factor = percent;
        self.arena.set_increase_factor(percent);
        old
    }

    pub fn set_max_node_num(&mut self, n: u32) -> u32 {
        let old = self.tuning.max_node_num;
        self.tuning.max_node_num = n;
        self.arena.set_max_nodenum(n);
        old
    }

    pub fn set_min_free_nodes(&mut self, percent: u32) -> u32 {
        let old = self.tuning.min_free_nodes;
        self.tuning.min_free_nodes = percent;
        self.arena.set_min_free_percent(percent);
        old
    }

    pub fn set_alloc_num(&mut self, n: u32) -> u32 {
        let old = self.tuning.alloc_num;
        self.tuning.alloc_num = n;
        old
    }

    /// Runs a recursive operator kernel, honoring the reorder-abort contract: on the first
    /// abort it lets the engine settle and retries once; a second abort gives up and yields
    /// the false terminal, matching the original's "retry once, then give up" rule.
    pub(crate) fn run_with_retry(
        &mut self,
        f: impl Fn(&mut Self) -> std::result::Result<Bdd, crate::arena::MakeNodeSignal>,
    ) -> Result<Bdd> {
        use crate::arena::MakeNodeSignal::*;
        let result = match f(self) {
            Ok(b) => Ok(b),
            Err(Exhausted) => Err(self.set_error(BddError::OutOfNodes)),
            Err(ReorderAbort) => {
                self.settle_reorder();
                match f(self) {
                    Ok(b) => Ok(b),
                    Err(Exhausted) => Err(self.set_error(BddError::OutOfNodes)),
                    Err(ReorderAbort) => {
                        warn!("reorder aborted twice, giving up and returning false");
                        Ok(Bdd::FALSE)
                    }
                }
            }
        };
        self.sync_arena_state();
        result
    }

    #[cfg(test)]
    pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
        use lazy_static::lazy_static;
        use std::sync::Mutex;
        // The engine enforces a single live instance per process; every test module that needs
        // its own engine takes this lock first so `cargo test`'s default thread-per-test
        // parallelism doesn't race on `ENGINE_RUNNING`.
        lazy_static! {
            static ref LOCK: Mutex<()> = Mutex::new(());
        }
        LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn next_quantvarset_id(&mut self) -> i64 {
        self.quantvarset_id += 1;
        // Mirrors the signed/unsigned threshold split documented in DESIGN.md: the signed
        // variant (used by `restrict`) resets at INT_MAX/2 so the sign bit stays meaningful,
        // while the unsigned family resets at the full range.
        if self.quantvarset_id >= i32::MAX as i64 / 2 {
            self.quantvarset_id = 1;
        }
        self.quantvarset_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BddConfig;

    #[test]
    fn duplicate_var_inserts_adjacent_level_without_changing_existing_functions() {
        let _guard = BddManager::test_lock();
        let mut m = BddManager::new(BddConfig::default()).unwrap();
        m.set_varnum(3).unwrap();
        let x0 = m.ithvar(Var(0)).unwrap();
        let x1 = m.ithvar(Var(1)).unwrap();
        let x2 = m.ithvar(Var(2)).unwrap();
        let f = m.ite(x0, x1, x2).unwrap();
        m.add_ref(f).unwrap();

        let x1_level = m.level(x1);
        let new_var = m.duplicate_var(Var(1)).unwrap();

        assert_eq!(m.varnum(), 4);
        assert_eq!(m.var_to_level[new_var.0 as usize], x1_level + 1);
        // x2's level must have shifted down to make room.
        assert!(m.level(x2) > x1_level + 1);

        // f never mentions the new variable, so fixing it to either polarity must reproduce f.
        let new_pos = m.ithvar(new_var).unwrap();
        let new_neg = m.nithvar(new_var).unwrap();
        assert_eq!(m.restrict(f, new_pos).unwrap(), f);
        assert_eq!(m.restrict(f, new_neg).unwrap(), f);
        m.done();
    }
}
