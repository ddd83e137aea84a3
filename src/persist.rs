//! `fnsave`/`fnload`: a process-internal text dump of a single BDD's reachable node set.
//!
//! Format: a header line with the live variable count, then one `id level low_id high_id` line
//! per reachable non-terminal node, children-first so `fnload` never sees a forward reference.
//! `0` and `1` are the terminals and are never written.

use std::fs;
use std::io::Write;
use std::path::Path;

use fxhash::FxHashMap;

use crate::error::{BddError, Result};
use crate::manager::BddManager;
use crate::node::Bdd;

impl BddManager {
    fn fnsave_collect(&mut self, r: Bdd, order: &mut Vec<Bdd>) {
        if r.is_terminal() || self.arena.is_marked(r) {
            return;
        }
        self.arena.set_mark(r, true);
        let (lo, hi) = (self.arena.low(r), self.arena.high(r));
        self.fnsave_collect(lo, order);
        self.fnsave_collect(hi, order);
        order.push(r);
    }

    /// Writes `r`'s reachable node set to `path` in children-first order.
    pub fn fnsave(&mut self, path: impl AsRef<Path>, r: Bdd) -> Result<()> {
        self.check_error()?;
        let mut order = Vec::new();
        self.fnsave_collect(r, &mut order);
        for &n in &order {
            self.arena.set_mark(n, false);
        }

        let mut out = String::new();
        out.push_str(&format!("{}\n", self.varnum));
        for n in order {
            out.push_str(&format!(
                "{} {} {} {}\n",
                n.0,
                self.arena.level(n),
                self.arena.low(n).0,
                self.arena.high(n).0
            ));
        }
        let mut f = fs::File::create(path).map_err(|_| self.set_error(BddError::FileFailed))?;
        f.write_all(out.as_bytes())
            .map_err(|_| self.set_error(BddError::FileFailed))?;
        Ok(())
    }

    /// Reads back a dump produced by `fnsave`, rebuilding every node via `make_node` so the
    /// result hash-conses against whatever is already live in this engine. The saved `id`s are
    /// only used to resolve `low_id`/`high_id` references within the file; the engine assigns
    /// its own handles.
    pub fn fnload(&mut self, path: impl AsRef<Path>) -> Result<Bdd> {
        self.check_error()?;
        let text = fs::read_to_string(path).map_err(|_| self.set_error(BddError::FileFailed))?;
        let mut lines = text.lines();
        let header = lines.next().ok_or_else(|| self.set_error(BddError::FormatError))?;
        let saved_varnum: u32 = header
            .trim()
            .parse()
            .map_err(|_| self.set_error(BddError::FormatError))?;
        if saved_varnum > self.varnum {
            return Err(self.set_error(BddError::SizeMismatch));
        }

        let mut resolved: FxHashMap<u32, Bdd> = FxHashMap::default();
        resolved.insert(0, Bdd::FALSE);
        resolved.insert(1, Bdd::TRUE);
        let mut last_id: i64 = 1;
        let mut last = Bdd::FALSE;

        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let id: u32 = parts
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| self.set_error(BddError::FormatError))?;
            let level: u32 = parts
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| self.set_error(BddError::FormatError))?;
            let low_id: u32 = parts
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| self.set_error(BddError::FormatError))?;
            let high_id: u32 = parts
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| self.set_error(BddError::FormatError))?;
            if parts.next().is_some() {
                return Err(self.set_error(BddError::FormatError));
            }
            if (id as i64) <= last_id {
                return Err(self.set_error(BddError::NotAscending));
            }
            last_id = id as i64;

            let low = *resolved
                .get(&low_id)
                .ok_or_else(|| self.set_error(BddError::FormatError))?;
            let high = *resolved
                .get(&high_id)
                .ok_or_else(|| self.set_error(BddError::FormatError))?;
            let node = self
                .arena
                .make_node(level, low, high, &self.protected)
                .map_err(|_| self.set_error(BddError::OutOfNodes))?;
            resolved.insert(id, node);
            last = node;
        }
        self.sync_arena_state();
        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BddConfig;
    use crate::node::Var;

    #[test]
    fn fnsave_then_fnload_roundtrips() {
        let _guard = BddManager::test_lock();
        let mut m = BddManager::new(BddConfig::default()).unwrap();
        m.set_varnum(3).unwrap();
        let x0 = m.ithvar(Var(0)).unwrap();
        let x1 = m.ithvar(Var(1)).unwrap();
        let x2 = m.ithvar(Var(2)).unwrap();
        let f = m.ite(x0, x1, x2).unwrap();
        m.add_ref(f).unwrap();

        let dir = std::env::temp_dir();
        let path = dir.join(format!("robdd_engine_fnsave_test_{}.bdd", std::process::id()));
        m.fnsave(&path, f).unwrap();
        let loaded = m.fnload(&path).unwrap();
        assert_eq!(loaded, f);
        let _ = std::fs::remove_file(&path);
        m.done();
    }

    #[test]
    fn fnload_rejects_non_ascending_ids() {
        let _guard = BddManager::test_lock();
        let mut m = BddManager::new(BddConfig::default()).unwrap();
        m.set_varnum(1).unwrap();

        let dir = std::env::temp_dir();
        let path = dir.join(format!("robdd_engine_fnsave_bad_{}.bdd", std::process::id()));
        std::fs::write(&path, "1\n5 0 0 1\n3 0 0 1\n").unwrap();
        let err = m.fnload(&path).unwrap_err();
        assert_eq!(err, BddError::NotAscending);
        let _ = std::fs::remove_file(&path);
        m.done();
    }
}
