//! The node arena and unique table: hash-consed storage, mark-sweep GC and dynamic growth.
//!
//! This is the one structure every operator touches. It deliberately knows nothing about
//! variables, operators or caches — it only ever sees `(level, low, high)` triples and handles.
//! The rest of the engine builds on top of it.

use crate::node::{triple, Bdd, Node, INVALID};
use likely_stable::unlikely;
use log::{debug, trace};

/// `make_node` either produces a handle, or signals that the caller must react before retrying.
pub(crate) enum MakeNodeSignal {
    /// The used-node count has crossed the reorder threshold while reordering is armed. The
    /// calling operator must unwind to its entry point, let the engine settle, and retry once.
    ReorderAbort,
    /// The table is at its hard capacity ceiling and growing would exceed it.
    Exhausted,
}

pub(crate) type MakeNodeResult = Result<Bdd, MakeNodeSignal>;

pub(crate) struct Arena {
    nodes: Vec<Node>,
    table: Vec<u32>,
    free_head: u32,
    freenum: u32,
    /// Node count beyond which `make_node` raises [`MakeNodeSignal::ReorderAbort`], if armed.
    next_reorder_threshold: u32,
    reorder_armed: bool,
    max_capacity: u32,
    increase_factor: u32,
    max_increase: u32,
    min_free_percent: u32,
    pub(crate) gc_count: u64,
    /// Set by `grow`, drained by the manager's resize hook after the triggering call returns.
    last_resize: Option<(u32, u32)>,
    /// Set by `gc`, drained by the manager after the triggering call returns: a collection may
    /// have reclaimed and reused a slot an operation cache's key still points at, so every cache
    /// must be cleared once this fires, not just on an explicit `force_gc`.
    gc_happened: bool,
}

impl Arena {
    pub fn new(initial_nodes: u32) -> Arena {
        let capacity = next_prime(initial_nodes.max(4));
        let mut nodes = Vec::with_capacity(capacity as usize);
        nodes.push(Node::terminal()); // Bdd::FALSE
        nodes.push(Node::terminal()); // Bdd::TRUE
        for i in 2..capacity {
            nodes.push(Node::free(if i + 1 < capacity { i + 1 } else { INVALID }));
        }
        Arena {
            nodes,
            table: vec![INVALID; capacity as usize],
            free_head: if capacity > 2 { 2 } else { INVALID },
            freenum: capacity.saturating_sub(2),
            next_reorder_threshold: u32::MAX,
            reorder_armed: false,
            max_capacity: u32::MAX,
            increase_factor: 100,
            max_increase: 50_000,
            min_free_percent: 20,
            gc_count: 0,
            last_resize: None,
            gc_happened: false,
        }
    }

    /// Drains the pending resize notification, if `grow` ran since the last drain.
    pub(crate) fn take_resize_event(&mut self) -> Option<(u32, u32)> {
        self.last_resize.take()
    }

    /// Drains the pending GC notification, if `gc` ran since the last drain.
    pub(crate) fn take_gc_event(&mut self) -> bool {
        std::mem::replace(&mut self.gc_happened, false)
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.nodes.len() as u32
    }

    #[inline]
    pub fn used(&self) -> u32 {
        self.capacity() - self.freenum
    }

    pub fn set_max_nodenum(&mut self, n: u32) {
        self.max_capacity = n;
    }

    pub fn set_increase_factor(&mut self, percent: u32) {
        self.increase_factor = percent;
    }

    pub fn set_max_increase(&mut self, n: u32) {
        self.max_increase = n;
    }

    pub fn set_min_free_percent(&mut self, percent: u32) {
        self.min_free_percent = percent;
    }

    pub fn arm_reorder(&mut self, threshold: u32) {
        self.reorder_armed = true;
        self.next_reorder_threshold = threshold;
    }

    pub fn disarm_reorder(&mut self) {
        self.reorder_armed = false;
        self.next_reorder_threshold = u32::MAX;
    }

    #[inline]
    pub fn level(&self, n: Bdd) -> u32 {
        self.nodes[n.index()].level
    }

    #[inline]
    pub fn low(&self, n: Bdd) -> Bdd {
        self.nodes[n.index()].low
    }

    #[inline]
    pub fn high(&self, n: Bdd) -> Bdd {
        self.nodes[n.index()].high
    }

    #[inline]
    pub fn refcount(&self, n: Bdd) -> u32 {
        self.nodes[n.index()].refcount
    }

    /// Scratch mark bit, reused by GC between collections and by the enumeration family
    /// (`nodecount`/`support`/`varprofile`) for mark-then-unmark traversals. Always `false`
    /// between calls; a caller that marks nodes must unmark the same set before returning.
    #[inline]
    pub fn is_marked(&self, n: Bdd) -> bool {
        self.nodes[n.index()].mark
    }

    #[inline]
    pub fn set_mark(&mut self, n: Bdd, mark: bool) {
        self.nodes[n.index()].mark = mark;
    }

    pub fn add_ref(&mut self, n: Bdd) {
        self.nodes[n.index()].add_ref();
    }

    pub fn del_ref(&mut self, n: Bdd) {
        self.nodes[n.index()].del_ref();
    }

    #[inline]
    fn bucket(&self, level: u32, low: Bdd, high: Bdd) -> usize {
        (triple(level as u64, low.0 as u64, high.0 as u64) % self.table.len() as u64) as usize
    }

    fn find(&self, level: u32, low: Bdd, high: Bdd) -> Option<Bdd> {
        let mut cur = self.table[self.bucket(level, low, high)];
        while cur != INVALID {
            let node = &self.nodes[cur as usize];
            if node.level == level && node.low == low && node.high == high {
                return Some(Bdd::new(cur));
            }
            cur = node.hash_next;
        }
        None
    }

    fn insert_chain(&mut self, idx: u32, level: u32, low: Bdd, high: Bdd) {
        let bucket = self.bucket(level, low, high);
        let head = self.table[bucket];
        self.nodes[idx as usize].hash_next = head;
        self.table[bucket] = idx;
    }

    /// Hash-cons `(level, low, high)`. `protected` is the caller's reference stack: handles that
    /// must survive a GC triggered by this very call.
    pub fn make_node(
        &mut self,
        level: u32,
        low: Bdd,
        high: Bdd,
        protected: &[Bdd],
    ) -> MakeNodeResult {
        if low == high {
            return Ok(low);
        }
        if let Some(existing) = self.find(level, low, high) {
            return Ok(existing);
        }

        if unlikely(self.free_head == INVALID) {
            self.gc(protected);
            let free_ratio = self.freenum * 100 / self.capacity().max(1);
            if self.free_head == INVALID || free_ratio < self.min_free_percent {
                if self.reorder_armed && self.used() >= self.next_reorder_threshold {
                    return Err(MakeNodeSignal::ReorderAbort);
                }
                self.grow()?;
            }
        }

        let idx = self.free_head;
        let freed_node = self.nodes[idx as usize];
        self.free_head = freed_node.hash_next;
        self.freenum -= 1;
        self.nodes[idx as usize] = Node {
            level,
            low,
            high,
            refcount: 0,
            mark: false,
            hash_next: INVALID,
        };
        self.insert_chain(idx, level, low, high);
        Ok(Bdd::new(idx))
    }

    fn grow(&mut self) -> Result<(), MakeNodeSignal> {
        let old_capacity = self.capacity();
        let grown = old_capacity + (old_capacity * self.increase_factor / 100).min(self.max_increase);
        let new_capacity = next_prime(grown).min(self.max_capacity.max(old_capacity + 1));
        if new_capacity <= old_capacity {
            return Err(MakeNodeSignal::Exhausted);
        }
        debug!(
            "growing node arena from {} to {} nodes",
            old_capacity, new_capacity
        );
        let extra = new_capacity - old_capacity;
        self.nodes.reserve(extra as usize);
        for i in old_capacity..new_capacity {
            self.nodes.push(Node::free(if i + 1 < new_capacity {
                i + 1
            } else {
                INVALID
            }));
        }
        self.free_head = old_capacity;
        self.freenum += extra;
        self.table = vec![INVALID; next_prime(new_capacity) as usize];
        self.rehash_all();
        self.last_resize = Some((old_capacity, new_capacity));
        Ok(())
    }

    fn rehash_all(&mut self) {
        for slot in self.table.iter_mut() {
            *slot = INVALID;
        }
        for idx in 2..self.nodes.len() as u32 {
            let node = self.nodes[idx as usize];
            if !node.is_free() {
                self.insert_chain(idx, node.level, node.low, node.high);
            }
        }
    }

    /// Mark-sweep collection. Roots are every node with a nonzero refcount plus everything in
    /// `protected` (the caller's in-flight reference stack) — transitively closed over children.
    pub fn gc(&mut self, protected: &[Bdd]) -> u32 {
        self.gc_count += 1;
        self.gc_happened = true;
        let before = self.freenum;
        let mut stack: Vec<Bdd> = protected.to_vec();
        for idx in 2..self.nodes.len() as u32 {
            if self.nodes[idx as usize].refcount > 0 && !self.nodes[idx as usize].is_free() {
                stack.push(Bdd::new(idx));
            }
        }
        while let Some(n) = stack.pop() {
            if n.is_terminal() {
                continue;
            }
            let node = &mut self.nodes[n.index()];
            if node.mark {
                continue;
            }
            node.mark = true;
            let (low, high) = (node.low, node.high);
            stack.push(low);
            stack.push(high);
        }

        for idx in 2..self.nodes.len() as u32 {
            let node = &mut self.nodes[idx as usize];
            if node.is_free() {
                continue;
            }
            if node.mark {
                node.mark = false;
            } else {
                *node = Node::free(INVALID);
            }
        }
        self.rehash_all();
        self.relink_free_list();
        let freed = self.freenum - before;
        trace!(
            "gc #{}: freed {} nodes ({} used of {})",
            self.gc_count,
            freed,
            self.used(),
            self.capacity()
        );
        freed
    }

    /// Shifts every live non-terminal node whose level is `> threshold` down by one, and
    /// rehashes the table to match. Used by `duplicate_var` to carve out a fresh level right
    /// below an existing variable.
    pub(crate) fn shift_levels_above(&mut self, threshold: u32) {
        for node in self.nodes.iter_mut() {
            if !node.is_free() && node.level != crate::node::TERMINAL_LEVEL && node.level > threshold {
                node.level += 1;
            }
        }
        self.rehash_all();
    }

    fn relink_free_list(&mut self) {
        self.free_head = INVALID;
        self.freenum = 0;
        for idx in (2..self.nodes.len() as u32).rev() {
            if self.nodes[idx as usize].is_free() {
                self.nodes[idx as usize].hash_next = self.free_head;
                self.free_head = idx;
                self.freenum += 1;
            }
        }
    }
}

/// Smallest prime `>= n`. The original rounds growth targets up to a prime to keep hash-chain
/// lengths well distributed; trial division is plenty fast at these sizes.
pub(crate) fn next_prime(n: u32) -> u32 {
    fn is_prime(n: u32) -> bool {
        if n < 2 {
            return false;
        }
        if n % 2 == 0 {
            return n == 2;
        }
        let mut d = 3;
        while d * d <= n {
            if n % d == 0 {
                return false;
            }
            d += 2;
        }
        true
    }
    let mut candidate = n.max(2);
    while !is_prime(candidate) {
        candidate += 1;
    }
    candidate
}
