//! Direct-mapped, lossy operation caches.
//!
//! Every operator family gets its own [`OpCache`] instance. A lookup hashes the full key
//! (up to three handles plus a tag distinguishing the operator/parameterization) into a single
//! slot; on a miss the slot is simply overwritten — there is no chaining, so a cache is a *hint*,
//! never a source of truth (callers must compare the full key before trusting a hit, per the
//! "cache non-authoritativeness" invariant).

use crate::node::Bdd;

const SEED: u64 = 0x51_7c_c1_b7_27_22_0a_95;

/// What a slot is currently holding. Kept as a plain union-by-enum rather than raw bits so the
/// borrow checker, not manual bit tricks, enforces that callers read back what they wrote.
#[derive(Copy, Clone, PartialEq)]
pub(crate) enum CacheValue {
    Empty,
    Node(Bdd),
    Real(f64),
}

#[derive(Copy, Clone)]
struct Slot {
    a: u32,
    b: u32,
    c: u32,
    tag: u32,
    value: CacheValue,
}

const EMPTY_SLOT: Slot = Slot {
    a: u32::MAX,
    b: u32::MAX,
    c: u32::MAX,
    tag: u32::MAX,
    value: CacheValue::Empty,
};

pub(crate) struct OpCache {
    slots: Vec<Slot>,
}

impl OpCache {
    pub fn new(capacity: usize) -> OpCache {
        OpCache {
            slots: vec![EMPTY_SLOT; capacity.max(1)],
        }
    }

    pub fn resize(&mut self, capacity: usize) {
        self.slots = vec![EMPTY_SLOT; capacity.max(1)];
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = EMPTY_SLOT;
        }
    }

    #[inline]
    fn index(&self, a: u32, b: u32, c: u32, tag: u32) -> usize {
        let h = (a as u64)
            .wrapping_mul(SEED)
            .wrapping_add((b as u64).wrapping_mul(SEED).rotate_left(17))
            .wrapping_add((c as u64).wrapping_mul(SEED).rotate_left(33))
            .wrapping_add(tag as u64);
        (h % self.slots.len() as u64) as usize
    }

    /// Looks up `(a, b, c, tag)`; `c` may be `u32::MAX` for binary-key operators.
    pub fn get(&self, a: u32, b: u32, c: u32, tag: u32) -> Option<CacheValue> {
        let slot = &self.slots[self.index(a, b, c, tag)];
        if slot.a == a && slot.b == b && slot.c == c && slot.tag == tag {
            match slot.value {
                CacheValue::Empty => None,
                v => Some(v),
            }
        } else {
            None
        }
    }

    pub fn put(&mut self, a: u32, b: u32, c: u32, tag: u32, value: CacheValue) {
        let idx = self.index(a, b, c, tag);
        self.slots[idx] = Slot { a, b, c, tag, value };
    }

    pub fn get_node(&self, a: u32, b: u32, c: u32, tag: u32) -> Option<Bdd> {
        match self.get(a, b, c, tag) {
            Some(CacheValue::Node(n)) => Some(n),
            _ => None,
        }
    }

    pub fn put_node(&mut self, a: u32, b: u32, c: u32, tag: u32, result: Bdd) {
        self.put(a, b, c, tag, CacheValue::Node(result));
    }

    pub fn get_real(&self, a: u32, b: u32, c: u32, tag: u32) -> Option<f64> {
        match self.get(a, b, c, tag) {
            Some(CacheValue::Real(r)) => Some(r),
            _ => None,
        }
    }

    pub fn put_real(&mut self, a: u32, b: u32, c: u32, tag: u32, result: f64) {
        self.put(a, b, c, tag, CacheValue::Real(result));
    }
}

/// Operator tags embedded in cache keys, one constant per distinct operator/shape so that a
/// cache shared by a family of operators (e.g. all of apply's `bdd_op`s) cannot mistake a hit
/// for one kind as a hit for another.
pub(crate) mod tag {
    pub const AND: u32 = 0;
    pub const OR: u32 = 1;
    pub const XOR: u32 = 2;
    pub const NAND: u32 = 3;
    pub const NOR: u32 = 4;
    pub const IMP: u32 = 5;
    pub const BIIMP: u32 = 6;
    pub const DIFF: u32 = 7;
    pub const LESS: u32 = 8;
    pub const INVIMP: u32 = 9;
    pub const NOT: u32 = 10;
    pub const ITE: u32 = 11;

    pub const RESTRICT: u32 = 0;
    pub const CONSTRAIN: u32 = 1;
    pub const SIMPLIFY: u32 = 2;

    pub const REPLACE: u32 = 0;
    pub const COMPOSE: u32 = 1;
    pub const VECCOMPOSE: u32 = 2;

    pub const EXIST: u32 = 0;
    pub const FORALL: u32 = 1;
    pub const UNIQUE: u32 = 2;
    pub const APPEX: u32 = 3;
    pub const APPALL: u32 = 4;
    pub const APPUNI: u32 = 5;

    pub const SATCOUNT: u32 = 0;
    pub const SATCOUNTLN: u32 = 1;
    pub const PATHCOUNT: u32 = 2;
}
