//! Tunable knobs for the engine, mirroring the `bdd_setcacheratio` family of setters.
//!
//! Each setter on [`crate::manager::BddManager`] returns the previous value, matching the
//! original procedural API; [`BddConfig`] is just the bundle used at construction time.

/// Construction-time configuration, passed to [`crate::manager::BddManager::new`].
#[derive(Copy, Clone, Debug)]
pub struct BddConfig {
    /// Initial node arena capacity.
    pub initial_nodes: u32,
    /// Initial per-operator cache capacity (each operator family gets its own cache of this
    /// size; the *ratio* setters later scale these relative to the node count).
    pub cache_size: u32,
}

impl Default for BddConfig {
    fn default() -> BddConfig {
        BddConfig {
            initial_nodes: 10_000,
            cache_size: 1_000,
        }
    }
}

impl BddConfig {
    pub fn new() -> BddConfig {
        BddConfig::default()
    }

    pub fn with_initial_nodes(mut self, n: u32) -> BddConfig {
        self.initial_nodes = n;
        self
    }

    pub fn with_cache_size(mut self, n: u32) -> BddConfig {
        self.cache_size = n;
        self
    }
}

/// Tuning state tracked by the live manager (as opposed to one-shot construction parameters).
pub(crate) struct Tuning {
    pub cache_ratio: u32,
    pub max_increase: u32,
    pub increase_factor: u32,
    pub max_node_num: u32,
    pub min_free_nodes: u32,
    pub alloc_num: u32,
}

impl Default for Tuning {
    fn default() -> Tuning {
        Tuning {
            cache_ratio: 0,
            max_increase: 50_000,
            increase_factor: 100,
            max_node_num: 0,
            min_free_nodes: 20,
            alloc_num: 10_000,
        }
    }
}
