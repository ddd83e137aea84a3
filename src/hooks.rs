//! Observability hooks: error, GC and resize callbacks.
//!
//! BuDDy's default error hook aborts the host process; a Rust library embedded in someone else's
//! process should not do that by default (see the matching Open Question in `DESIGN.md`), so the
//! default here logs at `error!` and lets the caller's `Result` carry the failure onward. A
//! caller that wants the original behavior installs a hook that panics.

use crate::error::BddError;
use log::error;

pub type ErrorHook = Box<dyn FnMut(BddError)>;
pub type GcHook = Box<dyn FnMut(GcEvent)>;
pub type ResizeHook = Box<dyn FnMut(u32, u32)>;

/// Reported before and after a collection cycle, matching BuDDy's `bddinfo` distinction between
/// pre- and post-GC callbacks.
#[derive(Copy, Clone, Debug)]
pub enum GcEvent {
    Begin { nodes_used: u32, nodes_total: u32 },
    End { freed: u32, nodes_total: u32 },
}

pub(crate) struct Hooks {
    pub error: ErrorHook,
    pub gc: Option<GcHook>,
    pub resize: Option<ResizeHook>,
}

fn default_error_hook(err: BddError) {
    error!("bdd engine error: {}", err);
}

impl Default for Hooks {
    fn default() -> Hooks {
        Hooks {
            error: Box::new(default_error_hook),
            gc: None,
            resize: None,
        }
    }
}
