//! Error taxonomy for the engine's public surface.
//!
//! Internal recursive kernels never return `Result`: a reorder-abort or allocation failure is
//! signalled inline (see [`crate::arena::MakeNodeSignal`]) and only converted into a
//! [`BddError`] at the public operator boundary, mirroring the original's "errors don't cross
//! the recursive chain" rule.

use thiserror::Error;

#[derive(Error, Copy, Clone, Eq, PartialEq, Debug)]
pub enum BddError {
    #[error("node arena exhausted (hard cap reached)")]
    OutOfNodes,
    #[error("allocation failed")]
    OutOfMemory,
    #[error("variable {0} is not known to this engine")]
    UnknownVariable(u32),
    #[error("value out of range")]
    OutOfRange,
    #[error("handle does not refer to a live node")]
    IllegalBdd,
    #[error("unknown operator id")]
    UnknownOperator,
    #[error("handle does not encode a variable set (cube)")]
    IllegalVarSet,
    #[error("variable block is malformed")]
    BadVarBlock,
    #[error("mismatched sizes")]
    SizeMismatch,
    #[error("illegal shift amount")]
    IllegalShift,
    #[error("division by zero")]
    DivisionByZero,
    #[error("engine is already running")]
    AlreadyRunning,
    #[error("variable count may only increase")]
    DecreaseVarNum,
    #[error("replace would violate the variable ordering")]
    ReplaceOutOfOrder,
    #[error("node limit reached and growth is disallowed")]
    NodeLimitReached,
    #[error("I/O failure")]
    FileFailed,
    #[error("malformed input")]
    FormatError,
    #[error("node ids are not in strictly ascending order")]
    NotAscending,
    #[error("operation was aborted by a user hook")]
    UserBreak,
}

pub type Result<T> = std::result::Result<T, BddError>;
