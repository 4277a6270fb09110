//! Error taxonomy for the virtual-memory core.
//!
//! Grounded in the teacher's `lib/error.rs` (`KernelError` enum with one
//! variant per failure kind, converted at the boundary rather than carrying
//! ad-hoc strings), adapted to `thiserror` — the teacher's `no_std` kernel
//! hand-rolls `Display`; this crate is `std`-based, and the teacher's own
//! `daemon`/`testing` crates reach for `thiserror` for exactly this kind of
//! enum, so this crate does too.

use thiserror::Error;

/// Failure taxonomy from the spec's Error Handling Design: every variant
/// actually returned to a caller somewhere in the crate, one per failure
/// kind rather than an ad-hoc string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("invalid region {rgid}: {reason}")]
    InvalidRegion { rgid: usize, reason: &'static str },

    #[error("out of memory: RAM and all swap devices are full with no evictable victim")]
    OutOfMemory,

    #[error("replacement miss: page-tracking list is empty while RAM is full")]
    ReplacementMiss,

    #[error("vma {0} does not exist")]
    NoSuchVma(usize),
}

pub type VmResult<T> = Result<T, VmError>;
