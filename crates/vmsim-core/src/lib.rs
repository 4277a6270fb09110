//! Concurrent, demand-paged, swap-backed virtual memory core for an
//! educational OS simulator: a five-level page table, CLOCK-with-second-
//! chance replacement, a per-process best-fit region allocator, a chained-
//! hash TLB, and a multi-level-queue scheduler, all threaded explicitly
//! through a single `Kernel` value rather than reached for through
//! globals (§9).
//!
//! This crate is the algorithmic core only: it never reads a
//! configuration file, never loads a program, and never interprets an
//! instruction stream — those are `vmsim-cli`'s job and the
//! `InstructionInterpreter` seam's job (`program` module), respectively.

pub mod clock;
pub mod dump;
pub mod error;
pub mod fault;
pub mod kernel;
pub mod memphy;
pub mod mm;
pub mod pagetable;
pub mod pcb;
pub mod program;
pub mod pte;
pub mod region;
pub mod replacement;
pub mod scheduler;
pub mod swap;
pub mod syscall;
pub mod tlb;
pub mod vma;

pub use error::{VmError, VmResult};
pub use kernel::{Kernel, KernelConfig, ProcessSpec};
pub use pcb::Pcb;
pub use pte::Pte;
