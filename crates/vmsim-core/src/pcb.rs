//! Per-process control block (§3 `Pcb`).
//!
//! The data model lists "reference to the Kernel" as a `Pcb` attribute;
//! this crate does not store that reference (design note, §9 "global
//! mutable state") — every method that needs kernel-wide state (the TLB,
//! the replacement list, RAM/swap) takes `&Kernel` explicitly instead, so a
//! `Pcb` can be torn down without unwinding a reference cycle back through
//! the kernel it belongs to.

use std::sync::{Arc, Mutex};

use crate::mm::Mm;
use crate::tlb::Pid;

struct PcbState {
    pc: usize,
}

/// A simulated process: pid, scheduling priority, its exclusively-owned
/// `Mm`, and a program counter.
///
/// `mm` is `Arc<Mm>` rather than a bare `Mm` so the replacement engine
/// (§4.6.1) can hold a short-lived handle to a tracked page's owner
/// without borrowing the whole process table — it clones the `Arc`,
/// inspects/mutates the PTE, and drops it, never storing a `Pcb` back-
/// reference (§9).
pub struct Pcb {
    pub pid: Pid,
    pub priority: usize,
    pub mm: Arc<Mm>,
    state: Mutex<PcbState>,
}

impl Pcb {
    pub fn new(pid: Pid, priority: usize) -> Self {
        Self {
            pid,
            priority,
            mm: Arc::new(Mm::new()),
            state: Mutex::new(PcbState { pc: 0 }),
        }
    }

    pub fn pc(&self) -> usize {
        self.state.lock().unwrap().pc
    }

    pub fn advance_pc(&self) {
        self.state.lock().unwrap().pc += 1;
    }
}
