//! Multi-level-queue scheduler (§4.7): one FIFO per priority, each level
//! with a refillable quantum `slot[i] = MAX_PRIO - i`.
//!
//! Grounded in the teacher's `qemu::supervisor` run-queue bookkeeping
//! (`VecDeque`-backed queues behind one `Mutex`, `Arc<Pcb>` handles passed
//! around rather than copied) adapted from "one supervised QEMU instance
//! per slot" to "one ready queue per priority level".

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::pcb::Pcb;

pub const MAX_PRIO: usize = 8;

struct SchedulerState {
    queues: [VecDeque<Arc<Pcb>>; MAX_PRIO],
    slot: [u32; MAX_PRIO],
    running: Vec<Arc<Pcb>>,
}

fn initial_slot(priority: usize) -> u32 {
    (MAX_PRIO - priority) as u32
}

/// The scheduler lock (§5, first in the acquisition order) guards queues,
/// `slot[]`, and the running list together as one `SchedulerState`.
pub struct Scheduler {
    state: Mutex<SchedulerState>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                queues: std::array::from_fn(|_| VecDeque::new()),
                slot: std::array::from_fn(initial_slot),
                running: Vec::new(),
            }),
        }
    }

    /// `add(pcb)`: initial insertion; does not charge the slot counter.
    pub fn add(&self, pcb: Arc<Pcb>) {
        let mut st = self.state.lock().unwrap();
        let prio = pcb.priority.min(MAX_PRIO - 1);
        st.queues[prio].push_back(pcb);
    }

    /// `dequeue() -> pcb | none`: scans priorities from 0 upward, refilling
    /// an exhausted level's quantum and continuing to the next level
    /// rather than starving it.
    pub fn dequeue(&self) -> Option<Arc<Pcb>> {
        let mut st = self.state.lock().unwrap();
        for prio in 0..MAX_PRIO {
            if st.queues[prio].is_empty() {
                continue;
            }
            if st.slot[prio] > 0 {
                let pcb = st.queues[prio].pop_front().unwrap();
                st.running.push(Arc::clone(&pcb));
                trace!(pid = pcb.pid, prio, slot = st.slot[prio], "dequeued");
                return Some(pcb);
            }
            trace!(prio, "quantum refilled");
            st.slot[prio] = initial_slot(prio);
        }
        None
    }

    /// `requeue(pcb)`: re-insert at the tail of its priority queue, and
    /// charge the elapsed ticks (floored at 1) against `slot[priority]` so
    /// a process that yields immediately still consumes its turn.
    pub fn requeue(&self, pcb: Arc<Pcb>, elapsed_ticks: u32) {
        let mut st = self.state.lock().unwrap();
        st.running.retain(|p| p.pid != pcb.pid);
        let prio = pcb.priority.min(MAX_PRIO - 1);
        let charge = elapsed_ticks.max(1);
        st.slot[prio] = st.slot[prio].saturating_sub(charge);
        st.queues[prio].push_back(pcb);
    }

    /// Remove a process from the running list on completion; it is not
    /// requeued.
    pub fn retire(&self, pid: crate::tlb::Pid) {
        let mut st = self.state.lock().unwrap();
        st.running.retain(|p| p.pid != pid);
    }

    pub fn running_count(&self) -> usize {
        self.state.lock().unwrap().running.len()
    }

    pub fn is_idle(&self) -> bool {
        let st = self.state.lock().unwrap();
        st.running.is_empty() && st.queues.iter().all(VecDeque::is_empty)
    }
}
