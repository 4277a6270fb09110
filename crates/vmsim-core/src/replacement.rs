//! The global page-tracking list and CLOCK-with-second-chance victim
//! selection (§4.6.1). Global because RAM is shared physical memory: a
//! fault in one process may need to evict a page belonging to another.
//!
//! §4.8 calls this "the kernel-global Mm used to hold the replacement list
//! and clock hand" (mirroring the source assignment, where `fifo_pgn` and
//! `clock_hand` are fields of `mm_struct`). This crate models it as its
//! own type on `Kernel` instead of a degenerate `Mm`: a list-only
//! container has none of a real `Mm`'s invariants (page-table root, VMA
//! list), so giving it a full `Mm` would mean carrying unused fields for
//! every invariant `Mm` is supposed to uphold. The list's *contents*
//! (`PageTrack`, §3) are unchanged from the Core.

use std::sync::Mutex;

use crate::mm::Mm;
use crate::tlb::{Pid, Vpn};

/// `PageTrack` (§3): a (vpn, owner pid) pair. The owner is stored as a PID,
/// not a raw `Pcb` reference, per the design note on cyclic ownership — the
/// replacement engine dereferences PIDs through the kernel's process table
/// under the mm lock of whichever page it is inspecting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageTrack {
    pub vpn: Vpn,
    pub owner: Pid,
}

struct ReplacementState {
    tracked: Vec<PageTrack>,
    clock_hand: usize,
}

pub struct ReplacementList {
    state: Mutex<ReplacementState>,
}

impl Default for ReplacementList {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplacementList {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ReplacementState { tracked: Vec::new(), clock_hand: 0 }),
        }
    }

    /// Append `(vpn, owner)` unless already present (duplicate guard, §4.6
    /// step 5).
    pub fn enlist(&self, vpn: Vpn, owner: Pid) {
        let mut st = self.state.lock().unwrap();
        if !st.tracked.iter().any(|p| p.vpn == vpn && p.owner == owner) {
            st.tracked.push(PageTrack { vpn, owner });
        }
    }

    /// Remove a specific tracked page, e.g. on process teardown.
    pub fn remove(&self, vpn: Vpn, owner: Pid) {
        let mut st = self.state.lock().unwrap();
        if let Some(idx) = st.tracked.iter().position(|p| p.vpn == vpn && p.owner == owner) {
            st.tracked.remove(idx);
            if st.clock_hand > idx {
                st.clock_hand -= 1;
            }
            if st.clock_hand >= st.tracked.len() {
                st.clock_hand = 0;
            }
        }
    }

    /// Remove every page owned by `pid` (process teardown).
    pub fn remove_process(&self, pid: Pid) {
        let mut st = self.state.lock().unwrap();
        st.tracked.retain(|p| p.owner != pid);
        if st.tracked.is_empty() {
            st.clock_hand = 0;
        } else {
            st.clock_hand %= st.tracked.len();
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<PageTrack> {
        self.state.lock().unwrap().tracked.clone()
    }

    /// CLOCK with second chance (§4.6.1). `mm_of` resolves a tracked
    /// page's owner PID to its `Mm` so the PTE's REFERENCED bit can be
    /// inspected/cleared; returns `None` if the process has already been
    /// torn down (its entries should have been removed by
    /// `remove_process`, but a racing teardown is handled defensively).
    pub fn find_victim(&self, mm_of: impl Fn(Pid) -> Option<std::sync::Arc<Mm>>) -> Option<PageTrack> {
        let mut st = self.state.lock().unwrap();

        // Drop stale entries (dead owner, or PTE no longer present) before
        // sweeping, per "if not PRESENT, drop P from the list and
        // continue".
        st.tracked.retain(|track| {
            mm_of(track.owner)
                .map(|mm| {
                    let pte = mm.pte_at(track.vpn);
                    pte.present() && !pte.swapped()
                })
                .unwrap_or(false)
        });

        if st.tracked.is_empty() {
            st.clock_hand = 0;
            return None;
        }

        let len = st.tracked.len();
        st.clock_hand %= len;
        let hand = st.clock_hand;

        // One full revolution: clear REFERENCED as we pass, evict the
        // first page we find already unreferenced.
        for step in 0..len {
            let idx = (hand + step) % len;
            let track = st.tracked[idx];
            let mm = mm_of(track.owner).expect("just verified owner is live");
            if mm.pte_at(track.vpn).referenced() {
                mm.clear_referenced(track.vpn);
                continue;
            }
            let victim = st.tracked.remove(idx);
            st.clock_hand = if st.tracked.is_empty() { 0 } else { idx % st.tracked.len() };
            return Some(victim);
        }

        // Every survivor had REFERENCED=1 simultaneously: the revolution
        // above cleared them all without electing anyone. Elect the first
        // list element (§4.6.1 termination guarantee).
        let victim = st.tracked.remove(0);
        st.clock_hand = 0;
        Some(victim)
    }
}
