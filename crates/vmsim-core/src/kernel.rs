//! Kernel wiring (§4.8): owns the single RAM, the swap array with an
//! active round-robin index, the global TLB, the global replacement list,
//! and the scheduler, and spawns the CPU worker / loader threads.
//!
//! Grounded in the teacher's `qemu::QemuSupervisor` (`daemon/src/qemu/
//! supervisor.rs`): one `Arc`-shared owner of every instance-wide resource,
//! handed to worker tasks rather than reached for through a global. This
//! crate keeps that shape but swaps tokio tasks for `std::thread` workers,
//! since the Core's worker/loader/timer model (§5) is plain OS threads,
//! not an async runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::clock::SimClock;
use crate::memphy::{Fpn, Memphy};
use crate::mm::Mm;
use crate::pcb::Pcb;
use crate::program::{Instruction, InstructionInterpreter};
use crate::replacement::ReplacementList;
use crate::scheduler::Scheduler;
use crate::tlb::{Pid, Tlb};
use crate::vma::Vma;

/// Parsed, already-validated configuration (`vmsim-cli::config::SimConfig`
/// converts text into this; `vmsim-core` never reads a config file, per
/// the out-of-scope boundary in §1).
#[derive(Clone, Debug)]
pub struct KernelConfig {
    pub ram_size: usize,
    /// Up to `PAGING_MAX_MMSWP` sizes; a zero entry means "not configured".
    pub swap_sizes: [usize; crate::pte::PAGING_MAX_MMSWP],
    pub page_size: usize,
    pub num_cpus: usize,
    pub tlb_buckets: usize,
    pub tlb_entries_per_bucket: usize,
    /// Size of each process's initial VMA 0, `[0, address_space_size)`.
    pub address_space_size: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            ram_size: 4096,
            swap_sizes: [4096, 0, 0, 0],
            page_size: 256,
            num_cpus: 1,
            tlb_buckets: 16,
            tlb_entries_per_bucket: 4,
            address_space_size: 1 << 20,
        }
    }
}

/// One entry of a loader's sorted admission list (§4.8 loader loop).
pub struct ProcessSpec {
    pub start_time: u64,
    pub priority: usize,
    pub program: Vec<Instruction>,
}

pub struct Kernel {
    pub ram: Memphy,
    swaps: Vec<Memphy>,
    active_swap: AtomicUsize,
    pub tlb: Tlb,
    pub replacement: ReplacementList,
    pub scheduler: Scheduler,
    processes: Mutex<HashMap<Pid, Arc<Pcb>>>,
    next_pid: AtomicU32,
    page_size: usize,
    address_space_size: u64,
    num_cpus: usize,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Self {
        let ram = Memphy::new(config.ram_size);
        ram.format(config.page_size);

        let swaps = config
            .swap_sizes
            .iter()
            .filter(|&&size| size > 0)
            .map(|&size| {
                let dev = Memphy::new(size);
                dev.format(config.page_size);
                dev
            })
            .collect();

        info!(ram_size = config.ram_size, page_size = config.page_size, "kernel initialized");

        Self {
            ram,
            swaps,
            active_swap: AtomicUsize::new(0),
            tlb: Tlb::new(config.tlb_buckets, config.tlb_entries_per_bucket),
            replacement: ReplacementList::new(),
            scheduler: Scheduler::new(),
            processes: Mutex::new(HashMap::new()),
            next_pid: AtomicU32::new(1),
            page_size: config.page_size,
            address_space_size: config.address_space_size,
            num_cpus: config.num_cpus.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn num_swap_devices(&self) -> usize {
        self.swaps.len()
    }

    /// Create a new process with an initialized `Mm` (vma 0 spanning the
    /// configured address space) and register it in the process table.
    /// Does not enroll it in the scheduler; the loader does that via
    /// `scheduler.add` once its `start_time` has arrived.
    pub fn spawn(&self, priority: usize) -> Arc<Pcb> {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let pcb = Arc::new(Pcb::new(pid, priority));
        pcb.mm.regions().vmas.push(Vma::new(0, 0, self.address_space_size));
        self.processes.lock().unwrap().insert(pid, Arc::clone(&pcb));
        pcb
    }

    pub fn mm_of(&self, pid: Pid) -> Option<Arc<Mm>> {
        self.processes.lock().unwrap().get(&pid).map(|pcb| Arc::clone(&pcb.mm))
    }

    pub fn pcb_of(&self, pid: Pid) -> Option<Arc<Pcb>> {
        self.processes.lock().unwrap().get(&pid).cloned()
    }

    /// Process teardown: reclaim every physical frame the process still
    /// owns, drop the process table entry, invalidate every TLB entry for
    /// `pid`, and strip it from the replacement list (§3 ownership note:
    /// "this reference...must be cleared before the Pcb is destroyed").
    ///
    /// Frames are only reclaimed here or as eviction victims (§4.4); the
    /// page table itself carries no memory of what it once mapped once
    /// this returns, so every present and every swapped-out entry has to be
    /// walked before the `Mm` is dropped.
    pub fn teardown(&self, pid: Pid) {
        let removed = self.processes.lock().unwrap().remove(&pid);
        if let Some(pcb) = &removed {
            pcb.mm.page_table().for_each_mapped(|_vpn, pte| {
                if pte.swapped() {
                    self.free_swap_frame(pte.swptyp(), pte.swpoff());
                } else {
                    self.ram.put_free_frame(pte.fpn());
                }
            });
        }
        self.tlb.invalidate_process(pid);
        self.replacement.remove_process(pid);
        self.scheduler.retire(pid);
        debug!(pid, running = self.scheduler.running_count(), "process torn down");
    }

    pub fn swap_device(&self, swp_id: usize) -> &Memphy {
        &self.swaps[swp_id]
    }

    /// Round-robin swap-frame allocation (§4.6 step 2): starting at
    /// `active_swap`, try each configured device once; return the first
    /// with a free frame and advance the active index past it. `None`
    /// means every device is full (swap exhaustion, scenario 6).
    pub fn allocate_swap_frame(&self) -> Option<(usize, Fpn)> {
        let num_devices = self.swaps.len();
        if num_devices == 0 {
            return None;
        }
        let start = self.active_swap.load(Ordering::SeqCst) % num_devices;
        for offset in 0..num_devices {
            let idx = (start + offset) % num_devices;
            if let Some(fpn) = self.swaps[idx].get_free_frame() {
                self.active_swap.store((idx + 1) % num_devices, Ordering::SeqCst);
                return Some((idx, fpn));
            }
        }
        None
    }

    pub fn free_swap_frame(&self, swp_id: usize, fpn: Fpn) {
        self.swaps[swp_id].put_free_frame(fpn);
    }

    /// Full §4.8 wiring: admits `specs` in `start_time` order via a loader
    /// thread, runs `config.num_cpus` worker threads each repeatedly
    /// dequeuing a process and advancing it one instruction via
    /// `interpreter`, paced by `clock`. Blocks until every admitted process
    /// has retired and the loader has admitted everything.
    pub fn run(
        self: &Arc<Self>,
        mut specs: Vec<ProcessSpec>,
        interpreter: &(impl InstructionInterpreter + ?Sized),
        clock: &(impl SimClock + ?Sized),
    ) {
        specs.sort_by_key(|s| s.start_time);
        let pending: Mutex<Vec<(u64, Arc<Pcb>)>> = Mutex::new(
            specs
                .into_iter()
                .map(|spec| {
                    let pcb = self.spawn(spec.priority);
                    interpreter.load_program(pcb.pid, spec.program);
                    (spec.start_time, pcb)
                })
                .collect(),
        );
        let total_admitted = pending.lock().unwrap().len();
        if total_admitted == 0 {
            return;
        }

        std::thread::scope(|scope| {
            scope.spawn(|| {
                loop {
                    let next = {
                        let mut guard = pending.lock().unwrap();
                        guard
                            .iter()
                            .position(|(start_time, _)| *start_time <= clock.now())
                            .map(|idx| guard.remove(idx).1)
                    };
                    match next {
                        Some(pcb) => {
                            debug!(pid = pcb.pid, "admitting process");
                            self.scheduler.add(pcb);
                        }
                        None => {
                            if pending.lock().unwrap().is_empty() {
                                break;
                            }
                            clock.wait_tick();
                        }
                    }
                }
            });

            for _ in 0..self.num_cpus {
                scope.spawn(|| loop {
                    let pending_empty = pending.lock().unwrap().is_empty();
                    if pending_empty && self.scheduler.is_idle() {
                        break;
                    }
                    let Some(pcb) = self.scheduler.dequeue() else {
                        clock.wait_tick();
                        continue;
                    };
                    let dequeued_at = clock.now();
                    match interpreter.step(self, &pcb) {
                        Ok(true) => {
                            let elapsed = (clock.now() - dequeued_at) as u32;
                            self.scheduler.requeue(pcb, elapsed);
                        }
                        Ok(false) | Err(_) => {
                            self.teardown(pcb.pid);
                        }
                    }
                    clock.wait_tick();
                });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_registers_process_and_initial_vma() {
        let kernel = Kernel::new(KernelConfig::default());
        let pcb = kernel.spawn(0);
        assert!(kernel.pcb_of(pcb.pid).is_some());
        assert_eq!(pcb.mm.regions().vmas.len(), 1);
    }

    #[test]
    fn teardown_removes_process_and_tlb_entries() {
        let kernel = Kernel::new(KernelConfig::default());
        let pcb = kernel.spawn(0);
        kernel.tlb.insert(1, 1, pcb.pid, false, false);
        kernel.teardown(pcb.pid);
        assert!(kernel.pcb_of(pcb.pid).is_none());
        assert_eq!(kernel.tlb.lookup(1, pcb.pid), None);
    }

    #[test]
    fn teardown_reclaims_resident_and_swapped_frames() {
        let kernel = Kernel::new(KernelConfig::default());
        let pcb = kernel.spawn(0);

        let ram_fpn = kernel.ram.get_free_frame().unwrap();
        pcb.mm.pte_set_fpn(&kernel.tlb, pcb.pid, 0, ram_fpn, false);

        let (swp_id, swp_fpn) = kernel.allocate_swap_frame().unwrap();
        pcb.mm.pte_set_swap(&kernel.tlb, pcb.pid, 1, swp_id, swp_fpn);

        let free_ram_before = kernel.ram.free_frame_snapshot().len();
        let free_swap_before = kernel.swap_device(swp_id).free_frame_snapshot().len();

        kernel.teardown(pcb.pid);

        assert_eq!(kernel.ram.free_frame_snapshot().len(), free_ram_before + 1);
        assert_eq!(kernel.swap_device(swp_id).free_frame_snapshot().len(), free_swap_before + 1);
    }

    #[test]
    fn swap_allocation_round_robins_across_devices() {
        let mut config = KernelConfig::default();
        config.swap_sizes = [256, 256, 0, 0];
        config.page_size = 256;
        let kernel = Kernel::new(config);
        let (first_dev, _) = kernel.allocate_swap_frame().unwrap();
        let (second_dev, _) = kernel.allocate_swap_frame().unwrap();
        assert_ne!(first_dev, second_dev);
    }
}
