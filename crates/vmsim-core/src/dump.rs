//! Read-only dump/debug views (§4.9), grounded in the teacher's
//! `get_page_table_stats` / `count_page_table_usage` pattern
//! (`mm/pagetable.rs`): walk a structure and accumulate a report without
//! mutating it. These take the same locks as the read path they
//! summarize and exist for tests and `vmsim-cli --dump`.

use serde::Serialize;

use crate::kernel::Kernel;
use crate::mm::Mm;
use crate::tlb::Pid;

#[derive(Debug, Serialize)]
pub struct MappedFrame {
    pub fpn: u32,
    pub pid: Pid,
    pub vpn: u64,
}

#[derive(Debug, Serialize)]
pub struct PhysDump {
    pub label: String,
    pub max_size: usize,
    pub frame_count: usize,
    pub free_frames: Vec<u32>,
    /// Frames known to be mapped by a resident PTE. Populated for RAM via
    /// the global page-tracking list; left empty for swap devices, which
    /// have no equivalent global index of swapped-out pages.
    pub mapped: Vec<MappedFrame>,
}

impl Kernel {
    pub fn dump_ram(&self) -> PhysDump {
        let mapped = self
            .replacement
            .snapshot()
            .into_iter()
            .filter_map(|track| {
                let mm = self.mm_of(track.owner)?;
                let pte = mm.pte_at(track.vpn);
                (pte.present() && !pte.swapped())
                    .then_some(MappedFrame { fpn: pte.fpn(), pid: track.owner, vpn: track.vpn })
            })
            .collect();
        PhysDump {
            label: "ram".to_string(),
            max_size: self.ram.max_size(),
            frame_count: self.ram.num_frames(),
            free_frames: self.ram.free_frame_snapshot(),
            mapped,
        }
    }

    pub fn dump_swap(&self, swp_id: usize) -> PhysDump {
        let device = self.swap_device(swp_id);
        PhysDump {
            label: format!("swap{swp_id}"),
            max_size: device.max_size(),
            frame_count: device.num_frames(),
            free_frames: device.free_frame_snapshot(),
            mapped: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind")]
pub enum PteDump {
    Resident { vpn: u64, fpn: u32, dirty: bool, referenced: bool },
    Swapped { vpn: u64, swptyp: usize, swpoff: u32 },
}

#[derive(Debug, Serialize)]
pub struct PageTableDump {
    pub entries: Vec<PteDump>,
}

#[derive(Debug, Serialize)]
pub struct VmaDump {
    pub id: usize,
    pub vm_start: u64,
    pub vm_end: u64,
    pub sbrk: u64,
    pub free_list: Vec<(u64, u64)>,
}

#[derive(Debug, Serialize)]
pub struct RegionDump {
    pub vmas: Vec<VmaDump>,
    pub symtbl: Vec<Option<(u64, u64)>>,
}

impl Mm {
    /// Walk every mapped leaf PTE, resident or swapped, via
    /// `for_each_mapped` (the fast walk used by the fault path,
    /// `for_each_present`, only visits residents).
    pub fn dump_page_table(&self) -> PageTableDump {
        let mut entries = Vec::new();
        self.page_table().for_each_mapped(|vpn, pte| {
            entries.push(if pte.swapped() {
                PteDump::Swapped { vpn, swptyp: pte.swptyp(), swpoff: pte.swpoff() }
            } else {
                PteDump::Resident { vpn, fpn: pte.fpn(), dirty: pte.dirty(), referenced: pte.referenced() }
            });
        });
        PageTableDump { entries }
    }

    pub fn dump_regions(&self) -> RegionDump {
        let regions = self.regions();
        let vmas = regions
            .vmas
            .iter()
            .map(|vma| VmaDump {
                id: vma.id,
                vm_start: vma.vm_start,
                vm_end: vma.vm_end,
                sbrk: vma.sbrk,
                free_list: vma.free_list.iter().map(|r| (r.start, r.end)).collect(),
            })
            .collect();
        let symtbl = regions
            .symtbl
            .iter()
            .map(|r| if r.is_vacant() { None } else { Some((r.start, r.end)) })
            .collect();
        RegionDump { vmas, symtbl }
    }
}
