//! The three syscall entry points the Core actually consumes (§1, §6):
//! `SYSMEM_INC_OP` (grow a vma's heap), `SYSMEM_SWP_OP` (copy a frame
//! between RAM and a swap device), and `SYSMEM_IO_READ`/`SYSMEM_IO_WRITE`
//! (touch one physical byte). Everything else in the source assignment's
//! syscall dispatch table is out of scope.
//!
//! Grounded in `original_source/src/mm-vm.c`'s `inc_vma_limit` (heap growth
//! eagerly maps the newly reserved pages rather than leaving them to the
//! next fault, via `vm_map_ram`) and `__mm_swap_page` (the direction-bit
//! dispatch `swap_copy` mirrors here).

use tracing::info;

use crate::error::{VmError, VmResult};
use crate::fault;
use crate::kernel::Kernel;
use crate::mm::Mm;
use crate::swap::swap_copy;
use crate::tlb::Pid;

/// `SYSMEM_INC_OP`: advance `vma[vmaid].sbrk` by `inc_aligned` bytes
/// (already page-aligned by the caller, §4.4 step 4) and eagerly fault in
/// every newly reserved page, mirroring `inc_vma_limit`'s `vm_map_ram`
/// call. Returns the old `sbrk` (the start of the newly mapped span).
pub fn sysmem_inc_op(kernel: &Kernel, mm: &Mm, pid: Pid, vmaid: usize, inc_aligned: usize) -> VmResult<u64> {
    let page_size = kernel.page_size() as u64;
    debug_assert!(inc_aligned as u64 % page_size == 0, "caller must page-align inc_aligned");

    let (old_sbrk, new_sbrk) = {
        let mut regions = mm.regions();
        let vma = regions.vma_mut(vmaid).ok_or(VmError::NoSuchVma(vmaid))?;
        let old_sbrk = vma.sbrk;
        let new_sbrk = old_sbrk + inc_aligned as u64;
        vma.sbrk = new_sbrk;
        (old_sbrk, new_sbrk)
    };

    let mut vpn = old_sbrk / page_size;
    let end_vpn = new_sbrk.div_ceil(page_size);
    while vpn < end_vpn {
        fault::get_page(kernel, mm, vpn, pid)?;
        vpn += 1;
    }

    Ok(old_sbrk)
}

/// `SYSMEM_SWP_OP`: copy one page between RAM and swap device `swp_id`.
/// `direction = false` is swap-out (RAM -> swap), `true` is swap-in
/// (swap -> RAM).
pub fn sysmem_swp_op(
    kernel: &Kernel,
    src_fpn: u32,
    dst_fpn: u32,
    direction: bool,
    swp_id: usize,
) {
    let page_size = kernel.page_size();
    if direction {
        swap_copy(kernel.swap_device(swp_id), src_fpn, &kernel.ram, dst_fpn, page_size);
        info!(swp_id, src_fpn, dst_fpn, "swap IN");
    } else {
        swap_copy(&kernel.ram, src_fpn, kernel.swap_device(swp_id), dst_fpn, page_size);
        info!(swp_id, src_fpn, dst_fpn, "swap OUT");
    }
}

/// `SYSMEM_IO_READ`: direct byte read from RAM.
pub fn sysmem_io_read(kernel: &Kernel, phys_addr: usize) -> VmResult<u8> {
    kernel.ram.read(phys_addr).ok_or(VmError::InvalidRegion {
        rgid: 0,
        reason: "physical address out of range",
    })
}

/// `SYSMEM_IO_WRITE`: direct byte write to RAM.
pub fn sysmem_io_write(kernel: &Kernel, phys_addr: usize, byte: u8) -> VmResult<()> {
    kernel.ram.write(phys_addr, byte).map_err(|_| VmError::InvalidRegion {
        rgid: 0,
        reason: "physical address out of range",
    })
}
