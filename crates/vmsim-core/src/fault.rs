//! Page-Fault & Replacement Engine (§4.6): `get_page` resolves a VPN to a
//! resident frame, faulting it in (possibly evicting a victim via CLOCK,
//! §4.6.1) when necessary.
//!
//! Grounded in `original_source/src/mm-vm.c`'s swap-direction dispatch and
//! in the teacher's `mm/pagetable.rs` walk pattern for inspecting a PTE
//! without holding the mm lock any longer than one traversal needs.

use tracing::{debug_span, info};

use crate::error::{VmError, VmResult};
use crate::kernel::Kernel;
use crate::mm::Mm;
use crate::pte::Pte;
use crate::syscall::sysmem_swp_op;
use crate::tlb::{Pid, Vpn};

/// `get_page(mm, vpn, owner) -> fpn | err` (§4.6).
pub fn get_page(kernel: &Kernel, mm: &Mm, vpn: Vpn, owner: Pid) -> VmResult<u32> {
    let _span = debug_span!("page_fault", pid = owner, vpn).entered();

    let pte = mm.pte_at(vpn);
    if !pte.needs_fault() {
        kernel.replacement.enlist(vpn, owner);
        return Ok(pte.fpn());
    }

    let target = match kernel.ram.get_free_frame() {
        Some(fpn) => fpn,
        None => evict_one(kernel)?,
    };

    if pte.swapped() {
        let swp_id = pte.swptyp();
        let swp_fpn = pte.swpoff();
        sysmem_swp_op(kernel, swp_fpn, target, true, swp_id);
        kernel.free_swap_frame(swp_id, swp_fpn);
        mm.pte_set_fpn(&kernel.tlb, owner, vpn, target, false);
    } else {
        mm.pte_set_fpn(&kernel.tlb, owner, vpn, target, true);
    }

    kernel.replacement.enlist(vpn, owner);
    Ok(target)
}

/// Run CLOCK (§4.6.1) to pick a victim, write it out if dirty (or drop it
/// if clean), and return the RAM frame it vacated. Leaves every PTE but
/// the victim's untouched on failure (scenario 6: swap exhaustion must not
/// corrupt existing mappings).
fn evict_one(kernel: &Kernel) -> VmResult<u32> {
    let victim = kernel
        .replacement
        .find_victim(|pid| kernel.mm_of(pid))
        .ok_or(VmError::ReplacementMiss)?;

    let victim_mm = kernel.mm_of(victim.owner).ok_or(VmError::ReplacementMiss)?;
    let victim_pte = victim_mm.pte_at(victim.vpn);
    let target = victim_pte.fpn();

    if victim_pte.dirty() {
        let (swp_id, swp_fpn) = kernel.allocate_swap_frame().ok_or(VmError::OutOfMemory)?;
        sysmem_swp_op(kernel, target, swp_fpn, false, swp_id);
        victim_mm.pte_set_swap(&kernel.tlb, victim.owner, victim.vpn, swp_id, swp_fpn);
        info!(victim_vpn = victim.vpn, victim_pid = victim.owner, dirty = true, "evicting page");
    } else {
        victim_mm.pte_write(&kernel.tlb, victim.owner, victim.vpn, Pte::zero());
        info!(victim_vpn = victim.vpn, victim_pid = victim.owner, dirty = false, "evicting page");
    }

    Ok(target)
}
