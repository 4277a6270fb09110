//! Boundary cases (§8).

use vmsim_core::kernel::{Kernel, KernelConfig};
use vmsim_core::{fault, region};

fn kernel(ram_frames: usize, page_size: usize) -> Kernel {
    let mut config = KernelConfig::default();
    config.page_size = page_size;
    config.ram_size = ram_frames * page_size;
    config.swap_sizes = [ram_frames * page_size, 0, 0, 0];
    Kernel::new(config)
}

#[test]
fn alloc_of_size_zero_fails() {
    let k = kernel(4, 256);
    let p = k.spawn(0);
    assert!(region::alloc(&k, &p, 0, 0, 0).is_err());
}

#[test]
fn read_at_offset_beyond_region_size_fails() {
    let k = kernel(4, 256);
    let p = k.spawn(0);
    region::alloc(&k, &p, 0, 0, 10).unwrap();
    assert!(region::read(&k, &p, 0, 10).is_err());
    assert!(region::write(&k, &p, 0, 10, 0).is_err());
}

/// Alloc exactly filling the last free region removes that node rather
/// than leaving a zero-length node behind.
#[test]
fn exact_fit_alloc_removes_the_free_node_not_zeroes_it() {
    let k = kernel(4, 256);
    let p = k.spawn(0);
    region::alloc(&k, &p, 0, 0, 200).unwrap(); // grows heap to 256, carves 200, leaves a 56-byte node
    region::alloc(&k, &p, 0, 1, 56).unwrap(); // exactly fills the remaining node
    let dump = p.mm.dump_regions();
    assert!(dump.vmas[0].free_list.is_empty());
}

/// Replacement when RAM has exactly one frame: that frame is always the
/// victim on the next fault.
#[test]
fn replacement_with_a_single_frame_always_picks_it() {
    let k = kernel(1, 256);
    let p = k.spawn(0);
    fault::get_page(&k, &p.mm, 0, p.pid).unwrap();
    fault::get_page(&k, &p.mm, 1, p.pid).unwrap();
    assert!(p.mm.pte_at(0).swapped());
    assert!(p.mm.pte_at(1).present() && !p.mm.pte_at(1).swapped());
}

/// When every tracked page has REFERENCED=1 simultaneously, CLOCK clears
/// every bit in one sweep and evicts the first list element.
#[test]
fn all_referenced_pages_are_cleared_then_the_first_is_evicted() {
    let k = kernel(2, 256);
    let p = k.spawn(0);
    fault::get_page(&k, &p.mm, 0, p.pid).unwrap();
    fault::get_page(&k, &p.mm, 1, p.pid).unwrap();
    p.mm.set_referenced(0);
    p.mm.set_referenced(1);

    fault::get_page(&k, &p.mm, 2, p.pid).unwrap();

    // vpn 0 was enlisted first, so it is the tie-break victim.
    assert!(p.mm.pte_at(0).swapped());
    assert!(!p.mm.pte_at(1).referenced());
}

#[test]
fn double_free_returns_an_error() {
    let k = kernel(4, 256);
    let p = k.spawn(0);
    region::alloc(&k, &p, 0, 0, 16).unwrap();
    region::free(&k, &p, 0, 0).unwrap();
    assert!(region::free(&k, &p, 0, 0).is_err());
}
