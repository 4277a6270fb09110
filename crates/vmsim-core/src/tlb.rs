//! Chained-hash TLB (§4.5), tagged by (VPN, PID), LRU-evicted per chain.
//!
//! Grounded in the teacher's per-device `MEMPHY lock` / single-`Mutex`-per-
//! shared-structure pattern (`mm/page_cache.rs` uses a lock-guarded
//! fixed-capacity structure with an LRU-ish eviction rule); this module is
//! the Core's analogous "one lock around fixed buckets" component. The
//! entire table — not per-bucket locks — is guarded by one `Mutex`, per
//! the Core's single "TLB lock" in the acquisition order (§5).

use std::sync::Mutex;

pub type Vpn = u64;
pub type Pid = u32;
pub type Fpn = u32;

#[derive(Clone, Copy, Debug)]
struct TlbEntry {
    vpn: Vpn,
    fpn: Fpn,
    pid: Pid,
    valid: bool,
    dirty: bool,
    referenced: bool,
    last_used: u64,
}

impl TlbEntry {
    fn empty() -> Self {
        Self {
            vpn: 0,
            fpn: 0,
            pid: 0,
            valid: false,
            dirty: false,
            referenced: false,
            last_used: 0,
        }
    }
}

struct TlbState {
    buckets: Vec<Vec<TlbEntry>>,
    clock: u64,
    hits: u64,
    misses: u64,
}

/// Global TLB. `num_buckets` and `entries_per_bucket` are fixed at
/// construction (hash table does not grow).
pub struct Tlb {
    num_buckets: usize,
    entries_per_bucket: usize,
    state: Mutex<TlbState>,
}

fn hash(vpn: Vpn, pid: Pid, num_buckets: usize) -> usize {
    ((vpn ^ pid as u64) as usize) % num_buckets
}

impl Tlb {
    pub fn new(num_buckets: usize, entries_per_bucket: usize) -> Self {
        assert!(num_buckets > 0 && entries_per_bucket > 0);
        Self {
            num_buckets,
            entries_per_bucket,
            state: Mutex::new(TlbState {
                buckets: vec![Vec::new(); num_buckets],
                clock: 0,
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// `lookup(vpn, pid) -> fpn | miss`: updates `last_used` and the hit
    /// counter on success; increments the miss counter on failure.
    pub fn lookup(&self, vpn: Vpn, pid: Pid) -> Option<Fpn> {
        let mut st = self.state.lock().unwrap();
        st.clock += 1;
        let now = st.clock;
        let idx = hash(vpn, pid, self.num_buckets);
        let bucket = &mut st.buckets[idx];
        if let Some(entry) = bucket
            .iter_mut()
            .find(|e| e.valid && e.vpn == vpn && e.pid == pid)
        {
            entry.last_used = now;
            let fpn = entry.fpn;
            st.hits += 1;
            Some(fpn)
        } else {
            st.misses += 1;
            None
        }
    }

    /// Insert or overwrite the (vpn, pid) mapping. If the chain is full of
    /// valid distinct entries, evict the one with the smallest
    /// `last_used` (any invalid slot is preferred first).
    pub fn insert(&self, vpn: Vpn, fpn: Fpn, pid: Pid, dirty: bool, referenced: bool) {
        let mut st = self.state.lock().unwrap();
        st.clock += 1;
        let now = st.clock;
        let idx = hash(vpn, pid, self.num_buckets);
        let capacity = self.entries_per_bucket;
        let bucket = &mut st.buckets[idx];

        if let Some(entry) = bucket
            .iter_mut()
            .find(|e| e.valid && e.vpn == vpn && e.pid == pid)
        {
            entry.fpn = fpn;
            entry.dirty = dirty;
            entry.referenced = referenced;
            entry.last_used = now;
            return;
        }

        if let Some(slot) = bucket.iter_mut().find(|e| !e.valid) {
            *slot = TlbEntry { vpn, fpn, pid, valid: true, dirty, referenced, last_used: now };
            return;
        }

        if bucket.len() < capacity {
            bucket.push(TlbEntry { vpn, fpn, pid, valid: true, dirty, referenced, last_used: now });
            return;
        }

        let victim_idx = bucket
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(i, _)| i)
            .expect("bucket at capacity must be non-empty");
        bucket[victim_idx] = TlbEntry { vpn, fpn, pid, valid: true, dirty, referenced, last_used: now };
    }

    pub fn invalidate_entry(&self, vpn: Vpn, pid: Pid) {
        let mut st = self.state.lock().unwrap();
        let idx = hash(vpn, pid, self.num_buckets);
        for e in st.buckets[idx].iter_mut() {
            if e.valid && e.vpn == vpn && e.pid == pid {
                e.valid = false;
            }
        }
    }

    pub fn invalidate_process(&self, pid: Pid) {
        let mut st = self.state.lock().unwrap();
        for bucket in st.buckets.iter_mut() {
            for e in bucket.iter_mut() {
                if e.valid && e.pid == pid {
                    e.valid = false;
                }
            }
        }
    }

    pub fn set_dirty(&self, vpn: Vpn, pid: Pid) {
        let mut st = self.state.lock().unwrap();
        let idx = hash(vpn, pid, self.num_buckets);
        if let Some(e) = st.buckets[idx]
            .iter_mut()
            .find(|e| e.valid && e.vpn == vpn && e.pid == pid)
        {
            e.dirty = true;
        }
    }

    pub fn set_referenced(&self, vpn: Vpn, pid: Pid) {
        let mut st = self.state.lock().unwrap();
        let idx = hash(vpn, pid, self.num_buckets);
        if let Some(e) = st.buckets[idx]
            .iter_mut()
            .find(|e| e.valid && e.vpn == vpn && e.pid == pid)
        {
            e.referenced = true;
        }
    }

    /// `(hits, misses, hit_rate)`.
    pub fn stats(&self) -> (u64, u64, f64) {
        let st = self.state.lock().unwrap();
        let total = st.hits + st.misses;
        let hit_rate = if total == 0 { 0.0 } else { st.hits as f64 / total as f64 };
        (st.hits, st.misses, hit_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_insert_then_hit() {
        let tlb = Tlb::new(8, 4);
        assert_eq!(tlb.lookup(1, 1), None);
        tlb.insert(1, 99, 1, false, false);
        assert_eq!(tlb.lookup(1, 1), Some(99));
        let (hits, misses, _) = tlb.stats();
        assert_eq!(hits, 1);
        assert_eq!(misses, 1);
    }

    #[test]
    fn invalidated_entry_is_not_observed() {
        let tlb = Tlb::new(8, 4);
        tlb.insert(5, 1, 7, false, false);
        tlb.invalidate_entry(5, 7);
        assert_eq!(tlb.lookup(5, 7), None);
    }

    #[test]
    fn distinct_pids_same_vpn_do_not_collide() {
        let tlb = Tlb::new(8, 4);
        tlb.insert(1, 10, 1, false, false);
        tlb.insert(1, 20, 2, false, false);
        assert_eq!(tlb.lookup(1, 1), Some(10));
        assert_eq!(tlb.lookup(1, 2), Some(20));
    }

    #[test]
    fn chain_overflow_evicts_lru() {
        let tlb = Tlb::new(1, 2); // single bucket forces collisions
        tlb.insert(1, 1, 0, false, false);
        tlb.insert(2, 2, 0, false, false);
        // touch vpn=1 so vpn=2 becomes the LRU entry
        assert_eq!(tlb.lookup(1, 0), Some(1));
        tlb.insert(3, 3, 0, false, false);
        assert_eq!(tlb.lookup(2, 0), None);
        assert_eq!(tlb.lookup(3, 0), Some(3));
        assert_eq!(tlb.lookup(1, 0), Some(1));
    }

    #[test]
    fn invalidate_process_clears_all_its_entries() {
        let tlb = Tlb::new(4, 4);
        tlb.insert(1, 1, 9, false, false);
        tlb.insert(2, 2, 9, false, false);
        tlb.insert(1, 1, 10, false, false);
        tlb.invalidate_process(9);
        assert_eq!(tlb.lookup(1, 9), None);
        assert_eq!(tlb.lookup(2, 9), None);
        assert_eq!(tlb.lookup(1, 10), Some(1));
    }
}
