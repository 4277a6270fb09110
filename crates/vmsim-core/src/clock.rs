//! `SimClock`: the timer/event driver is listed as out of scope (§1) — the
//! Core only needs something that hands out a monotonically increasing
//! tick count so the scheduler can charge elapsed ticks (§4.7) and the
//! loader can gate admission on `start_time` (§4.8). This trait is the
//! seam an embedder's real timer driver plugs into; `vmsim-core` ships two
//! implementations for its own tests and for a runnable default.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub trait SimClock: Send + Sync {
    /// Current simulated time, in ticks.
    fn now(&self) -> u64;

    /// Block the calling worker until at least one more tick has elapsed.
    fn wait_tick(&self);
}

/// Wall-clock-paced ticks, one per `tick_millis` milliseconds. Used by
/// `vmsim-cli` for a real (if compressed) run.
pub struct RealTimeClock {
    start: Instant,
    tick_millis: u64,
}

impl RealTimeClock {
    pub fn new(tick_millis: u64) -> Self {
        Self { start: Instant::now(), tick_millis: tick_millis.max(1) }
    }
}

impl SimClock for RealTimeClock {
    fn now(&self) -> u64 {
        (self.start.elapsed().as_millis() as u64) / self.tick_millis
    }

    fn wait_tick(&self) {
        std::thread::sleep(std::time::Duration::from_millis(self.tick_millis));
    }
}

/// A manually-advanced clock for deterministic tests: `wait_tick` returns
/// immediately once `advance` has been called at least once since the
/// last observation, so test code drives time explicitly rather than
/// racing a real sleep.
pub struct ManualClock {
    ticks: AtomicU64,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self { ticks: AtomicU64::new(0) }
    }

    pub fn advance(&self, by: u64) {
        self.ticks.fetch_add(by, Ordering::SeqCst);
    }
}

impl SimClock for ManualClock {
    fn now(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    fn wait_tick(&self) {
        // Deterministic tests drive `advance` explicitly; nothing to wait on.
    }
}
