//! Wall-clock sources for the game loop.
//!
//! The loop never reads `Instant` directly; it asks a [`Clock`]. The
//! production [`SystemClock`] measures real time, while [`ManualClock`] only
//! moves when told to, which makes the accumulator math reproducible.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Millisecond time source with the ability to wait.
pub trait Clock: Send {
    /// Milliseconds since an arbitrary fixed origin. Never decreases.
    fn now_ms(&self) -> u64;

    /// Block the calling thread for roughly `ms` milliseconds.
    fn sleep_ms(&self, ms: u64);

    /// Give other threads a chance to run between loop iterations.
    fn yield_now(&self) {
        std::thread::yield_now();
    }
}

/// Monotonic real-time clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn sleep_ms(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

/// Clock that only moves when advanced.
///
/// Clones share the same time, so a test can keep one handle while the loop
/// owns another. Sleeping advances the clock by the requested amount instead
/// of blocking.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        ManualClock {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn sleep_ms(&self, ms: u64) {
        self.advance(ms);
    }

    fn yield_now(&self) {}
}
