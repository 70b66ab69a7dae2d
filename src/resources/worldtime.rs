//! Logical simulation clock.
//!
//! [`WorldTime`] advances by exactly one fixed tick per `update_logic` call,
//! independently of how often frames are rendered. Animation deadlines and
//! entity behaviours read it instead of the wall clock, so a slow frame that
//! is caught up by several updates observes the same timeline as a fast one.

/// Tick counter plus derived logical milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldTime {
    /// Number of fixed ticks simulated so far.
    pub tick: u64,
    /// Logical milliseconds simulated so far (`tick * tick_ms`).
    pub elapsed_ms: u64,
    /// Length of one tick in milliseconds.
    pub tick_ms: u64,
    /// Number of frames rendered so far.
    pub frame: u64,
}

impl Default for WorldTime {
    fn default() -> Self {
        WorldTime::new(20)
    }
}

impl WorldTime {
    pub fn new(tick_ms: u64) -> Self {
        WorldTime {
            tick: 0,
            elapsed_ms: 0,
            tick_ms,
            frame: 0,
        }
    }

    /// Move the clock forward by one tick.
    pub fn advance(&mut self) {
        self.tick += 1;
        self.elapsed_ms += self.tick_ms;
    }

    /// Length of one tick in seconds, for behaviours integrating velocities.
    pub fn delta_seconds(&self) -> f32 {
        self.tick_ms as f32 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_accumulates_fixed_ticks() {
        let mut wt = WorldTime::new(20);
        for _ in 0..5 {
            wt.advance();
        }
        assert_eq!(wt.tick, 5);
        assert_eq!(wt.elapsed_ms, 100);
        assert_eq!(wt.frame, 0);
    }

    #[test]
    fn test_delta_seconds() {
        let wt = WorldTime::new(25);
        assert!((wt.delta_seconds() - 0.025).abs() < 1e-6);
    }
}
