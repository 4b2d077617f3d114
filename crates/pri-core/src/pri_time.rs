use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic time in milliseconds, as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PriTime(pub u64);

impl PriTime {
    pub fn add_ms(self, ms: u64) -> PriTime {
        PriTime(self.0.saturating_add(ms))
    }

    /// Milliseconds from `self` until `later`, zero if `later` already passed.
    pub fn until(self, later: PriTime) -> u64 {
        later.0.saturating_sub(self.0)
    }
}

impl fmt::Display for PriTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.0 / 1000, self.0 % 1000)
    }
}

/// Time source for the scheduler
pub trait Clock: Send {
    fn now(&self) -> PriTime;
}

/// Wall clock, counting from the moment it was created
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> PriTime {
        PriTime(self.epoch.elapsed().as_millis() as u64)
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, t: PriTime) {
        self.now_ms.store(t.0, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> PriTime {
        PriTime(self.now_ms.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance(1500);
        assert_eq!(other.now(), PriTime(1500));
        assert_eq!(format!("{}", other.now()), "1.500");
        assert_eq!(PriTime(100).until(PriTime(40)), 0);
    }
}
