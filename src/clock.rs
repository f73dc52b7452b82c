use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Time source for search deadlines and turn clocks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to, or by a fixed step on every reading.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed_ms: AtomicU64,
    step_ms: u64,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::stepping(Duration::ZERO)
    }

    pub fn stepping(step: Duration) -> Self {
        Self {
            origin: Instant::now(),
            elapsed_ms: AtomicU64::new(0),
            step_ms: step.as_millis() as u64,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let elapsed = self.elapsed_ms.fetch_add(self.step_ms, Ordering::SeqCst);
        self.origin + Duration::from_millis(elapsed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(clock: &dyn Clock, budget: Duration) -> Self {
        Self {
            at: clock.now() + budget,
        }
    }

    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        clock.now() >= self.at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let clock = ManualClock::new();
        let deadline = Deadline::after(&clock, Duration::from_millis(100));
        assert!(!deadline.is_expired(&clock));

        clock.advance(Duration::from_millis(99));
        assert!(!deadline.is_expired(&clock));

        clock.advance(Duration::from_millis(1));
        assert!(deadline.is_expired(&clock));
    }

    #[test]
    fn stepping_clock_expires_after_enough_readings() {
        let clock = ManualClock::stepping(Duration::from_millis(10));
        let deadline = Deadline::after(&clock, Duration::from_millis(30));

        let readings = (0..10).take_while(|_| !deadline.is_expired(&clock)).count();
        assert_eq!(readings, 2);
    }
}
