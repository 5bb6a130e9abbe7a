// Debounce module
// Single-shot, resettable timer handle driven by an external clock

use std::time::{Duration, Instant};

/// Fires once `delay` after the most recent `schedule`, never before
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }

    /// (Re)start the quiet window at `now`
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the timer if it is due at `now`
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_collapses_into_one_fire() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(400));

        for i in 0..5 {
            debouncer.schedule(start + Duration::from_millis(i * 50));
        }
        let last = start + Duration::from_millis(200);

        assert!(!debouncer.fire(last + Duration::from_millis(399)));
        assert!(debouncer.fire(last + Duration::from_millis(400)));
        assert!(!debouncer.fire(last + Duration::from_millis(800)));
    }

    #[test]
    fn test_cancel() {
        let now = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.schedule(now);
        debouncer.cancel();
        assert!(!debouncer.is_pending());
        assert!(!debouncer.fire(now + Duration::from_secs(1)));
    }
}
