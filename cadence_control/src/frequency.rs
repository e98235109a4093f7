//! Wall-clock pacing and frequency measurement for clocked back ends.

use std::time::{Duration, Instant};

/// Absolute-deadline pacer for a clocked loop.
///
/// Deadlines advance by a fixed period from the previous deadline, not
/// from the wake-up time, so pacing does not drift with scheduling
/// jitter. An overrun resets the deadline to now: late ticks are not
/// compensated by a burst of catch-up ticks.
pub struct FrequencyManager {
    period: Duration,
    next_deadline: Instant,
}

impl FrequencyManager {
    /// A pacer for `frequency_hz` ticks per second, anchored at now.
    pub fn new(frequency_hz: f64) -> Self {
        let period = Duration::from_secs_f64(1.0 / frequency_hz);
        Self {
            period,
            next_deadline: Instant::now() + period,
        }
    }

    /// Configured tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleep until the next tick boundary.
    ///
    /// Returns `false` when the boundary had already passed (overrun);
    /// the deadline is then re-anchored at now and the tick proceeds
    /// immediately.
    pub fn wait(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.next_deadline {
            self.next_deadline = now + self.period;
            return false;
        }
        std::thread::sleep(self.next_deadline - now);
        self.next_deadline += self.period;
        true
    }
}

/// Measured tick rate, smoothed over a fixed window of recent ticks.
pub struct FrequencyMeasure {
    window: Duration,
    anchor: Option<Instant>,
    ticks_since_anchor: u64,
    latest: f64,
}

impl FrequencyMeasure {
    const WINDOW: Duration = Duration::from_millis(200);

    /// A measure with an empty window; reports 0.0 until two ticks
    /// have been recorded.
    pub fn new() -> Self {
        Self {
            window: Self::WINDOW,
            anchor: None,
            ticks_since_anchor: 0,
            latest: 0.0,
        }
    }

    /// Record one tick and return the current frequency estimate [Hz].
    pub fn tick(&mut self) -> f64 {
        let now = Instant::now();
        match self.anchor {
            None => {
                self.anchor = Some(now);
                self.ticks_since_anchor = 0;
            }
            Some(anchor) => {
                self.ticks_since_anchor += 1;
                let elapsed = now - anchor;
                if elapsed >= self.window {
                    self.latest = self.ticks_since_anchor as f64 / elapsed.as_secs_f64();
                    self.anchor = Some(now);
                    self.ticks_since_anchor = 0;
                }
            }
        }
        self.latest
    }

    /// Latest frequency estimate without recording a tick.
    pub fn latest(&self) -> f64 {
        self.latest
    }
}

impl Default for FrequencyMeasure {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_reports_overrun_when_deadline_passed() {
        let mut manager = FrequencyManager::new(1000.0);
        std::thread::sleep(Duration::from_millis(5));
        assert!(!manager.wait());
        // Re-anchored: the next wait has a full period available.
        assert!(manager.wait());
    }

    #[test]
    fn measure_starts_at_zero() {
        let mut measure = FrequencyMeasure::new();
        assert_eq!(measure.tick(), 0.0);
        assert_eq!(measure.latest(), 0.0);
    }

    #[test]
    fn measure_converges_on_tick_rate() {
        let mut measure = FrequencyMeasure::new();
        let mut estimate = 0.0;
        // ~1 kHz for a bit over one window.
        for _ in 0..260 {
            std::thread::sleep(Duration::from_millis(1));
            estimate = measure.tick();
        }
        assert!(estimate > 100.0, "estimate {estimate} too low");
        assert!(estimate < 1100.0, "estimate {estimate} too high");
    }
}
