use std::time::Duration;

/// Periods delivered by a single `advance` call at most. A stalled frame
/// would otherwise replay seconds of simulation in one go.
pub const MAX_BURST: u32 = 50;

/// Fixed-period trigger driven by caller-supplied elapsed time.
#[derive(Clone, Debug)]
pub struct Interval {
    period: Duration,
    accum: Duration,
}

impl Interval {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            accum: Duration::ZERO,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Adds `dt` and returns how many whole periods are due.
    pub fn advance(&mut self, dt: Duration) -> u32 {
        if self.period.is_zero() {
            return 0;
        }
        self.accum = self.accum.saturating_add(dt);

        let mut due = 0;
        while self.accum >= self.period {
            self.accum = self.accum.saturating_sub(self.period);
            due += 1;
            if due == MAX_BURST {
                // drop the backlog
                self.accum = Duration::ZERO;
                break;
            }
        }
        due
    }

    pub fn reset(&mut self) {
        self.accum = Duration::ZERO;
    }
}
