//! Retry and interval timing for the control loop.
//!
//! Nothing in here sleeps.  The loop passes a monotonic millisecond clock
//! into every query, so host tests drive time explicitly.
//!
//! ```text
//!   attempt ──fail──▶ wait retry_delay ──▶ attempt ──fail──▶ ...   (never gives up)
//!      │
//!      └─ok──▶ succeed(): next failure retries immediately
//!
//!   IntervalTimer:  |── interval ──|── interval ──|   fires when now - last > interval
//! ```

// ═══════════════════════════════════════════════════════════════
//  RetryPolicy
// ═══════════════════════════════════════════════════════════════

/// Fixed-delay, unbounded retry schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delay_ms: u64,
    last_attempt_ms: Option<u64>,
    attempts: u32,
}

impl RetryPolicy {
    pub const fn fixed(delay_ms: u32) -> Self {
        Self { delay_ms: delay_ms as u64, last_attempt_ms: None, attempts: 0 }
    }

    /// True when no attempt is outstanding or the delay has elapsed.
    pub fn is_due(&self, now_ms: u64) -> bool {
        match self.last_attempt_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.delay_ms,
        }
    }

    /// Record an attempt at `now_ms`; returns its 1-based number within the
    /// current failure streak.
    pub fn record_attempt(&mut self, now_ms: u64) -> u32 {
        self.last_attempt_ms = Some(now_ms);
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    /// The guarded operation succeeded: clear the streak so the next failure
    /// is retried at once.
    pub fn succeed(&mut self) {
        self.last_attempt_ms = None;
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }
}

// ═══════════════════════════════════════════════════════════════
//  IntervalTimer
// ═══════════════════════════════════════════════════════════════

/// Periodic slot timer anchored at a start time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalTimer {
    interval_ms: u64,
    last_ms: u64,
}

impl IntervalTimer {
    pub const fn new(interval_ms: u32, start_ms: u64) -> Self {
        Self { interval_ms: interval_ms as u64, last_ms: start_ms }
    }

    /// Claim the slot if strictly more than one interval has elapsed.
    pub fn fire(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_ms) > self.interval_ms {
            self.last_ms = now_ms;
            true
        } else {
            false
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
