//! Debounce timer.
//!
//! A [`Debouncer`] is a one-shot timer whose deadline is pushed back every
//! time it is triggered. It only fires once the input has been quiet for the
//! full delay. Time is passed in explicitly so the owner's event loop (or a
//! test) controls the clock.

use std::time::{Duration, Instant};

use crate::logging::targets;

/// Reset-on-change one-shot timer.
#[derive(Debug, Clone)]
pub struct Debouncer {
    /// Required quiet period.
    delay: Duration,
    /// When the timer fires, if armed.
    deadline: Option<Instant>,
    /// Number of times the deadline was pushed back before firing.
    resets: u64,
}

impl Debouncer {
    /// Create an idle debouncer with the given quiet period.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            resets: 0,
        }
    }

    /// The configured quiet period.
    #[inline]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm the timer, or push an armed timer's deadline back to `now + delay`.
    pub fn trigger(&mut self, now: Instant) {
        if self.deadline.is_some() {
            self.resets += 1;
            tracing::trace!(target: targets::TIMER, resets = self.resets, "debounce reset");
        }
        self.deadline = Some(now + self.delay);
    }

    /// Disarm the timer without firing.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether the timer is armed.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left until the timer fires, `None` when idle.
    pub fn time_until_fire(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Fire and disarm the timer if its deadline has passed.
    ///
    /// Returns `true` exactly once per quiet period.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.resets = 0;
                tracing::trace!(target: targets::TIMER, "debounce fired");
                true
            }
            _ => false,
        }
    }
}
