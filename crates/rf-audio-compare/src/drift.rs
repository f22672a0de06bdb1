//! Slow-drift compensation
//!
//! Each channel keeps an integer drift accumulator (in quanta) and a
//! countdown. The countdown ticks down once per frame; only when it has
//! reached zero may the accumulator step by one toward the sign of
//! `b - a`, after which the countdown restarts at the tolerance interval.
//! A drift of at most one quantum per interval is therefore absorbed.

use serde::{Deserialize, Serialize};

/// Per-channel drift state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftState {
    pub accumulator: i32,
    pub countdown: u32,
}

/// Tracks drift for up to two channels
#[derive(Debug, Clone)]
pub struct DriftTracker {
    interval: u32,
    states: [DriftState; 2],
}

impl DriftTracker {
    /// An interval of 0 disables tracking
    pub fn new(interval: u32) -> Self {
        Self {
            interval,
            states: [DriftState::default(); 2],
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.interval > 0
    }

    /// Advance one frame for `channel` and return its drift in quanta
    pub fn update(&mut self, channel: usize, sample_a: f64, sample_b: f64) -> i32 {
        if !self.is_enabled() {
            return 0;
        }

        let state = &mut self.states[channel];
        state.countdown = state.countdown.saturating_sub(1);

        if state.countdown == 0 {
            if sample_a > sample_b {
                state.accumulator -= 1;
                state.countdown = self.interval;
            } else if sample_a < sample_b {
                state.accumulator += 1;
                state.countdown = self.interval;
            }
        }

        state.accumulator
    }

    pub fn drift(&self, channel: usize) -> i32 {
        self.states[channel].accumulator
    }

    pub fn state(&self, channel: usize) -> DriftState {
        self.states[channel]
    }
}
