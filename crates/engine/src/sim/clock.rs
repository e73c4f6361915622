use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const FAST_FORWARD_FACTOR: f32 = 4.0;
pub const RELEASE_RATE_BALANCER: f32 = 4.0;
pub const RELEASE_RATE_MIN: u32 = 10;
pub const RELEASE_RATE_MAX: u32 = 990;
pub const RELEASE_RATE_STEP: u32 = 10;

/// Simulation time base: acceleration, pause and the release schedule.
///
/// Every duration threshold in the core is passed through
/// [`SimulationClock::scaled_duration`], so fast-forward shortens thresholds
/// without touching the constants that define them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationClock {
    fast_forward: bool,
    paused: bool,
    release_rate: u32,
    release_timer_ms: f32,
    elapsed_ticks: u64,
}

impl SimulationClock {
    pub fn new(release_rate: u32) -> Self {
        Self {
            fast_forward: false,
            paused: false,
            release_rate: release_rate.clamp(RELEASE_RATE_MIN, RELEASE_RATE_MAX),
            release_timer_ms: 0.0,
            elapsed_ticks: 0,
        }
    }

    pub fn acceleration(&self) -> f32 {
        if self.fast_forward {
            FAST_FORWARD_FACTOR
        } else {
            1.0
        }
    }

    pub fn scaled_duration(&self, duration_ms: f32) -> f32 {
        duration_ms / self.acceleration()
    }

    /// Fixed step the loop runner should use; shorter in fast-forward.
    pub fn tick_interval(&self, base: Duration) -> Duration {
        base.div_f32(self.acceleration())
    }

    pub fn is_fast_forward(&self) -> bool {
        self.fast_forward
    }

    pub fn set_fast_forward(&mut self, enabled: bool) {
        self.fast_forward = enabled;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn release_rate(&self) -> u32 {
        self.release_rate
    }

    /// Steps the release rate by `steps * 10`, clamped to the allowed range.
    pub fn adjust_release_rate(&mut self, steps: i32) -> u32 {
        let delta = steps.saturating_mul(RELEASE_RATE_STEP as i32);
        let next = (self.release_rate as i64 + delta as i64)
            .clamp(RELEASE_RATE_MIN as i64, RELEASE_RATE_MAX as i64);
        self.release_rate = next as u32;
        self.release_rate
    }

    pub fn release_timer_ms(&self) -> f32 {
        self.release_timer_ms
    }

    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed_ticks
    }

    pub(crate) fn record_tick(&mut self) {
        self.elapsed_ticks = self.elapsed_ticks.saturating_add(1);
    }

    /// Accumulates `dt_ms`; true when the next agent is due. The timer resets
    /// on every release.
    pub(crate) fn release_due(&mut self, dt_ms: f32) -> bool {
        let threshold = self.scaled_duration(self.release_rate as f32 * RELEASE_RATE_BALANCER);
        self.release_timer_ms += dt_ms;
        if self.release_timer_ms >= threshold {
            self.release_timer_ms = 0.0;
            true
        } else {
            false
        }
    }
}
