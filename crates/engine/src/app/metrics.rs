use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static POISON_WARNED: AtomicBool = AtomicBool::new(false);

/// Loop health over the last metrics window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    /// Simulated milliseconds per wall-clock millisecond. Roughly 4 while
    /// fast-forwarding, 0 while the loop is starved.
    pub sim_speed: f32,
    /// Frames whose tick backlog exceeded the per-frame cap.
    pub clamped_frames: u32,
    pub dropped_backlog_ms: f32,
}

/// Shared read side of the loop metrics; the scene reads it for its title.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        *self.latest.read().unwrap_or_else(|poisoned| {
            note_poison("read");
            PoisonError::into_inner(poisoned)
        })
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        let mut latest = self.latest.write().unwrap_or_else(|poisoned| {
            note_poison("write");
            PoisonError::into_inner(poisoned)
        });
        *latest = snapshot;
    }
}

fn note_poison(operation: &'static str) {
    if !POISON_WARNED.swap(true, Ordering::Relaxed) {
        warn!(operation, "metrics_lock_poisoned");
    }
}

#[derive(Debug, Default)]
struct WindowCounters {
    frames: u32,
    ticks: u32,
    frame_time: Duration,
    sim_time: Duration,
    clamped_frames: u32,
    dropped_backlog: Duration,
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    window_start: Instant,
    window: Duration,
    counters: WindowCounters,
}

impl MetricsAccumulator {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window_start: Instant::now(),
            window,
            counters: WindowCounters::default(),
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration) {
        self.counters.frames = self.counters.frames.saturating_add(1);
        self.counters.frame_time = self.counters.frame_time.saturating_add(frame_dt);
    }

    /// `tick_dt` is the interval each of the `ticks` advanced the scene by.
    pub(crate) fn record_ticks(&mut self, ticks: u32, tick_dt: Duration) {
        self.counters.ticks = self.counters.ticks.saturating_add(ticks);
        self.counters.sim_time = self
            .counters
            .sim_time
            .saturating_add(tick_dt.saturating_mul(ticks));
    }

    pub(crate) fn record_clamp(&mut self, dropped_backlog: Duration) {
        self.counters.clamped_frames = self.counters.clamped_frames.saturating_add(1);
        self.counters.dropped_backlog = self
            .counters
            .dropped_backlog
            .saturating_add(dropped_backlog);
    }

    /// Closes the window once it has run its length and starts the next one.
    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }
        let counters = std::mem::take(&mut self.counters);
        self.window_start = now;

        let seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = match counters.frames {
            0 => 0.0,
            frames => counters.frame_time.as_secs_f32() * 1000.0 / frames as f32,
        };
        Some(LoopMetricsSnapshot {
            fps: counters.frames as f32 / seconds,
            tps: counters.ticks as f32 / seconds,
            frame_time_ms,
            sim_speed: counters.sim_time.as_secs_f32() / seconds,
            clamped_frames: counters.clamped_frames,
            dropped_backlog_ms: counters.dropped_backlog.as_secs_f32() * 1000.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn poison(handle: &MetricsHandle) {
        let latest = Arc::clone(&handle.latest);
        let _ = thread::spawn(move || {
            let _guard = latest.write().expect("write guard");
            panic!("poison metrics lock");
        })
        .join();
    }

    #[test]
    fn window_reports_rates_and_sim_speed() {
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1));
        let start = accumulator.window_start;

        accumulator.record_frame(Duration::from_millis(20));
        accumulator.record_frame(Duration::from_millis(30));
        accumulator.record_ticks(3, Duration::from_millis(100));
        accumulator.record_ticks(1, Duration::from_millis(200));
        accumulator.record_clamp(Duration::from_millis(40));

        let snapshot = accumulator
            .maybe_snapshot(start + Duration::from_secs(1))
            .expect("snapshot");

        assert!((snapshot.fps - 2.0).abs() < 0.01);
        assert!((snapshot.tps - 4.0).abs() < 0.01);
        assert!((snapshot.frame_time_ms - 25.0).abs() < 0.01);
        assert!((snapshot.sim_speed - 0.5).abs() < 0.01);
        assert_eq!(snapshot.clamped_frames, 1);
        assert!((snapshot.dropped_backlog_ms - 40.0).abs() < 0.01);
    }

    #[test]
    fn next_window_starts_from_zero() {
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1));
        let start = accumulator.window_start;
        accumulator.record_ticks(30, Duration::from_millis(33));
        accumulator.record_clamp(Duration::from_millis(10));
        accumulator
            .maybe_snapshot(start + Duration::from_secs(1))
            .expect("first");

        let next = accumulator
            .maybe_snapshot(start + Duration::from_secs(3))
            .expect("second");
        assert_eq!(next, LoopMetricsSnapshot::default());
    }

    #[test]
    fn no_snapshot_before_window_ends() {
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1));
        let start = accumulator.window_start;
        accumulator.record_frame(Duration::from_millis(16));

        assert!(accumulator
            .maybe_snapshot(start + Duration::from_millis(500))
            .is_none());
    }

    #[test]
    fn poisoned_lock_still_reads_and_publishes() {
        let handle = MetricsHandle::default();
        poison(&handle);

        assert_eq!(handle.snapshot(), LoopMetricsSnapshot::default());

        let published = LoopMetricsSnapshot {
            fps: 60.0,
            tps: 30.0,
            sim_speed: 1.0,
            ..LoopMetricsSnapshot::default()
        };
        handle.publish(published);
        assert_eq!(handle.snapshot(), published);
    }
}
