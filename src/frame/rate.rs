//! Fixed-window frames-per-second estimator.

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

// ============================================================================
// Constants
// ============================================================================

/// Length of one measurement window.
pub const FPS_WINDOW: Duration = Duration::from_millis(1000);

// ============================================================================
// FpsSample
// ============================================================================

/// Throughput over one completed window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsSample {
    /// Frames recorded in the window.
    pub frames_in_window: u32,
    /// Actual window length in milliseconds (at least 1000).
    pub window_duration_ms: f64,
}

impl FpsSample {
    /// Frames per second.
    #[inline]
    #[must_use]
    pub fn fps(&self) -> f64 {
        f64::from(self.frames_in_window) / (self.window_duration_ms / 1000.0)
    }
}

// ============================================================================
// FrameRateMonitor
// ============================================================================

/// Counts frames and emits one [`FpsSample`] per elapsed window.
///
/// Not a sliding average: the counter and the window start reset each time
/// a sample is emitted.
#[derive(Debug, Clone)]
pub struct FrameRateMonitor {
    frames: u32,
    window_start: Instant,
}

impl Default for FrameRateMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRateMonitor {
    /// Creates a monitor whose first window starts now.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Creates a monitor whose first window starts at `start`.
    #[must_use]
    pub fn starting_at(start: Instant) -> Self {
        Self {
            frames: 0,
            window_start: start,
        }
    }

    /// Discards the current count and starts a new window now.
    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    /// Discards the current count and starts a new window at `now`.
    pub fn reset_at(&mut self, now: Instant) {
        self.frames = 0;
        self.window_start = now;
    }

    /// Records one frame now.
    pub fn record_frame(&mut self) -> Option<FpsSample> {
        self.record_frame_at(Instant::now())
    }

    /// Records one frame observed at `now`.
    ///
    /// Returns a sample when at least [`FPS_WINDOW`] has elapsed since the
    /// window started.
    pub fn record_frame_at(&mut self, now: Instant) -> Option<FpsSample> {
        self.frames = self.frames.saturating_add(1);

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < FPS_WINDOW {
            return None;
        }

        let sample = FpsSample {
            frames_in_window: self.frames,
            window_duration_ms: elapsed.as_secs_f64() * 1000.0,
        };
        self.reset_at(now);
        Some(sample)
    }

    /// Frames recorded in the current window.
    #[inline]
    #[must_use]
    pub fn pending_frames(&self) -> u32 {
        self.frames
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_steady_ten_fps_for_ten_seconds() {
        let start = Instant::now();
        let mut monitor = FrameRateMonitor::starting_at(start);
        let mut samples = Vec::new();

        for i in 1..=100u64 {
            let now = start + Duration::from_millis(i * 100);
            if let Some(sample) = monitor.record_frame_at(now) {
                samples.push(sample);
            }
        }

        assert_eq!(samples.len(), 10);
        for sample in samples {
            assert_eq!(sample.frames_in_window, 10);
            assert!((sample.fps() - 10.0).abs() < 0.01, "fps = {}", sample.fps());
        }
    }

    #[test]
    fn test_no_sample_before_window_elapses() {
        let start = Instant::now();
        let mut monitor = FrameRateMonitor::starting_at(start);

        assert!(monitor.record_frame_at(start + Duration::from_millis(999)).is_none());
        assert_eq!(monitor.pending_frames(), 1);
    }

    #[test]
    fn test_slow_window_uses_actual_duration() {
        let start = Instant::now();
        let mut monitor = FrameRateMonitor::starting_at(start);

        monitor.record_frame_at(start + Duration::from_millis(500));
        let sample = monitor
            .record_frame_at(start + Duration::from_millis(4000))
            .unwrap();

        assert_eq!(sample.frames_in_window, 2);
        assert!((sample.fps() - 0.5).abs() < 1e-9);
        assert_eq!(monitor.pending_frames(), 0);
    }

    #[test]
    fn test_reset_discards_count() {
        let start = Instant::now();
        let mut monitor = FrameRateMonitor::starting_at(start);
        monitor.record_frame_at(start + Duration::from_millis(10));
        monitor.reset_at(start + Duration::from_millis(20));

        assert_eq!(monitor.pending_frames(), 0);
        assert!(monitor.record_frame_at(start + Duration::from_millis(1019)).is_none());
    }

    proptest! {
        #[test]
        fn prop_one_sample_per_window_at_most(gaps in proptest::collection::vec(1u64..400, 1..200)) {
            let start = Instant::now();
            let mut monitor = FrameRateMonitor::starting_at(start);
            let mut t = 0u64;
            let mut samples = 0u64;

            for gap in gaps {
                t += gap;
                if let Some(sample) = monitor.record_frame_at(start + Duration::from_millis(t)) {
                    prop_assert!(sample.window_duration_ms >= 1000.0);
                    samples += 1;
                }
            }

            prop_assert!(samples <= t / 1000);
        }
    }
}
