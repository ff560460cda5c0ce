use std::ops::Range;
use std::time::{Duration, Instant};

/// Maps output frame indices to exact audio sample windows.
///
/// Frame `n` covers `[n*sr/fps, (n+1)*sr/fps)` in u64 integer arithmetic.
/// The rounding policy is fixed at construction and applied to every
/// frame, so windows tile the stream with no skipped or duplicated
/// samples and the accumulated error against ideal frame time stays
/// below one sample for any frame index.
#[derive(Debug, Clone, Copy)]
pub struct FrameSyncEngine {
    sample_rate: u64,
    fps: u64,
}

impl FrameSyncEngine {
    /// `fps` and `sample_rate` must already be validated non-zero.
    pub fn new(sample_rate: u32, fps: u32) -> Self {
        Self {
            sample_rate: u64::from(sample_rate),
            fps: u64::from(fps),
        }
    }

    /// Sample window for frame `n`. The final window of a finite source
    /// may extend past the last sample; the caller zero-pads.
    pub fn window(&self, frame: u64) -> Range<u64> {
        let start = frame * self.sample_rate / self.fps;
        let end = (frame + 1) * self.sample_rate / self.fps;
        start..end
    }

    /// Number of frames a finite source produces:
    /// `ceil(total_samples * fps / sample_rate)`, i.e. every sample is
    /// covered and the final partial window still yields a frame.
    pub fn frame_count(&self, total_samples: u64) -> u64 {
        (total_samples * self.fps + self.sample_rate - 1) / self.sample_rate
    }

    /// Fixed analysis window length: the largest tile the engine can
    /// produce. Shorter tiles are zero-padded up to this.
    pub fn window_len(&self) -> usize {
        ((self.sample_rate + self.fps - 1) / self.fps) as usize
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps as f64)
    }
}

/// Deadline-based pacer for live mode.
///
/// Each iteration is scheduled one frame period after the previous one.
/// An iteration that finishes past its successor's deadline causes that
/// next scheduled frame to be dropped (never queued) and realigns the
/// schedule to the first deadline still in the future.
#[derive(Debug)]
pub struct LivePacer {
    period: Duration,
    next_deadline: Instant,
    dropped: u64,
}

impl LivePacer {
    pub fn new(fps: u32) -> Self {
        Self::starting_at(Instant::now(), fps)
    }

    pub fn starting_at(start: Instant, fps: u32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / f64::from(fps)),
            next_deadline: start,
            dropped: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleeps until the next scheduled frame slot, if it is still ahead.
    pub fn wait_for_slot(&self) {
        let now = Instant::now();
        if let Some(remaining) = self.next_deadline.checked_duration_since(now) {
            std::thread::sleep(remaining);
        }
    }

    /// Records the end of an iteration at `now`. Returns true when the
    /// iteration overran and the next scheduled frame was dropped.
    pub fn finish_iteration(&mut self, now: Instant) -> bool {
        self.next_deadline += self.period;
        if now <= self.next_deadline {
            return false;
        }

        // One overrun drops exactly one scheduled frame, however large
        // the overrun was; then realign to the next future slot.
        self.dropped += 1;
        let behind = now - self.next_deadline;
        let periods = (behind.as_nanos() / self.period.as_nanos()) as u32 + 1;
        self.next_deadline += self.period * periods;
        true
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_tile_exactly() {
        let sync = FrameSyncEngine::new(44_100, 30);
        for n in 0..10_000u64 {
            assert_eq!(sync.window(n).end, sync.window(n + 1).start);
        }
    }

    #[test]
    fn window_lengths_stay_within_one_sample_of_ideal() {
        let sync = FrameSyncEngine::new(44_100, 30);
        let ideal = 44_100.0 / 30.0;
        for n in 0..10_000u64 {
            let w = sync.window(n);
            let len = (w.end - w.start) as f64;
            assert!((len - ideal).abs() < 1.0, "frame {} len {}", n, len);
        }
    }

    #[test]
    fn cumulative_drift_stays_below_one_sample() {
        // 44100/29 is not an integer; floor rounding must not accumulate.
        let sync = FrameSyncEngine::new(44_100, 29);
        for n in (0..1_000_000u64).step_by(997) {
            let ideal = n as f64 * 44_100.0 / 29.0;
            let actual = sync.window(n).start as f64;
            assert!((actual - ideal).abs() < 1.0);
        }
    }

    #[test]
    fn frame_count_is_ceil_of_total_over_samples_per_frame() {
        for (sr, fps) in [(44_100u32, 25u32), (44_100, 30), (48_000, 24), (22_050, 29)] {
            let sync = FrameSyncEngine::new(sr, fps);
            let spf = f64::from(sr) / f64::from(fps);
            for total in [0u64, 1, 999, 44_100, 44_101, 441_000, 441_001, 12_345_678] {
                let expected = (total as f64 / spf).ceil() as u64;
                assert_eq!(
                    sync.frame_count(total),
                    expected,
                    "sr={} fps={} total={}",
                    sr,
                    fps,
                    total
                );
            }
        }
    }

    #[test]
    fn ten_seconds_at_25fps_is_exactly_250_frames() {
        let sync = FrameSyncEngine::new(44_100, 25);
        assert_eq!(sync.frame_count(441_000), 250);
    }

    #[test]
    fn last_window_covers_final_samples() {
        let sync = FrameSyncEngine::new(44_100, 30);
        let total = 44_123u64; // deliberately not frame-aligned
        let frames = sync.frame_count(total);
        let last = sync.window(frames - 1);
        assert!(last.start < total);
        assert!(last.end >= total);
        // One frame earlier must not already cover everything.
        assert!(sync.window(frames - 2).end < total);
    }

    #[test]
    fn window_len_is_ceil_of_samples_per_frame() {
        assert_eq!(FrameSyncEngine::new(44_100, 25).window_len(), 1764);
        assert_eq!(FrameSyncEngine::new(44_100, 30).window_len(), 1470);
        assert_eq!(FrameSyncEngine::new(44_100, 29).window_len(), 1521);
    }

    #[test]
    fn overrun_of_three_periods_drops_exactly_one_frame() {
        let start = Instant::now();
        let mut pacer = LivePacer::starting_at(start, 20);
        let period = pacer.period();

        // First iteration takes 3x the frame period.
        let dropped = pacer.finish_iteration(start + period * 3);
        assert!(dropped);
        assert_eq!(pacer.dropped(), 1);

        // The schedule recovers: a fast follow-up iteration is on time.
        let dropped = pacer.finish_iteration(start + period * 4 + period / 10);
        assert!(!dropped);
        assert_eq!(pacer.dropped(), 1);
    }

    #[test]
    fn on_time_iterations_never_drop() {
        let start = Instant::now();
        let mut pacer = LivePacer::starting_at(start, 30);
        let period = pacer.period();
        for n in 1..=100u32 {
            let finished = start + period * n - period / 2;
            assert!(!pacer.finish_iteration(finished));
        }
        assert_eq!(pacer.dropped(), 0);
    }
}
