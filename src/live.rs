use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::audio::amplify::AdaptiveAmplifier;
use crate::audio::extract::{FeatureExtractor, FeatureVector};
use crate::audio::source::{NextBlock, SampleSource};
use crate::config::RenderConfig;
use crate::error::Result;
use crate::pipeline::FrameSink;
use crate::render::VisualRenderer;
use crate::sync::LivePacer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Default, Clone)]
pub struct LiveStats {
    pub frames_rendered: u64,
    /// Scheduled frames skipped because an iteration overran its frame
    /// period. Diagnostics, not errors.
    pub frames_dropped: u64,
}

struct TuningShared {
    pending: Mutex<Option<RenderConfig>>,
    stop: AtomicBool,
}

/// Cloneable handle for adjusting a running session from outside the
/// loop. Replacement configs are posted whole and picked up between
/// iterations, so an in-flight frame always completes against the
/// config it started with.
#[derive(Clone)]
pub struct TuningHandle {
    shared: Arc<TuningShared>,
}

impl TuningHandle {
    /// Validates and posts a replacement config. The previous pending
    /// value, if any, is superseded.
    pub fn update(&self, config: RenderConfig) -> Result<()> {
        config.validate()?;
        if let Ok(mut pending) = self.shared.pending.lock() {
            *pending = Some(config);
        }
        Ok(())
    }

    /// Requests a cooperative stop; the session finishes its in-flight
    /// iteration and then halts.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
    }
}

/// Drives extraction, amplification and rendering against a live source
/// at a steady target rate, with bounded latency: when an iteration
/// overruns, the next scheduled frame is dropped rather than queued.
pub struct LiveTuningSession<S: SampleSource> {
    source: S,
    config: RenderConfig,
    extractor: FeatureExtractor,
    amplifier: AdaptiveAmplifier,
    renderer: VisualRenderer,
    shared: Arc<TuningShared>,
    state: SessionState,
    stats: LiveStats,
    last_features: Option<FeatureVector>,
}

impl<S: SampleSource> LiveTuningSession<S> {
    pub fn new(source: S, config: RenderConfig) -> Result<Self> {
        config.validate()?;
        let sample_rate = source.sample_rate();
        Ok(Self {
            extractor: FeatureExtractor::new(&config, sample_rate),
            amplifier: AdaptiveAmplifier::new(&config),
            renderer: VisualRenderer::new(&config),
            source,
            config,
            shared: Arc::new(TuningShared {
                pending: Mutex::new(None),
                stop: AtomicBool::new(false),
            }),
            state: SessionState::Idle,
            stats: LiveStats::default(),
            last_features: None,
        })
    }

    pub fn handle(&self) -> TuningHandle {
        TuningHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> LiveStats {
        self.stats.clone()
    }

    /// The currently-active config, verbatim. This is what `save-config`
    /// serializes; reloading it later reproduces the tuned style.
    pub fn export_config(&self) -> RenderConfig {
        self.config.clone()
    }

    /// Runs until the source ends, a stop is requested, or a fatal
    /// source/sink error aborts the loop. Stopped is terminal: calling
    /// `run` again produces no further frames.
    pub fn run<K: FrameSink>(&mut self, sink: &mut K) -> Result<LiveStats> {
        if self.state == SessionState::Stopped {
            log::warn!("Live session already stopped; not restarting");
            return Ok(self.stats.clone());
        }
        self.state = SessionState::Running;

        let result = self.run_loop(sink);

        self.state = SessionState::Stopped;
        log::info!(
            "Live session stopped: {} frames rendered, {} dropped",
            self.stats.frames_rendered,
            self.stats.frames_dropped
        );
        result.map(|()| self.stats.clone())
    }

    fn run_loop<K: FrameSink>(&mut self, sink: &mut K) -> Result<()> {
        let mut pacer = LivePacer::new(self.config.fps);
        let mut frame_index: u64 = 0;

        loop {
            if self.shared.stop.load(Ordering::Acquire) {
                break;
            }
            if self.apply_pending_config() {
                pacer = LivePacer::starting_at(Instant::now(), self.config.fps);
            }

            pacer.wait_for_slot();

            let window_len = self.extractor.window_len();
            let features = match self.source.next_block(window_len)? {
                NextBlock::EndOfStream => break,
                NextBlock::Block(block) => {
                    let block = if block.len() < window_len {
                        block.zero_padded(window_len)
                    } else {
                        block
                    };
                    let mut features = self.extractor.extract(&block, frame_index)?;
                    self.amplifier.process(&mut features);
                    self.last_features = Some(features.clone());
                    Some(features)
                }
                // Extraction is lagging behind the clock: repeat the most
                // recent vector instead of blocking the sink.
                NextBlock::Pending => self.last_features.clone().map(|mut f| {
                    f.frame_index = frame_index;
                    f
                }),
            };

            if let Some(features) = features {
                let frame = self.renderer.render(&features, &self.config);
                sink.write(&frame)?;
                self.stats.frames_rendered += 1;
                frame_index += 1;
            }

            if pacer.finish_iteration(Instant::now()) {
                self.stats.frames_dropped += 1;
                log::debug!(
                    "Iteration overran the frame period; dropped one frame ({} total)",
                    self.stats.frames_dropped
                );
            }
        }

        Ok(())
    }

    /// Swaps in a posted config between iterations. Returns true when
    /// the frame rate changed and the pacer must be rebuilt.
    fn apply_pending_config(&mut self) -> bool {
        let pending = self
            .shared
            .pending
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        let Some(new) = pending else {
            return false;
        };

        let fps_changed = new.fps != self.config.fps;
        let rebuild_analysis = fps_changed || new.band_count != self.config.band_count;
        let rebuild_renderer = rebuild_analysis
            || new.visualizer != self.config.visualizer
            || new.resolution != self.config.resolution
            || new.inner_band_count != self.config.inner_band_count;

        self.config = new;
        if rebuild_analysis {
            // Band layout changed: feature dimensions and gain history
            // no longer line up, so both are rebuilt (and reseeded).
            let sample_rate = self.source.sample_rate();
            self.extractor = FeatureExtractor::new(&self.config, sample_rate);
            self.amplifier = AdaptiveAmplifier::new(&self.config);
            self.last_features = None;
        }
        if rebuild_renderer {
            self.renderer = VisualRenderer::new(&self.config);
        }
        log::info!("Applied updated render config");
        fps_changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::MemorySource;
    use crate::config::{Resolution, Theme, Visualizer};
    use crate::render::Frame;
    use std::time::Duration;

    struct CountingSink {
        frames: u64,
    }

    impl FrameSink for CountingSink {
        fn write(&mut self, _frame: &Frame) -> Result<()> {
            self.frames += 1;
            Ok(())
        }
    }

    /// Stalls on the first write to simulate an iteration that overruns
    /// its frame-period budget.
    struct SlowFirstWriteSink {
        stall: Duration,
        stalled: bool,
        frames: u64,
    }

    impl FrameSink for SlowFirstWriteSink {
        fn write(&mut self, _frame: &Frame) -> Result<()> {
            if !self.stalled {
                self.stalled = true;
                std::thread::sleep(self.stall);
            }
            self.frames += 1;
            Ok(())
        }
    }

    fn live_config(fps: u32) -> RenderConfig {
        let mut config = RenderConfig::for_theme(Theme::Minimal);
        config.visualizer = Visualizer::Circular;
        config.resolution = Resolution::Hd720;
        config.band_count = 16;
        config.inner_band_count = 8;
        config.fps = fps;
        config
    }

    fn finite_source(blocks: usize, fps: u32) -> MemorySource {
        let sample_rate = 8_000u32;
        let window = (sample_rate as usize).div_ceil(fps as usize);
        MemorySource::new(vec![0.2; blocks * window], sample_rate)
    }

    #[test]
    fn session_runs_to_end_of_stream_and_stops() {
        let mut session =
            LiveTuningSession::new(finite_source(4, 40), live_config(40)).unwrap();
        assert_eq!(session.state(), SessionState::Idle);

        let mut sink = CountingSink { frames: 0 };
        let stats = session.run(&mut sink).unwrap();

        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(stats.frames_rendered, 4);
        assert_eq!(sink.frames, 4);
    }

    #[test]
    fn stopped_session_produces_no_further_frames() {
        let mut session =
            LiveTuningSession::new(finite_source(2, 40), live_config(40)).unwrap();
        let mut sink = CountingSink { frames: 0 };
        session.run(&mut sink).unwrap();

        let stats = session.run(&mut sink).unwrap();
        assert_eq!(stats.frames_rendered, 2);
        assert_eq!(sink.frames, 2);
    }

    #[test]
    fn stop_request_halts_before_the_first_iteration() {
        let mut session =
            LiveTuningSession::new(finite_source(50, 40), live_config(40)).unwrap();
        session.handle().stop();

        let mut sink = CountingSink { frames: 0 };
        let stats = session.run(&mut sink).unwrap();
        assert_eq!(stats.frames_rendered, 0);
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn posted_config_is_applied_and_exported_verbatim() {
        let mut session =
            LiveTuningSession::new(finite_source(3, 40), live_config(40)).unwrap();

        let mut tuned = live_config(40);
        tuned.rotation_speed = 2.0;
        tuned.sensitivity = 1.5;
        session.handle().update(tuned.clone()).unwrap();

        let mut sink = CountingSink { frames: 0 };
        session.run(&mut sink).unwrap();

        assert_eq!(session.export_config(), tuned);
        assert_eq!(sink.frames, 3);
    }

    #[test]
    fn invalid_posted_config_is_rejected_and_ignored() {
        let session = LiveTuningSession::new(finite_source(1, 40), live_config(40)).unwrap();

        let mut bad = live_config(40);
        bad.fps = 0;
        assert!(session.handle().update(bad).is_err());
    }

    #[test]
    fn structural_config_change_rebuilds_the_analysis_chain() {
        let mut session =
            LiveTuningSession::new(finite_source(3, 40), live_config(40)).unwrap();

        let mut tuned = live_config(40);
        tuned.band_count = 32;
        session.handle().update(tuned).unwrap();

        let mut sink = CountingSink { frames: 0 };
        // Must not panic on mismatched band dimensions.
        session.run(&mut sink).unwrap();
        assert_eq!(session.export_config().band_count, 32);
    }

    #[test]
    fn single_overrun_drops_exactly_one_frame_and_continues() {
        // A generous frame period keeps unrelated render time from
        // registering as overruns on slow machines.
        let fps = 5;
        let period = Duration::from_secs_f64(1.0 / f64::from(fps));
        let mut session =
            LiveTuningSession::new(finite_source(6, fps), live_config(fps)).unwrap();

        let mut sink = SlowFirstWriteSink {
            stall: period * 3,
            stalled: false,
            frames: 0,
        };
        let stats = session.run(&mut sink).unwrap();

        assert_eq!(stats.frames_dropped, 1);
        // Every source block still rendered; only a schedule slot was lost.
        assert_eq!(stats.frames_rendered, 6);
        assert_eq!(session.state(), SessionState::Stopped);
    }
}
