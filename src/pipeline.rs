use rayon::prelude::*;

use crate::audio::amplify::AdaptiveAmplifier;
use crate::audio::extract::{FeatureExtractor, FeatureVector};
use crate::audio::source::{NextBlock, SampleBlock, SampleSource};
use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::render::{Frame, VisualRenderer};
use crate::sync::FrameSyncEngine;

/// Frames are extracted in batches of this many windows; extraction fans
/// out across threads while amplification and rendering stay sequential.
const EXTRACT_BATCH: usize = 64;

/// Receives rendered frames in strictly increasing index order.
pub trait FrameSink {
    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close. Called once after the final frame.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct RenderStats {
    pub frames_written: u64,
}

/// Drives a finite source through extraction, amplification and
/// rendering to completion. Total frame count is a pure function of the
/// audio duration and configured frame rate; no frame is ever skipped
/// or reordered in this mode.
pub struct RenderPipeline {
    config: RenderConfig,
}

impl RenderPipeline {
    pub fn new(config: RenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Expected frame count for a source of `total_samples`.
    pub fn frame_count(&self, total_samples: u64, sample_rate: u32) -> u64 {
        FrameSyncEngine::new(sample_rate, self.config.fps).frame_count(total_samples)
    }

    pub fn run<S, K>(
        &self,
        source: &mut S,
        sink: &mut K,
        mut on_frame: impl FnMut(u64),
    ) -> Result<RenderStats>
    where
        S: SampleSource,
        K: FrameSink,
    {
        let sample_rate = source.sample_rate();
        let sync = FrameSyncEngine::new(sample_rate, self.config.fps);
        let extractor = FeatureExtractor::new(&self.config, sample_rate);
        let mut amplifier = AdaptiveAmplifier::new(&self.config);
        let mut renderer = VisualRenderer::new(&self.config);

        let window_len = extractor.window_len();
        let mut next_frame: u64 = 0;
        let mut stats = RenderStats::default();

        'frames: loop {
            // Gather a batch of analysis windows. The final block of a
            // finite source may come up short; it is zero-padded rather
            // than dropped so every sample contributes to a frame.
            let mut batch: Vec<(u64, SampleBlock)> = Vec::with_capacity(EXTRACT_BATCH);
            while batch.len() < EXTRACT_BATCH {
                let frame = next_frame + batch.len() as u64;
                let window = sync.window(frame);
                let wanted = (window.end - window.start) as usize;
                match source.next_block(wanted)? {
                    NextBlock::Block(block) => {
                        let block = if block.len() < window_len {
                            block.zero_padded(window_len)
                        } else {
                            block
                        };
                        batch.push((frame, block));
                    }
                    NextBlock::EndOfStream => break,
                    NextBlock::Pending => {
                        return Err(Error::source_msg(
                            "offline pipeline requires a finite source",
                        ));
                    }
                }
            }
            if batch.is_empty() {
                break 'frames;
            }

            // Fork-join extraction; order is preserved by the indexed
            // collect, so the sequential stages below still observe
            // frames in logical order.
            let extracted: Vec<FeatureVector> = batch
                .par_iter()
                .map(|(frame, block)| extractor.extract(block, *frame))
                .collect::<Result<_>>()?;

            for mut features in extracted {
                amplifier.process(&mut features);
                let frame = renderer.render(&features, &self.config);
                sink.write(&frame)?;
                stats.frames_written += 1;
                on_frame(stats.frames_written);
            }
            next_frame += batch.len() as u64;
        }

        sink.finish()?;
        log::info!("Pipeline complete: {} frames", stats.frames_written);
        Ok(stats)
    }
}
