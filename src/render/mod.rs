pub mod canvas;
pub mod circular;
pub mod spectrum;
pub mod waveform;

pub use canvas::{Canvas, Frame};

use crate::audio::extract::FeatureVector;
use crate::config::{parse_hex_color, RenderConfig, Visualizer};

use canvas::Color;
use circular::CircularRenderer;
use spectrum::SpectrumRenderer;
use waveform::WaveformRenderer;

/// Theme colors resolved from the config's hex fields.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub background: Color,
    pub primary: Color,
    pub secondary: Color,
    pub accent: Color,
    pub gradient: bool,
}

impl Palette {
    /// The config is validated before any rendering starts, so the hex
    /// fields are known-parseable here.
    pub fn from_config(config: &RenderConfig) -> Self {
        let color = |value: &str| parse_hex_color(value).unwrap_or([0, 0, 0, 255]);
        Self {
            background: color(&config.background),
            primary: color(&config.primary),
            secondary: color(&config.secondary),
            accent: color(&config.accent),
            gradient: config.gradient,
        }
    }
}

/// The closed set of visualizer implementations, selected once per
/// session from the configuration.
///
/// Rendering is a pure function of `(FeatureVector, RenderConfig)` apart
/// from each renderer's frame-to-frame easing buffers, which follow the
/// same strict sequential-order contract as the amplifier.
pub enum VisualRenderer {
    Waveform(WaveformRenderer),
    Spectrum(SpectrumRenderer),
    Circular(CircularRenderer),
}

impl VisualRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        match config.visualizer {
            Visualizer::Waveform => Self::Waveform(WaveformRenderer::new(config)),
            Visualizer::Spectrum => Self::Spectrum(SpectrumRenderer::new(config)),
            Visualizer::Circular => Self::Circular(CircularRenderer::new(config)),
        }
    }

    pub fn render(&mut self, features: &FeatureVector, config: &RenderConfig) -> Frame {
        match self {
            Self::Waveform(r) => r.render(features, config),
            Self::Spectrum(r) => r.render(features, config),
            Self::Circular(r) => r.render(features, config),
        }
    }
}

/// Mean-pools `values` down to `n` buckets. Used to derive the inner
/// ring's coarser band set from the full feature vector.
pub(crate) fn downsample(values: &[f32], n: usize) -> Vec<f32> {
    if values.len() <= n {
        return values.to_vec();
    }
    let bin_size = values.len() / n;
    (0..n)
        .map(|i| {
            let start = i * bin_size;
            let end = ((i + 1) * bin_size).min(values.len());
            values[start..end].iter().sum::<f32>() / (end - start) as f32
        })
        .collect()
}

/// One-frame exponential smoothing against the previous frame's values,
/// with a floor snap so decayed bars settle at zero instead of hovering.
pub(crate) fn smooth_toward(previous: &mut Vec<f32>, current: &[f32], smoothing: f32) {
    if previous.len() != current.len() {
        *previous = current.to_vec();
        return;
    }
    const NOISE_FLOOR: f32 = 0.01;
    for (prev, &cur) in previous.iter_mut().zip(current.iter()) {
        let mut value = smoothing * *prev + (1.0 - smoothing) * cur;
        if value < NOISE_FLOOR {
            value = 0.0;
        }
        *prev = value.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Resolution, Theme};

    fn features(bands: &[f32], amplitude: f32) -> FeatureVector {
        FeatureVector {
            frame_index: 0,
            bands: bands.to_vec(),
            amplitude,
        }
    }

    fn small_config(visualizer: Visualizer) -> RenderConfig {
        let mut config = RenderConfig::for_theme(Theme::Professional);
        config.visualizer = visualizer;
        config.resolution = Resolution::Hd720;
        config.band_count = 16;
        config.inner_band_count = 8;
        config
    }

    #[test]
    fn every_variant_renders_exact_resolution() {
        for visualizer in [Visualizer::Waveform, Visualizer::Spectrum, Visualizer::Circular] {
            let config = small_config(visualizer);
            let mut renderer = VisualRenderer::new(&config);
            let frame = renderer.render(&features(&[0.5; 16], 0.5), &config);
            assert_eq!(frame.width, 1280);
            assert_eq!(frame.height, 720);
            assert_eq!(frame.pixels.len(), 1280 * 720 * 4);
        }
    }

    #[test]
    fn non_silent_features_produce_non_degenerate_images() {
        for visualizer in [Visualizer::Waveform, Visualizer::Spectrum, Visualizer::Circular] {
            let config = small_config(visualizer);
            let mut renderer = VisualRenderer::new(&config);
            // Warm up the easing buffers, then check the steady frame.
            let mut frame = renderer.render(&features(&[0.8; 16], 0.8), &config);
            for index in 1..5u64 {
                let mut f = features(&[0.8; 16], 0.8);
                f.frame_index = index;
                frame = renderer.render(&f, &config);
            }

            let background = parse_hex_color(&config.background).unwrap();
            let foreground = frame
                .pixels
                .chunks_exact(4)
                .filter(|px| *px != background)
                .count();
            assert!(
                foreground > 100,
                "{:?} rendered an (almost) empty frame: {} foreground pixels",
                visualizer,
                foreground
            );
        }
    }

    #[test]
    fn downsample_mean_pools() {
        let values = [1.0, 1.0, 3.0, 3.0];
        assert_eq!(downsample(&values, 2), vec![1.0, 3.0]);
        assert_eq!(downsample(&values, 8), values.to_vec());
    }

    #[test]
    fn smoothing_tracks_and_settles_to_zero() {
        let mut previous = vec![1.0];
        for _ in 0..200 {
            smooth_toward(&mut previous, &[0.0], 0.8);
        }
        assert_eq!(previous[0], 0.0);

        let mut previous = vec![0.0];
        smooth_toward(&mut previous, &[1.0], 0.8);
        assert!(previous[0] > 0.1 && previous[0] < 1.0);
    }
}
