use crate::audio::extract::FeatureVector;
use crate::config::RenderConfig;

use super::canvas::{interpolate_color, scale_color, Canvas, Color, Frame};
use super::{smooth_toward, Palette};

const GLOW_THRESHOLD: f32 = 0.7;
const GLOW_RADIUS: i32 = 3;

/// Frequency bars rising from the bottom edge, colored by band position.
pub struct SpectrumRenderer {
    heights: Vec<f32>,
}

impl SpectrumRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            heights: vec![0.0; config.band_count],
        }
    }

    pub fn render(&mut self, features: &FeatureVector, config: &RenderConfig) -> Frame {
        let palette = Palette::from_config(config);
        let (width, height) = config.resolution.dimensions();
        let mut canvas = Canvas::new(width, height, palette.background);

        let levels: Vec<f32> = features
            .bands
            .iter()
            .map(|&b| (b * config.sensitivity).clamp(0.0, 1.0))
            .collect();
        smooth_toward(&mut self.heights, &levels, config.smoothing_factor);

        let n = self.heights.len();
        let margin = width as f32 * 0.1;
        let spacing = 2.0;
        let bar_width =
            ((width as f32 - 2.0 * margin - (n - 1) as f32 * spacing) / n as f32).max(1.0);
        let max_bar_height = height as f32 * 0.8;
        let base_y = (height as f32 * 0.9) as i32;

        for (i, &magnitude) in self.heights.iter().enumerate() {
            let bar_height = (magnitude * max_bar_height) as i32;
            if bar_height < 1 {
                continue;
            }

            let x = (margin + i as f32 * (bar_width + spacing)) as i32;
            let x_end = x + bar_width as i32;
            let y_top = base_y - bar_height;

            let color = bar_color(i, magnitude, n, &palette);

            if palette.gradient {
                // Full color at the base fading toward dark at the tip.
                let dark = scale_color(color, 0.2);
                for y in y_top..base_y {
                    let factor = (base_y - y) as f32 / bar_height as f32;
                    let row_color = interpolate_color(color, dark, factor);
                    for px in x..x_end {
                        canvas.set_pixel(px, y, row_color);
                    }
                }
            } else {
                canvas.fill_rect(x, y_top, x_end, base_y, color);
            }

            if magnitude > GLOW_THRESHOLD {
                add_glow(&mut canvas, x, y_top, x_end, base_y, color);
            }
        }

        canvas.into_frame(features.frame_index)
    }
}

/// Low bands take the primary color, mids the secondary, highs the
/// accent; brightness tracks magnitude with a 30% floor.
fn bar_color(index: usize, magnitude: f32, total: usize, palette: &Palette) -> Color {
    let freq_ratio = index as f32 / (total - 1).max(1) as f32;
    let base = if freq_ratio < 0.33 {
        palette.primary
    } else if freq_ratio < 0.66 {
        palette.secondary
    } else {
        palette.accent
    };
    scale_color(base, 0.3 + 0.7 * magnitude)
}

fn add_glow(canvas: &mut Canvas, x0: i32, y0: i32, x1: i32, y1: i32, color: Color) {
    let glow = scale_color(color, 0.5);
    for radius in 1..=GLOW_RADIUS {
        let alpha = 0.3 / radius as f32;
        for x in (x0 - radius)..(x1 + radius) {
            canvas.blend_pixel(x, y0 - radius, glow, alpha);
            canvas.blend_pixel(x, y1 + radius - 1, glow, alpha);
        }
        for y in (y0 - radius)..(y1 + radius) {
            canvas.blend_pixel(x0 - radius, y, glow, alpha);
            canvas.blend_pixel(x1 + radius - 1, y, glow, alpha);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Resolution, Theme, Visualizer};

    fn config() -> RenderConfig {
        let mut config = RenderConfig::for_theme(Theme::Professional);
        config.visualizer = Visualizer::Spectrum;
        config.resolution = Resolution::Hd720;
        config.band_count = 8;
        config
    }

    #[test]
    fn silent_features_leave_the_background_untouched() {
        let config = config();
        let mut renderer = SpectrumRenderer::new(&config);
        let features = FeatureVector::silent(0, 8);
        let frame = renderer.render(&features, &config);

        let background = crate::config::parse_hex_color(&config.background).unwrap();
        assert!(frame.pixels.chunks_exact(4).all(|px| px == background));
    }

    #[test]
    fn bar_heights_ease_frame_over_frame() {
        let config = config();
        let mut renderer = SpectrumRenderer::new(&config);
        let loud = FeatureVector {
            frame_index: 0,
            bands: vec![1.0; 8],
            amplitude: 1.0,
        };
        renderer.render(&loud, &config);
        let after_one = renderer.heights.clone();

        renderer.render(&loud, &config);
        let after_two = renderer.heights.clone();

        // Smoothing approaches the level monotonically from below.
        assert!(after_one[0] > 0.0 && after_one[0] < 1.0);
        assert!(after_two[0] > after_one[0]);
    }

    #[test]
    fn color_ramp_follows_band_position() {
        let palette = Palette::from_config(&config());
        assert_eq!(bar_color(0, 1.0, 8, &palette), palette.primary);
        assert_eq!(bar_color(7, 1.0, 8, &palette), palette.accent);
    }
}
