use std::collections::VecDeque;

use crate::audio::extract::FeatureVector;
use crate::config::RenderConfig;

use super::canvas::{Canvas, Color, Frame};
use super::Palette;

const METER_RED: Color = [255, 64, 64, 255];
const METER_ORANGE: Color = [255, 165, 0, 255];

/// Scrolling amplitude envelope mirrored around the center line, with a
/// level meter at the right edge. Renders the amplitude scalar directly
/// and ignores the per-band decomposition.
pub struct WaveformRenderer {
    history: VecDeque<f32>,
    capacity: usize,
}

impl WaveformRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        let capacity = (config.width() / 4).max(2) as usize;
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn render(&mut self, features: &FeatureVector, config: &RenderConfig) -> Frame {
        let palette = Palette::from_config(config);
        let (width, height) = config.resolution.dimensions();
        let mut canvas = Canvas::new(width, height, palette.background);

        let level = (features.amplitude * config.sensitivity).clamp(0.0, 1.0);
        self.history.push_back(level);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }

        let center_y = height as f32 / 2.0;
        let max_amplitude = height as f32 * 0.4;

        canvas.draw_line(
            0.0,
            center_y,
            width as f32,
            center_y,
            palette.secondary,
            1,
        );

        if self.history.len() > 1 {
            let x_step = width as f32 / (self.history.len() - 1) as f32;
            let points: Vec<(f32, f32)> = self
                .history
                .iter()
                .enumerate()
                .map(|(i, &amp)| (i as f32 * x_step, amp * max_amplitude))
                .collect();

            for pair in points.windows(2) {
                let (x0, d0) = pair[0];
                let (x1, d1) = pair[1];
                // Upper trace and its mirror below the center line.
                canvas.draw_line(x0, center_y - d0, x1, center_y - d1, palette.primary, 2);
                canvas.draw_line(x0, center_y + d0, x1, center_y + d1, palette.primary, 2);
            }
        }

        self.draw_level_meter(&mut canvas, level, &palette, width, height);

        canvas.into_frame(features.frame_index)
    }

    fn draw_level_meter(
        &self,
        canvas: &mut Canvas,
        level: f32,
        palette: &Palette,
        width: u32,
        height: u32,
    ) {
        let meter_x = width as i32 - 30;
        let meter_top = (height as f32 * 0.1) as i32;
        let meter_bottom = (height as f32 * 0.9) as i32;
        let meter_height = meter_bottom - meter_top;

        canvas.stroke_rect(meter_x, meter_top, meter_x + 20, meter_bottom, palette.secondary);

        let level_height = (level * meter_height as f32) as i32;
        if level_height <= 0 {
            return;
        }

        let color = if level > 0.8 {
            METER_RED
        } else if level > 0.5 {
            METER_ORANGE
        } else {
            palette.primary
        };
        canvas.fill_rect(
            meter_x + 2,
            meter_bottom - level_height,
            meter_x + 18,
            meter_bottom,
            color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Resolution, Theme, Visualizer};

    fn config() -> RenderConfig {
        let mut config = RenderConfig::for_theme(Theme::Minimal);
        config.visualizer = Visualizer::Waveform;
        config.resolution = Resolution::Hd720;
        config
    }

    fn features(index: u64, amplitude: f32) -> FeatureVector {
        FeatureVector {
            frame_index: index,
            bands: vec![0.0; 64],
            amplitude,
        }
    }

    #[test]
    fn history_is_bounded_by_capacity() {
        let config = config();
        let mut renderer = WaveformRenderer::new(&config);
        for i in 0..(renderer.capacity as u64 + 50) {
            renderer.render(&features(i, 0.3), &config);
        }
        assert_eq!(renderer.history.len(), renderer.capacity);
    }

    #[test]
    fn frame_carries_its_index() {
        let config = config();
        let mut renderer = WaveformRenderer::new(&config);
        let frame = renderer.render(&features(41, 0.3), &config);
        assert_eq!(frame.index, 41);
    }

    #[test]
    fn louder_input_paints_more_foreground() {
        let config = config();
        let background = crate::config::parse_hex_color(&config.background).unwrap();
        let count_foreground = |frame: &Frame| {
            frame
                .pixels
                .chunks_exact(4)
                .filter(|px| *px != background)
                .count()
        };

        let mut quiet_renderer = WaveformRenderer::new(&config);
        let mut loud_renderer = WaveformRenderer::new(&config);
        let mut quiet_frame = None;
        let mut loud_frame = None;
        for i in 0..20 {
            quiet_frame = Some(quiet_renderer.render(&features(i, 0.05), &config));
            loud_frame = Some(loud_renderer.render(&features(i, 0.9), &config));
        }

        assert!(count_foreground(&loud_frame.unwrap()) > count_foreground(&quiet_frame.unwrap()));
    }
}
