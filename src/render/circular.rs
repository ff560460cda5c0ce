use crate::audio::extract::FeatureVector;
use crate::config::RenderConfig;

use super::canvas::{Canvas, Frame};
use super::{downsample, smooth_toward, Palette};

/// Two nested rings deformed by band energies: an outer ring in the
/// primary color and an inner ring punched out in the background color.
/// Both rotate independently at configurable speeds.
pub struct CircularRenderer {
    smoothed: Vec<f32>,
    rotation: f32,
    inner_rotation: f32,
    mapping: Vec<usize>,
    inner_mapping: Vec<usize>,
}

impl CircularRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        let segments = config.band_count * 2;
        let inner_segments = config.inner_band_count * 2;
        Self {
            smoothed: vec![0.0; config.band_count],
            rotation: 0.0,
            inner_rotation: 0.0,
            mapping: scatter_mapping(segments, config.band_count),
            inner_mapping: scatter_mapping(inner_segments, config.inner_band_count),
        }
    }

    pub fn render(&mut self, features: &FeatureVector, config: &RenderConfig) -> Frame {
        let palette = Palette::from_config(config);
        let (width, height) = config.resolution.dimensions();
        let mut canvas = Canvas::new(width, height, palette.background);

        self.rotation += config.rotation_speed.to_radians();
        self.inner_rotation += config.inner_rotation_speed.to_radians();

        let levels: Vec<f32> = features
            .bands
            .iter()
            .map(|&b| (b * config.sensitivity).clamp(0.0, 1.0))
            .collect();
        smooth_toward(&mut self.smoothed, &levels, config.smoothing_factor);

        let center = (width as f32 / 2.0, height as f32 / 2.0);
        let half_height = height as f32 / 2.0;

        let outer = deformed_ring(
            &self.smoothed,
            &self.mapping,
            center,
            half_height * config.min_radius,
            half_height * config.max_radius,
            self.rotation,
        );
        canvas.fill_polygon(&outer, palette.primary);
        canvas.stroke_polygon(&outer, palette.primary, 2);

        let inner_levels = downsample(&self.smoothed, config.inner_band_count);
        let inner = deformed_ring(
            &inner_levels,
            &self.inner_mapping,
            center,
            half_height * config.inner_min_radius,
            half_height * config.inner_max_radius,
            self.inner_rotation,
        );
        canvas.fill_polygon(&inner, palette.background);
        canvas.stroke_polygon(&inner, palette.background, 2);

        canvas.into_frame(features.frame_index)
    }
}

/// Polygon approximating a circle whose radius at each segment follows
/// the mapped band's magnitude.
fn deformed_ring(
    levels: &[f32],
    mapping: &[usize],
    center: (f32, f32),
    min_radius: f32,
    max_radius: f32,
    rotation: f32,
) -> Vec<(f32, f32)> {
    let segments = mapping.len();
    let angle_step = std::f32::consts::TAU / segments as f32;
    let radius_range = max_radius - min_radius;

    (0..segments)
        .map(|i| {
            let angle = i as f32 * angle_step + rotation;
            let magnitude = levels.get(mapping[i]).copied().unwrap_or(0.0);
            let radius = min_radius + magnitude * radius_range;
            (
                center.0 + radius * angle.cos(),
                center.1 + radius * angle.sin(),
            )
        })
        .collect()
}

/// Distributes band indices around the ring so neighboring segments pull
/// from distant bands. A fixed coprime-ish stride replaces a random
/// shuffle: the scatter looks similar but reproduces across runs.
fn scatter_mapping(segments: usize, bands: usize) -> Vec<usize> {
    let stride = bands / 2 + 1;
    (0..segments).map(|i| (i * stride) % bands).collect()
}
