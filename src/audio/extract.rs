use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::sync::FrameSyncEngine;

use super::source::SampleBlock;

const BAND_LOW_HZ: f32 = 20.0;
const BAND_HIGH_HZ: f32 = 20_000.0;

/// Per-frame visual features: one energy scalar per frequency band plus
/// the block's RMS amplitude. Band count is fixed for a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub frame_index: u64,
    pub bands: Vec<f32>,
    pub amplitude: f32,
}

impl FeatureVector {
    pub fn silent(frame_index: u64, band_count: usize) -> Self {
        Self {
            frame_index,
            bands: vec![0.0; band_count],
            amplitude: 0.0,
        }
    }
}

/// Converts one analysis window of samples into a `FeatureVector`.
///
/// Stateless per block: identical input and config produce identical
/// output, so offline extraction may fan out across threads.
pub struct FeatureExtractor {
    window_len: usize,
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    hann: Vec<f32>,
    /// `band_count + 1` FFT bin indices, strictly increasing.
    band_edges: Vec<usize>,
    freq_resolution: f32,
}

impl FeatureExtractor {
    pub fn new(config: &RenderConfig, sample_rate: u32) -> Self {
        let sync = FrameSyncEngine::new(sample_rate, config.fps);
        let window_len = sync.window_len();
        let fft_size = window_len.next_power_of_two().max(1024);

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        let freq_resolution = sample_rate as f32 / fft_size as f32;
        let band_edges = log_band_edges(config.band_count, sample_rate, fft_size);

        Self {
            window_len,
            fft_size,
            fft,
            hann: hann_window(window_len),
            band_edges,
            freq_resolution,
        }
    }

    /// Samples consumed per extraction; blocks shorter than this are
    /// rejected and must be zero-padded by the caller.
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn band_count(&self) -> usize {
        self.band_edges.len() - 1
    }

    /// Frequency range summarized by band `i`.
    pub fn band_range_hz(&self, i: usize) -> (f32, f32) {
        (
            self.band_edges[i] as f32 * self.freq_resolution,
            self.band_edges[i + 1] as f32 * self.freq_resolution,
        )
    }

    pub fn extract(&self, block: &SampleBlock, frame_index: u64) -> Result<FeatureVector> {
        let samples = block.samples();
        if samples.len() < self.window_len {
            return Err(Error::InsufficientSamples {
                got: samples.len(),
                needed: self.window_len,
            });
        }
        let samples = &samples[..self.window_len];

        let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); self.fft_size];
        for (i, (&s, &w)) in samples.iter().zip(self.hann.iter()).enumerate() {
            buffer[i] = Complex::new(s * w, 0.0);
        }
        self.fft.process(&mut buffer);

        let half = self.fft_size / 2;
        let magnitudes: Vec<f32> = buffer[..half].iter().map(|c| c.norm()).collect();

        let bands = self
            .band_edges
            .windows(2)
            .map(|edge| {
                let (lo, hi) = (edge[0], edge[1].min(half));
                if lo >= hi {
                    return 0.0;
                }
                let sum: f32 = magnitudes[lo..hi].iter().map(|&m| m * m).sum();
                (sum / (hi - lo) as f32).sqrt()
            })
            .collect();

        let amplitude =
            (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt();

        Ok(FeatureVector {
            frame_index,
            bands,
            amplitude,
        })
    }
}

/// Logarithmically spaced band boundaries over the audible range,
/// expressed as FFT bin indices. Adjacent edges are forced apart so
/// every band covers at least one bin.
fn log_band_edges(band_count: usize, sample_rate: u32, fft_size: usize) -> Vec<usize> {
    let freq_resolution = sample_rate as f32 / fft_size as f32;
    let half = fft_size / 2;
    let high = BAND_HIGH_HZ.min(sample_rate as f32 / 2.0);
    let ratio = high / BAND_LOW_HZ;

    let mut edges = Vec::with_capacity(band_count + 1);
    for i in 0..=band_count {
        let hz = BAND_LOW_HZ * ratio.powf(i as f32 / band_count as f32);
        let mut bin = (hz / freq_resolution).round() as usize;
        if let Some(&prev) = edges.last() {
            bin = bin.max(prev + 1);
        }
        edges.push(bin.min(half));
    }
    edges
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}
