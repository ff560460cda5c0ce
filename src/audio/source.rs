use std::collections::VecDeque;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;

use super::decode;
use crate::error::{Error, Result};

/// A fixed run of mono samples cut from the stream. Immutable once
/// produced; `start_sample` positions it on the source's sample clock.
#[derive(Debug, Clone)]
pub struct SampleBlock {
    samples: Vec<f32>,
    start_sample: u64,
    sample_rate: u32,
}

impl SampleBlock {
    pub fn new(samples: Vec<f32>, start_sample: u64, sample_rate: u32) -> Self {
        Self {
            samples,
            start_sample,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn start_sample(&self) -> u64 {
        self.start_sample
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Copy extended with trailing zeros up to `len`. Used for the final
    /// short block of a finite source before feature extraction.
    pub fn zero_padded(&self, len: usize) -> SampleBlock {
        let mut samples = self.samples.clone();
        samples.resize(len.max(samples.len()), 0.0);
        SampleBlock {
            samples,
            start_sample: self.start_sample,
            sample_rate: self.sample_rate,
        }
    }
}

pub enum NextBlock {
    Block(SampleBlock),
    /// Live source had no data within its read timeout; the caller keeps
    /// pacing with the most recent features instead of blocking.
    Pending,
    EndOfStream,
}

/// Produces fixed-size sample blocks at a fixed rate. Finite sources end
/// with `EndOfStream`; live sources may interleave `Pending`.
pub trait SampleSource {
    fn sample_rate(&self) -> u32;
    fn next_block(&mut self, n_samples: usize) -> Result<NextBlock>;
}

/// Finite source over an in-memory sample buffer (decoded file audio, or
/// synthetic test signals).
pub struct MemorySource {
    samples: Vec<f32>,
    sample_rate: u32,
    cursor: usize,
}

impl MemorySource {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            cursor: 0,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let audio = decode::decode_audio(path)?;
        Ok(Self::new(audio.samples, audio.sample_rate))
    }

    pub fn total_samples(&self) -> u64 {
        self.samples.len() as u64
    }
}

impl SampleSource for MemorySource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_block(&mut self, n_samples: usize) -> Result<NextBlock> {
        if self.cursor >= self.samples.len() {
            return Ok(NextBlock::EndOfStream);
        }
        let start = self.cursor;
        let end = (start + n_samples).min(self.samples.len());
        self.cursor = end;
        Ok(NextBlock::Block(SampleBlock::new(
            self.samples[start..end].to_vec(),
            start as u64,
            self.sample_rate,
        )))
    }
}

/// Unbounded live source reading the default input device through cpal.
/// The stream callback forwards mono-downmixed chunks over a channel;
/// `next_block` reassembles them into fixed-size blocks.
pub struct MicSource {
    sample_rate: u32,
    rx: Receiver<Vec<f32>>,
    buffer: VecDeque<f32>,
    consumed: u64,
    read_timeout: Duration,
    _stream: cpal::Stream,
}

impl MicSource {
    pub fn open_default(read_timeout: Duration) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::source_msg("no default input device available"))?;

        let supported = device
            .default_input_config()
            .map_err(|e| Error::source_with("failed to query input device config", e))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        log::info!(
            "Microphone: {} @ {}Hz, {} channel(s), {:?}",
            device.name().unwrap_or_else(|_| "unknown".into()),
            sample_rate,
            channels,
            sample_format
        );

        let (tx, rx) = mpsc::channel::<Vec<f32>>();
        let err_fn = |e| log::warn!("Input stream error: {}", e);

        let stream = match sample_format {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(downmix(data, channels));
                },
                err_fn,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let floats: Vec<f32> =
                        data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                    let _ = tx.send(downmix(&floats, channels));
                },
                err_fn,
                None,
            ),
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    let floats: Vec<f32> = data
                        .iter()
                        .map(|&s| (f32::from(s) - 32768.0) / 32768.0)
                        .collect();
                    let _ = tx.send(downmix(&floats, channels));
                },
                err_fn,
                None,
            ),
            other => {
                return Err(Error::source_msg(format!(
                    "unsupported input sample format {:?}",
                    other
                )))
            }
        }
        .map_err(|e| Error::source_with("failed to open input stream", e))?;

        stream
            .play()
            .map_err(|e| Error::source_with("failed to start input stream", e))?;

        Ok(Self {
            sample_rate,
            rx,
            buffer: VecDeque::new(),
            consumed: 0,
            read_timeout,
            _stream: stream,
        })
    }
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

impl SampleSource for MicSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_block(&mut self, n_samples: usize) -> Result<NextBlock> {
        let deadline = std::time::Instant::now() + self.read_timeout;
        while self.buffer.len() < n_samples {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(chunk) => self.buffer.extend(chunk),
                Err(RecvTimeoutError::Timeout) => return Ok(NextBlock::Pending),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::source_msg("microphone stream terminated"))
                }
            }
        }

        let samples: Vec<f32> = self.buffer.drain(..n_samples).collect();
        let start_sample = self.consumed;
        self.consumed += n_samples as u64;
        Ok(NextBlock::Block(SampleBlock::new(
            samples,
            start_sample,
            self.sample_rate,
        )))
    }
}
