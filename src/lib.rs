//! Turns an audio signal (file or live microphone) into a synchronized
//! visual animation, exported as video through ffmpeg or previewed live.
//!
//! The core is the audio-to-frame pipeline: `audio::source` produces
//! sample blocks, `audio::extract` turns each analysis window into a
//! feature vector, `audio::amplify` rescales it against recent history,
//! `sync` maps frame indices to exact sample windows, and `render` turns
//! features into RGBA frames. `pipeline` orchestrates offline renders;
//! `live` drives the same stages against a microphone with tunable
//! parameters that reproduce identically in a later offline render.

pub mod audio;
pub mod cli;
pub mod config;
pub mod encode;
pub mod error;
pub mod live;
pub mod pipeline;
pub mod render;
pub mod sync;
