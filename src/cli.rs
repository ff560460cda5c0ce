use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Resolution, Theme, Visualizer};

#[derive(Parser, Debug)]
#[command(name = "voviz", about = "Audio visualizer video generator", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a visualization video from an audio file
    Generate {
        /// Input audio file (WAV, MP3, FLAC, OGG, AAC)
        input: PathBuf,

        /// Output video file (defaults to the input name with .mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Config file (.json or .toml); fields present in it override
        /// the other flags
        #[arg(long)]
        config: Option<PathBuf>,

        /// Visualizer variant
        #[arg(short, long, value_enum)]
        visualizer: Option<Visualizer>,

        /// Visual theme
        #[arg(short, long, value_enum)]
        theme: Option<Theme>,

        /// Output resolution
        #[arg(short, long, value_enum)]
        resolution: Option<Resolution>,

        /// Frames per second
        #[arg(long)]
        fps: Option<u32>,

        /// Number of frequency bands
        #[arg(long)]
        bands: Option<usize>,
    },

    /// Play a visualization of an audio file in real time
    Preview {
        /// Input audio file
        input: PathBuf,

        /// Visualizer variant
        #[arg(short, long, value_enum)]
        visualizer: Option<Visualizer>,

        /// Visual theme
        #[arg(short, long, value_enum)]
        theme: Option<Theme>,
    },

    /// Visualize the default microphone with live-tunable parameters
    Live {
        /// Visual theme
        #[arg(short, long, value_enum)]
        theme: Option<Theme>,

        /// Write the session's final configuration to this file on exit
        #[arg(long)]
        save_config: Option<PathBuf>,
    },

    /// List available themes
    Themes,

    /// List available visualizers
    Visualizers,
}
