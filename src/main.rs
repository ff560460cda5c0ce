use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use voviz::audio::source::{MemorySource, MicSource, SampleSource};
use voviz::cli::{Cli, Command};
use voviz::config::{self, RenderConfig, Resolution, Theme, Visualizer};
use voviz::encode::ffmpeg::{FfmpegEncoder, FfplayPreview};
use voviz::error::Error;
use voviz::live::LiveTuningSession;
use voviz::pipeline::{FrameSink, RenderPipeline};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Generate {
            input,
            output,
            config,
            visualizer,
            theme,
            resolution,
            fps,
            bands,
        } => generate(
            &input, output, config, visualizer, theme, resolution, fps, bands,
        ),
        Command::Preview {
            input,
            visualizer,
            theme,
        } => preview(&input, visualizer, theme),
        Command::Live { theme, save_config } => live(theme, save_config),
        Command::Themes => {
            println!("Available themes:");
            println!("  professional   Clean, technical aesthetic");
            println!("  minimal        Simple white-on-black");
            Ok(())
        }
        Command::Visualizers => {
            println!("Available visualizers:");
            println!("  waveform   Scrolling amplitude envelope with level meter");
            println!("  spectrum   Frequency bars colored by band position");
            println!("  circular   Nested rings deformed by band energies");
            Ok(())
        }
    }
}

/// Resolves the effective config: theme defaults, then CLI flags, then a
/// config file overlay (explicit --config path or an auto-discovered
/// one). Fields present in the file win over flags.
fn build_config(
    theme: Option<Theme>,
    visualizer: Option<Visualizer>,
    resolution: Option<Resolution>,
    fps: Option<u32>,
    bands: Option<usize>,
    config_path: Option<PathBuf>,
) -> Result<RenderConfig> {
    let mut config = RenderConfig::for_theme(theme.unwrap_or(Theme::Professional));
    if let Some(v) = visualizer {
        config.visualizer = v;
    }
    if let Some(r) = resolution {
        config.resolution = r;
    }
    if let Some(fps) = fps {
        config.fps = fps;
    }
    if let Some(bands) = bands {
        config.band_count = bands;
    }

    if let Some(path) = config_path.or_else(config::discover_config_path) {
        let overlay = config::load_overlay(&path)?;
        overlay.apply(&mut config);
        log::info!("Loaded config from {}", path.display());
    }

    config.validate()?;
    Ok(config)
}

#[allow(clippy::too_many_arguments)]
fn generate(
    input: &Path,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
    visualizer: Option<Visualizer>,
    theme: Option<Theme>,
    resolution: Option<Resolution>,
    fps: Option<u32>,
    bands: Option<usize>,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    let output = output.unwrap_or_else(|| input.with_extension("mp4"));
    let config = build_config(theme, visualizer, resolution, fps, bands, config_path)?;

    log::info!("voviz - audio visualizer");
    log::info!("Input: {}", input.display());
    log::info!("Output: {}", output.display());
    log::info!(
        "Visualizer: {:?}, theme: {:?}, {}x{} @ {}fps",
        config.visualizer,
        config.theme,
        config.width(),
        config.height(),
        config.fps
    );

    log::info!("Decoding audio...");
    let mut source = MemorySource::from_file(input)?;

    let pipeline = RenderPipeline::new(config.clone())?;
    let total_frames = pipeline.frame_count(source.total_samples(), source.sample_rate());
    log::info!("Total frames: {}", total_frames);

    let mut encoder = FfmpegEncoder::new(
        &output,
        input,
        config.width(),
        config.height(),
        config.fps,
    )?;

    let pb = ProgressBar::new(total_frames);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")
            .unwrap()
            .progress_chars("=>-"),
    );

    pipeline
        .run(&mut source, &mut encoder, |n| pb.set_position(n))
        .context("rendering failed")?;

    pb.finish_with_message("Rendering complete");
    log::info!("Done! Output: {}", output.display());
    Ok(())
}

fn preview(
    input: &Path,
    visualizer: Option<Visualizer>,
    theme: Option<Theme>,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    let config = build_config(theme, visualizer, None, None, None, None)?;

    log::info!("Previewing: {}", input.display());
    let mut source = MemorySource::from_file(input)?;

    let pipeline = RenderPipeline::new(config.clone())?;
    let mut display = FfplayPreview::open(
        "voviz preview",
        config.width(),
        config.height(),
        config.fps,
    )?;

    // The display pipe applies backpressure at the configured frame
    // rate; a closed window surfaces as a sink error and just ends the
    // preview.
    match pipeline.run(&mut source, &mut display, |_| {}) {
        Ok(_) => {}
        Err(Error::Sink { .. }) => log::info!("Preview window closed"),
        Err(e) => return Err(e).context("preview failed"),
    }
    Ok(())
}

fn live(theme: Option<Theme>, save_config: Option<PathBuf>) -> Result<()> {
    let mut config = RenderConfig::for_theme(theme.unwrap_or(Theme::Minimal));
    config.visualizer = Visualizer::Circular;
    config.resolution = Resolution::Hd720;
    config.validate()?;

    log::info!("Live microphone mode, theme: {:?}", config.theme);
    log::info!("Close the display window to stop");

    let read_timeout = Duration::from_secs_f64(1.0 / f64::from(config.fps));
    let mic = MicSource::open_default(read_timeout)?;

    let mut session = LiveTuningSession::new(mic, config.clone())?;
    let mut display = FfplayPreview::open(
        "voviz live",
        config.width(),
        config.height(),
        config.fps,
    )?;

    let stats = match session.run(&mut display) {
        Ok(stats) => stats,
        Err(Error::Sink { .. }) => {
            log::info!("Display closed; stopping session");
            session.stats()
        }
        Err(e) => return Err(e).context("live session failed"),
    };
    display.finish()?;

    log::info!(
        "Session ended: {} frames rendered, {} dropped",
        stats.frames_rendered,
        stats.frames_dropped
    );

    if let Some(path) = save_config {
        session.export_config().save_json(&path)?;
        log::info!("Saved session config to {}", path.display());
    }
    Ok(())
}
