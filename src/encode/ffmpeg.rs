use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use crate::error::{Error, Result};
use crate::pipeline::FrameSink;
use crate::render::Frame;

const VIDEO_CODEC: &str = "libx264";
const PIX_FMT: &str = "yuv420p";
const CRF: u32 = 18;

/// Pipes raw RGBA frames into an ffmpeg process that encodes them and
/// muxes the original audio track alongside.
pub struct FfmpegEncoder {
    child: Option<Child>,
}

impl FfmpegEncoder {
    pub fn new(
        output_path: &Path,
        input_audio: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Self> {
        let args = [
            "-y".to_string(),
            "-f".into(), "rawvideo".into(),
            "-pixel_format".into(), "rgba".into(),
            "-video_size".into(), format!("{}x{}", width, height),
            "-framerate".into(), fps.to_string(),
            "-i".into(), "pipe:0".into(),
            "-i".into(), input_audio.display().to_string(),
            "-c:v".into(), VIDEO_CODEC.into(),
            "-pix_fmt".into(), PIX_FMT.into(),
            "-crf".into(), CRF.to_string(),
            "-preset".into(), "medium".into(),
            "-c:a".into(), "aac".into(),
            "-b:a".into(), "192k".into(),
            "-shortest".into(),
            output_path.display().to_string(),
        ];

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::sink_with("failed to spawn ffmpeg (is it installed?)", e))?;

        log::info!("FFmpeg encoder started: {}x{} @ {}fps", width, height, fps);

        Ok(Self { child: Some(child) })
    }
}

impl FrameSink for FfmpegEncoder {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| Error::sink_msg("encoder already finished"))?;
        let stdin = child
            .stdin
            .as_mut()
            .ok_or_else(|| Error::sink_msg("ffmpeg stdin not available"))?;
        stdin
            .write_all(&frame.pixels)
            .map_err(|e| Error::sink_with("failed to write frame to ffmpeg", e))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        // Close stdin to signal EOF
        drop(child.stdin.take());

        let output = child
            .wait_with_output()
            .map_err(|e| Error::sink_with("failed to wait for ffmpeg", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::sink_msg(format!(
                "ffmpeg exited with error:\n{}",
                stderr
            )));
        }

        log::info!("FFmpeg encoding complete");
        Ok(())
    }
}

/// Displays raw RGBA frames in an ffplay window. Backpressure on the
/// pipe paces the writer at the configured frame rate, so this doubles
/// as the preview and live-mode display sink.
pub struct FfplayPreview {
    child: Option<Child>,
}

impl FfplayPreview {
    pub fn open(title: &str, width: u32, height: u32, fps: u32) -> Result<Self> {
        let args = [
            "-f".to_string(), "rawvideo".into(),
            "-pixel_format".into(), "rgba".into(),
            "-video_size".into(), format!("{}x{}", width, height),
            "-framerate".into(), fps.to_string(),
            "-window_title".into(), title.into(),
            "-autoexit".into(),
            "-i".into(), "pipe:0".into(),
        ];

        let child = Command::new("ffplay")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::sink_with("failed to spawn ffplay (is it installed?)", e))?;

        log::info!("FFplay preview started: {}x{} @ {}fps", width, height, fps);

        Ok(Self { child: Some(child) })
    }
}

impl FrameSink for FfplayPreview {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| Error::sink_msg("preview already closed"))?;
        let stdin = child
            .stdin
            .as_mut()
            .ok_or_else(|| Error::sink_msg("ffplay stdin not available"))?;
        stdin
            .write_all(&frame.pixels)
            .map_err(|e| Error::sink_with("preview window closed", e))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        drop(child.stdin.take());
        let _ = child.wait();
        Ok(())
    }
}
