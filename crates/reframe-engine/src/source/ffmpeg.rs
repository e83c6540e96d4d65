//! FFmpeg CLI frame source.
//!
//! Probes the stream once with `ffprobe` and decodes one raw RGB frame per
//! read with `ffmpeg -ss`. Runs synchronously; call it from a blocking thread.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

use reframe_models::SourceInfo;

use super::{Frame, FrameSource, FrameSourceOpener};
use crate::error::{EngineError, EngineResult};

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

/// Probe a video file for stream properties.
pub fn probe_source(path: &Path) -> EngineResult<SourceInfo> {
    if !path.exists() {
        return Err(EngineError::source_unavailable(path, "file not found"));
    }

    let ffprobe = which::which("ffprobe").map_err(|_| EngineError::FfprobeNotFound)?;

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()?;

    if !output.status.success() {
        return Err(EngineError::FfprobeFailed {
            message: format!("ffprobe exited with {}", output.status),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(stdout: &[u8]) -> EngineResult<SourceInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| EngineError::decode_failed("No video stream found"))?;

    let width = video_stream.width.unwrap_or(0);
    let height = video_stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(EngineError::decode_failed(format!(
            "Video stream has invalid dimensions {}x{}",
            width, height
        )));
    }

    let fps = video_stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.avg_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    let duration = probe
        .format
        .duration
        .as_deref()
        .or(video_stream.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(SourceInfo {
        fps,
        width,
        height,
        duration,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
///
/// Returns `None` for zero or unparseable rates such as "0/0".
fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den <= 0.0 {
                return None;
            }
            num / den
        }
        None => s.parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Frame source that shells out to the FFmpeg CLI for every read.
#[derive(Debug)]
pub struct FfmpegFrameSource {
    path: PathBuf,
    ffmpeg: PathBuf,
    info: SourceInfo,
    position: f64,
    closed: bool,
}

/// Any failure to open a source surfaces as `SourceUnavailable`.
fn as_unavailable(path: &Path, err: EngineError) -> EngineError {
    match err {
        EngineError::SourceUnavailable { .. } => err,
        other => EngineError::source_unavailable(path, other.to_string()),
    }
}

impl FfmpegFrameSource {
    /// Probe `path` and prepare a source positioned at the start.
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let ffmpeg = which::which("ffmpeg")
            .map_err(|_| as_unavailable(path, EngineError::FfmpegNotFound))?;
        let info = probe_source(path).map_err(|e| as_unavailable(path, e))?;

        info!(
            path = %path.display(),
            fps = info.fps,
            width = info.width,
            height = info.height,
            duration = info.duration,
            "Opened frame source"
        );

        Ok(Self {
            path: path.to_path_buf(),
            ffmpeg,
            info,
            position: 0.0,
            closed: false,
        })
    }

    fn frame_len(&self) -> usize {
        self.info.width as usize * self.info.height as usize * 3
    }
}

impl FrameSource for FfmpegFrameSource {
    fn fps(&self) -> f64 {
        self.info.fps
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    fn duration(&self) -> f64 {
        self.info.duration
    }

    fn seek(&mut self, timestamp_secs: f64) -> EngineResult<()> {
        if !timestamp_secs.is_finite() || timestamp_secs < 0.0 {
            return Err(EngineError::decode_failed(format!(
                "Invalid seek position {}",
                timestamp_secs
            )));
        }
        self.position = timestamp_secs;
        Ok(())
    }

    fn read_frame(&mut self) -> EngineResult<Option<Frame>> {
        if self.closed {
            return Err(EngineError::internal("Frame source is closed"));
        }
        if self.info.duration > 0.0 && self.position >= self.info.duration {
            return Ok(None);
        }

        let output = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-ss", &format!("{:.3}", self.position), "-i"])
            .arg(&self.path)
            .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .output()?;

        if !output.status.success() {
            return Err(EngineError::decode_failed(format!(
                "ffmpeg failed at {:.3}s: {}",
                self.position,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let expected = self.frame_len();
        if output.stdout.len() < expected {
            debug!(
                position = self.position,
                bytes = output.stdout.len(),
                "Short frame read, treating as end of stream"
            );
            return Ok(None);
        }

        let mut data = output.stdout;
        data.truncate(expected);
        let frame = Frame::from_raw(self.info.width, self.info.height, data)
            .ok_or_else(|| EngineError::internal("Failed to create image buffer"))?;

        self.position += 1.0 / self.info.fps;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Opens [`FfmpegFrameSource`] handles.
#[derive(Debug, Clone, Default)]
pub struct FfmpegOpener;

impl FrameSourceOpener for FfmpegOpener {
    fn open(&self, path: &Path) -> EngineResult<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegFrameSource::open(path)?))
    }
}
