//! Frame sources.
//!
//! The engine never decodes video itself; it seeks and reads frames through
//! [`FrameSource`] handles obtained from a [`FrameSourceOpener`].

mod ffmpeg;

pub use ffmpeg::{probe_source, FfmpegFrameSource, FfmpegOpener};

use std::path::Path;

use reframe_models::SourceInfo;

use crate::error::EngineResult;

/// A decoded RGB8 frame.
pub type Frame = image::RgbImage;

/// An open, seekable video stream owned by one segment computation.
pub trait FrameSource: Send {
    /// Frames per second of the video stream.
    fn fps(&self) -> f64;

    /// Frame size as `(width, height)`.
    fn dimensions(&self) -> (u32, u32);

    /// Stream duration in seconds.
    fn duration(&self) -> f64;

    /// Position the next read at `timestamp_secs`.
    fn seek(&mut self, timestamp_secs: f64) -> EngineResult<()>;

    /// Decode the frame at the current position.
    ///
    /// `Ok(None)` means end of stream. An `Err` is a failed read of this one
    /// frame; callers may seek elsewhere and continue.
    fn read_frame(&mut self) -> EngineResult<Option<Frame>>;

    /// Release the handle. Reads after close fail.
    fn close(&mut self) {}

    /// Stream properties as one value.
    fn info(&self) -> SourceInfo {
        let (width, height) = self.dimensions();
        SourceInfo {
            fps: self.fps(),
            width,
            height,
            duration: self.duration(),
        }
    }
}

/// Opens frame sources by path.
pub trait FrameSourceOpener: Send + Sync {
    /// Open `path`, failing with `EngineError::SourceUnavailable` if it cannot be decoded.
    fn open(&self, path: &Path) -> EngineResult<Box<dyn FrameSource>>;
}
