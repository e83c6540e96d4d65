//! Synthetic frame sources and scripted detection backends.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use image::Rgb;

use reframe_engine::{
    DetectionBackend, EngineError, EngineResult, Frame, FrameSource, FrameSourceOpener,
    ProgressSink,
};
use reframe_models::DetectedRegion;

/// In-memory source whose frames carry their own index in the first pixel.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// Frames that exist; reads at or past this index are end of stream
    pub frame_count: usize,
    /// Frame indices whose reads fail
    pub failing: HashSet<usize>,
    position: usize,
    closed: bool,
}

impl SyntheticSource {
    pub fn new(fps: f64, width: u32, height: u32, frame_count: usize) -> Self {
        Self {
            fps,
            width,
            height,
            frame_count,
            failing: HashSet::new(),
            position: 0,
            closed: false,
        }
    }

    pub fn failing_at(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.failing.extend(indices);
        self
    }
}

/// Frame index encoded by [`SyntheticSource`].
pub fn frame_index(frame: &Frame) -> usize {
    let px = frame.get_pixel(0, 0);
    px[0] as usize + ((px[1] as usize) << 8)
}

impl FrameSource for SyntheticSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn duration(&self) -> f64 {
        self.frame_count as f64 / self.fps
    }

    fn seek(&mut self, timestamp_secs: f64) -> EngineResult<()> {
        self.position = (timestamp_secs * self.fps + 1e-6).floor() as usize;
        Ok(())
    }

    fn read_frame(&mut self) -> EngineResult<Option<Frame>> {
        if self.closed {
            return Err(EngineError::internal("closed"));
        }
        let index = self.position;
        if index >= self.frame_count {
            return Ok(None);
        }
        self.position += 1;
        if self.failing.contains(&index) {
            return Err(EngineError::decode_failed(format!("frame {} is corrupt", index)));
        }

        let lo = (index & 0xff) as u8;
        let hi = ((index >> 8) & 0xff) as u8;
        Ok(Some(Frame::from_pixel(self.width, self.height, Rgb([lo, hi, 0]))))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Opener handing out clones of one synthetic source.
pub struct SyntheticOpener(pub SyntheticSource);

impl FrameSourceOpener for SyntheticOpener {
    fn open(&self, _path: &Path) -> EngineResult<Box<dyn FrameSource>> {
        Ok(Box::new(self.0.clone()))
    }
}

/// Opener that can never open anything.
pub struct MissingOpener;

impl FrameSourceOpener for MissingOpener {
    fn open(&self, path: &Path) -> EngineResult<Box<dyn FrameSource>> {
        Err(EngineError::source_unavailable(path, "cannot decode"))
    }
}

type Script = dyn Fn(usize) -> Vec<DetectedRegion> + Send + Sync;

/// Backend that answers from a function of the frame index.
pub struct ScriptedBackend {
    script: Box<Script>,
}

impl ScriptedBackend {
    pub fn new(script: impl Fn(usize) -> Vec<DetectedRegion> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
        }
    }

    /// One confident square region centered on `(cx, cy)` in every frame.
    pub fn fixed_subject(cx: f64, cy: f64) -> Self {
        Self::new(move |_| vec![square(cx, cy, 0.9)])
    }
}

impl DetectionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn detect(&self, frame: &Frame) -> EngineResult<Vec<DetectedRegion>> {
        Ok((self.script)(frame_index(frame)))
    }
}

/// 120x120 region centered on `(cx, cy)`.
pub fn square(cx: f64, cy: f64, confidence: f64) -> DetectedRegion {
    DetectedRegion::new(cx - 60.0, cy - 60.0, 120.0, 120.0, confidence)
}

/// Sink that records every report.
#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<(f64, String)>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<(f64, String)> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, percent: f64, message: &str) {
        self.events.lock().unwrap().push((percent, message.to_string()));
    }
}
