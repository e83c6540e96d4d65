//! Segment requests and reframing plans.

use serde::{Deserialize, Serialize};

use crate::classification::SceneClassification;
use crate::crop::CropFrame;

/// A time range of the source video to reframe, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentRequest {
    pub start: f64,
    pub end: f64,
}

impl SegmentRequest {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Segment duration in seconds (never negative).
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Whether the range is finite, non-negative and non-empty.
    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start >= 0.0 && self.end > self.start
    }
}

/// Stream properties of an opened source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// Total duration in seconds
    pub duration: f64,
}

/// Everything produced for one segment: the decision and the per-frame windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentPlan {
    pub request: SegmentRequest,
    pub source: SourceInfo,
    pub classification: SceneClassification,
    /// One crop window per output frame, in presentation order
    pub frames: Vec<CropFrame>,
}

impl SegmentPlan {
    /// Whether no crop windows were produced.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
