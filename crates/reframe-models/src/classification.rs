//! Scene classification results.

use serde::{Deserialize, Serialize};

use crate::region::DetectedRegion;
use crate::strategy::CropStrategy;

/// Result of sampling a segment and deciding how to frame it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneClassification {
    /// Chosen framing strategy
    pub strategy: CropStrategy,
    /// Mean number of regions per decoded sample
    pub avg_detections: f64,
    /// Largest number of regions seen in one sample
    pub max_detections: usize,
    /// Mean inter-sample motion score (0-100)
    pub motion_score: f64,
    /// Most prominent region across all samples
    pub primary_region: Option<DetectedRegion>,
    /// Most recent regions seen, oldest first
    pub recent_regions: Vec<DetectedRegion>,
    /// Number of samples that decoded successfully
    pub sampled_frames: usize,
    /// Human-readable explanation of the decision
    pub reason: String,
}

impl SceneClassification {
    /// Classification for a segment where no frame could be decoded.
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self {
            strategy: CropStrategy::General,
            avg_detections: 0.0,
            max_detections: 0,
            motion_score: 0.0,
            primary_region: None,
            recent_regions: Vec::new(),
            sampled_frames: 0,
            reason: reason.into(),
        }
    }

    /// Whether at least one frame was sampled.
    pub fn has_samples(&self) -> bool {
        self.sampled_frames > 0
    }
}
