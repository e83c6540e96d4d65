//! Scene classification.
//!
//! Samples a handful of frames across a segment, counts detected subjects and
//! measures inter-sample motion, then picks TRACK for single-subject scenes
//! and GENERAL for everything else.

use std::path::Path;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use reframe_models::{CropStrategy, DetectedRegion, SceneClassification};

use crate::config::ClassifierConfig;
use crate::detector::SubjectDetector;
use crate::error::EngineResult;
use crate::guard::{check_cancelled, check_segment};
use crate::metrics;
use crate::motion::motion_score;
use crate::source::{Frame, FrameSource, FrameSourceOpener};

/// TRACK iff both the mean and the peak detection counts are within bounds.
pub fn decide_strategy(
    avg_detections: f64,
    max_detections: usize,
    config: &ClassifierConfig,
) -> CropStrategy {
    if avg_detections <= config.track_max_avg_detections
        && max_detections <= config.track_max_peak_detections
    {
        CropStrategy::Track
    } else {
        CropStrategy::General
    }
}

/// Classifies segments by sampling frames through a [`SubjectDetector`].
pub struct SceneClassifier<'a> {
    detector: &'a SubjectDetector,
    config: ClassifierConfig,
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a> SceneClassifier<'a> {
    pub fn new(detector: &'a SubjectDetector, config: ClassifierConfig) -> Self {
        Self {
            detector,
            config,
            cancel: None,
        }
    }

    /// Stop between samples once the flag turns true.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Open `path`, classify `[start, end]` and close the source.
    pub fn classify(
        &self,
        opener: &dyn FrameSourceOpener,
        path: &Path,
        start: f64,
        end: f64,
    ) -> EngineResult<SceneClassification> {
        check_segment(start, end)?;

        let mut source = opener.open(path)?;
        let result = self.classify_source(source.as_mut(), start, end);
        source.close();
        result
    }

    /// Classify `[start, end]` on an already-open source.
    pub fn classify_source(
        &self,
        source: &mut dyn FrameSource,
        start: f64,
        end: f64,
    ) -> EngineResult<SceneClassification> {
        check_segment(start, end)?;
        let started = Instant::now();

        let fps = source.fps();
        let sample_count = self.config.sample_count.max(1);
        let interval = (end - start) / sample_count as f64;

        let mut counts: Vec<usize> = Vec::with_capacity(sample_count);
        let mut regions: Vec<DetectedRegion> = Vec::new();
        let mut motion: Vec<f64> = Vec::new();
        let mut prev: Option<Frame> = None;

        for i in 0..sample_count {
            check_cancelled(self.cancel.as_ref())?;

            let t = start + i as f64 * interval;
            let Some(frame) = read_sample(source, frame_aligned(t, fps)) else {
                metrics::record_decode_skip("classify");
                continue;
            };

            let found = self.detector.detect(&frame);
            counts.push(found.len());
            regions.extend(found);

            if let Some(prev) = prev.as_ref() {
                motion.push(motion_score(
                    prev,
                    &frame,
                    self.config.motion_scale,
                    self.config.motion_cap,
                ));
            }
            prev = Some(frame);
        }

        if counts.is_empty() {
            warn!(
                segment_start = start,
                segment_end = end,
                "No frames could be sampled, defaulting to general framing"
            );
            let classification = SceneClassification::degenerate(format!(
                "No frames sampled between {:.1}s and {:.1}s - using general layout",
                start, end
            ));
            metrics::record_classify_duration(
                classification.strategy.as_str(),
                started.elapsed().as_secs_f64(),
            );
            return Ok(classification);
        }

        let avg_detections = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
        let max_detections = counts.iter().copied().max().unwrap_or(0);
        let motion_score = if motion.is_empty() {
            0.0
        } else {
            motion.iter().sum::<f64>() / motion.len() as f64
        };

        let strategy = decide_strategy(avg_detections, max_detections, &self.config);
        let reason = match strategy {
            CropStrategy::Track => {
                format!("Single subject detected (avg {:.1} subjects)", avg_detections)
            }
            CropStrategy::General => format!(
                "Multiple subjects ({} max subjects) - using blur layout",
                max_detections
            ),
        };

        let keep_from = regions
            .len()
            .saturating_sub(self.config.recent_region_capacity);

        let classification = SceneClassification {
            strategy,
            avg_detections,
            max_detections,
            motion_score,
            primary_region: DetectedRegion::most_significant(&regions),
            recent_regions: regions[keep_from..].to_vec(),
            sampled_frames: counts.len(),
            reason,
        };

        metrics::record_classify_duration(strategy.as_str(), started.elapsed().as_secs_f64());
        info!(
            segment_start = start,
            segment_end = end,
            strategy = %strategy,
            sampled = counts.len(),
            avg_detections,
            max_detections,
            motion_score,
            backend = self.detector.backend_name(),
            "Scene classified"
        );

        Ok(classification)
    }
}

/// Snap a timestamp down to the start of its frame.
fn frame_aligned(t: f64, fps: f64) -> f64 {
    if fps.is_finite() && fps > 0.0 {
        (t * fps + 1e-9).floor() / fps
    } else {
        t
    }
}

/// Seek and read one frame; any failure or end of stream yields `None`.
fn read_sample(source: &mut dyn FrameSource, t: f64) -> Option<Frame> {
    if let Err(e) = source.seek(t) {
        debug!(timestamp = t, error = %e, "Seek failed, skipping sample");
        return None;
    }
    match source.read_frame() {
        Ok(Some(frame)) => Some(frame),
        Ok(None) => {
            debug!(timestamp = t, "End of stream, skipping sample");
            None
        }
        Err(e) => {
            debug!(timestamp = t, error = %e, "Decode failed, skipping sample");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_strategy_thresholds() {
        let config = ClassifierConfig::default();
        assert_eq!(decide_strategy(1.0, 2, &config), CropStrategy::Track);
        assert_eq!(decide_strategy(1.0, 3, &config), CropStrategy::General);
        assert_eq!(decide_strategy(2.0, 1, &config), CropStrategy::General);
        assert_eq!(decide_strategy(1.5, 2, &config), CropStrategy::Track);
        assert_eq!(decide_strategy(0.0, 0, &config), CropStrategy::Track);
    }

    #[test]
    fn test_decide_strategy_uses_configured_bounds() {
        let config = ClassifierConfig {
            track_max_avg_detections: 3.0,
            track_max_peak_detections: 4,
            ..Default::default()
        };
        assert_eq!(decide_strategy(2.5, 4, &config), CropStrategy::Track);
    }

    #[test]
    fn test_frame_aligned() {
        assert!((frame_aligned(1.05, 10.0) - 1.0).abs() < 1e-9);
        assert_eq!(frame_aligned(1.05, 0.0), 1.05);
    }
}
