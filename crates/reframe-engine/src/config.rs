//! Engine configuration.
//!
//! All tuning is supplied by the caller; the engine reads no environment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use reframe_models::{AspectRatio, StabilizerConfig};

use crate::error::{EngineError, EngineResult};

/// Top-level configuration for classification and trajectory generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub stabilizer: StabilizerConfig,
    pub classifier: ClassifierConfig,
    pub trajectory: TrajectoryConfig,
    pub detector: DetectorConfig,
}

impl EngineConfig {
    /// Check every group for out-of-range values.
    pub fn validate(&self) -> EngineResult<()> {
        self.stabilizer.validate()?;
        self.classifier.validate()?;
        self.trajectory.validate()?;
        self.detector.validate()?;
        Ok(())
    }
}

/// Configuration for scene classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Number of frames sampled across the segment (default: 10)
    pub sample_count: usize,

    // === Decision thresholds ===
    /// Highest mean detections per sample still framed as TRACK (default: 1.5)
    pub track_max_avg_detections: f64,
    /// Highest single-sample detection count still framed as TRACK (default: 2)
    pub track_max_peak_detections: usize,

    // === Motion ===
    /// Multiplier applied to the mean grayscale difference (default: 2.0)
    pub motion_scale: f64,
    /// Upper bound on the motion score (default: 100.0)
    pub motion_cap: f64,

    /// Number of most recent regions kept on the classification (default: 10)
    pub recent_region_capacity: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            sample_count: 10,
            track_max_avg_detections: 1.5,
            track_max_peak_detections: 2,
            motion_scale: 2.0,
            motion_cap: 100.0,
            recent_region_capacity: 10,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.sample_count == 0 {
            return Err(EngineError::InvalidConfig(
                "classifier.sample_count must be at least 1".to_string(),
            ));
        }
        if !(self.track_max_avg_detections.is_finite() && self.track_max_avg_detections >= 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "classifier.track_max_avg_detections = {} must be >= 0",
                self.track_max_avg_detections
            )));
        }
        if !(self.motion_scale.is_finite() && self.motion_scale > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "classifier.motion_scale = {} must be > 0",
                self.motion_scale
            )));
        }
        if !(self.motion_cap.is_finite() && self.motion_cap > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "classifier.motion_cap = {} must be > 0",
                self.motion_cap
            )));
        }
        Ok(())
    }
}

/// Configuration for keyframe sampling and crop output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// Detection rate the skip factor aims for, in keyframes per second (default: 10.0)
    pub target_detection_fps: f64,
    /// Progress is reported every this many keyframes (default: 10)
    pub progress_every_keyframes: usize,
    /// Confidence fed to the stabilizer when a keyframe has no region (default: 0.3)
    pub fallback_confidence: f64,
    /// Aspect ratio of TRACK windows (default: 9:16)
    pub output_aspect: AspectRatio,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            target_detection_fps: 10.0,
            progress_every_keyframes: 10,
            fallback_confidence: 0.3,
            output_aspect: AspectRatio::PORTRAIT,
        }
    }
}

impl TrajectoryConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.target_detection_fps.is_finite() && self.target_detection_fps > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "trajectory.target_detection_fps = {} must be > 0",
                self.target_detection_fps
            )));
        }
        if self.progress_every_keyframes == 0 {
            return Err(EngineError::InvalidConfig(
                "trajectory.progress_every_keyframes must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.fallback_confidence) {
            return Err(EngineError::InvalidConfig(format!(
                "trajectory.fallback_confidence = {} must be in [0, 1]",
                self.fallback_confidence
            )));
        }
        if self.output_aspect.width == 0 || self.output_aspect.height == 0 {
            return Err(EngineError::InvalidConfig(format!(
                "trajectory.output_aspect {} has a zero side",
                self.output_aspect
            )));
        }
        Ok(())
    }
}

/// Configuration for the detection backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum backend score for a region to count (default: 0.5)
    pub min_confidence: f64,
    /// Upper fraction of a person box treated as the face (default: 0.25)
    pub person_face_fraction: f64,
    /// YuNet ONNX model used by the OpenCV backend
    pub yunet_model_path: PathBuf,
    /// YOLOv8 ONNX model used by the ONNX Runtime backend
    pub yolo_model_path: PathBuf,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            person_face_fraction: 0.25,
            yunet_model_path: PathBuf::from("models/face_detection_yunet_2023mar.onnx"),
            yolo_model_path: PathBuf::from("models/object_detection/yolov8n.onnx"),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(EngineError::InvalidConfig(format!(
                "detector.min_confidence = {} must be in [0, 1]",
                self.min_confidence
            )));
        }
        if !(self.person_face_fraction > 0.0 && self.person_face_fraction <= 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "detector.person_face_fraction = {} must be in (0, 1]",
                self.person_face_fraction
            )));
        }
        Ok(())
    }
}
