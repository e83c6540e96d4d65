//! Worker configuration.

use std::path::PathBuf;

use reframe_engine::EngineConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum segments planned concurrently
    pub max_segment_parallel: usize,
    /// Classifier samples per segment
    pub sample_count: usize,
    /// Detection rate for trajectory keyframes
    pub target_detection_fps: f64,
    /// YuNet face model (used when built with `opencv`)
    pub yunet_model_path: PathBuf,
    /// YOLOv8 model (used when built with `onnx`)
    pub yolo_model_path: PathBuf,
    /// Emit JSON log lines instead of ANSI text
    pub json_logs: bool,
    /// Install the Prometheus recorder and log a snapshot at exit
    pub metrics_enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            max_segment_parallel: 2,
            sample_count: engine.classifier.sample_count,
            target_detection_fps: engine.trajectory.target_detection_fps,
            yunet_model_path: engine.detector.yunet_model_path,
            yolo_model_path: engine.detector.yolo_model_path,
            json_logs: false,
            metrics_enabled: false,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup; unset or unparsable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_segment_parallel: lookup("WORKER_MAX_SEGMENT_PARALLEL")
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_segment_parallel),
            sample_count: lookup("WORKER_SAMPLE_COUNT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sample_count),
            target_detection_fps: lookup("WORKER_TARGET_DETECTION_FPS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.target_detection_fps),
            yunet_model_path: lookup("REFRAME_YUNET_MODEL")
                .map(PathBuf::from)
                .unwrap_or(defaults.yunet_model_path),
            yolo_model_path: lookup("REFRAME_YOLO_MODEL")
                .map(PathBuf::from)
                .unwrap_or(defaults.yolo_model_path),
            json_logs: lookup("LOG_FORMAT")
                .map(|v| v.to_lowercase() == "json")
                .unwrap_or(false),
            metrics_enabled: lookup("METRICS_ENABLED")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
        }
    }

    /// Engine settings with this worker's overrides applied.
    pub fn to_engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.classifier.sample_count = self.sample_count;
        config.trajectory.target_detection_fps = self.target_detection_fps;
        config.detector.yunet_model_path = self.yunet_model_path.clone();
        config.detector.yolo_model_path = self.yolo_model_path.clone();
        config
    }
}
