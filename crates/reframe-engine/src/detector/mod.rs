//! Subject detection.
//!
//! Backends are tried once, in order, when a [`SubjectDetector`] is built.
//! The first backend that initializes serves every later call. With no
//! backend, or when the backend fails on a frame, the detector answers with
//! the [`CenterHeuristic`] region so callers always have a candidate.

mod heuristic;
#[cfg(feature = "onnx")]
mod yolo;
#[cfg(feature = "opencv")]
mod yunet;

pub use heuristic::CenterHeuristic;
#[cfg(feature = "onnx")]
pub use yolo::{YoloFactory, YoloPersonBackend};
#[cfg(feature = "opencv")]
pub use yunet::{YuNetBackend, YuNetFactory};

use tracing::{debug, info, warn};

use reframe_models::DetectedRegion;

use crate::config::DetectorConfig;
use crate::error::EngineResult;
use crate::metrics;
use crate::source::Frame;

/// Name reported when no backend is active.
pub const HEURISTIC_BACKEND: &str = "heuristic";

/// A concrete detection model.
pub trait DetectionBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Detect regions of interest in `frame`, in frame pixel coordinates.
    fn detect(&self, frame: &Frame) -> EngineResult<Vec<DetectedRegion>>;
}

/// Builds a backend, failing when its model or library is unavailable.
pub trait BackendFactory: Send + Sync {
    fn name(&self) -> &str;

    fn build(&self) -> EngineResult<Box<dyn DetectionBackend>>;
}

/// Backend factories compiled into this build, in priority order.
///
/// Face models come before person models.
#[allow(unused_variables)]
pub fn default_backend_factories(config: &DetectorConfig) -> Vec<Box<dyn BackendFactory>> {
    #[allow(unused_mut)]
    let mut factories: Vec<Box<dyn BackendFactory>> = Vec::new();

    #[cfg(feature = "opencv")]
    factories.push(Box::new(YuNetFactory::new(config.clone())));

    #[cfg(feature = "onnx")]
    factories.push(Box::new(YoloFactory::new(config.clone())));

    factories
}

/// Infallible subject detector over an optional backend.
pub struct SubjectDetector {
    backend: Option<Box<dyn DetectionBackend>>,
    heuristic: CenterHeuristic,
}

impl std::fmt::Debug for SubjectDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubjectDetector")
            .field("backend", &self.backend_name())
            .field("heuristic", &self.heuristic)
            .finish()
    }
}

impl SubjectDetector {
    /// Try each factory in order and keep the first backend that builds.
    pub fn select(factories: &[Box<dyn BackendFactory>]) -> Self {
        for factory in factories {
            match factory.build() {
                Ok(backend) => {
                    info!(backend = backend.name(), "Subject detection backend selected");
                    return Self::with_backend(backend);
                }
                Err(e) => {
                    warn!(backend = factory.name(), error = %e, "Detection backend unavailable");
                }
            }
        }

        info!(
            backend = HEURISTIC_BACKEND,
            "No detection backend available, using center heuristic"
        );
        Self::heuristic_only()
    }

    /// Detector that always answers with the heuristic region.
    pub fn heuristic_only() -> Self {
        Self {
            backend: None,
            heuristic: CenterHeuristic::default(),
        }
    }

    /// Detector over an already-built backend.
    pub fn with_backend(backend: Box<dyn DetectionBackend>) -> Self {
        Self {
            backend: Some(backend),
            heuristic: CenterHeuristic::default(),
        }
    }

    /// Name of the active backend.
    pub fn backend_name(&self) -> &str {
        self.backend
            .as_ref()
            .map(|b| b.name())
            .unwrap_or(HEURISTIC_BACKEND)
    }

    /// Whether a real backend is active.
    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Detect regions in `frame`.
    ///
    /// Never fails. Regions are clipped to the frame; a working backend's
    /// empty answer stays empty.
    pub fn detect(&self, frame: &Frame) -> Vec<DetectedRegion> {
        let (width, height) = frame.dimensions();

        let Some(backend) = self.backend.as_ref() else {
            metrics::record_detector_fallback("no_backend");
            return vec![self.heuristic.region(width, height)];
        };

        match backend.detect(frame) {
            Ok(regions) => regions
                .iter()
                .filter_map(|r| r.clip_to_frame(width, height))
                .collect(),
            Err(e) => {
                debug!(backend = backend.name(), error = %e, "Detection failed, using center heuristic");
                metrics::record_detector_fallback("backend_error");
                vec![self.heuristic.region(width, height)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    struct Failing;

    impl DetectionBackend for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn detect(&self, _frame: &Frame) -> EngineResult<Vec<DetectedRegion>> {
            Err(EngineError::detection_failed("model crashed"))
        }
    }

    struct Fixed(Vec<DetectedRegion>);

    impl DetectionBackend for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn detect(&self, _frame: &Frame) -> EngineResult<Vec<DetectedRegion>> {
            Ok(self.0.clone())
        }
    }

    struct Unbuildable;

    impl BackendFactory for Unbuildable {
        fn name(&self) -> &str {
            "unbuildable"
        }

        fn build(&self) -> EngineResult<Box<dyn DetectionBackend>> {
            Err(EngineError::model_not_found("missing.onnx"))
        }
    }

    struct Buildable;

    impl BackendFactory for Buildable {
        fn name(&self) -> &str {
            "fixed"
        }

        fn build(&self) -> EngineResult<Box<dyn DetectionBackend>> {
            Ok(Box::new(Fixed(Vec::new())))
        }
    }

    fn frame() -> Frame {
        Frame::new(1920, 1080)
    }

    #[test]
    fn test_heuristic_only_returns_center_region() {
        let detector = SubjectDetector::heuristic_only();
        let regions = detector.detect(&frame());
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].confidence, 0.8);
        assert_eq!(detector.backend_name(), HEURISTIC_BACKEND);
    }

    #[test]
    fn test_backend_error_falls_back_to_heuristic() {
        let detector = SubjectDetector::with_backend(Box::new(Failing));
        let regions = detector.detect(&frame());
        assert_eq!(regions.len(), 1);
        assert!((regions[0].cx() - 960.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_backend_result_stays_empty() {
        let detector = SubjectDetector::with_backend(Box::new(Fixed(Vec::new())));
        assert!(detector.detect(&frame()).is_empty());
    }

    #[test]
    fn test_backend_regions_are_clipped() {
        let detector = SubjectDetector::with_backend(Box::new(Fixed(vec![
            DetectedRegion::new(1800.0, 0.0, 400.0, 100.0, 0.9),
            DetectedRegion::new(5000.0, 0.0, 10.0, 10.0, 0.9),
        ])));
        let regions = detector.detect(&frame());
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].width, 120.0);
    }

    #[test]
    fn test_select_keeps_first_buildable() {
        let factories: Vec<Box<dyn BackendFactory>> =
            vec![Box::new(Unbuildable), Box::new(Buildable)];
        let detector = SubjectDetector::select(&factories);
        assert_eq!(detector.backend_name(), "fixed");
        assert!(detector.has_backend());
    }

    #[test]
    fn test_select_without_factories_is_heuristic() {
        let detector = SubjectDetector::select(&[]);
        assert!(!detector.has_backend());
    }
}
