//! Async facade over the synchronous engine.
//!
//! Every call runs on tokio's blocking pool so frame decoding and detection
//! never stall the async scheduler.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task;
use tracing::info;

use reframe_models::{CropFrame, SceneClassification, SegmentPlan, SegmentRequest};

use crate::classifier::SceneClassifier;
use crate::config::EngineConfig;
use crate::detector::{default_backend_factories, SubjectDetector};
use crate::error::{EngineError, EngineResult};
use crate::guard::check_segment;
use crate::progress::ProgressSink;
use crate::source::{FfmpegOpener, FrameSourceOpener};
use crate::trajectory::TrajectoryGenerator;

/// Plans crop trajectories for segments of one or more videos.
///
/// Cheap to clone; clones share the detector and opener.
#[derive(Clone)]
pub struct ReframePlanner {
    config: Arc<EngineConfig>,
    detector: Arc<SubjectDetector>,
    opener: Arc<dyn FrameSourceOpener>,
    cancel: Option<watch::Receiver<bool>>,
}

impl ReframePlanner {
    /// Create a planner, rejecting invalid configuration.
    pub fn new(
        config: EngineConfig,
        detector: Arc<SubjectDetector>,
        opener: Arc<dyn FrameSourceOpener>,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            detector,
            opener,
            cancel: None,
        })
    }

    /// Planner over the FFmpeg CLI with the compiled-in detection backends.
    pub fn with_ffmpeg(config: EngineConfig) -> EngineResult<Self> {
        let detector = SubjectDetector::select(&default_backend_factories(&config.detector));
        info!(backend = detector.backend_name(), "Reframe planner ready");
        Self::new(config, Arc::new(detector), Arc::new(FfmpegOpener))
    }

    /// Abort in-flight work between samples once the flag turns true.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn detector(&self) -> &SubjectDetector {
        &self.detector
    }

    /// Classify `[start, end]` of the video at `path`.
    pub async fn classify(
        &self,
        path: impl Into<PathBuf>,
        start: f64,
        end: f64,
    ) -> EngineResult<SceneClassification> {
        let path = path.into();
        let this = self.clone();

        run_blocking(move || this.classifier().classify(this.opener.as_ref(), &path, start, end))
            .await
    }

    /// Generate the crop trajectory for `[start, end]` using a prior classification.
    pub async fn generate(
        &self,
        path: impl Into<PathBuf>,
        start: f64,
        end: f64,
        classification: SceneClassification,
        progress: Arc<dyn ProgressSink>,
    ) -> EngineResult<Vec<CropFrame>> {
        let path = path.into();
        let this = self.clone();

        run_blocking(move || {
            this.generator().generate(
                this.opener.as_ref(),
                &path,
                start,
                end,
                &classification,
                progress.as_ref(),
            )
        })
        .await
    }

    /// Classify then generate on one source handle.
    pub async fn plan_segment(
        &self,
        path: impl Into<PathBuf>,
        request: SegmentRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> EngineResult<SegmentPlan> {
        check_segment(request.start, request.end)?;

        let path = path.into();
        let this = self.clone();

        run_blocking(move || {
            let mut source = this.opener.open(&path)?;
            let info = source.info();

            let planned = this
                .classifier()
                .classify_source(source.as_mut(), request.start, request.end)
                .and_then(|classification| {
                    let frames = this.generator().generate_from_source(
                        source.as_mut(),
                        request.start,
                        request.end,
                        &classification,
                        progress.as_ref(),
                    )?;
                    Ok((classification, frames))
                });
            source.close();

            let (classification, frames) = planned?;
            Ok(SegmentPlan {
                request,
                source: info,
                classification,
                frames,
            })
        })
        .await
    }

    fn classifier(&self) -> SceneClassifier<'_> {
        let classifier = SceneClassifier::new(&self.detector, self.config.classifier.clone());
        match self.cancel.clone() {
            Some(cancel) => classifier.with_cancel(cancel),
            None => classifier,
        }
    }

    fn generator(&self) -> TrajectoryGenerator<'_> {
        let generator = TrajectoryGenerator::from_config(&self.detector, &self.config);
        match self.cancel.clone() {
            Some(cancel) => generator.with_cancel(cancel),
            None => generator,
        }
    }
}

async fn run_blocking<T, F>(f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| EngineError::internal(format!("Blocking task failed: {}", e)))?
}
