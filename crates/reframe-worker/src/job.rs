//! Reframe job files and their execution.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use reframe_engine::{ChannelProgress, ProgressEvent, ReframePlanner};
use reframe_models::{CropFrame, CropRect, CropStrategy, SegmentPlan, SegmentRequest, SourceInfo};

use crate::error::{WorkerError, WorkerResult};

/// A video and the segments to reframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReframeJob {
    pub video_path: PathBuf,
    pub segments: Vec<SegmentRequest>,
}

impl ReframeJob {
    /// Read and validate a job file.
    pub fn load(path: impl AsRef<Path>) -> WorkerResult<Self> {
        let data = std::fs::read_to_string(path)?;
        let job: Self = serde_json::from_str(&data)?;
        job.validate()?;
        Ok(job)
    }

    pub fn validate(&self) -> WorkerResult<()> {
        if self.segments.is_empty() {
            return Err(WorkerError::invalid_job("job has no segments"));
        }
        if let Some((i, seg)) = self.segments.iter().enumerate().find(|(_, s)| !s.is_valid()) {
            return Err(WorkerError::invalid_job(format!(
                "segment {} has invalid range {}..{}",
                i, seg.start, seg.end
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    Ok,
    /// No frames could be sampled or decoded
    Empty,
    Failed,
}

/// Result for one segment of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentOutcome {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub status: SegmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<CropStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInfo>,
    /// Single averaged crop for renderers that apply one static window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_window: Option<CropRect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<CropFrame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SegmentOutcome {
    fn from_plan(index: usize, plan: SegmentPlan) -> Self {
        let status = if plan.is_empty() {
            SegmentStatus::Empty
        } else {
            SegmentStatus::Ok
        };
        let average_window =
            reframe_engine::average_window(&plan.frames, plan.source.width, plan.source.height);

        Self {
            index,
            start: plan.request.start,
            end: plan.request.end,
            status,
            strategy: Some(plan.classification.strategy),
            reason: Some(plan.classification.reason),
            source: Some(plan.source),
            average_window,
            frames: plan.frames,
            error: None,
        }
    }

    fn failed(index: usize, request: SegmentRequest, error: impl ToString) -> Self {
        Self {
            index,
            start: request.start,
            end: request.end,
            status: SegmentStatus::Failed,
            strategy: None,
            reason: None,
            source: None,
            average_window: None,
            frames: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

/// Output document for a whole job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub video_path: PathBuf,
    pub segments: Vec<SegmentOutcome>,
    pub elapsed_secs: f64,
}

impl JobReport {
    pub fn count(&self, status: SegmentStatus) -> usize {
        self.segments.iter().filter(|s| s.status == status).count()
    }
}

/// Plan every segment of `job`, at most `max_parallel` at a time.
///
/// Segment failures are recorded in the report; only task-level failures
/// abort the job.
pub async fn run_job(
    planner: &ReframePlanner,
    job: &ReframeJob,
    max_parallel: usize,
) -> WorkerResult<JobReport> {
    let started = Instant::now();
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let (progress, rx) = ChannelProgress::channel();
    let progress_task = tokio::spawn(log_progress(rx));

    info!(
        video = %job.video_path.display(),
        segments = job.segments.len(),
        max_parallel,
        "Planning reframe job"
    );

    let handles: Vec<_> = job
        .segments
        .iter()
        .enumerate()
        .map(|(index, request)| {
            let request = *request;
            let planner = planner.clone();
            let video_path = job.video_path.clone();
            let sink = Arc::new(progress.for_segment(index));
            let semaphore = semaphore.clone();

            tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| WorkerError::task_failed(e.to_string()))?;

                let outcome = match planner.plan_segment(video_path, request, sink).await {
                    Ok(plan) => SegmentOutcome::from_plan(index, plan),
                    Err(e) => {
                        warn!(segment = index, error = %e, "Segment planning failed");
                        SegmentOutcome::failed(index, request, e)
                    }
                };
                Ok::<_, WorkerError>(outcome)
            })
        })
        .collect();

    let mut segments = Vec::with_capacity(handles.len());
    for handle in handles {
        let outcome = handle
            .await
            .map_err(|e| WorkerError::task_failed(e.to_string()))??;
        segments.push(outcome);
    }

    // Closing the last sender ends the progress task.
    drop(progress);
    progress_task.await.ok();

    let report = JobReport {
        video_path: job.video_path.clone(),
        segments,
        elapsed_secs: started.elapsed().as_secs_f64(),
    };

    info!(
        ok = report.count(SegmentStatus::Ok),
        empty = report.count(SegmentStatus::Empty),
        failed = report.count(SegmentStatus::Failed),
        elapsed_secs = report.elapsed_secs,
        "Reframe job complete"
    );

    Ok(report)
}

async fn log_progress(mut rx: tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>) {
    while let Some(event) = rx.recv().await {
        info!(
            segment = event.segment,
            percent = event.percent,
            "{}", event.message
        );
    }
}
