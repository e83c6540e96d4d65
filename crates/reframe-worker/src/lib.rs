//! Batch host for the reframe engine.
//!
//! Reads a job file naming a video and its segments, plans every segment's
//! crop trajectory concurrently and reports the results as JSON.

pub mod config;
pub mod error;
pub mod job;
pub mod logging;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use job::{run_job, JobReport, ReframeJob, SegmentOutcome, SegmentStatus};
