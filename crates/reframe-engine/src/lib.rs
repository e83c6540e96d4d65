#![deny(unreachable_patterns)]
//! Adaptive crop trajectory engine.
//!
//! This crate provides:
//! - Frame source abstraction with an FFmpeg CLI implementation
//! - Subject detection with ordered backend selection and a center heuristic fallback
//! - Scene classification into TRACK or GENERAL framing
//! - A heavy-tripod stabilizer with deadzone, hysteresis and velocity limits
//! - Keyframe sampling and interpolation into a per-frame crop trajectory
//! - An async planner that runs the synchronous work on blocking threads

pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
mod guard;
pub mod metrics;
pub mod motion;
pub mod planner;
pub mod progress;
pub mod source;
pub mod stabilizer;
pub mod trajectory;

pub use classifier::{decide_strategy, SceneClassifier};
pub use config::{ClassifierConfig, DetectorConfig, EngineConfig, TrajectoryConfig};
pub use detector::{
    default_backend_factories, BackendFactory, CenterHeuristic, DetectionBackend, SubjectDetector,
};
pub use error::{EngineError, EngineResult};
pub use motion::motion_score;
pub use planner::ReframePlanner;
pub use progress::{ChannelProgress, NoopProgress, ProgressEvent, ProgressSink};
pub use source::{FfmpegFrameSource, FfmpegOpener, Frame, FrameSource, FrameSourceOpener};
pub use stabilizer::{MovementStats, Stabilizer};
pub use trajectory::{average_window, interpolate, is_static, Keyframe, TrajectoryGenerator};
